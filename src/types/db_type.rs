//! 抽象列类型定义
//!
//! 封闭枚举，建立与JDBC类型代码的固定对应关系，
//! 由方言层翻译为各数据库厂商的列语法

use serde::{Deserialize, Serialize};

/// 抽象列类型
///
/// 每个成员对应一个固定的SQL类型代码，并声明长度/精度/二进制标志的适用性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    /// 布尔
    Boolean,
    /// 单字节整数
    Byte,
    /// 短整数
    Short,
    /// 整数
    Int,
    /// 长整数
    Long,
    /// 标识符（内部按长整数存储）
    Id,
    /// 单精度浮点
    Float,
    /// 双精度浮点
    Double,
    /// 定点小数
    Decimal,
    /// 定长字符
    Char,
    /// 变长字符串
    String,
    /// 日期
    Date,
    /// 时间
    Time,
    /// 日期时间
    DateTime,
    /// 大文本
    Clob,
    /// 大二进制
    Blob,
}

impl DbType {
    /// 获取对应的SQL类型代码（与JDBC java.sql.Types对齐）
    pub fn sql_type_code(&self) -> i32 {
        match self {
            DbType::Boolean => 16,
            DbType::Byte => -6,
            DbType::Short => 5,
            DbType::Int => 4,
            DbType::Long => -5,
            DbType::Id => -5,
            DbType::Float => 7,
            DbType::Double => 8,
            DbType::Decimal => 3,
            DbType::Char => 1,
            DbType::String => 12,
            DbType::Date => 91,
            DbType::Time => 92,
            DbType::DateTime => 93,
            DbType::Clob => 2005,
            DbType::Blob => 2004,
        }
    }

    /// 从SQL类型代码解析抽象列类型
    ///
    /// 标识符类型无法从代码区分，长整数代码统一解析为 [DbType::Long]
    pub fn from_sql_type_code(code: i32) -> Option<Self> {
        match code {
            16 => Some(DbType::Boolean),
            -6 => Some(DbType::Byte),
            5 => Some(DbType::Short),
            4 => Some(DbType::Int),
            -5 => Some(DbType::Long),
            7 => Some(DbType::Float),
            8 => Some(DbType::Double),
            3 | 2 => Some(DbType::Decimal),
            1 => Some(DbType::Char),
            12 => Some(DbType::String),
            91 => Some(DbType::Date),
            92 => Some(DbType::Time),
            93 => Some(DbType::DateTime),
            2005 => Some(DbType::Clob),
            2004 => Some(DbType::Blob),
            _ => None,
        }
    }

    /// 该类型的DDL是否携带长度注解
    pub fn has_size(&self) -> bool {
        matches!(
            self,
            DbType::Char | DbType::String | DbType::Decimal | DbType::Clob | DbType::Blob
        )
    }

    /// 该类型的DDL是否携带精度注解
    pub fn has_precision(&self) -> bool {
        matches!(self, DbType::Decimal)
    }

    /// 二进制标志对该类型是否有意义（影响排序规则/字节比较）
    pub fn binary_applicable(&self) -> bool {
        matches!(self, DbType::Char | DbType::String | DbType::Clob)
    }

    /// 获取类型的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Boolean => "boolean",
            DbType::Byte => "byte",
            DbType::Short => "short",
            DbType::Int => "int",
            DbType::Long => "long",
            DbType::Id => "id",
            DbType::Float => "float",
            DbType::Double => "double",
            DbType::Decimal => "decimal",
            DbType::Char => "char",
            DbType::String => "string",
            DbType::Date => "date",
            DbType::Time => "time",
            DbType::DateTime => "datetime",
            DbType::Clob => "clob",
            DbType::Blob => "blob",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_roundtrip() {
        for db_type in [
            DbType::Boolean,
            DbType::Byte,
            DbType::Short,
            DbType::Int,
            DbType::Long,
            DbType::Float,
            DbType::Double,
            DbType::Decimal,
            DbType::Char,
            DbType::String,
            DbType::Date,
            DbType::Time,
            DbType::DateTime,
            DbType::Clob,
            DbType::Blob,
        ] {
            let code = db_type.sql_type_code();
            assert_eq!(DbType::from_sql_type_code(code), Some(db_type));
        }
    }

    #[test]
    fn test_id_maps_to_long_code() {
        // 标识符按长整数存储，代码反向解析得到Long
        assert_eq!(DbType::Id.sql_type_code(), DbType::Long.sql_type_code());
        assert_eq!(
            DbType::from_sql_type_code(DbType::Id.sql_type_code()),
            Some(DbType::Long)
        );
    }

    #[test]
    fn test_annotation_flags() {
        assert!(DbType::String.has_size());
        assert!(!DbType::Int.has_size());
        assert!(DbType::Decimal.has_precision());
        assert!(!DbType::String.has_precision());
        assert!(DbType::String.binary_applicable());
        assert!(!DbType::Blob.binary_applicable());
    }
}
