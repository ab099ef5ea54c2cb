//! 通用方言与轻量方言实现

use crate::dialect::SqlDialect;
use crate::types::DbType;

/// 通用回退方言
///
/// 完全使用trait默认行为，未识别的数据库靠它保证池可以启动
#[derive(Debug)]
pub struct GenericDialect;

impl SqlDialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}

/// H2方言
#[derive(Debug)]
pub struct H2Dialect;

impl SqlDialect for H2Dialect {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn supports_limit_start(&self) -> bool {
        true
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_last(&self, sql: &mut String, start_row: u64, stop_row: u64) {
        sql.push_str(&format!(" LIMIT {}", stop_row - start_row));
        if start_row > 0 {
            sql.push_str(&format!(" OFFSET {}", start_row));
        }
    }
}

/// SQLite方言
///
/// 列类型落到SQLite的类型亲和性上；不支持行级锁子句
#[derive(Debug)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, db_type: DbType, _size: u64, _precision: u32, _binary: bool) -> String {
        match db_type {
            DbType::Boolean
            | DbType::Byte
            | DbType::Short
            | DbType::Int
            | DbType::Long
            | DbType::Id => "INTEGER".to_string(),
            DbType::Float | DbType::Double => "REAL".to_string(),
            DbType::Decimal => "NUMERIC".to_string(),
            DbType::Char | DbType::String | DbType::Clob => "TEXT".to_string(),
            // SQLite没有原生日期类型，按文本存储ISO格式
            DbType::Date | DbType::Time | DbType::DateTime => "TEXT".to_string(),
            DbType::Blob => "BLOB".to_string(),
        }
    }

    fn supports_limit_start(&self) -> bool {
        true
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_last(&self, sql: &mut String, start_row: u64, stop_row: u64) {
        sql.push_str(&format!(" LIMIT {}", stop_row - start_row));
        if start_row > 0 {
            sql.push_str(&format!(" OFFSET {}", start_row));
        }
    }

    fn for_update1(&self) -> &'static str {
        ""
    }

    // SQLite整库锁，不存在行级FOR UPDATE
    fn for_update2(&self) -> &'static str {
        ""
    }

    fn can_retry(&self, err: &crate::error::DbPoolError) -> bool {
        // SQLITE_BUSY / SQLITE_LOCKED 重试有意义
        match err {
            crate::error::DbPoolError::SqlError { message, .. } => {
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}
