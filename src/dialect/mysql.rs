//! MySQL/MariaDB方言实现

use crate::dialect::SqlDialect;
use crate::error::DbPoolError;
use crate::types::DbType;

/// MySQL方言（同时服务于MariaDB）
#[derive(Debug)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// 创建MySQL方言
    pub fn new() -> Self {
        Self
    }
}

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn column_type(&self, db_type: DbType, size: u64, precision: u32, binary: bool) -> String {
        match db_type {
            DbType::Boolean => "TINYINT(1)".to_string(),
            DbType::Byte => "TINYINT".to_string(),
            DbType::Short => "SMALLINT".to_string(),
            DbType::Int => "INT".to_string(),
            DbType::Long | DbType::Id => "BIGINT".to_string(),
            DbType::Float => "FLOAT".to_string(),
            DbType::Double => "DOUBLE".to_string(),
            DbType::Decimal => format!("DECIMAL({},{})", size, precision),
            DbType::Char => {
                if binary {
                    format!("CHAR({}) BINARY", size)
                } else {
                    format!("CHAR({})", size)
                }
            }
            DbType::String => {
                if binary {
                    format!("VARCHAR({}) BINARY", size)
                } else {
                    format!("VARCHAR({})", size)
                }
            }
            DbType::Date => "DATE".to_string(),
            DbType::Time => "TIME".to_string(),
            DbType::DateTime => "DATETIME(3)".to_string(),
            DbType::Clob => "LONGTEXT".to_string(),
            DbType::Blob => "LONGBLOB".to_string(),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name)
    }

    fn escape(&self, value: &str) -> String {
        // MySQL默认启用反斜杠转义，两种元字符都要翻倍
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn fn_now(&self) -> &'static str {
        "NOW(3)"
    }

    fn supports_limit_start(&self) -> bool {
        true
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_last(&self, sql: &mut String, start_row: u64, stop_row: u64) {
        if start_row > 0 {
            sql.push_str(&format!(" LIMIT {}, {}", start_row, stop_row - start_row));
        } else {
            sql.push_str(&format!(" LIMIT {}", stop_row));
        }
    }

    fn can_retry(&self, err: &DbPoolError) -> bool {
        match err.sql_state() {
            // 死锁与锁等待超时可以重试
            Some("40001") | Some("41000") => true,
            _ => match err {
                DbPoolError::SqlError { message, .. } => message.contains("Deadlock"),
                _ => false,
            },
        }
    }
}
