//! PostgreSQL方言实现

use crate::dialect::SqlDialect;
use crate::error::DbPoolError;
use crate::types::{DbType, SqlValue};

/// PostgreSQL方言
#[derive(Debug)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn column_type(&self, db_type: DbType, size: u64, precision: u32, _binary: bool) -> String {
        match db_type {
            DbType::Boolean => "BOOLEAN".to_string(),
            // PostgreSQL没有单字节整数
            DbType::Byte | DbType::Short => "SMALLINT".to_string(),
            DbType::Int => "INTEGER".to_string(),
            DbType::Long | DbType::Id => "BIGINT".to_string(),
            DbType::Float => "REAL".to_string(),
            DbType::Double => "DOUBLE PRECISION".to_string(),
            DbType::Decimal => format!("NUMERIC({},{})", size, precision),
            DbType::Char => format!("CHAR({})", size),
            DbType::String => format!("VARCHAR({})", size),
            DbType::Date => "DATE".to_string(),
            DbType::Time => "TIME".to_string(),
            DbType::DateTime => "TIMESTAMP(3)".to_string(),
            DbType::Clob => "TEXT".to_string(),
            DbType::Blob => "BYTEA".to_string(),
        }
    }

    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 12);
                out.push_str("'\\x");
                for byte in b {
                    out.push_str(&format!("{:02x}", byte));
                }
                out.push_str("'::BYTEA");
                out
            }
            other => {
                // 其余类型沿用通用格式
                generic_literal(self, other)
            }
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

    fn can_retry(&self, err: &DbPoolError) -> bool {
        // 串行化失败与死锁检测
        matches!(err.sql_state(), Some("40001") | Some("40P01"))
    }
}

/// 绕开方言自身 literal 覆盖，取得trait默认格式
fn generic_literal(dialect: &dyn SqlDialect, value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Decimal(d) => d.clone(),
        SqlValue::Str(s) => dialect.escape(s),
        SqlValue::Bytes(_) => unreachable!("字节字面量由调用方处理"),
        SqlValue::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        SqlValue::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S")),
        SqlValue::DateTime(dt) => format!("TIMESTAMP '{}'", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
    }
}
