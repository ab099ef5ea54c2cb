//! Oracle方言实现
//!
//! 以变体字段区分12c之前/兼容模式/当前模式，
//! 替代按版本派生子类的做法

use crate::dialect::SqlDialect;
use crate::error::DbPoolError;
use crate::types::{DbType, SqlValue};

/// Oracle方言变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OracleVariant {
    /// 12c之前的驱动与数据库
    Legacy,
    /// 12c驱动连接12c之前的数据库
    Compat,
    /// 12c及以后
    Current,
}

/// Oracle方言
#[derive(Debug)]
pub struct OracleDialect {
    variant: OracleVariant,
}

impl OracleDialect {
    /// 12c之前的变体（ROWNUM分页）
    pub fn legacy() -> Self {
        Self {
            variant: OracleVariant::Legacy,
        }
    }

    /// 12c驱动连接旧数据库的兼容变体
    pub fn compat() -> Self {
        Self {
            variant: OracleVariant::Compat,
        }
    }

    /// 12c及以后的变体（OFFSET/FETCH分页）
    pub fn current() -> Self {
        Self {
            variant: OracleVariant::Current,
        }
    }

    fn offset_fetch(&self) -> bool {
        self.variant == OracleVariant::Current
    }
}

impl SqlDialect for OracleDialect {
    fn name(&self) -> &'static str {
        match self.variant {
            OracleVariant::Legacy => "oracle10",
            OracleVariant::Compat => "oracle12-compat",
            OracleVariant::Current => "oracle12",
        }
    }

    fn ping_sql(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn column_type(&self, db_type: DbType, size: u64, precision: u32, _binary: bool) -> String {
        match db_type {
            DbType::Boolean => "NUMBER(1)".to_string(),
            DbType::Byte => "NUMBER(3)".to_string(),
            DbType::Short => "NUMBER(5)".to_string(),
            DbType::Int => "NUMBER(10)".to_string(),
            DbType::Long | DbType::Id => "NUMBER(19)".to_string(),
            DbType::Float => "BINARY_FLOAT".to_string(),
            DbType::Double => "BINARY_DOUBLE".to_string(),
            DbType::Decimal => format!("NUMBER({},{})", size, precision),
            DbType::Char => format!("CHAR({} CHAR)", size),
            DbType::String => format!("VARCHAR2({} CHAR)", size),
            // Oracle的DATE同时携带时间部分
            DbType::Date | DbType::Time => "DATE".to_string(),
            DbType::DateTime => "TIMESTAMP(3)".to_string(),
            DbType::Clob => "CLOB".to_string(),
            DbType::Blob => "BLOB".to_string(),
        }
    }

    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Date(d) => {
                format!("TO_DATE('{}', 'YYYY-MM-DD')", d.format("%Y-%m-%d"))
            }
            SqlValue::DateTime(dt) => format!(
                "TO_TIMESTAMP('{}', 'YYYY-MM-DD HH24:MI:SS.FF3')",
                dt.format("%Y-%m-%d %H:%M:%S%.3f")
            ),
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Decimal(d) => d.clone(),
            SqlValue::Str(s) => self.escape(s),
            SqlValue::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 12);
                out.push_str("HEXTORAW('");
                for byte in b {
                    out.push_str(&format!("{:02X}", byte));
                }
                out.push_str("')");
                out
            }
            SqlValue::Time(t) => {
                format!("TO_DATE('{}', 'HH24:MI:SS')", t.format("%H:%M:%S"))
            }
        }
    }

    fn fn_now(&self) -> &'static str {
        "SYSTIMESTAMP"
    }

    fn supports_limit_start(&self) -> bool {
        true
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_start(&self, sql: &mut String, start_row: u64, _stop_row: u64) {
        if self.offset_fetch() {
            return;
        }
        // 12c之前用ROWNUM包装查询
        if start_row > 0 {
            sql.push_str("SELECT * FROM (SELECT inner_.*, ROWNUM rn_ FROM (");
        } else {
            sql.push_str("SELECT * FROM (");
        }
    }

    fn limit_last(&self, sql: &mut String, start_row: u64, stop_row: u64) {
        if self.offset_fetch() {
            sql.push_str(&format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                start_row,
                stop_row - start_row
            ));
            return;
        }
        if start_row > 0 {
            sql.push_str(&format!(
                ") inner_ WHERE ROWNUM <= {}) WHERE rn_ > {}",
                stop_row, start_row
            ));
        } else {
            sql.push_str(&format!(") WHERE ROWNUM <= {}", stop_row));
        }
    }

    fn for_update2(&self) -> &'static str {
        " FOR UPDATE NOWAIT"
    }

    fn can_retry(&self, err: &DbPoolError) -> bool {
        match err {
            // ORA-00060: 死锁; ORA-08177: 串行化冲突
            DbPoolError::SqlError { message, sql_state } => {
                sql_state.as_deref() == Some("61000")
                    || message.contains("ORA-00060")
                    || message.contains("ORA-08177")
            }
            _ => false,
        }
    }
}
