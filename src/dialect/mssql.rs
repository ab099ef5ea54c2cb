//! Microsoft SQL Server方言实现

use crate::dialect::SqlDialect;
use crate::error::DbPoolError;
use crate::types::DbType;

/// SQL Server方言
#[derive(Debug)]
pub struct MssqlDialect {
    /// 2005及更早版本（TOP分页），否则OFFSET/FETCH
    legacy: bool,
}

impl MssqlDialect {
    /// SQL Server 2005及更早版本的变体
    pub fn legacy() -> Self {
        Self { legacy: true }
    }

    /// 当前版本的变体
    pub fn current() -> Self {
        Self { legacy: false }
    }
}

impl SqlDialect for MssqlDialect {
    fn name(&self) -> &'static str {
        if self.legacy { "mssql90" } else { "mssql" }
    }

    fn column_type(&self, db_type: DbType, size: u64, precision: u32, _binary: bool) -> String {
        match db_type {
            DbType::Boolean => "BIT".to_string(),
            DbType::Byte => "TINYINT".to_string(),
            DbType::Short => "SMALLINT".to_string(),
            DbType::Int => "INT".to_string(),
            DbType::Long | DbType::Id => "BIGINT".to_string(),
            DbType::Float => "REAL".to_string(),
            DbType::Double => "FLOAT".to_string(),
            DbType::Decimal => format!("DECIMAL({},{})", size, precision),
            DbType::Char => format!("NCHAR({})", size),
            DbType::String => format!("NVARCHAR({})", size),
            DbType::Date => "DATE".to_string(),
            DbType::Time => "TIME".to_string(),
            DbType::DateTime => "DATETIME2(3)".to_string(),
            DbType::Clob => "NVARCHAR(MAX)".to_string(),
            DbType::Blob => "VARBINARY(MAX)".to_string(),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name)
    }

    fn escape(&self, value: &str) -> String {
        // N前缀保证Unicode字面量
        let mut out = String::with_capacity(value.len() + 3);
        out.push_str("N'");
        for c in value.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
        out
    }

    fn fn_now(&self) -> &'static str {
        "GETDATE()"
    }

    fn supports_limit_start(&self) -> bool {
        !self.legacy
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_start(&self, sql: &mut String, _start_row: u64, stop_row: u64) {
        if self.legacy {
            // 旧版本只能截断，不能跳过
            sql.push_str(&format!("SELECT TOP {} * FROM (", stop_row));
        }
    }

    fn limit_last(&self, sql: &mut String, start_row: u64, stop_row: u64) {
        if self.legacy {
            sql.push_str(") AS limited_");
        } else {
            sql.push_str(&format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                start_row,
                stop_row - start_row
            ));
        }
    }

    fn for_update1(&self) -> &'static str {
        " WITH (UPDLOCK)"
    }

    // 行锁通过表提示表达，语句尾部无子句
    fn for_update2(&self) -> &'static str {
        ""
    }

    fn can_retry(&self, err: &DbPoolError) -> bool {
        match err {
            DbPoolError::SqlError { message, sql_state } => {
                sql_state.as_deref() == Some("40001") || message.contains("deadlock")
            }
            _ => false,
        }
    }
}
