//! IBM DB2方言实现

use crate::dialect::SqlDialect;
use crate::types::DbType;

/// DB2方言
#[derive(Debug)]
pub struct Db2Dialect;

impl SqlDialect for Db2Dialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn ping_sql(&self) -> &'static str {
        "SELECT 1 FROM SYSIBM.SYSDUMMY1"
    }

    fn column_type(&self, db_type: DbType, size: u64, precision: u32, _binary: bool) -> String {
        match db_type {
            // DB2 9.7之前没有布尔类型
            DbType::Boolean => "SMALLINT".to_string(),
            DbType::Byte | DbType::Short => "SMALLINT".to_string(),
            DbType::Int => "INTEGER".to_string(),
            DbType::Long | DbType::Id => "BIGINT".to_string(),
            DbType::Float => "REAL".to_string(),
            DbType::Double => "DOUBLE".to_string(),
            DbType::Decimal => format!("DECIMAL({},{})", size, precision),
            DbType::Char => format!("CHAR({})", size),
            DbType::String => format!("VARCHAR({})", size),
            DbType::Date => "DATE".to_string(),
            DbType::Time => "TIME".to_string(),
            DbType::DateTime => "TIMESTAMP".to_string(),
            DbType::Clob => format!("CLOB({})", size.max(1)),
            DbType::Blob => format!("BLOB({})", size.max(1)),
        }
    }

    fn supports_limit_stop(&self) -> bool {
        true
    }

    fn limit_last(&self, sql: &mut String, _start_row: u64, stop_row: u64) {
        sql.push_str(&format!(" FETCH FIRST {} ROWS ONLY", stop_row));
    }

    fn for_update2(&self) -> &'static str {
        " FOR UPDATE WITH RS"
    }
}
