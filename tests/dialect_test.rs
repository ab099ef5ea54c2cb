//! 方言检测与SQL生成测试

mod common;

use chrono::{TimeZone, Utc};
use common::metadata;
use rat_dbpool::{
    DbPoolError, DbType, MssqlDialect, MysqlDialect, OracleDialect, PostgresDialect, SqlDialect,
    SqlValue, detect_dialect, dialect_by_name,
};

#[test]
fn test_detect_mysql() {
    let dialect = detect_dialect(&metadata("MySQL", "MySQL Connector", 8, 0, 8)).unwrap();
    assert_eq!(dialect.name(), "mysql");
}

#[test]
fn test_detect_mysql_below_floor_is_error() {
    // 5.5 以下版本直接拒绝
    let err = detect_dialect(&metadata("MySQL", "MySQL Connector", 5, 1, 5)).unwrap_err();
    assert!(matches!(err, DbPoolError::DialectError { .. }));
}

#[test]
fn test_detect_mariadb_uses_mysql_dialect() {
    let dialect = detect_dialect(&metadata("MariaDB", "MariaDB driver", 10, 6, 3)).unwrap();
    assert_eq!(dialect.name(), "mysql");
}

#[test]
fn test_detect_oracle_variants() {
    // 12驱动 + 12库 → 当前变体
    let dialect = detect_dialect(&metadata("Oracle", "Oracle JDBC", 19, 0, 19)).unwrap();
    assert_eq!(dialect.name(), "oracle12");

    // 12驱动 + 旧库 → 兼容变体
    let dialect = detect_dialect(&metadata("Oracle", "Oracle JDBC", 11, 2, 12)).unwrap();
    assert_eq!(dialect.name(), "oracle12-compat");

    // 旧驱动 → 旧变体
    let dialect = detect_dialect(&metadata("Oracle", "Oracle JDBC", 11, 2, 10)).unwrap();
    assert_eq!(dialect.name(), "oracle10");

    // 9及以下驱动拒绝
    let err = detect_dialect(&metadata("Oracle", "Oracle JDBC", 9, 0, 9)).unwrap_err();
    assert!(matches!(err, DbPoolError::DialectError { .. }));
}

#[test]
fn test_detect_mssql_variants() {
    let dialect = detect_dialect(&metadata("Microsoft SQL Server", "SQLServer JDBC", 15, 0, 12))
        .unwrap();
    assert_eq!(dialect.name(), "mssql");

    let dialect =
        detect_dialect(&metadata("Microsoft SQL Server", "jTDS driver", 9, 0, 1)).unwrap();
    assert_eq!(dialect.name(), "mssql90");
}

#[test]
fn test_detect_misc_products() {
    assert_eq!(
        detect_dialect(&metadata("PostgreSQL", "tokio-postgres", 15, 3, 0))
            .unwrap()
            .name(),
        "postgresql"
    );
    assert_eq!(
        detect_dialect(&metadata("DB2/LINUX", "IBM Data Server", 11, 5, 4))
            .unwrap()
            .name(),
        "db2"
    );
    assert_eq!(
        detect_dialect(&metadata("H2", "H2 JDBC", 2, 2, 2)).unwrap().name(),
        "h2"
    );
    assert_eq!(
        detect_dialect(&metadata("SQLite", "sqlx-sqlite", 3, 45, 0))
            .unwrap()
            .name(),
        "sqlite"
    );
}

#[test]
fn test_detect_unknown_falls_back_to_generic() {
    let dialect = detect_dialect(&metadata("FancyDB", "fancy-driver", 1, 0, 1)).unwrap();
    assert_eq!(dialect.name(), "generic");
}

#[test]
fn test_dialect_by_name() {
    assert_eq!(dialect_by_name("pg").unwrap().name(), "postgresql");
    assert_eq!(dialect_by_name("MySQL").unwrap().name(), "mysql");
    assert!(dialect_by_name("no-such-db").is_err());
}

#[test]
fn test_column_type_rendering() {
    let mysql = MysqlDialect::new();
    assert_eq!(mysql.column_type(DbType::Boolean, 0, 0, false), "TINYINT(1)");
    assert_eq!(
        mysql.column_type(DbType::String, 100, 0, true),
        "VARCHAR(100) BINARY"
    );

    let pg = PostgresDialect;
    assert_eq!(pg.column_type(DbType::Blob, 0, 0, false), "BYTEA");
    assert_eq!(pg.column_type(DbType::Decimal, 10, 2, false), "NUMERIC(10,2)");

    let oracle = OracleDialect::current();
    assert_eq!(oracle.column_type(DbType::Id, 0, 0, false), "NUMBER(19)");
    assert_eq!(
        oracle.column_type(DbType::String, 64, 0, false),
        "VARCHAR2(64 CHAR)"
    );
}

#[test]
fn test_append_db_type_with_mandatory() {
    let pg = PostgresDialect;
    let mut out = String::new();
    pg.append_db_type(&mut out, DbType::String, 32, 0, true, false);
    assert_eq!(out, "VARCHAR(32) NOT NULL");
}

#[test]
fn test_literal_formatting() {
    let mysql = MysqlDialect::new();
    // 反斜杠与引号都要转义
    assert_eq!(mysql.literal(&SqlValue::from(r"a'b\c")), r"'a''b\\c'");
    assert_eq!(mysql.literal(&SqlValue::Bool(true)), "1");

    let pg = PostgresDialect;
    assert_eq!(pg.literal(&SqlValue::Bool(true)), "TRUE");
    assert_eq!(
        pg.literal(&SqlValue::Bytes(vec![0xde, 0xad])),
        "'\\xdead'::BYTEA"
    );

    let oracle = OracleDialect::current();
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    assert_eq!(
        oracle.literal(&SqlValue::DateTime(ts)),
        "TO_TIMESTAMP('2024-03-01 12:30:00.000', 'YYYY-MM-DD HH24:MI:SS.FF3')"
    );

    let generic = dialect_by_name("generic").unwrap();
    assert_eq!(generic.literal(&SqlValue::Null), "NULL");
    assert_eq!(generic.literal(&SqlValue::from(42i64)), "42");
}

#[test]
fn test_pagination_clauses() {
    let mysql = MysqlDialect::new();
    let mut sql = "SELECT id FROM t".to_string();
    mysql.limit_last(&mut sql, 10, 30);
    assert_eq!(sql, "SELECT id FROM t LIMIT 10, 20");

    let pg = PostgresDialect;
    let mut sql = "SELECT id FROM t".to_string();
    pg.limit_last(&mut sql, 0, 20);
    assert_eq!(sql, "SELECT id FROM t LIMIT 20");

    // 旧版Oracle需要ROWNUM包装
    let oracle = OracleDialect::legacy();
    let mut sql = String::new();
    oracle.limit_start(&mut sql, 10, 30);
    sql.push_str("SELECT id FROM t");
    oracle.limit_last(&mut sql, 10, 30);
    assert_eq!(
        sql,
        "SELECT * FROM (SELECT inner_.*, ROWNUM rn_ FROM (SELECT id FROM t) inner_ \
         WHERE ROWNUM <= 30) WHERE rn_ > 10"
    );

    // 新版Oracle使用OFFSET/FETCH
    let oracle = OracleDialect::current();
    let mut sql = "SELECT id FROM t".to_string();
    oracle.limit_start(&mut sql, 10, 30);
    oracle.limit_last(&mut sql, 10, 30);
    assert_eq!(
        sql,
        "SELECT id FROM t OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"
    );

    // 旧版MSSQL只支持截断
    let mssql = MssqlDialect::legacy();
    assert!(!mssql.supports_limit_start());
    let mut sql = String::new();
    mssql.limit_start(&mut sql, 0, 10);
    sql.push_str("SELECT id FROM t");
    mssql.limit_last(&mut sql, 0, 10);
    assert_eq!(sql, "SELECT TOP 10 * FROM (SELECT id FROM t) AS limited_");
}

#[test]
fn test_row_locking_clauses() {
    let pg = PostgresDialect;
    assert_eq!(pg.for_update1(), "");
    assert_eq!(pg.for_update2(), " FOR UPDATE");

    // MSSQL在表提示位置表达行锁
    let mssql = MssqlDialect::current();
    assert_eq!(mssql.for_update1(), " WITH (UPDLOCK)");
    assert_eq!(mssql.for_update2(), "");
}

#[test]
fn test_identifier_quoting() {
    assert_eq!(MysqlDialect::new().quote_identifier("order"), "`order`");
    assert_eq!(MssqlDialect::current().quote_identifier("order"), "[order]");
    assert_eq!(PostgresDialect.quote_identifier("order"), "\"order\"");
}

#[test]
fn test_can_retry_classification() {
    let pg = PostgresDialect;
    let deadlock = DbPoolError::SqlError {
        message: "deadlock detected".to_string(),
        sql_state: Some("40P01".to_string()),
    };
    assert!(pg.can_retry(&deadlock));

    let syntax = DbPoolError::SqlError {
        message: "syntax error".to_string(),
        sql_state: Some("42601".to_string()),
    };
    assert!(!pg.can_retry(&syntax));

    // 通用方言不做重试分类
    let generic = dialect_by_name("generic").unwrap();
    assert!(!generic.can_retry(&deadlock));

    let mysql = MysqlDialect::new();
    let lock_wait = DbPoolError::SqlError {
        message: "Lock wait timeout exceeded".to_string(),
        sql_state: Some("41000".to_string()),
    };
    assert!(mysql.can_retry(&lock_wait));
    assert_eq!(mysql.retry_count(), 3);
}

#[test]
fn test_ping_sql_per_dialect() {
    assert_eq!(dialect_by_name("oracle").unwrap().ping_sql(), "SELECT 1 FROM DUAL");
    assert_eq!(
        dialect_by_name("db2").unwrap().ping_sql(),
        "SELECT 1 FROM SYSIBM.SYSDUMMY1"
    );
    assert_eq!(dialect_by_name("mysql").unwrap().ping_sql(), "SELECT 1");
}
