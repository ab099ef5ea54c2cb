//! SQLite适配器集成测试（需要 sqlite-support 特性）
#![cfg(feature = "sqlite-support")]

use std::sync::Arc;

use rat_dbpool::adapter::SqliteDataSource;
use rat_dbpool::{
    ConnectionConfig, ConnectionPool, DataSource, DataSourceConfig, PoolEntryConfig,
    SessionContext,
};

fn memory_entry() -> (PoolEntryConfig, DataSourceConfig) {
    let ds_config = DataSourceConfig::new(ConnectionConfig::Sqlite {
        path: ":memory:".to_string(),
        create_if_missing: false,
    });
    (PoolEntryConfig::new(ds_config.clone()), ds_config)
}

#[tokio::test]
async fn test_sqlite_connection_lifecycle() {
    let (entry, ds_config) = memory_entry();
    let data_source = Arc::new(SqliteDataSource::new(ds_config));
    let pool = ConnectionPool::new("sqlite-mem", &entry, data_source);
    let ctx = SessionContext::new();

    // 方言检测应命中SQLite分支
    let dialect = pool.init_sql_dialect(&ctx).await.unwrap();
    assert_eq!(dialect.name(), "sqlite");

    let write_conn = pool.borrow_write_connection(&ctx).await.unwrap();
    write_conn
        .execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .await
        .unwrap();
    let affected = write_conn
        .execute("INSERT INTO notes (body) VALUES ('hello')")
        .await
        .unwrap();
    assert_eq!(affected, 1);
    write_conn.commit().await.unwrap();

    pool.release_write_connection(&ctx, &write_conn)
        .await
        .unwrap();
    ctx.unbind().await;
    pool.close().await;
}

#[tokio::test]
async fn test_sqlite_file_database_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.db");
    let ds_config = DataSourceConfig::new(ConnectionConfig::Sqlite {
        path: path.to_string_lossy().into_owned(),
        create_if_missing: true,
    });
    let data_source = SqliteDataSource::new(ds_config);

    let mut conn = data_source.create_connection().await.unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)").await.unwrap();
    conn.close().await.unwrap();

    assert!(path.exists(), "数据库文件应按需创建");
}

#[tokio::test]
async fn test_sqlite_rollback_discards_changes() {
    let (entry, ds_config) = memory_entry();
    let data_source = Arc::new(SqliteDataSource::new(ds_config));
    let pool = ConnectionPool::new("sqlite-rollback", &entry, data_source);
    let ctx = SessionContext::new();

    let conn = pool.borrow_write_connection(&ctx).await.unwrap();
    conn.execute("CREATE TABLE t (x INTEGER)").await.unwrap();
    conn.commit().await.unwrap();

    conn.execute("INSERT INTO t (x) VALUES (1)").await.unwrap();
    // 回滚后事务重新开启，连接仍可使用
    conn.rollback().await.unwrap();
    conn.execute("INSERT INTO t (x) VALUES (2)").await.unwrap();
    conn.commit().await.unwrap();

    pool.release_write_connection(&ctx, &conn).await.unwrap();
    ctx.unbind().await;
    pool.close().await;
}
