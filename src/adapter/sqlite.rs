//! SQLite数据源适配器（基于sqlx）

use async_trait::async_trait;
use rat_logger::debug;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};

use super::{DataSource, DatabaseMetadata, NativeConnection};
use crate::error::{DbPoolError, DbPoolResult};
use crate::pool_error;
use crate::types::{ConnectionConfig, DataSourceConfig, IsolationLevel};

/// SQLite数据源
pub struct SqliteDataSource {
    config: DataSourceConfig,
}

impl std::fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDataSource({})", self.describe())
    }
}

impl SqliteDataSource {
    /// 创建SQLite数据源
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn create_connection(&self) -> DbPoolResult<Box<dyn NativeConnection>> {
        let (path, create_if_missing) = match &self.config.connection {
            ConnectionConfig::Sqlite {
                path,
                create_if_missing,
            } => (path.clone(), *create_if_missing),
            _ => {
                return Err(pool_error!(config, "SQLite连接配置类型不匹配"));
            }
        };

        let connect_options = if path == ":memory:" {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(create_if_missing)
        };

        let mut conn = connect_options
            .connect()
            .await
            .map_err(|e| DbPoolError::ConnectionError {
                message: format!("SQLite连接创建失败: {}", e),
            })?;

        // 采集服务器版本
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&mut conn)
            .await
            .map_err(map_sqlx_err)?;
        let (major, minor) = parse_version(&version);

        let metadata = DatabaseMetadata {
            product_name: "SQLite".to_string(),
            product_version: version,
            product_major: major,
            product_minor: minor,
            driver_name: "sqlx-sqlite".to_string(),
            driver_major: 0,
            driver_minor: 8,
        };

        let mut native = SqliteNativeConnection {
            conn: Some(conn),
            metadata,
            auto_commit: true,
            read_only: false,
            isolation: IsolationLevel::Unset,
        };

        // 应用通用驱动选项
        let options = self.config.decoded_options()?;
        if let Some(init_sql) = options.get("init_sql") {
            native.execute(init_sql).await?;
        }

        Ok(Box::new(native))
    }

    fn describe(&self) -> String {
        match &self.config.connection {
            ConnectionConfig::Sqlite { path, .. } => format!("sqlite:{}", path),
            _ => "sqlite:<invalid>".to_string(),
        }
    }
}

/// SQLite原生连接
struct SqliteNativeConnection {
    conn: Option<SqliteConnection>,
    metadata: DatabaseMetadata,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
}

impl SqliteNativeConnection {
    fn conn_mut(&mut self) -> DbPoolResult<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| pool_error!(illegal_state, "SQLite连接已关闭"))
    }

    async fn run(&mut self, sql: &str) -> DbPoolResult<u64> {
        let conn = self.conn_mut()?;
        let result = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NativeConnection for SqliteNativeConnection {
    async fn execute(&mut self, sql: &str) -> DbPoolResult<u64> {
        self.run(sql).await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbPoolResult<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
            // 回到自动提交时结束当前事务
            self.run("COMMIT").await?;
        } else {
            self.run("BEGIN").await?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_read_only(&mut self, read_only: bool) -> DbPoolResult<()> {
        if read_only {
            self.run("PRAGMA query_only = ON").await?;
        } else {
            self.run("PRAGMA query_only = OFF").await?;
        }
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DbPoolResult<()> {
        // SQLite不支持会话级隔离级别调整，记录设置值即可
        if level.sql_keyword().is_some() {
            debug!("SQLite忽略隔离级别设置: {:?}", level);
        }
        self.isolation = level;
        Ok(())
    }

    fn transaction_isolation(&self) -> IsolationLevel {
        self.isolation
    }

    async fn rollback(&mut self) -> DbPoolResult<()> {
        self.run("ROLLBACK").await?;
        if !self.auto_commit {
            // 手动提交模式下保持事务开启的不变量
            self.run("BEGIN").await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> DbPoolResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await.map_err(map_sqlx_err)?;
        }
        Ok(())
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

/// 将sqlx错误映射为统一错误类型
fn map_sqlx_err(err: sqlx::Error) -> DbPoolError {
    match err {
        sqlx::Error::Database(db_err) => DbPoolError::SqlError {
            message: db_err.message().to_string(),
            sql_state: db_err.code().map(|c| c.to_string()),
        },
        other => DbPoolError::ConnectionError {
            message: format!("SQLite驱动错误: {}", other),
        },
    }
}

/// 从版本文本解析主/次版本号
fn parse_version(version: &str) -> (u32, u32) {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}
