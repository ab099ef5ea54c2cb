//! MySQL数据源适配器（基于mysql_async）

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder};

use super::{DataSource, DatabaseMetadata, NativeConnection};
use crate::error::{DbPoolError, DbPoolResult};
use crate::pool_error;
use crate::types::{ConnectionConfig, DataSourceConfig, IsolationLevel};

/// MySQL数据源
pub struct MysqlDataSource {
    config: DataSourceConfig,
}

impl std::fmt::Debug for MysqlDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MysqlDataSource({})", self.describe())
    }
}

impl MysqlDataSource {
    /// 创建MySQL数据源
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for MysqlDataSource {
    async fn create_connection(&self) -> DbPoolResult<Box<dyn NativeConnection>> {
        let (host, port, database, username, password) = match &self.config.connection {
            ConnectionConfig::Mysql {
                host,
                port,
                database,
                username,
                password,
            } => (host, *port, database, username, password),
            _ => {
                return Err(pool_error!(config, "MySQL连接配置类型不匹配"));
            }
        };

        let opts = OptsBuilder::default()
            .ip_or_hostname(host.clone())
            .tcp_port(port)
            .db_name(Some(database.clone()))
            .user(Some(username.clone()))
            .pass(Some(password.clone()));

        let conn = Conn::new(opts)
            .await
            .map_err(|e| DbPoolError::ConnectionError {
                message: format!("MySQL连接创建失败: {}", e),
            })?;

        let (major, minor, patch) = conn.server_version();
        let metadata = DatabaseMetadata {
            product_name: "MySQL".to_string(),
            product_version: format!("{}.{}.{}", major, minor, patch),
            product_major: major as u32,
            product_minor: minor as u32,
            driver_name: "mysql_async".to_string(),
            driver_major: 0,
            driver_minor: 34,
        };

        let mut native = MysqlNativeConnection {
            conn: Some(conn),
            metadata,
            auto_commit: true,
            read_only: false,
            isolation: IsolationLevel::Unset,
        };

        let options = self.config.decoded_options()?;
        if let Some(init_sql) = options.get("init_sql") {
            native.execute(init_sql).await?;
        }

        Ok(Box::new(native))
    }

    fn describe(&self) -> String {
        match &self.config.connection {
            ConnectionConfig::Mysql {
                host,
                port,
                database,
                username,
                ..
            } => format!("mysql://{}@{}:{}/{}", username, host, port, database),
            _ => "mysql:<invalid>".to_string(),
        }
    }
}

/// MySQL原生连接
struct MysqlNativeConnection {
    conn: Option<Conn>,
    metadata: DatabaseMetadata,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
}

impl MysqlNativeConnection {
    fn conn_mut(&mut self) -> DbPoolResult<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| pool_error!(illegal_state, "MySQL连接已关闭"))
    }

    async fn run(&mut self, sql: &str) -> DbPoolResult<u64> {
        let conn = self.conn_mut()?;
        conn.query_drop(sql).await.map_err(map_mysql_err)?;
        Ok(conn.affected_rows())
    }
}

#[async_trait]
impl NativeConnection for MysqlNativeConnection {
    async fn execute(&mut self, sql: &str) -> DbPoolResult<u64> {
        self.run(sql).await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbPoolResult<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
            self.run("SET autocommit = 1").await?;
        } else {
            self.run("SET autocommit = 0").await?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_read_only(&mut self, read_only: bool) -> DbPoolResult<()> {
        if read_only {
            self.run("SET SESSION TRANSACTION READ ONLY").await?;
        } else {
            self.run("SET SESSION TRANSACTION READ WRITE").await?;
        }
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DbPoolResult<()> {
        if let Some(keyword) = level.sql_keyword() {
            let sql = format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", keyword);
            self.run(&sql).await?;
        }
        self.isolation = level;
        Ok(())
    }

    fn transaction_isolation(&self) -> IsolationLevel {
        self.isolation
    }

    async fn rollback(&mut self) -> DbPoolResult<()> {
        self.run("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) -> DbPoolResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await.map_err(map_mysql_err)?;
        }
        Ok(())
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

/// 将mysql_async错误映射为统一错误类型
fn map_mysql_err(err: mysql_async::Error) -> DbPoolError {
    match err {
        mysql_async::Error::Server(server_err) => DbPoolError::SqlError {
            message: server_err.message.clone(),
            sql_state: Some(server_err.state.clone()),
        },
        other => DbPoolError::ConnectionError {
            message: format!("MySQL驱动错误: {}", other),
        },
    }
}
