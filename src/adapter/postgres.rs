//! PostgreSQL数据源适配器（基于tokio-postgres）

use async_trait::async_trait;
use rat_logger::debug;
use tokio_postgres::{Client, NoTls};

use super::{DataSource, DatabaseMetadata, NativeConnection};
use crate::error::{DbPoolError, DbPoolResult};
use crate::pool_error;
use crate::types::{ConnectionConfig, DataSourceConfig, IsolationLevel};

/// PostgreSQL数据源
pub struct PostgresDataSource {
    config: DataSourceConfig,
}

impl std::fmt::Debug for PostgresDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // describe不含凭据，Debug输出同样不能泄露
        write!(f, "PostgresDataSource({})", self.describe())
    }
}

impl PostgresDataSource {
    /// 创建PostgreSQL数据源
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for PostgresDataSource {
    async fn create_connection(&self) -> DbPoolResult<Box<dyn NativeConnection>> {
        let (host, port, database, username, password) = match &self.config.connection {
            ConnectionConfig::Postgres {
                host,
                port,
                database,
                username,
                password,
            } => (host, *port, database, username, password),
            _ => {
                return Err(pool_error!(config, "PostgreSQL连接配置类型不匹配"));
            }
        };

        let options = self.config.decoded_options()?;

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(host)
            .port(port)
            .dbname(database)
            .user(username)
            .password(password);
        if let Some(app_name) = options.get("application_name") {
            pg_config.application_name(app_name);
        }

        let (client, connection) =
            pg_config
                .connect(NoTls)
                .await
                .map_err(|e| DbPoolError::ConnectionError {
                    message: format!("PostgreSQL连接创建失败: {}", e),
                })?;

        // 连接驱动任务：负责实际的socket读写
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("PostgreSQL连接任务结束: {}", e);
            }
        });

        // 采集服务器版本
        let row = client
            .query_one("SHOW server_version", &[])
            .await
            .map_err(map_pg_err)?;
        let version: String = row.get(0);
        let (major, minor) = parse_version(&version);

        let metadata = DatabaseMetadata {
            product_name: "PostgreSQL".to_string(),
            product_version: version,
            product_major: major,
            product_minor: minor,
            driver_name: "tokio-postgres".to_string(),
            driver_major: 0,
            driver_minor: 7,
        };

        let mut native = PostgresNativeConnection {
            client: Some(client),
            driver: Some(driver),
            metadata,
            auto_commit: true,
            read_only: false,
            isolation: IsolationLevel::Unset,
        };

        if let Some(init_sql) = options.get("init_sql") {
            native.execute(init_sql).await?;
        }

        Ok(Box::new(native))
    }

    fn describe(&self) -> String {
        match &self.config.connection {
            ConnectionConfig::Postgres {
                host,
                port,
                database,
                username,
                ..
            } => format!("postgresql://{}@{}:{}/{}", username, host, port, database),
            _ => "postgresql:<invalid>".to_string(),
        }
    }
}

/// PostgreSQL原生连接
struct PostgresNativeConnection {
    client: Option<Client>,
    driver: Option<tokio::task::JoinHandle<()>>,
    metadata: DatabaseMetadata,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
}

impl PostgresNativeConnection {
    fn client(&self) -> DbPoolResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| pool_error!(illegal_state, "PostgreSQL连接已关闭"))
    }

    async fn run(&mut self, sql: &str) -> DbPoolResult<u64> {
        self.client()?.execute(sql, &[]).await.map_err(map_pg_err)
    }
}

#[async_trait]
impl NativeConnection for PostgresNativeConnection {
    async fn execute(&mut self, sql: &str) -> DbPoolResult<u64> {
        self.run(sql).await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbPoolResult<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
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
            self.run("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                .await?;
        } else {
            self.run("SET SESSION CHARACTERISTICS AS TRANSACTION READ WRITE")
                .await?;
        }
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DbPoolResult<()> {
        if let Some(keyword) = level.sql_keyword() {
            let sql = format!(
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}",
                keyword
            );
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
        if !self.auto_commit {
            self.run("BEGIN").await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> DbPoolResult<()> {
        // 丢弃客户端后驱动任务自然结束
        self.client.take();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
        Ok(())
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

/// 将tokio-postgres错误映射为统一错误类型
fn map_pg_err(err: tokio_postgres::Error) -> DbPoolError {
    let sql_state = err.code().map(|state| state.code().to_string());
    match sql_state {
        Some(state) => DbPoolError::SqlError {
            message: err.to_string(),
            sql_state: Some(state),
        },
        None => DbPoolError::ConnectionError {
            message: format!("PostgreSQL驱动错误: {}", err),
        },
    }
}

/// 从版本文本解析主/次版本号（如 "15.3 (Debian 15.3-1)" -> (15, 3)）
fn parse_version(version: &str) -> (u32, u32) {
    let leading: String = version
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = leading.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}
