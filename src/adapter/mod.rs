//! 数据源适配器模块
//!
//! 提供统一的原生连接接口，屏蔽不同数据库驱动的实现差异。
//! 连接池只通过 [NativeConnection] 与 [DataSource] 两个trait管理连接，
//! 具体驱动按特性条件编译

use async_trait::async_trait;

use crate::error::DbPoolResult;
use crate::pool_error;
use crate::types::{DataSourceConfig, IsolationLevel};

// 导入各个数据库适配器 (条件编译)
#[cfg(feature = "mysql-support")]
mod mysql;
#[cfg(feature = "postgres-support")]
mod postgres;
#[cfg(feature = "sqlite-support")]
mod sqlite;

// 条件导出适配器
#[cfg(feature = "mysql-support")]
pub use mysql::MysqlDataSource;
#[cfg(feature = "postgres-support")]
pub use postgres::PostgresDataSource;
#[cfg(feature = "sqlite-support")]
pub use sqlite::SqliteDataSource;

/// 数据库元数据
///
/// 连接建立后从驱动/服务器采集，供方言检测使用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMetadata {
    /// 数据库产品名（如 "MySQL", "PostgreSQL"）
    pub product_name: String,
    /// 数据库产品版本文本
    pub product_version: String,
    /// 数据库主版本号
    pub product_major: u32,
    /// 数据库次版本号
    pub product_minor: u32,
    /// 驱动名称
    pub driver_name: String,
    /// 驱动主版本号
    pub driver_major: u32,
    /// 驱动次版本号
    pub driver_minor: u32,
}

impl DatabaseMetadata {
    /// 产品名或驱动名是否包含给定子串
    pub fn matches(&self, needle: &str) -> bool {
        self.driver_name.contains(needle) || self.product_name.contains(needle)
    }
}

/// 原生数据库连接的统一接口
///
/// auto_commit / read_only / 隔离级别由适配器在客户端跟踪，
/// 因此对应的getter是同步方法
#[async_trait]
pub trait NativeConnection: Send {
    /// 执行一条SQL语句，返回受影响行数
    async fn execute(&mut self, sql: &str) -> DbPoolResult<u64>;

    /// 设置自动提交模式
    ///
    /// 切换到手动提交会开启一个事务；切换回自动提交会提交当前事务
    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbPoolResult<()>;

    /// 当前自动提交模式
    fn auto_commit(&self) -> bool;

    /// 设置只读模式
    async fn set_read_only(&mut self, read_only: bool) -> DbPoolResult<()>;

    /// 当前只读模式
    fn is_read_only(&self) -> bool;

    /// 设置事务隔离级别（`Unset` 为空操作）
    async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DbPoolResult<()>;

    /// 当前事务隔离级别
    fn transaction_isolation(&self) -> IsolationLevel;

    /// 回滚当前事务
    async fn rollback(&mut self) -> DbPoolResult<()>;

    /// 关闭连接（可重复调用，二次调用为空操作）
    async fn close(&mut self) -> DbPoolResult<()>;

    /// 获取数据库元数据
    fn metadata(&self) -> &DatabaseMetadata;
}

/// 数据源：原生连接的工厂
#[async_trait]
pub trait DataSource: Send + Sync + std::fmt::Debug {
    /// 创建一条新的原生连接
    async fn create_connection(&self) -> DbPoolResult<Box<dyn NativeConnection>>;

    /// 数据源的描述文本（用于日志，不得泄露凭据）
    fn describe(&self) -> String;
}

/// 根据数据源配置创建数据源
///
/// 对应驱动特性未启用时返回配置错误
#[allow(unused_variables)]
pub fn create_data_source(
    config: &DataSourceConfig,
) -> DbPoolResult<std::sync::Arc<dyn DataSource>> {
    // 选项键先行校验，加密值的解码推迟到适配器建连时
    for key in config.options.keys() {
        crate::security::validate_option_key(key)?;
    }

    match &config.connection {
        #[cfg(feature = "sqlite-support")]
        crate::types::ConnectionConfig::Sqlite { .. } => Ok(std::sync::Arc::new(
            SqliteDataSource::new(config.clone()),
        )),
        #[cfg(feature = "postgres-support")]
        crate::types::ConnectionConfig::Postgres { .. } => Ok(std::sync::Arc::new(
            PostgresDataSource::new(config.clone()),
        )),
        #[cfg(feature = "mysql-support")]
        crate::types::ConnectionConfig::Mysql { .. } => Ok(std::sync::Arc::new(
            MysqlDataSource::new(config.clone()),
        )),
        #[allow(unreachable_patterns)]
        other => {
            // 只报驱动名，连接参数里有凭据，不能进错误文本
            let driver = match other {
                crate::types::ConnectionConfig::Sqlite { .. } => "sqlite",
                crate::types::ConnectionConfig::Postgres { .. } => "postgres",
                crate::types::ConnectionConfig::Mysql { .. } => "mysql",
            };
            Err(pool_error!(
                config,
                format!("数据库驱动未启用对应的feature: {}", driver)
            ))
        }
    }
}
