//! rat_dbpool - 跨数据库连接池库
//!
//! 提供读写分离的有界连接子池、会话级资源记账（泄漏自愈）
//! 与按数据库元数据自动检测的SQL方言适配。
//! 借出的读连接按会话可重入折叠，写连接借出前总是先取读连接，
//! 以固定的获取顺序规避跨线程死锁

// 导出所有公共模块
pub mod adapter;
pub mod context;
pub mod dialect;
pub mod error;
pub mod pool;
pub mod registry;
pub mod security;
pub mod types;

// 重新导出常用类型和函数
pub use adapter::{DataSource, DatabaseMetadata, NativeConnection, create_data_source};
pub use context::SessionContext;
pub use dialect::{
    Db2Dialect, GenericDialect, MssqlDialect, MysqlDialect, OracleDialect, PostgresDialect,
    SqlDialect, detect_dialect, dialect_by_name,
};
pub use error::{DbPoolError, DbPoolResult};
pub use pool::{ConnectionPool, ObjectPool, PooledConnection, ResourceFactory};
pub use registry::{DEFAULT_POOL_NAME, PoolRegistry};
pub use types::{
    ConnectionConfig, ConnectionKind, DataSourceConfig, DbType, ExhaustedAction, IsolationLevel,
    PoolEntryConfig, PoolSettings, RegistryConfig, ResolvedPoolSettings, SqlValue,
};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_dbpool库
///
/// 注意：日志系统由调用者自行初始化，本库不自动初始化日志
pub fn init() {
    // 目前没有需要提前准备的全局状态，保留入口以保持与姊妹库一致的使用方式
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
