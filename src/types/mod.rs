//! 公共类型定义模块
//!
//! 定义抽象列类型、SQL字面量值与连接池配置

pub mod config;
pub mod db_type;
pub mod sql_value;

// 重新导出所有公共类型
pub use config::{
    ConnectionConfig, ConnectionKind, DataSourceConfig, ExhaustedAction, IsolationLevel,
    PoolEntryConfig, PoolSettings, RegistryConfig, ResolvedPoolSettings,
};
pub use db_type::DbType;
pub use sql_value::SqlValue;
