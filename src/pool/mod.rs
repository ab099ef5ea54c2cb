//! 连接池核心模块
//!
//! object_pool承载两个有界子池，connection是池化连接包装器，
//! local负责会话级记账，pool编排全部借出/释放语义

pub mod connection;
pub(crate) mod local;
pub mod object_pool;
#[allow(clippy::module_inception)]
pub mod pool;

pub use connection::PooledConnection;
pub use object_pool::{ObjectPool, ResourceFactory};
pub use pool::ConnectionPool;
