//! 错误类型定义模块
//!
//! 提供统一的错误类型，区分编程错误、瞬时数据库错误与配置错误

use thiserror::Error;

/// 统一的Result别名
pub type DbPoolResult<T> = Result<T, DbPoolError>;

/// 连接池库的统一错误类型
#[derive(Error, Debug)]
pub enum DbPoolError {
    /// 建立原生连接失败或连接级IO错误
    #[error("连接错误: {message}")]
    ConnectionError {
        /// 错误描述
        message: String,
    },

    /// 数据库返回的SQL错误，携带SQLSTATE（如果驱动提供）
    #[error("数据库错误: {message}")]
    SqlError {
        /// 错误描述
        message: String,
        /// SQLSTATE代码（用于重试分类）
        sql_state: Option<String>,
    },

    /// 配置解析或校验错误
    #[error("配置错误: {message}")]
    ConfigError {
        /// 错误描述
        message: String,
    },

    /// 子池耗尽（fail动作立即返回，block动作超时后返回）
    #[error("连接池已耗尽: 池={pool}, 已等待={waited_ms}ms")]
    PoolExhausted {
        /// 子池名称
        pool: String,
        /// 实际等待时长（毫秒）
        waited_ms: u64,
    },

    /// 连接池已关闭，后续调用均不合法
    #[error("连接池已关闭: 池={pool}")]
    PoolClosed {
        /// 池名称
        pool: String,
    },

    /// 编程错误：释放/失效了不属于当前会话记账的连接
    ///
    /// 开启 debug_resources 后携带原始借出调用栈，便于定位泄漏代码路径
    #[error("非法释放: {message}")]
    IllegalRelease {
        /// 错误描述
        message: String,
        /// 原始借出调用栈（仅 debug_resources 开启时存在）
        borrow_trace: Option<String>,
    },

    /// 编程错误：使用未激活的连接、或试图修改不可变连接属性
    #[error("非法状态: {message}")]
    IllegalState {
        /// 错误描述
        message: String,
    },

    /// 方言检测或方言操作错误
    #[error("方言错误: {message}")]
    DialectError {
        /// 错误描述
        message: String,
    },

    /// 注册表中不存在该别名
    #[error("连接池别名不存在: {alias}")]
    AliasNotFound {
        /// 查找的别名
        alias: String,
    },
}

impl DbPoolError {
    /// 获取SQLSTATE代码（仅SqlError携带）
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            DbPoolError::SqlError { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// 是否属于编程错误类（应当修复调用方代码，而不是重试）
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            DbPoolError::IllegalRelease { .. } | DbPoolError::IllegalState { .. }
        )
    }
}

/// 快速构造常用错误的宏
///
/// # 示例
/// ```
/// use rat_dbpool::pool_error;
/// let err = pool_error!(config, "缺少数据源配置");
/// let err = pool_error!(alias_not_found, "main");
/// ```
#[macro_export]
macro_rules! pool_error {
    (connection, $msg:expr) => {
        $crate::error::DbPoolError::ConnectionError {
            message: $msg.to_string(),
        }
    };
    (sql, $msg:expr) => {
        $crate::error::DbPoolError::SqlError {
            message: $msg.to_string(),
            sql_state: None,
        }
    };
    (sql, $msg:expr, $state:expr) => {
        $crate::error::DbPoolError::SqlError {
            message: $msg.to_string(),
            sql_state: Some($state.to_string()),
        }
    };
    (config, $msg:expr) => {
        $crate::error::DbPoolError::ConfigError {
            message: $msg.to_string(),
        }
    };
    (illegal_state, $msg:expr) => {
        $crate::error::DbPoolError::IllegalState {
            message: $msg.to_string(),
        }
    };
    (dialect, $msg:expr) => {
        $crate::error::DbPoolError::DialectError {
            message: $msg.to_string(),
        }
    };
    (alias_not_found, $alias:expr) => {
        $crate::error::DbPoolError::AliasNotFound {
            alias: $alias.to_string(),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_state_accessor() {
        let err = pool_error!(sql, "死锁", "40001");
        assert_eq!(err.sql_state(), Some("40001"));

        let err = pool_error!(connection, "拒绝连接");
        assert_eq!(err.sql_state(), None);
    }

    #[test]
    fn test_programming_error_classification() {
        let err = DbPoolError::IllegalRelease {
            message: "连接不属于当前会话".to_string(),
            borrow_trace: None,
        };
        assert!(err.is_programming_error());
        assert!(!pool_error!(config, "x").is_programming_error());
    }
}
