//! 会话上下文
//!
//! 每个工作单元（任务/请求）一份，显式传入所有借出/释放调用，
//! 替代环境性的线程本地状态。上下文结束时未释放的连接
//! 由解绑钩子统一回收（泄漏自愈）

use parking_lot::Mutex;
use rat_logger::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{DbPoolError, DbPoolResult};
use crate::pool::connection::PooledConnection;
use crate::pool::local::LocalConnections;
use crate::pool::ConnectionPool;

/// 上下文中单个池的条目
struct PoolLocal {
    pool: Weak<ConnectionPool>,
    local: LocalConnections,
}

/// 会话上下文
///
/// 严格限定在单个工作单元内使用，常规路径只有持有者访问；
/// 内部互斥锁仅为让携带上下文引用的future保持Send，从不跨await持有
pub struct SessionContext {
    entries: Mutex<HashMap<u64, PoolLocal>>,
    unbound: AtomicBool,
}

impl SessionContext {
    /// 创建新的会话上下文
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unbound: AtomicBool::new(false),
        }
    }

    /// 访问（必要时创建）指定池的记账
    pub(crate) fn with_local<R>(
        &self,
        pool: &Arc<ConnectionPool>,
        f: impl FnOnce(&mut LocalConnections) -> R,
    ) -> R {
        let mut entries = self.entries.lock();
        let entry = entries.entry(pool.id()).or_insert_with(|| PoolLocal {
            pool: Arc::downgrade(pool),
            local: LocalConnections::new(),
        });
        f(&mut entry.local)
    }

    /// 访问指定池的既有记账，不存在即为非法释放
    pub(crate) fn try_with_local<R>(
        &self,
        pool_id: u64,
        f: impl FnOnce(&mut LocalConnections) -> DbPoolResult<R>,
    ) -> DbPoolResult<R> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&pool_id) {
            Some(entry) => f(&mut entry.local),
            None => Err(DbPoolError::IllegalRelease {
                message: "当前会话没有从该连接池借出过连接".to_string(),
                borrow_trace: None,
            }),
        }
    }

    /// 查看指定池当前的读连接
    pub(crate) fn peek_read(&self, pool_id: u64) -> Option<Arc<PooledConnection>> {
        let entries = self.entries.lock();
        entries
            .get(&pool_id)
            .and_then(|entry| entry.local.peek_read_connection())
    }

    /// 当前是否还有未释放的连接
    pub fn has_open_connections(&self) -> bool {
        let entries = self.entries.lock();
        entries.values().any(|entry| !entry.local.is_empty())
    }

    /// 显式解绑：回收所有未释放的连接
    ///
    /// 恰好执行一次；之后的Drop兜底不再做任何事
    pub async fn unbind(&self) {
        if self.unbound.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<PoolLocal> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        for mut entry in drained {
            if entry.local.is_empty() {
                continue;
            }
            match entry.pool.upgrade() {
                Some(pool) => pool.reclaim_leaked(&mut entry.local).await,
                None => warn!("会话解绑时连接池已销毁，在借连接随之丢弃"),
            }
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionContext {
    /// 兜底回收：上下文未显式解绑就被丢弃时，走同步修复路径
    fn drop(&mut self) {
        if self.unbound.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<PoolLocal> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        for mut entry in drained {
            if entry.local.is_empty() {
                continue;
            }
            match entry.pool.upgrade() {
                Some(pool) => pool.reclaim_leaked_sync(&mut entry.local),
                None => warn!("会话丢弃时连接池已销毁，在借连接随之丢弃"),
            }
        }
    }
}
