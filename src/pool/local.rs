//! 会话级连接记账
//!
//! 每个会话上下文、每个连接池一份记录：读连接折叠为单把手 + 嵌套计数，
//! 写连接互相独立、各自成项。释放不属于本记录的连接是编程错误

use rat_logger::warn;
use std::sync::Arc;

use crate::error::{DbPoolError, DbPoolResult};
use crate::pool::connection::PooledConnection;

/// 单个池在当前会话中的连接记账
///
/// 不变量：`read_connection` 为空当且仅当 `read_connection_cnt` 为零；
/// 记录中的每条连接都处于激活状态
pub(crate) struct LocalConnections {
    read_connection: Option<Arc<PooledConnection>>,
    /// 读连接的嵌套借出计数
    read_connection_cnt: u32,
    write_connections: Vec<Arc<PooledConnection>>,
}

impl LocalConnections {
    pub(crate) fn new() -> Self {
        Self {
            read_connection: None,
            read_connection_cnt: 0,
            write_connections: Vec::new(),
        }
    }

    /// 借出路径：复用已借出的读连接并累加计数
    ///
    /// 没有已借出的读连接时返回None，调用方需向子池借新连接
    pub(crate) fn local_read_connection(
        &mut self,
        warn_nested: bool,
    ) -> Option<Arc<PooledConnection>> {
        let conn = self.read_connection.as_ref()?;
        if warn_nested {
            warn!(
                "读连接被嵌套借出。借出栈={}",
                conn.borrow_trace().unwrap_or_else(|| "<未开启debug_resources>".to_string())
            );
        }
        self.read_connection_cnt += 1;
        Some(conn.clone())
    }

    /// 查看读连接而不影响计数
    pub(crate) fn peek_read_connection(&self) -> Option<Arc<PooledConnection>> {
        self.read_connection.clone()
    }

    /// 记录新借出的读连接
    pub(crate) fn init_read_connection(&mut self, conn: Arc<PooledConnection>) {
        debug_assert!(
            self.read_connection.is_none(),
            "读连接槽位非空时禁止覆盖"
        );
        self.read_connection = Some(conn);
        self.read_connection_cnt = 1;
    }

    /// 读连接释放记账
    ///
    /// 返回 `Ok(true)` 表示计数归零，连接应实际归还子池
    pub(crate) fn notify_release_read(
        &mut self,
        conn: &Arc<PooledConnection>,
    ) -> DbPoolResult<bool> {
        match &self.read_connection {
            Some(held) if Arc::ptr_eq(held, conn) => {
                self.read_connection_cnt -= 1;
                if self.read_connection_cnt == 0 {
                    self.read_connection = None;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => Err(DbPoolError::IllegalRelease {
                message: "只能释放通过borrow_read_connection借出的连接。\
                          若看不到借出调用栈，请开启debug_resources后重试"
                    .to_string(),
                borrow_trace: conn.borrow_trace(),
            }),
        }
    }

    /// 写连接借出记账
    pub(crate) fn notify_borrow_write(&mut self, conn: Arc<PooledConnection>) {
        self.write_connections.push(conn);
    }

    /// 写连接释放记账：必须恰好移除一条匹配项
    pub(crate) fn notify_release_write(&mut self, conn: &Arc<PooledConnection>) -> DbPoolResult<()> {
        match self
            .write_connections
            .iter()
            .position(|held| Arc::ptr_eq(held, conn))
        {
            Some(index) => {
                self.write_connections.remove(index);
                Ok(())
            }
            None => Err(DbPoolError::IllegalRelease {
                message: "只能释放通过borrow_write_connection借出的连接".to_string(),
                borrow_trace: conn.borrow_trace(),
            }),
        }
    }

    /// 是否没有任何在借连接
    pub(crate) fn is_empty(&self) -> bool {
        self.read_connection.is_none() && self.write_connections.is_empty()
    }

    /// 取走读连接（泄漏回收用），返回连接与嵌套计数
    pub(crate) fn take_read(&mut self) -> Option<(Arc<PooledConnection>, u32)> {
        let conn = self.read_connection.take()?;
        let cnt = self.read_connection_cnt;
        self.read_connection_cnt = 0;
        Some((conn, cnt))
    }

    /// 取走全部写连接（泄漏回收用）
    pub(crate) fn take_writes(&mut self) -> Vec<Arc<PooledConnection>> {
        std::mem::take(&mut self.write_connections)
    }
}
