//! 池化连接包装器
//!
//! 包装一条惰性创建的原生连接：自动提交/只读/隔离级别在借出时固定，
//! 所有委托操作先检查激活状态，防止归还后继续使用的代码
//! 污染已经交给其他借用方的连接

use rat_logger::{info, warn};
use std::backtrace::Backtrace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::adapter::{DataSource, DatabaseMetadata, NativeConnection};
use crate::dialect::SqlDialect;
use crate::error::DbPoolResult;
use crate::pool_error;
use crate::types::{ConnectionKind, IsolationLevel};

/// 原生连接槽位
struct ConnectionState {
    native: Option<Box<dyn NativeConnection>>,
    /// 物理关闭后为真，之后不再惰性重建
    closed: bool,
}

/// 池化连接
///
/// 同一时刻最多归属一个子池；借出期间由借用方会话的记账独占
pub struct PooledConnection {
    pool_name: String,
    kind: ConnectionKind,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
    active: AtomicBool,
    data_source: Arc<dyn DataSource>,
    state: Mutex<ConnectionState>,
    borrow_trace: parking_lot::Mutex<Option<String>>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool_name)
            .field("kind", &self.kind)
            .field("auto_commit", &self.auto_commit)
            .field("read_only", &self.read_only)
            .field("active", &self.active.load(Ordering::Acquire))
            .finish()
    }
}

impl PooledConnection {
    /// 创建池化连接（由子池工厂调用）
    ///
    /// 三个连接属性自此固定，借出方无法再修改
    pub(crate) fn new(
        pool_name: String,
        kind: ConnectionKind,
        data_source: Arc<dyn DataSource>,
        isolation: IsolationLevel,
        auto_commit: bool,
        read_only: bool,
    ) -> Self {
        Self {
            pool_name,
            kind,
            auto_commit,
            read_only,
            isolation,
            active: AtomicBool::new(false),
            data_source,
            state: Mutex::new(ConnectionState {
                native: None,
                closed: false,
            }),
            borrow_trace: parking_lot::Mutex::new(None),
        }
    }

    /// 连接种类（读/写）
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// 借出时固定的自动提交属性
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// 借出时固定的只读属性
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 借出时固定的隔离级别
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// 包装器是否处于激活状态
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 激活包装器（借出前由子池工厂调用）
    pub(crate) fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// 取消激活（归还/销毁路径）
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// 试图修改自动提交属性——始终失败
    ///
    /// 属性在借出时固定，放行修改会破坏下一个借用方的前提
    pub fn set_auto_commit(&self, _auto_commit: bool) -> DbPoolResult<()> {
        Err(pool_error!(
            illegal_state,
            "池化连接的自动提交属性在借出时固定，不可修改"
        ))
    }

    /// 试图修改只读属性——始终失败
    pub fn set_read_only(&self, _read_only: bool) -> DbPoolResult<()> {
        Err(pool_error!(
            illegal_state,
            "池化连接的只读属性在借出时固定，不可修改"
        ))
    }

    fn check_active(&self) -> DbPoolResult<()> {
        if !self.is_active() {
            return Err(pool_error!(
                illegal_state,
                format!(
                    "访问未激活的池化连接: 池={}, 种类={}（连接可能已归还）",
                    self.pool_name,
                    self.kind.as_str()
                )
            ));
        }
        Ok(())
    }

    /// 惰性创建原生连接并应用三个固定属性
    async fn materialize<'a>(
        &self,
        state: &'a mut ConnectionState,
    ) -> DbPoolResult<&'a mut Box<dyn NativeConnection>> {
        if state.closed {
            return Err(pool_error!(
                illegal_state,
                format!("池化连接已物理关闭: 池={}", self.pool_name)
            ));
        }
        if state.native.is_none() {
            let mut native = self.data_source.create_connection().await?;
            // 只读与隔离级别先设置，手动提交模式最后切换（它会立即开启事务）
            native.set_read_only(self.read_only).await?;
            native.set_transaction_isolation(self.isolation).await?;
            native.set_auto_commit(self.auto_commit).await?;
            state.native = Some(native);
        }
        match state.native.as_mut() {
            Some(native) => Ok(native),
            None => unreachable!("原生连接在上方刚完成物化"),
        }
    }

    /// 执行一条SQL语句
    pub async fn execute(&self, sql: &str) -> DbPoolResult<u64> {
        self.check_active()?;
        let mut state = self.state.lock().await;
        let native = self.materialize(&mut state).await?;
        native.execute(sql).await
    }

    /// 提交当前事务（仅手动提交模式合法）
    pub async fn commit(&self) -> DbPoolResult<()> {
        self.check_active()?;
        if self.auto_commit {
            return Err(pool_error!(illegal_state, "自动提交模式下不允许显式提交"));
        }
        let mut state = self.state.lock().await;
        let native = self.materialize(&mut state).await?;
        native.execute("COMMIT").await?;
        native.execute("BEGIN").await?;
        Ok(())
    }

    /// 回滚当前事务（仅手动提交模式合法）
    pub async fn rollback(&self) -> DbPoolResult<()> {
        self.check_active()?;
        if self.auto_commit {
            return Err(pool_error!(illegal_state, "自动提交模式下不允许显式回滚"));
        }
        let mut state = self.state.lock().await;
        let native = self.materialize(&mut state).await?;
        native.rollback().await
    }

    /// 读取数据库元数据（需要时物化原生连接）
    pub async fn database_metadata(&self) -> DbPoolResult<DatabaseMetadata> {
        self.check_active()?;
        let mut state = self.state.lock().await;
        let native = self.materialize(&mut state).await?;
        Ok(native.metadata().clone())
    }

    /// 用给定方言做存活检测
    ///
    /// 未物化的连接视为有效（下次借出会重新物化）；
    /// 校验发生在池内部，不要求包装器处于激活状态
    pub(crate) async fn ping(&self, dialect: &dyn SqlDialect) -> DbPoolResult<bool> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(false);
        }
        match state.native.as_mut() {
            Some(native) => dialect.ping(native.as_mut()).await,
            None => Ok(true),
        }
    }

    /// 在物化的连接上执行方言环境检查，失败仅记录
    pub(crate) async fn check_dialect(&self, dialect: &dyn SqlDialect) {
        let mut state = self.state.lock().await;
        match self.materialize(&mut state).await {
            Ok(native) => {
                if let Err(e) = dialect.check(native.as_mut()).await {
                    warn!("方言环境检查失败: 池={}, 错误={}", self.pool_name, e);
                }
            }
            Err(e) => {
                warn!("方言环境检查无法取得连接: 池={}, 错误={}", self.pool_name, e);
            }
        }
    }

    /// 物理关闭连接，可重复调用且绝不向上抛错
    ///
    /// 手动提交且可写的连接先回滚未结束的事务；
    /// 关闭过程中的二次失败只记录日志
    pub async fn close_connection(&self, reason: Option<&str>) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;

        let Some(mut native) = state.native.take() else {
            return;
        };
        // closed已在锁内置位，此后的物化尝试会直接失败，回滚/关闭的IO可以在锁外进行
        drop(state);

        if let Some(reason) = reason {
            info!("关闭物理连接: 池={}, 原因={}", self.pool_name, reason);
        }

        if !self.read_only && !self.auto_commit {
            // 只读或自动提交模式下回滚非法/无意义，跳过
            if let Err(e) = native.rollback().await {
                warn!("关闭连接前回滚失败: 池={}, 错误={}", self.pool_name, e);
            }
        }

        if let Err(e) = native.close().await {
            warn!("关闭物理连接失败: 池={}, 错误={}", self.pool_name, e);
        }
    }

    /// 归还子池时的钝化处理
    ///
    /// 取消激活后防御性复查两个固定属性：应用代码若绕过包装器
    /// 改动了原生连接，这里强制恢复并告警，而不是把脏状态交给下一个借用方
    pub(crate) async fn cleanup(&self) {
        self.deactivate();
        self.clear_borrow_trace();

        let mut state = self.state.lock().await;
        let mut drop_native = false;
        if let Some(native) = state.native.as_mut() {
            if native.auto_commit() != self.auto_commit {
                warn!(
                    "归还时发现自动提交状态被非法修改，强制恢复: 池={}, 期望={}",
                    self.pool_name, self.auto_commit
                );
                if native.set_auto_commit(self.auto_commit).await.is_err() {
                    drop_native = true;
                }
            }
            if !drop_native && native.is_read_only() != self.read_only {
                warn!(
                    "归还时发现只读状态被非法修改，强制恢复: 池={}, 期望={}",
                    self.pool_name, self.read_only
                );
                if native.set_read_only(self.read_only).await.is_err() {
                    drop_native = true;
                }
            }
        }
        if drop_native {
            // 恢复失败的连接不再复用，下次借出时重新物化
            warn!("属性恢复失败，丢弃原生连接: 池={}", self.pool_name);
            state.native = None;
        }
    }

    /// 泄漏回收路径的同步钝化
    ///
    /// 不做异步恢复：属性被改动的连接直接丢弃原生句柄
    pub(crate) fn cleanup_sync(&self) {
        self.deactivate();
        self.clear_borrow_trace();

        if let Ok(mut state) = self.state.try_lock() {
            let mismatch = state.native.as_ref().is_some_and(|native| {
                native.auto_commit() != self.auto_commit
                    || native.is_read_only() != self.read_only
            });
            if mismatch {
                warn!(
                    "泄漏回收时发现连接属性被非法修改，丢弃原生连接: 池={}",
                    self.pool_name
                );
                state.native = None;
            }
        }
    }

    /// 复查原生连接的属性与固定配置是否一致
    ///
    /// 未物化的连接视为一致；借出路径的最好努力断言使用
    pub(crate) async fn flags_consistent(&self) -> bool {
        let state = self.state.lock().await;
        match state.native.as_ref() {
            Some(native) => {
                native.auto_commit() == self.auto_commit
                    && native.is_read_only() == self.read_only
            }
            None => true,
        }
    }

    /// 记录借出调用栈（仅 debug_resources 开启时）
    pub(crate) fn init_borrow_trace(&self) {
        *self.borrow_trace.lock() = Some(Backtrace::force_capture().to_string());
    }

    /// 取借出调用栈快照
    pub fn borrow_trace(&self) -> Option<String> {
        self.borrow_trace.lock().clone()
    }

    fn clear_borrow_trace(&self) {
        *self.borrow_trace.lock() = None;
    }
}
