//! 连接池门面
//!
//! 在读/写两个子池之上编排借出、释放与失效：
//! 借出委托会话记账做读连接折叠；写借出先拿读连接规避死锁；
//! 方言在池生命周期内恰好检测一次

use rat_logger::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::OnceCell;

use crate::adapter::DataSource;
use crate::context::SessionContext;
use crate::dialect::{SqlDialect, detect_dialect, dialect_by_name};
use crate::error::{DbPoolError, DbPoolResult};
use crate::pool::connection::PooledConnection;
use crate::pool::local::LocalConnections;
use crate::pool::object_pool::{ObjectPool, ResourceFactory};
use crate::pool_error;
use crate::types::{ConnectionKind, IsolationLevel, PoolEntryConfig};

/// 池实例标识序列
static POOL_ID_SEQ: AtomicU64 = AtomicU64::new(1);

/// 方言槽位：池与子池工厂共享，恰好初始化一次
pub(crate) struct DialectSlot {
    cell: OnceCell<Arc<dyn SqlDialect>>,
}

impl DialectSlot {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// 已解析的方言（未初始化时为None）
    pub(crate) fn get(&self) -> Option<Arc<dyn SqlDialect>> {
        self.cell.get().cloned()
    }
}

/// 池化连接工厂：为一个子池生产固定属性的连接包装器
struct PooledConnectionFactory {
    pool_name: String,
    kind: ConnectionKind,
    auto_commit: bool,
    read_only: bool,
    data_source: Arc<dyn DataSource>,
    dialect: Arc<DialectSlot>,
}

impl PooledConnectionFactory {
    fn new(
        pool_name: String,
        kind: ConnectionKind,
        data_source: Arc<dyn DataSource>,
        dialect: Arc<DialectSlot>,
    ) -> Self {
        // 读连接：自动提交+只读；写连接：手动提交+可写
        let (auto_commit, read_only) = match kind {
            ConnectionKind::Read => (true, true),
            ConnectionKind::Write => (false, false),
        };
        Self {
            pool_name,
            kind,
            auto_commit,
            read_only,
            data_source,
            dialect,
        }
    }
}

#[async_trait::async_trait]
impl ResourceFactory<Arc<PooledConnection>> for PooledConnectionFactory {
    async fn make(&self) -> DbPoolResult<Arc<PooledConnection>> {
        Ok(Arc::new(PooledConnection::new(
            self.pool_name.clone(),
            self.kind,
            self.data_source.clone(),
            IsolationLevel::ReadCommitted,
            self.auto_commit,
            self.read_only,
        )))
    }

    fn activate(&self, obj: &Arc<PooledConnection>) {
        obj.activate();
    }

    async fn passivate(&self, obj: &Arc<PooledConnection>) {
        obj.cleanup().await;
    }

    async fn destroy(&self, obj: Arc<PooledConnection>) {
        obj.close_connection(None).await;
    }

    async fn validate(&self, obj: &Arc<PooledConnection>) -> bool {
        match self.dialect.get() {
            Some(dialect) => match obj.ping(dialect.as_ref()).await {
                Ok(alive) => alive,
                Err(e) => {
                    // 校验中的数据库错误等同于连接失效，绝不向外传播
                    warn!("连接校验的数据库访问失败: 池={}, 错误={}", self.pool_name, e);
                    false
                }
            },
            // 方言尚未解析时跳过存活检测
            None => true,
        }
    }
}

/// 连接池
///
/// 命名的进程级服务：持有读/写两个有界子池、一个数据源工厂
/// 与池生命周期内解析一次的SQL方言
pub struct ConnectionPool {
    id: u64,
    name: String,
    data_source: Arc<dyn DataSource>,
    dialect_override: Option<String>,
    dialect: Arc<DialectSlot>,
    read_pool: ObjectPool<Arc<PooledConnection>>,
    write_pool: ObjectPool<Arc<PooledConnection>>,
    debug_resources: bool,
    warn_nested_read: bool,
    closed: AtomicBool,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("data_source", &self.data_source.describe())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl ConnectionPool {
    /// 从配置创建连接池
    ///
    /// 写池参数由读池参数叠加写池覆盖得到
    pub fn new(
        name: &str,
        config: &PoolEntryConfig,
        data_source: Arc<dyn DataSource>,
    ) -> Arc<Self> {
        let dialect = Arc::new(DialectSlot::new());

        let read_factory = Arc::new(PooledConnectionFactory::new(
            name.to_string(),
            ConnectionKind::Read,
            data_source.clone(),
            dialect.clone(),
        ));
        let write_factory = Arc::new(PooledConnectionFactory::new(
            name.to_string(),
            ConnectionKind::Write,
            data_source.clone(),
            dialect.clone(),
        ));

        let read_pool = ObjectPool::new(
            format!("{}-read", name),
            read_factory,
            config.resolved_read_settings(),
        );
        let write_pool = ObjectPool::new(
            format!("{}-write", name),
            write_factory,
            config.resolved_write_settings(),
        );

        info!(
            "创建连接池: 池={}, 数据源={}, debug_resources={}",
            name,
            data_source.describe(),
            config.debug_resources
        );

        Arc::new(Self {
            id: POOL_ID_SEQ.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            data_source,
            dialect_override: config.dialect.clone(),
            dialect,
            read_pool,
            write_pool,
            debug_resources: config.debug_resources || config.warn_nested_read,
            warn_nested_read: config.warn_nested_read,
            closed: AtomicBool::new(false),
        })
    }

    /// 池实例标识（会话记账的键）
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 池名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否开启借出调用栈跟踪
    pub fn debug_resources(&self) -> bool {
        self.debug_resources
    }

    fn check_open(&self) -> DbPoolResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbPoolError::PoolClosed {
                pool: self.name.clone(),
            });
        }
        Ok(())
    }

    /// 借出读连接
    ///
    /// 会话已持有读连接时原地复用并累加计数（无IO，O(1)）；
    /// 否则向读子池借新连接并登记为会话读连接
    pub async fn borrow_read_connection(
        self: &Arc<Self>,
        ctx: &SessionContext,
    ) -> DbPoolResult<Arc<PooledConnection>> {
        self.check_open()?;

        let warn_nested = self.debug_resources && self.warn_nested_read;
        if let Some(existing) = ctx.with_local(self, |local| local.local_read_connection(warn_nested))
        {
            return Ok(existing);
        }

        let conn = self.read_pool.borrow().await?;
        // 不变量复查只记录，不致命：发现问题比崩溃更有价值
        if !conn.flags_consistent().await {
            warn!("读连接的固定属性不变量被破坏: 池={}", self.name);
        }
        if self.debug_resources {
            conn.init_borrow_trace();
        }

        ctx.with_local(self, |local| local.init_read_connection(conn.clone()));
        Ok(conn)
    }

    /// 借出写连接
    ///
    /// 总是先借读连接再借写连接。读连接按线程可重入，先读后写
    /// 保证任何持有者都能继续推进，避免与其它线程的获取顺序互锁；
    /// 读借出失败时绝不尝试写借出
    pub async fn borrow_write_connection(
        self: &Arc<Self>,
        ctx: &SessionContext,
    ) -> DbPoolResult<Arc<PooledConnection>> {
        self.check_open()?;

        let read_conn = self.borrow_read_connection(ctx).await?;

        let write_conn = match self.write_pool.borrow().await {
            Ok(conn) => conn,
            Err(e) => {
                // 撤销为此次写借出隐式获取的读连接记账
                if let Err(release_err) = self.release_read_connection(ctx, &read_conn).await {
                    warn!(
                        "写借出失败后撤销读连接失败: 池={}, 错误={}",
                        self.name, release_err
                    );
                }
                return Err(e);
            }
        };

        if !write_conn.flags_consistent().await {
            warn!("写连接的固定属性不变量被破坏: 池={}", self.name);
        }
        if self.debug_resources {
            write_conn.init_borrow_trace();
        }

        ctx.with_local(self, |local| local.notify_borrow_write(write_conn.clone()));
        Ok(write_conn)
    }

    /// 释放读连接
    ///
    /// 计数减一；归零时连接才实际回到读子池
    pub async fn release_read_connection(
        &self,
        ctx: &SessionContext,
        conn: &Arc<PooledConnection>,
    ) -> DbPoolResult<()> {
        let fully_released =
            ctx.try_with_local(self.id, |local| local.notify_release_read(conn))?;
        if fully_released {
            self.read_pool.return_object(conn.clone()).await;
        }
        Ok(())
    }

    /// 失效读连接（怀疑损坏时替代释放）
    ///
    /// 仍被嵌套借出引用时降级为直接关闭物理连接，而不是破坏子池内部状态
    pub async fn invalidate_read_connection(
        &self,
        ctx: &SessionContext,
        conn: &Arc<PooledConnection>,
    ) -> DbPoolResult<()> {
        let fully_released =
            ctx.try_with_local(self.id, |local| local.notify_release_read(conn))?;
        if fully_released {
            self.read_pool.invalidate_object(conn.clone()).await;
        } else {
            conn.close_connection(Some("连接仍被嵌套引用，降级为物理关闭")).await;
        }
        Ok(())
    }

    /// 释放写连接
    ///
    /// 同时释放为它隐式获取的读连接（若记账仍显示存在）
    pub async fn release_write_connection(
        &self,
        ctx: &SessionContext,
        conn: &Arc<PooledConnection>,
    ) -> DbPoolResult<()> {
        ctx.try_with_local(self.id, |local| local.notify_release_write(conn))?;
        self.write_pool.return_object(conn.clone()).await;

        if let Some(read_conn) = ctx.peek_read(self.id) {
            self.release_read_connection(ctx, &read_conn).await?;
        }
        Ok(())
    }

    /// 失效写连接
    pub async fn invalidate_write_connection(
        &self,
        ctx: &SessionContext,
        conn: &Arc<PooledConnection>,
    ) -> DbPoolResult<()> {
        ctx.try_with_local(self.id, |local| local.notify_release_write(conn))?;
        self.write_pool.invalidate_object(conn.clone()).await;

        if let Some(read_conn) = ctx.peek_read(self.id) {
            self.invalidate_read_connection(ctx, &read_conn).await?;
        }
        Ok(())
    }

    /// 初始化SQL方言（池生命周期内恰好检测一次）
    ///
    /// 配置了显式覆盖时按名取方言；否则借一条读连接，
    /// 从数据库元数据检测，并在该连接上执行方言环境检查。
    /// 并发调用只会触发一次检测，其余调用等待同一结果
    pub async fn init_sql_dialect(
        self: &Arc<Self>,
        ctx: &SessionContext,
    ) -> DbPoolResult<Arc<dyn SqlDialect>> {
        self.dialect
            .cell
            .get_or_try_init(|| async {
                if let Some(name) = &self.dialect_override {
                    let dialect = dialect_by_name(name)?;
                    info!(
                        "连接池方言使用显式覆盖: 池={}, 方言={}",
                        self.name,
                        dialect.name()
                    );
                    return Ok(dialect);
                }

                let conn = self.borrow_read_connection(ctx).await?;
                let detection = async {
                    let meta = conn.database_metadata().await?;
                    let dialect = detect_dialect(&meta)?;
                    conn.check_dialect(dialect.as_ref()).await;
                    Ok::<_, DbPoolError>(dialect)
                }
                .await;
                let released = self.release_read_connection(ctx, &conn).await;

                let dialect = detection?;
                released?;
                info!(
                    "连接池方言解析完成: 池={}, 方言={}",
                    self.name,
                    dialect.name()
                );
                Ok(dialect)
            })
            .await
            .cloned()
    }

    /// 获取已解析的SQL方言
    pub fn get_sql_dialect(&self) -> DbPoolResult<Arc<dyn SqlDialect>> {
        self.dialect.get().ok_or_else(|| {
            pool_error!(
                illegal_state,
                format!("连接池方言尚未初始化: 池={}（请先调用init_sql_dialect）", self.name)
            )
        })
    }

    /// 主动清空两个子池的空闲连接
    ///
    /// 之后的借出保证创建全新连接
    pub async fn clear(&self) {
        self.read_pool.clear().await;
        self.write_pool.clear().await;
    }

    /// 关闭连接池（终态），此后任何借出调用都不合法
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.read_pool.close().await;
        self.write_pool.close().await;
        info!("连接池已关闭: 池={}", self.name);
    }

    /// 读子池当前借出数
    pub fn read_active(&self) -> usize {
        self.read_pool.num_active()
    }

    /// 读子池当前空闲数
    pub fn read_idle(&self) -> usize {
        self.read_pool.num_idle()
    }

    /// 写子池当前借出数
    pub fn write_active(&self) -> usize {
        self.write_pool.num_active()
    }

    /// 写子池当前空闲数
    pub fn write_idle(&self) -> usize {
        self.write_pool.num_idle()
    }

    fn leak_warning(&self, kind: &str, conn: &PooledConnection, nested: u32) {
        let trace = conn
            .borrow_trace()
            .unwrap_or_else(|| "<未开启debug_resources>".to_string());
        warn!(
            "检测到未释放的{}连接，框架自动回收: 池={}, 嵌套计数={}。\
             若看不到借出调用栈，请开启debug_resources后重试。借出栈={}",
            kind, self.name, nested, trace
        );
    }

    /// 解绑路径的泄漏回收（异步常规归还）
    pub(crate) async fn reclaim_leaked(&self, local: &mut LocalConnections) {
        if let Some((conn, nested)) = local.take_read() {
            self.leak_warning("读", &conn, nested);
            self.read_pool.return_object(conn).await;
        }
        for conn in local.take_writes() {
            self.leak_warning("写", &conn, 1);
            self.write_pool.return_object(conn).await;
        }
    }

    /// Drop兜底路径的泄漏回收（同步强制归还）
    pub(crate) fn reclaim_leaked_sync(&self, local: &mut LocalConnections) {
        if let Some((conn, nested)) = local.take_read() {
            self.leak_warning("读", &conn, nested);
            conn.cleanup_sync();
            self.read_pool.return_object_forced(conn);
        }
        for conn in local.take_writes() {
            self.leak_warning("写", &conn, 1);
            conn.cleanup_sync();
            self.write_pool.return_object_forced(conn);
        }
    }
}
