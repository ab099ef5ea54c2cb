//! 测试替身：可注入元数据、可制造失效的内存数据源
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rat_dbpool::{
    DataSource, DatabaseMetadata, DbPoolError, DbPoolResult, IsolationLevel, NativeConnection,
};

/// 数据源替身的共享观测状态
#[derive(Default)]
pub struct MockStats {
    /// 已创建的原生连接数
    pub created: AtomicUsize,
    /// 已物理关闭的原生连接数
    pub closed: AtomicUsize,
    /// 执行过的SQL语句
    pub executed: Mutex<Vec<String>>,
    /// 为真时所有SQL执行报错（制造失效连接）
    pub fail_sql: AtomicBool,
}

/// 内存数据源替身
#[derive(Debug)]
pub struct MockDataSource {
    metadata: DatabaseMetadata,
    stats: Arc<MockStats>,
}

impl std::fmt::Debug for MockStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStats")
            .field("created", &self.created.load(Ordering::Acquire))
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl MockDataSource {
    /// 默认元数据（未知产品，方言检测会回退到通用方言）
    pub fn new() -> Self {
        Self::with_metadata(DatabaseMetadata {
            product_name: "MockDB".to_string(),
            product_version: "1.0".to_string(),
            product_major: 1,
            product_minor: 0,
            driver_name: "mock-driver".to_string(),
            driver_major: 1,
            driver_minor: 0,
        })
    }

    /// 指定元数据（驱动方言检测分支）
    pub fn with_metadata(metadata: DatabaseMetadata) -> Self {
        Self {
            metadata,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// 观测状态句柄
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn create_connection(&self) -> DbPoolResult<Box<dyn NativeConnection>> {
        self.stats.created.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MockConnection {
            metadata: self.metadata.clone(),
            stats: self.stats.clone(),
            auto_commit: true,
            read_only: false,
            isolation: IsolationLevel::Unset,
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        "mock://memory".to_string()
    }
}

/// 原生连接替身
pub struct MockConnection {
    metadata: DatabaseMetadata,
    stats: Arc<MockStats>,
    auto_commit: bool,
    read_only: bool,
    isolation: IsolationLevel,
    closed: bool,
}

#[async_trait]
impl NativeConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> DbPoolResult<u64> {
        if self.stats.fail_sql.load(Ordering::Acquire) {
            return Err(DbPoolError::SqlError {
                message: "mock: 连接已失效".to_string(),
                sql_state: Some("08003".to_string()),
            });
        }
        self.stats.executed.lock().push(sql.to_string());
        Ok(0)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbPoolResult<()> {
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_read_only(&mut self, read_only: bool) -> DbPoolResult<()> {
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn set_transaction_isolation(&mut self, level: IsolationLevel) -> DbPoolResult<()> {
        self.isolation = level;
        Ok(())
    }

    fn transaction_isolation(&self) -> IsolationLevel {
        self.isolation
    }

    async fn rollback(&mut self) -> DbPoolResult<()> {
        self.stats.executed.lock().push("ROLLBACK".to_string());
        Ok(())
    }

    async fn close(&mut self) -> DbPoolResult<()> {
        if !self.closed {
            self.closed = true;
            self.stats.closed.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

/// 构造一份指定产品/版本的元数据
pub fn metadata(
    product: &str,
    driver: &str,
    product_major: u32,
    product_minor: u32,
    driver_major: u32,
) -> DatabaseMetadata {
    DatabaseMetadata {
        product_name: product.to_string(),
        product_version: format!("{}.{}", product_major, product_minor),
        product_major,
        product_minor,
        driver_name: driver.to_string(),
        driver_major,
        driver_minor: 0,
    }
}
