//! 通用有界对象池
//!
//! 连接池的两个子池（读/写）都由它实现。容量由信号量约束，
//! 耗尽动作支持立即失败/限时阻塞/临时增长三种，
//! 空闲对象由可选的后台驱逐任务回收

use async_trait::async_trait;
use parking_lot::Mutex;
use rat_logger::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::error::{DbPoolError, DbPoolResult};
use crate::types::{ExhaustedAction, ResolvedPoolSettings};

/// 池化资源的生命周期工厂
///
/// 对应关系：make=新建, activate=借出前激活, passivate=归还时钝化,
/// destroy=销毁, validate=存活校验
#[async_trait]
pub trait ResourceFactory<T: Send + Sync>: Send + Sync {
    /// 创建一个新资源
    async fn make(&self) -> DbPoolResult<T>;

    /// 借出前激活资源
    fn activate(&self, obj: &T);

    /// 归还时钝化资源
    async fn passivate(&self, obj: &T);

    /// 销毁资源（绝不失败，内部自行记录错误）
    async fn destroy(&self, obj: T);

    /// 校验资源是否仍然可用
    async fn validate(&self, obj: &T) -> bool;
}

/// 空闲队列条目
struct IdleEntry<T> {
    obj: T,
    idle_since: Instant,
}

/// 池内部共享状态（驱逐任务持有弱引用）
struct PoolShared<T: Send + Sync + 'static> {
    name: String,
    factory: Arc<dyn ResourceFactory<T>>,
    settings: ResolvedPoolSettings,
    idle: Mutex<VecDeque<IdleEntry<T>>>,
    /// 名义容量的许可
    permits: Arc<Semaphore>,
    /// Grow动作下超出名义容量的借出数
    overflow: AtomicU32,
    active: AtomicUsize,
    closed: AtomicBool,
}

impl<T: Send + Sync + 'static> PoolShared<T> {
    /// 归还一份容量：优先消化超额借出，否则补回许可
    fn release_capacity(&self) {
        loop {
            let overflow = self.overflow.load(Ordering::Acquire);
            if overflow == 0 {
                self.permits.add_permits(1);
                return;
            }
            if self
                .overflow
                .compare_exchange(overflow, overflow - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }
}

/// 通用有界对象池
pub struct ObjectPool<T: Send + Sync + 'static> {
    shared: Arc<PoolShared<T>>,
    evictor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> ObjectPool<T> {
    /// 创建对象池
    ///
    /// 配置了驱逐间隔时启动后台驱逐任务
    pub fn new(
        name: String,
        factory: Arc<dyn ResourceFactory<T>>,
        settings: ResolvedPoolSettings,
    ) -> Self {
        let max_active = settings.max_active.max(1) as usize;
        let shared = Arc::new(PoolShared {
            name,
            factory,
            settings,
            idle: Mutex::new(VecDeque::new()),
            permits: Arc::new(Semaphore::new(max_active)),
            overflow: AtomicU32::new(0),
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });

        let evictor = if shared.settings.time_between_eviction_runs_ms > 0 {
            // 池可能在运行时之外构造（同步装配路径），此时驱逐任务无法启动
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => Some(Self::spawn_evictor(handle, Arc::downgrade(&shared))),
                Err(_) => {
                    warn!("当前无tokio运行时，空闲驱逐任务未启动: 池={}", shared.name);
                    None
                }
            }
        } else {
            None
        };

        Self {
            shared,
            evictor: Mutex::new(evictor),
        }
    }

    /// 后台驱逐任务：回收超龄空闲对象，按需做空闲校验
    fn spawn_evictor(
        handle: tokio::runtime::Handle,
        shared: Weak<PoolShared<T>>,
    ) -> tokio::task::JoinHandle<()> {
        handle.spawn(async move {
            let interval_ms = match shared.upgrade() {
                Some(s) => s.settings.time_between_eviction_runs_ms,
                None => return,
            };
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(s) = shared.upgrade() else { return };
                if s.closed.load(Ordering::Acquire) {
                    return;
                }
                Self::run_eviction(&s).await;
            }
        })
    }

    async fn run_eviction(shared: &PoolShared<T>) {
        let settings = &shared.settings;
        let mut evicted: Vec<T> = Vec::new();
        {
            let mut idle = shared.idle.lock();
            let mut remaining = settings.num_tests_per_eviction_run.max(1);
            // 队首是最旧的条目
            while remaining > 0 {
                let Some(entry) = idle.front() else { break };
                let over_min_idle = idle.len() > settings.min_idle as usize;
                let expired = entry.idle_since.elapsed()
                    >= Duration::from_millis(settings.min_evictable_idle_ms);
                if over_min_idle && expired {
                    if let Some(entry) = idle.pop_front() {
                        evicted.push(entry.obj);
                    }
                } else {
                    break;
                }
                remaining -= 1;
            }
        }
        let evicted_count = evicted.len();
        for obj in evicted {
            shared.factory.destroy(obj).await;
        }
        if evicted_count > 0 {
            debug!("驱逐超龄空闲对象: 池={}, 数量={}", shared.name, evicted_count);
        }

        // 空闲校验：取出一个做检测，失效则销毁
        if settings.test_while_idle {
            let candidate = shared.idle.lock().pop_front();
            if let Some(entry) = candidate {
                if shared.factory.validate(&entry.obj).await {
                    shared.idle.lock().push_back(IdleEntry {
                        obj: entry.obj,
                        idle_since: entry.idle_since,
                    });
                } else {
                    warn!("空闲校验发现失效对象，销毁: 池={}", shared.name);
                    shared.factory.destroy(entry.obj).await;
                }
            }
        }
    }

    /// 子池名称
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// 借出一个对象
    ///
    /// 容量耗尽时按配置的动作处理；阻塞等待受 max_wait_ms 约束
    pub async fn borrow(&self) -> DbPoolResult<T> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            return Err(DbPoolError::PoolClosed {
                pool: shared.name.clone(),
            });
        }

        // 第一步：取得容量（许可或超额名额）
        let held_permit = match shared.settings.when_exhausted {
            ExhaustedAction::Fail => match shared.permits.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return Err(DbPoolError::PoolExhausted {
                        pool: shared.name.clone(),
                        waited_ms: 0,
                    });
                }
            },
            ExhaustedAction::Block => {
                let max_wait = Duration::from_millis(shared.settings.max_wait_ms);
                let started = Instant::now();
                match tokio::time::timeout(max_wait, shared.permits.clone().acquire_owned()).await
                {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(_)) => {
                        // 信号量只在池关闭时关闭
                        return Err(DbPoolError::PoolClosed {
                            pool: shared.name.clone(),
                        });
                    }
                    Err(_) => {
                        return Err(DbPoolError::PoolExhausted {
                            pool: shared.name.clone(),
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                }
            }
            ExhaustedAction::Grow => match shared.permits.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    shared.overflow.fetch_add(1, Ordering::AcqRel);
                    debug!("超出名义容量借出: 池={}", shared.name);
                    None
                }
            },
        };

        // 第二步：复用空闲对象或新建
        let result = self.take_idle_or_make().await;
        match result {
            Ok(obj) => {
                if let Some(permit) = held_permit {
                    permit.forget();
                }
                shared.active.fetch_add(1, Ordering::AcqRel);
                Ok(obj)
            }
            Err(e) => {
                match held_permit {
                    Some(permit) => drop(permit),
                    None => shared.release_capacity(),
                }
                Err(e)
            }
        }
    }

    async fn take_idle_or_make(&self) -> DbPoolResult<T> {
        let shared = &self.shared;
        loop {
            let entry = {
                let mut idle = shared.idle.lock();
                if shared.settings.lifo {
                    idle.pop_back()
                } else {
                    idle.pop_front()
                }
            };
            let Some(entry) = entry else { break };

            shared.factory.activate(&entry.obj);
            if shared.settings.test_on_borrow && !shared.factory.validate(&entry.obj).await {
                // 失效连接直接销毁，换下一个
                warn!("借出校验发现失效对象，销毁: 池={}", shared.name);
                shared.factory.destroy(entry.obj).await;
                continue;
            }
            return Ok(entry.obj);
        }

        let obj = shared.factory.make().await?;
        shared.factory.activate(&obj);
        Ok(obj)
    }

    /// 归还一个对象
    ///
    /// 校验失败、池已关闭或空闲队列已满时对象被销毁而不是回池
    pub async fn return_object(&self, obj: T) {
        let shared = &self.shared;
        shared.factory.passivate(&obj).await;

        let valid = if shared.settings.test_on_return {
            shared.factory.validate(&obj).await
        } else {
            true
        };

        shared.active.fetch_sub(1, Ordering::AcqRel);

        let pooled = valid && !shared.closed.load(Ordering::Acquire);
        if pooled {
            let mut idle = shared.idle.lock();
            if idle.len() < shared.settings.max_idle as usize {
                idle.push_back(IdleEntry {
                    obj,
                    idle_since: Instant::now(),
                });
                drop(idle);
                shared.release_capacity();
                return;
            }
        }

        shared.factory.destroy(obj).await;
        shared.release_capacity();
    }

    /// 修复路径的同步归还
    ///
    /// 仅供泄漏回收使用：跳过工厂钝化与校验，调用方必须已自行钝化对象
    pub fn return_object_forced(&self, obj: T) {
        let shared = &self.shared;
        shared.active.fetch_sub(1, Ordering::AcqRel);

        if !shared.closed.load(Ordering::Acquire) {
            let mut idle = shared.idle.lock();
            if idle.len() < shared.settings.max_idle as usize {
                idle.push_back(IdleEntry {
                    obj,
                    idle_since: Instant::now(),
                });
                drop(idle);
                shared.release_capacity();
                return;
            }
        }

        // 池已关闭或空闲已满：对象随作用域销毁
        drop(obj);
        shared.release_capacity();
    }

    /// 废弃一个对象（怀疑已损坏时替代归还）
    pub async fn invalidate_object(&self, obj: T) {
        let shared = &self.shared;
        shared.factory.destroy(obj).await;
        shared.active.fetch_sub(1, Ordering::AcqRel);
        shared.release_capacity();
    }

    /// 清空所有空闲对象，后续借出保证拿到新建连接
    pub async fn clear(&self) {
        let drained: Vec<T> = {
            let mut idle = self.shared.idle.lock();
            idle.drain(..).map(|entry| entry.obj).collect()
        };
        let count = drained.len();
        for obj in drained {
            self.shared.factory.destroy(obj).await;
        }
        if count > 0 {
            info!("清空空闲对象: 池={}, 数量={}", self.shared.name, count);
        }
    }

    /// 关闭对象池（终态）
    ///
    /// 此后借出一律失败；仍在外的对象归还时直接销毁
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        let evictor = self.evictor.lock().take();
        if let Some(handle) = evictor {
            handle.abort();
        }
        self.clear().await;
    }

    /// 当前借出数量
    pub fn num_active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// 当前空闲数量
    pub fn num_idle(&self) -> usize {
        self.shared.idle.lock().len()
    }

    /// 池是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
