//! 连接池注册表
//!
//! 显式构造、按依赖注入传递的命名池目录（不提供全局静态入口）。
//! 支持 settings_from 配置别名与保留名 "default" 的默认池解析

use dashmap::DashMap;
use rat_logger::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::adapter::{DataSource, create_data_source};
use crate::error::DbPoolResult;
use crate::pool::ConnectionPool;
use crate::pool_error;
use crate::types::{DataSourceConfig, PoolEntryConfig, RegistryConfig};

/// 默认连接池的保留名称
pub const DEFAULT_POOL_NAME: &str = "default";

/// 数据源工厂回调：测试可注入替身数据源
pub type DataSourceProvider =
    dyn Fn(&DataSourceConfig) -> DbPoolResult<Arc<dyn DataSource>> + Send + Sync;

/// 连接池注册表
///
/// 进程生命周期内的池名目录；池实例创建于注册表构造，销毁于 [PoolRegistry::shutdown]
pub struct PoolRegistry {
    pools: DashMap<String, Arc<ConnectionPool>>,
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.aliases())
            .finish()
    }
}

impl PoolRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// 从配置构造注册表（使用内建的数据源工厂）
    pub fn from_config(config: &RegistryConfig) -> DbPoolResult<Self> {
        Self::from_config_with_provider(config, &|ds_config| create_data_source(ds_config))
    }

    /// 从配置构造注册表，数据源由调用方提供的工厂创建
    pub fn from_config_with_provider(
        config: &RegistryConfig,
        provider: &DataSourceProvider,
    ) -> DbPoolResult<Self> {
        let registry = Self::new();

        for (name, entry) in &config.pools {
            if !entry.enabled {
                // 禁用条目只作为settings_from的配置来源
                info!("连接池条目已禁用，跳过实例化: 池={}", name);
                continue;
            }

            let resolved = resolve_entry(config, name, entry)?;
            let data_source_config = resolved.data_source.as_ref().ok_or_else(|| {
                pool_error!(config, format!("连接池条目缺少数据源配置: 池={}", name))
            })?;

            let data_source = provider(data_source_config)?;
            let pool = ConnectionPool::new(name, &resolved, data_source);
            registry.register(name, pool);
        }

        if registry.get(DEFAULT_POOL_NAME).is_none() {
            warn!("未注册名为 {} 的连接池，默认池解析将返回空", DEFAULT_POOL_NAME);
        }

        Ok(registry)
    }

    /// 注册一个池（同名覆盖）
    pub fn register(&self, name: &str, pool: Arc<ConnectionPool>) {
        if self.pools.insert(name.to_string(), pool).is_some() {
            warn!("连接池名称已存在，替换原有实例: 池={}", name);
        }
    }

    fn get(&self, name: &str) -> Option<Arc<ConnectionPool>> {
        self.pools.get(name).map(|entry| entry.value().clone())
    }

    /// 按名称获取连接池，名称未注册视为非法参数
    pub fn get_pool(&self, name: &str) -> DbPoolResult<Arc<ConnectionPool>> {
        self.get(name)
            .ok_or_else(|| pool_error!(alias_not_found, name))
    }

    /// 获取默认连接池（保留名 "default"），未注册时返回None
    pub fn get_default_pool(&self) -> Option<Arc<ConnectionPool>> {
        self.get(DEFAULT_POOL_NAME)
    }

    /// 当前所有已注册的池名
    pub fn aliases(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// 获取所有已注册池的状态快照
    ///
    /// 包含每个池的读/写子池借出与空闲数量，以及方言解析状态
    pub fn status(&self) -> serde_json::Value {
        use serde_json::json;
        let mut pools_status = serde_json::Map::new();
        for entry in self.pools.iter() {
            let pool = entry.value();
            let dialect = pool
                .get_sql_dialect()
                .map(|d| d.name().to_string())
                .unwrap_or_else(|_| "<未初始化>".to_string());
            pools_status.insert(
                entry.key().clone(),
                json!({
                    "read": {
                        "active": pool.read_active(),
                        "idle": pool.read_idle(),
                    },
                    "write": {
                        "active": pool.write_active(),
                        "idle": pool.write_idle(),
                    },
                    "dialect": dialect,
                }),
            );
        }
        serde_json::Value::Object(pools_status)
    }

    /// 关闭注册表：逐个关闭所有池并清空目录
    pub async fn shutdown(&self) {
        info!("开始关闭连接池注册表");
        let pools: Vec<Arc<ConnectionPool>> = self
            .pools
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for pool in pools {
            pool.close().await;
        }
        self.pools.clear();
        info!("连接池注册表已关闭");
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析settings_from链，得到条目的最终配置
///
/// 被引用的条目可以处于禁用状态；链上出现环或悬空引用都是配置错误
fn resolve_entry(
    config: &RegistryConfig,
    name: &str,
    entry: &PoolEntryConfig,
) -> DbPoolResult<PoolEntryConfig> {
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(name);

    let mut current = entry;
    while let Some(source_name) = &current.settings_from {
        if !visited.insert(source_name.as_str()) {
            return Err(pool_error!(
                config,
                format!("settings_from存在循环引用: 池={}", name)
            ));
        }
        current = config.pools.get(source_name).ok_or_else(|| {
            pool_error!(
                config,
                format!(
                    "settings_from指向不存在的条目: 池={}, 引用={}",
                    name, source_name
                )
            )
        })?;
    }

    if std::ptr::eq(current, entry) {
        return Ok(entry.clone());
    }

    // 复用来源配置，但保留本条目的启用状态
    let mut resolved = current.clone();
    resolved.enabled = entry.enabled;
    resolved.settings_from = None;
    info!(
        "连接池复用配置: 池={}, 来源={}",
        name,
        entry.settings_from.as_deref().unwrap_or("")
    );
    Ok(resolved)
}
