//! 连接池配置类型
//!
//! 涵盖子池参数、数据源参数与注册表配置，
//! 全部支持serde序列化，可从TOML加载

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DbPoolResult;
use crate::pool_error;

/// 连接种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// 只读连接
    Read,
    /// 可写连接
    Write,
}

impl ConnectionKind {
    /// 获取种类的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Read => "read",
            ConnectionKind::Write => "write",
        }
    }
}

/// 事务隔离级别
///
/// `Unset` 表示不对连接设置隔离级别（对应原生驱动默认值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// 不设置
    #[default]
    Unset,
    /// 读未提交
    ReadUncommitted,
    /// 读已提交
    ReadCommitted,
    /// 可重复读
    RepeatableRead,
    /// 串行化
    Serializable,
}

impl IsolationLevel {
    /// 生成 SET TRANSACTION ISOLATION LEVEL 子句中的级别文本
    pub fn sql_keyword(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::Unset => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

/// 子池耗尽时的处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedAction {
    /// 立即失败
    Fail,
    /// 阻塞等待（受max_wait_ms限制）
    Block,
    /// 临时超出名义容量
    Grow,
}

/// 子池参数
///
/// 所有字段可选，未设置的字段在 [PoolSettings::resolve] 时落到默认值；
/// 写池配置通过 [PoolSettings::overlay] 叠加在读池配置之上
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolSettings {
    /// 最大活跃连接数
    pub max_active: Option<u32>,
    /// 耗尽阻塞的最长等待（毫秒）
    pub max_wait_ms: Option<u64>,
    /// 最小空闲连接数（驱逐任务保留的下限）
    pub min_idle: Option<u32>,
    /// 最大空闲连接数
    pub max_idle: Option<u32>,
    /// 驱逐任务运行间隔（毫秒，0表示不运行）
    pub time_between_eviction_runs_ms: Option<u64>,
    /// 空闲多久后可被驱逐（毫秒）
    pub min_evictable_idle_ms: Option<u64>,
    /// 每轮驱逐检查的连接数
    pub num_tests_per_eviction_run: Option<u32>,
    /// 借出时校验连接
    pub test_on_borrow: Option<bool>,
    /// 归还时校验连接
    pub test_on_return: Option<bool>,
    /// 空闲期间校验连接
    pub test_while_idle: Option<bool>,
    /// 后进先出（复用最近归还的连接）
    pub lifo: Option<bool>,
    /// 耗尽动作
    pub when_exhausted: Option<ExhaustedAction>,
}

/// 解析完成的子池参数（所有字段都有具体值）
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPoolSettings {
    pub max_active: u32,
    pub max_wait_ms: u64,
    pub min_idle: u32,
    pub max_idle: u32,
    pub time_between_eviction_runs_ms: u64,
    pub min_evictable_idle_ms: u64,
    pub num_tests_per_eviction_run: u32,
    pub test_on_borrow: bool,
    pub test_on_return: bool,
    pub test_while_idle: bool,
    pub lifo: bool,
    pub when_exhausted: ExhaustedAction,
}

impl Default for ResolvedPoolSettings {
    fn default() -> Self {
        Self {
            max_active: 8,
            max_wait_ms: 30_000,
            min_idle: 0,
            max_idle: 8,
            time_between_eviction_runs_ms: 0,
            min_evictable_idle_ms: 1_800_000,
            num_tests_per_eviction_run: 3,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            lifo: true,
            when_exhausted: ExhaustedAction::Block,
        }
    }
}

impl PoolSettings {
    /// 将另一组参数叠加到当前参数之上，已设置的字段优先
    ///
    /// 写池配置 = 读池配置 overlay 写池配置
    pub fn overlay(&self, over: &PoolSettings) -> PoolSettings {
        PoolSettings {
            max_active: over.max_active.or(self.max_active),
            max_wait_ms: over.max_wait_ms.or(self.max_wait_ms),
            min_idle: over.min_idle.or(self.min_idle),
            max_idle: over.max_idle.or(self.max_idle),
            time_between_eviction_runs_ms: over
                .time_between_eviction_runs_ms
                .or(self.time_between_eviction_runs_ms),
            min_evictable_idle_ms: over.min_evictable_idle_ms.or(self.min_evictable_idle_ms),
            num_tests_per_eviction_run: over
                .num_tests_per_eviction_run
                .or(self.num_tests_per_eviction_run),
            test_on_borrow: over.test_on_borrow.or(self.test_on_borrow),
            test_on_return: over.test_on_return.or(self.test_on_return),
            test_while_idle: over.test_while_idle.or(self.test_while_idle),
            lifo: over.lifo.or(self.lifo),
            when_exhausted: over.when_exhausted.or(self.when_exhausted),
        }
    }

    /// 解析为具体参数，未设置的字段取默认值
    pub fn resolve(&self) -> ResolvedPoolSettings {
        let defaults = ResolvedPoolSettings::default();
        ResolvedPoolSettings {
            max_active: self.max_active.unwrap_or(defaults.max_active),
            max_wait_ms: self.max_wait_ms.unwrap_or(defaults.max_wait_ms),
            min_idle: self.min_idle.unwrap_or(defaults.min_idle),
            max_idle: self.max_idle.unwrap_or(defaults.max_idle),
            time_between_eviction_runs_ms: self
                .time_between_eviction_runs_ms
                .unwrap_or(defaults.time_between_eviction_runs_ms),
            min_evictable_idle_ms: self
                .min_evictable_idle_ms
                .unwrap_or(defaults.min_evictable_idle_ms),
            num_tests_per_eviction_run: self
                .num_tests_per_eviction_run
                .unwrap_or(defaults.num_tests_per_eviction_run),
            test_on_borrow: self.test_on_borrow.unwrap_or(defaults.test_on_borrow),
            test_on_return: self.test_on_return.unwrap_or(defaults.test_on_return),
            test_while_idle: self.test_while_idle.unwrap_or(defaults.test_while_idle),
            lifo: self.lifo.unwrap_or(defaults.lifo),
            when_exhausted: self.when_exhausted.unwrap_or(defaults.when_exhausted),
        }
    }

    /// 设置最大活跃连接数
    pub fn with_max_active(mut self, max_active: u32) -> Self {
        self.max_active = Some(max_active);
        self
    }

    /// 设置耗尽等待上限（毫秒）
    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = Some(max_wait_ms);
        self
    }

    /// 设置耗尽动作
    pub fn with_exhausted_action(mut self, action: ExhaustedAction) -> Self {
        self.when_exhausted = Some(action);
        self
    }

    /// 设置借出时校验
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = Some(test);
        self
    }

    /// 设置驱逐任务间隔（毫秒）
    pub fn with_eviction_interval_ms(mut self, interval_ms: u64) -> Self {
        self.time_between_eviction_runs_ms = Some(interval_ms);
        self
    }

    /// 设置最小空闲连接数
    pub fn with_min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = Some(min_idle);
        self
    }
}

/// 各数据库的连接参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum ConnectionConfig {
    /// SQLite 文件路径
    Sqlite {
        /// 数据库文件路径（`:memory:` 表示内存库）
        path: String,
        /// 文件不存在时是否创建
        #[serde(default)]
        create_if_missing: bool,
    },
    /// PostgreSQL 连接配置
    Postgres {
        /// 主机地址
        host: String,
        /// 端口号
        port: u16,
        /// 数据库名
        database: String,
        /// 用户名
        username: String,
        /// 密码
        password: String,
    },
    /// MySQL 连接配置
    Mysql {
        /// 主机地址
        host: String,
        /// 端口号
        port: u16,
        /// 数据库名
        database: String,
        /// 用户名
        username: String,
        /// 密码
        password: String,
    },
}

/// 数据源配置
///
/// 除驱动参数外还携带通用键值选项；
/// `encrypted_options` 列出的键，其值以加密形式存储，使用前需解码
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// 驱动连接参数
    pub connection: ConnectionConfig,
    /// 通用驱动选项
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// 值为加密存储的选项键
    #[serde(default)]
    pub encrypted_options: Vec<String>,
}

impl DataSourceConfig {
    /// 创建不带额外选项的数据源配置
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            options: HashMap::new(),
            encrypted_options: Vec::new(),
        }
    }

    /// 获取解码后的驱动选项
    ///
    /// `encrypted_options` 中列出的键会先经过解码；未加密的键原样返回
    pub fn decoded_options(&self) -> DbPoolResult<HashMap<String, String>> {
        let mut decoded = HashMap::with_capacity(self.options.len());
        for (key, value) in &self.options {
            if self.encrypted_options.iter().any(|k| k == key) {
                decoded.insert(key.clone(), crate::security::decode_option(value)?);
            } else {
                decoded.insert(key.clone(), value.clone());
            }
        }
        Ok(decoded)
    }
}

/// 注册表中单个连接池条目的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntryConfig {
    /// 是否启用（禁用的条目仅可作为 settings_from 的来源）
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 复用另一条目的配置（配置别名）
    #[serde(default)]
    pub settings_from: Option<String>,
    /// 数据源配置（settings_from 条目可省略）
    #[serde(default)]
    pub data_source: Option<DataSourceConfig>,
    /// 读池参数
    #[serde(default)]
    pub read_pool: PoolSettings,
    /// 写池参数（叠加在读池参数之上）
    #[serde(default)]
    pub write_pool: PoolSettings,
    /// 显式方言覆盖（跳过自动检测）
    #[serde(default)]
    pub dialect: Option<String>,
    /// 跟踪借出调用栈（有性能代价）
    #[serde(default)]
    pub debug_resources: bool,
    /// 嵌套借出读连接时发出警告
    #[serde(default)]
    pub warn_nested_read: bool,
}

fn default_enabled() -> bool {
    true
}

impl PoolEntryConfig {
    /// 创建一个使用给定数据源的池配置
    pub fn new(data_source: DataSourceConfig) -> Self {
        Self {
            enabled: true,
            settings_from: None,
            data_source: Some(data_source),
            read_pool: PoolSettings::default(),
            write_pool: PoolSettings::default(),
            dialect: None,
            debug_resources: false,
            warn_nested_read: false,
        }
    }

    /// 设置读池参数
    pub fn with_read_pool(mut self, settings: PoolSettings) -> Self {
        self.read_pool = settings;
        self
    }

    /// 设置写池参数
    pub fn with_write_pool(mut self, settings: PoolSettings) -> Self {
        self.write_pool = settings;
        self
    }

    /// 开启借出调用栈跟踪
    pub fn with_debug_resources(mut self, enabled: bool) -> Self {
        self.debug_resources = enabled;
        self
    }

    /// 设置显式方言覆盖
    pub fn with_dialect(mut self, dialect: &str) -> Self {
        self.dialect = Some(dialect.to_string());
        self
    }

    /// 计算写池的最终参数（读池参数叠加写池参数）
    pub fn resolved_write_settings(&self) -> ResolvedPoolSettings {
        self.read_pool.overlay(&self.write_pool).resolve()
    }

    /// 计算读池的最终参数
    pub fn resolved_read_settings(&self) -> ResolvedPoolSettings {
        self.read_pool.resolve()
    }
}

/// 注册表配置：命名的连接池条目集合
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 池名 -> 条目配置
    #[serde(default)]
    pub pools: HashMap<String, PoolEntryConfig>,
}

impl RegistryConfig {
    /// 从TOML文本解析注册表配置
    pub fn from_toml_str(text: &str) -> DbPoolResult<Self> {
        toml::from_str(text).map_err(|e| pool_error!(config, format!("TOML解析失败: {}", e)))
    }

    /// 添加一个池条目
    pub fn with_pool(mut self, name: &str, entry: PoolEntryConfig) -> Self {
        self.pools.insert(name.to_string(), entry);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_write_settings() {
        let read = PoolSettings::default()
            .with_max_active(20)
            .with_max_wait_ms(1000);
        let write = PoolSettings::default().with_max_active(4);

        let layered = read.overlay(&write).resolve();
        assert_eq!(layered.max_active, 4);
        assert_eq!(layered.max_wait_ms, 1000);
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = PoolSettings::default().resolve();
        assert_eq!(resolved.max_active, 8);
        assert_eq!(resolved.when_exhausted, ExhaustedAction::Block);
        assert!(resolved.lifo);
    }

    #[test]
    fn test_registry_config_from_toml() {
        let text = r#"
            [pools.default.data_source.connection]
            driver = "sqlite"
            path = ":memory:"

            [pools.default.read_pool]
            max_active = 5
            test_on_borrow = true

            [pools.reporting]
            settings_from = "default"
        "#;
        let config = RegistryConfig::from_toml_str(text).unwrap();
        let entry = &config.pools["default"];
        assert!(entry.enabled);
        assert_eq!(entry.read_pool.max_active, Some(5));
        assert_eq!(
            config.pools["reporting"].settings_from.as_deref(),
            Some("default")
        );
    }
}
