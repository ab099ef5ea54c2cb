//! 注册表与配置测试

mod common;

use std::sync::Arc;

use common::MockDataSource;
use rat_dbpool::registry::DEFAULT_POOL_NAME;
use rat_dbpool::{
    ConnectionConfig, DataSourceConfig, DbPoolError, PoolEntryConfig, PoolRegistry, RegistryConfig,
    SessionContext,
};

fn sqlite_entry() -> PoolEntryConfig {
    PoolEntryConfig::new(DataSourceConfig::new(ConnectionConfig::Sqlite {
        path: ":memory:".to_string(),
        create_if_missing: false,
    }))
}

fn mock_registry(config: &RegistryConfig) -> PoolRegistry {
    PoolRegistry::from_config_with_provider(config, &|_ds_config| {
        Ok(Arc::new(MockDataSource::new()))
    })
    .unwrap()
}

#[tokio::test]
async fn test_lookup_and_default_resolution() {
    let config = RegistryConfig::default()
        .with_pool(DEFAULT_POOL_NAME, sqlite_entry())
        .with_pool("reporting", sqlite_entry());
    let registry = mock_registry(&config);

    assert!(registry.get_pool("reporting").is_ok());
    assert_eq!(
        registry.get_default_pool().unwrap().name(),
        DEFAULT_POOL_NAME
    );

    let mut aliases = registry.aliases();
    aliases.sort();
    assert_eq!(aliases, vec!["default", "reporting"]);

    let status = registry.status();
    assert_eq!(status["reporting"]["read"]["active"], 0);
    assert_eq!(status["default"]["dialect"], "<未初始化>");
}

#[tokio::test]
async fn test_unknown_name_is_error() {
    let config = RegistryConfig::default().with_pool(DEFAULT_POOL_NAME, sqlite_entry());
    let registry = mock_registry(&config);

    let err = registry.get_pool("nonexistent").unwrap_err();
    assert!(matches!(err, DbPoolError::AliasNotFound { .. }));
}

#[tokio::test]
async fn test_missing_default_pool_is_none() {
    let config = RegistryConfig::default().with_pool("primary", sqlite_entry());
    let registry = mock_registry(&config);

    assert!(registry.get_default_pool().is_none());
    assert!(registry.get_pool("primary").is_ok());
}

#[tokio::test]
async fn test_settings_from_alias() {
    let mut source = sqlite_entry();
    source.read_pool.max_active = Some(3);
    // 禁用的条目仍可作为配置来源
    source.enabled = false;

    let mut alias = PoolEntryConfig::new(DataSourceConfig::new(ConnectionConfig::Sqlite {
        path: "unused".to_string(),
        create_if_missing: false,
    }));
    alias.settings_from = Some("template".to_string());
    alias.data_source = None;

    let config = RegistryConfig::default()
        .with_pool("template", source)
        .with_pool("analytics", alias);
    let registry = mock_registry(&config);

    // 模板条目本身被禁用，不实例化
    assert!(registry.get_pool("template").is_err());
    let pool = registry.get_pool("analytics").unwrap();
    assert_eq!(pool.name(), "analytics");
}

#[tokio::test]
async fn test_settings_from_cycle_is_config_error() {
    let mut a = sqlite_entry();
    a.settings_from = Some("b".to_string());
    let mut b = sqlite_entry();
    b.settings_from = Some("a".to_string());

    let config = RegistryConfig::default()
        .with_pool("a", a)
        .with_pool("b", b);
    let result = PoolRegistry::from_config_with_provider(&config, &|_ds| {
        Ok(Arc::new(MockDataSource::new()))
    });
    assert!(matches!(result, Err(DbPoolError::ConfigError { .. })));
}

#[tokio::test]
async fn test_registry_from_toml() {
    let text = r#"
        [pools.default.data_source.connection]
        driver = "sqlite"
        path = ":memory:"

        [pools.default.read_pool]
        max_active = 4

        [pools.default.write_pool]
        max_active = 2

        [pools.batch]
        settings_from = "default"
    "#;
    let config = RegistryConfig::from_toml_str(text).unwrap();
    let registry = mock_registry(&config);

    assert!(registry.get_pool("batch").is_ok());
    let entry = &config.pools["default"];
    assert_eq!(entry.resolved_read_settings().max_active, 4);
    // 写池参数叠加在读池之上
    assert_eq!(entry.resolved_write_settings().max_active, 2);
    assert_eq!(
        entry.resolved_write_settings().max_wait_ms,
        entry.resolved_read_settings().max_wait_ms
    );
}

#[tokio::test]
async fn test_shutdown_closes_all_pools() {
    let config = RegistryConfig::default().with_pool(DEFAULT_POOL_NAME, sqlite_entry());
    let registry = mock_registry(&config);
    let pool = registry.get_default_pool().unwrap();

    registry.shutdown().await;
    assert!(registry.aliases().is_empty());

    // 已关闭的池拒绝借出
    let ctx = SessionContext::new();
    let err = pool.borrow_read_connection(&ctx).await.unwrap_err();
    assert!(matches!(err, DbPoolError::PoolClosed { .. }));
}

#[tokio::test]
async fn test_encrypted_datasource_options() {
    let mut ds_config = DataSourceConfig::new(ConnectionConfig::Sqlite {
        path: ":memory:".to_string(),
        create_if_missing: false,
    });
    ds_config.options.insert(
        "api_token".to_string(),
        rat_dbpool::security::encode_option("t0p-s3cret"),
    );
    ds_config.encrypted_options.push("api_token".to_string());
    ds_config
        .options
        .insert("connect_timeout".to_string(), "30".to_string());

    let decoded = ds_config.decoded_options().unwrap();
    assert_eq!(decoded["api_token"], "t0p-s3cret");
    assert_eq!(decoded["connect_timeout"], "30");
}
