//! 配置模块集成测试
//!
//! 从配置文件构建完整的分层缓存

use cacheron::{
    cache::PromotionMode,
    config::CacheConfig,
    error::CacheError,
    factory::StoreFactory,
};
use std::time::Duration;

fn yaml_config(dir: &std::path::Path) -> String {
    format!(
        r#"
version: "1.0"
manager:
  promotion_mode: inline
  default_ttl: "1h"
layers:
  - name: "l1"
    priority: 100
    backend:
      type: memory
      capacity: 128
  - name: "l2"
    priority: 50
    resilient: true
    backend:
      type: file
      dir: "{}"
circuit_breaker:
  failure_threshold: 2
  timeout: "5s"
retry:
  max_retries: 1
  base_delay: "10ms"
  backoff_multiplier: 2.0
  jitter: false
"#,
        dir.display()
    )
}

/// YAML文件 -> 管理器
#[tokio::test]
async fn test_build_manager_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let path = dir.path().join("cache.yaml");
    tokio::fs::write(&path, yaml_config(&data_dir)).await.unwrap();

    let config = CacheConfig::load(&path).await.unwrap();
    assert_eq!(config.manager.promotion_mode, PromotionMode::Inline);
    assert_eq!(
        config.retry.to_config().unwrap().base_delay,
        Duration::from_millis(10)
    );

    let manager = StoreFactory::new().build_manager(&config).await.unwrap();
    assert_eq!(manager.layer_names(), vec!["l1", "l2"]);
    assert_eq!(manager.default_ttl(), Some(Duration::from_secs(3600)));

    manager.set("k", "v", None, Some(&["l2"])).await;
    assert_eq!(manager.get("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(manager.get_in_layer("k", "l1").await.unwrap(), "v");

    // 文件层被弹性包装
    let stats = manager.stats();
    assert_eq!(stats["l2"]["breaker_state"], "Closed");
    assert!(data_dir.exists());
}

/// TOML文件与YAML等价
#[tokio::test]
async fn test_toml_and_yaml_are_equivalent() {
    let yaml = r#"
version: "1.0"
layers:
  - name: "memory"
    priority: 1
    backend:
      type: memory
      default_ttl: "30s"
"#;
    let toml = r#"
version = "1.0"

[[layers]]
name = "memory"
priority = 1

[layers.backend]
type = "memory"
default_ttl = "30s"
"#;

    let from_yaml = CacheConfig::from_yaml_str(yaml).unwrap();
    let from_toml = CacheConfig::from_toml_str(toml).unwrap();
    assert_eq!(from_yaml, from_toml);
}

/// 无效配置在构建前被拒绝
#[tokio::test]
async fn test_invalid_config_rejected() {
    let yaml = r#"
version: "1.0"
layers:
  - name: "a"
    priority: 1
    backend:
      type: memory
retry:
  max_retries: 3
  base_delay: "100ms"
  backoff_multiplier: 0.5
"#;
    let err = CacheConfig::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, CacheError::Config(msg) if msg.contains("退避倍数")));

    let yaml = r#"
version: "1.0"
layers:
  - name: "a"
    priority: 1
    backend:
      type: tape
"#;
    assert!(matches!(
        CacheConfig::from_yaml_str(yaml),
        Err(CacheError::Config(_))
    ));
}
