//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 定义分层缓存的配置结构，支持 YAML 与 TOML 两种格式。
//! 时间段使用带单位的字符串（如 `"100ms"`、`"30s"`、`"5m"`）。

use ahash::AHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::PromotionMode;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS, DEFAULT_CIRCUIT_BREAKER_FAILURE_THRESHOLD,
    DEFAULT_CIRCUIT_BREAKER_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MEMORY_CAPACITY,
};
use crate::error::CacheError;
use crate::retry::RetryConfig;

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub version: String,
    #[serde(default)]
    pub manager: ManagerConfig,
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub circuit_breaker: BreakerSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            manager: ManagerConfig::default(),
            layers: Vec::new(),
            circuit_breaker: BreakerSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl CacheConfig {
    /// 从YAML文本解析并校验
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CacheError> {
        let config: CacheConfig = serde_yaml::from_str(yaml)?;
        config.validate().map_err(CacheError::Config)?;
        Ok(config)
    }

    /// 从TOML文本解析并校验
    pub fn from_toml_str(toml: &str) -> Result<Self, CacheError> {
        let config: CacheConfig = toml::from_str(toml)?;
        config.validate().map_err(CacheError::Config)?;
        Ok(config)
    }

    /// 从文件加载，按扩展名选择格式（`.toml` 为TOML，其余按YAML处理）
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CacheError::Config(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), String> {
        if self.version.is_empty() {
            return Err("版本号不能为空".to_string());
        }

        if self.layers.is_empty() {
            return Err("至少需要一个缓存层".to_string());
        }

        let mut names = HashSet::new();
        for (index, layer) in self.layers.iter().enumerate() {
            if !names.insert(layer.name.as_str()) {
                return Err(format!("缓存层名称重复: {}", layer.name));
            }
            layer
                .validate()
                .map_err(|e| format!("缓存层[{}]校验失败: {}", index, e))?;
        }

        self.manager.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;

        Ok(())
    }
}

/// 管理器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManagerConfig {
    #[serde(default)]
    pub promotion_mode: PromotionMode,
    /// 默认TTL（写入未指定TTL时使用）
    #[serde(default)]
    pub default_ttl: Option<String>,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ttl) = &self.default_ttl {
            parse_duration(ttl).map_err(|e| format!("default_ttl: {}", e))?;
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Result<Option<Duration>, CacheError> {
        self.default_ttl
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(CacheError::Config)
    }
}

/// 缓存层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerConfig {
    pub name: String,
    /// 优先级，越大越先查询
    pub priority: i32,
    pub backend: BackendConfig,
    /// 是否用熔断器与重试包装该层
    #[serde(default)]
    pub resilient: bool,
}

impl LayerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("缓存层名称不能为空".to_string());
        }
        self.backend.validate()
    }
}

/// 存储后端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// 进程内LRU存储
    Memory {
        #[serde(default = "default_memory_capacity")]
        capacity: usize,
        #[serde(default)]
        default_ttl: Option<String>,
    },
    /// 文件存储
    File { dir: PathBuf },
    /// Redis存储（需要 `redis` 特性）
    Redis {
        url: String,
        #[serde(default)]
        db: i64,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        key_prefix: Option<String>,
    },
}

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            BackendConfig::Memory {
                capacity,
                default_ttl,
            } => {
                if *capacity == 0 {
                    return Err("内存存储容量必须大于0".to_string());
                }
                if let Some(ttl) = default_ttl {
                    parse_duration(ttl).map_err(|e| format!("default_ttl: {}", e))?;
                }
            }
            BackendConfig::File { dir } => {
                if dir.as_os_str().is_empty() {
                    return Err("文件存储目录不能为空".to_string());
                }
            }
            BackendConfig::Redis { url, .. } => {
                if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                    return Err(format!("无效的Redis URL: {}", url));
                }
            }
        }
        Ok(())
    }

    /// 后端类型名称
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Memory { .. } => "memory",
            BackendConfig::File { .. } => "file",
            BackendConfig::Redis { .. } => "redis",
        }
    }
}

/// 熔断器配置（配置文件形式）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerSettings {
    pub failure_threshold: u64,
    pub timeout: String,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            timeout: format!("{}s", DEFAULT_CIRCUIT_BREAKER_TIMEOUT_SECS),
        }
    }
}

impl BreakerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("熔断失败阈值必须大于0".to_string());
        }
        parse_duration(&self.timeout).map_err(|e| format!("熔断超时: {}", e))?;
        Ok(())
    }

    pub fn to_config(&self) -> Result<CircuitBreakerConfig, CacheError> {
        let timeout = parse_duration(&self.timeout).map_err(CacheError::Config)?;
        Ok(CircuitBreakerConfig::new(self.failure_threshold, timeout))
    }
}

/// 重试配置（配置文件形式）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: String,
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    #[serde(default)]
    pub max_delay: Option<String>,
}

fn default_jitter() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: format!("{}ms", DEFAULT_BASE_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
            max_delay: None,
        }
    }
}

impl RetrySettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "退避倍数必须不小于1.0: {}",
                self.backoff_multiplier
            ));
        }
        parse_duration(&self.base_delay).map_err(|e| format!("base_delay: {}", e))?;
        if let Some(max_delay) = &self.max_delay {
            parse_duration(max_delay).map_err(|e| format!("max_delay: {}", e))?;
        }
        Ok(())
    }

    pub fn to_config(&self) -> Result<RetryConfig, CacheError> {
        let base_delay = parse_duration(&self.base_delay).map_err(CacheError::Config)?;
        let mut config = RetryConfig::new(self.max_retries, base_delay, self.backoff_multiplier)
            .jitter(self.jitter);
        if let Some(max_delay) = &self.max_delay {
            config = config.max_delay(parse_duration(max_delay).map_err(CacheError::Config)?);
        }
        Ok(config)
    }
}

/// 解析时间段字符串
///
/// # 支持的格式
///
/// - `250ms` - 250毫秒
/// - `10s` - 10秒
/// - `5m` - 5分钟
/// - `2h` - 2小时
/// - `1d` - 1天
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("时间段不能为空".to_string());
    }

    let (num_part, unit_part) =
        input.split_at(input.find(|c: char| c.is_alphabetic()).unwrap_or(input.len()));

    let num_str = num_part.trim();
    let unit = unit_part.trim().to_lowercase();

    if num_str.is_empty() {
        return Err("时间段格式错误：缺少数字部分".to_string());
    }

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("无效的数字格式: {}", num_str))?;

    if num == 0 {
        return Err("时间段必须大于0".to_string());
    }

    let secs = |factor: u64| {
        num.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("时间段溢出: {}", input))
    };

    match unit.as_str() {
        "ms" | "msec" | "millis" | "milliseconds" => Ok(Duration::from_millis(num)),
        "" | "s" | "sec" | "second" | "seconds" => secs(1),
        "m" | "min" | "minute" | "minutes" => secs(60),
        "h" | "hr" | "hour" | "hours" => secs(3600),
        "d" | "day" | "days" => secs(86400),
        _ => Err(format!(
            "不支持的单位: {}。支持的单位: ms, s, m, h, d",
            unit
        )),
    }
}
