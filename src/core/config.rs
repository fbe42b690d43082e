//! 解析器配置
//!
//! 定义后台调度、日志与执行环境的配置结构和加载逻辑。
//! 配置文件支持 YAML 和 JSON（按扩展名区分），缺省字段取默认值。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::module::profile::ExecutionEnvironment;
use crate::utils::{CoreError, Result};

/// 调度器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 非立即请求的防抖时间（毫秒）
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// 单个批次内并行解析的模块数
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// 类路径缓存容量
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// 待重算队列上限
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_queue_size() -> usize {
    10000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            worker_count: default_worker_count(),
            cache_capacity: default_cache_capacity(),
            queue_size: default_queue_size(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 保留日志文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            max_files: default_max_files(),
        }
    }
}

/// 执行环境配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// 默认执行环境，未设置时取标识最大的环境
    #[serde(default)]
    pub default_environment: Option<String>,

    /// 执行环境列表
    #[serde(default)]
    pub environments: Vec<ExecutionEnvironment>,
}

/// 解析器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 调度器配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 执行环境配置
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl ResolverConfig {
    /// 创建配置构建器
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// `.json` 扩展名按 JSON 解析，其余按 YAML 解析。加载后会做一次校验。
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取配置文件 '{}': {}", path.display(), e))
        })?;

        let mut config: ResolverConfig = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.validate()?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.worker_count == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "scheduler.worker_count".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.scheduler.queue_size == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "scheduler.queue_size".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if let Some(default) = &self.profiles.default_environment {
            if !self.profiles.environments.iter().any(|env| &env.id == default) {
                return Err(CoreError::UnknownEnvironment(default.clone()));
            }
        }
        Ok(())
    }

    /// 合并另一个配置（用于覆盖）
    ///
    /// 只覆盖与默认值不同的字段；执行环境按标识合并，同名时后者覆盖前者。
    pub fn merge(&mut self, other: ResolverConfig) {
        if other.scheduler.debounce_ms != default_debounce_ms() {
            self.scheduler.debounce_ms = other.scheduler.debounce_ms;
        }
        if other.scheduler.worker_count != default_worker_count() {
            self.scheduler.worker_count = other.scheduler.worker_count;
        }
        if other.scheduler.cache_capacity != default_cache_capacity() {
            self.scheduler.cache_capacity = other.scheduler.cache_capacity;
        }
        if other.scheduler.queue_size != default_queue_size() {
            self.scheduler.queue_size = other.scheduler.queue_size;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.profiles.default_environment.is_some() {
            self.profiles.default_environment = other.profiles.default_environment;
        }
        for env in other.profiles.environments {
            self.profiles.environments.retain(|existing| existing.id != env.id);
            self.profiles.environments.push(env);
        }
        if other.config_path.is_some() {
            self.config_path = other.config_path;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    /// 创建构建器，初始值为默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置防抖时间（毫秒）
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.debounce_ms = ms;
        self
    }

    /// 设置并行解析数
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.scheduler.worker_count = count;
        self
    }

    /// 设置缓存容量
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.scheduler.cache_capacity = capacity;
        self
    }

    /// 设置队列上限
    pub fn queue_size(mut self, size: usize) -> Self {
        self.config.scheduler.queue_size = size;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 添加执行环境
    pub fn environment(mut self, environment: ExecutionEnvironment) -> Self {
        self.config.profiles.environments.push(environment);
        self
    }

    /// 设置默认执行环境
    pub fn default_environment(mut self, id: impl Into<String>) -> Self {
        self.config.profiles.default_environment = Some(id.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> ResolverConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.scheduler.debounce_ms, 200);
        assert_eq!(config.scheduler.cache_capacity, 1024);
        assert!(config.scheduler.worker_count > 0);
        assert_eq!(config.logging.level, "info");
        assert!(config.profiles.environments.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ResolverConfig::builder()
            .debounce_ms(0)
            .worker_count(2)
            .log_level("debug")
            .environment(ExecutionEnvironment::new("JavaSE-17", ["javax.xml"]))
            .default_environment("JavaSE-17")
            .build();

        assert_eq!(config.scheduler.debounce_ms, 0);
        assert_eq!(config.scheduler.worker_count, 2);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ResolverConfig::builder().worker_count(0).build();
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfigValue { ref key, .. }) if key == "scheduler.worker_count"
        ));

        let config = ResolverConfig::builder().default_environment("JavaSE-99").build();
        assert!(matches!(config.validate(), Err(CoreError::UnknownEnvironment(_))));
    }

    #[test]
    fn test_merge_overrides_non_defaults() {
        let mut base = ResolverConfig::builder()
            .environment(ExecutionEnvironment::new("JavaSE-11", ["a"]))
            .environment(ExecutionEnvironment::new("JavaSE-17", ["b"]))
            .build();
        let overlay = ResolverConfig::builder()
            .debounce_ms(50)
            .log_level("trace")
            .environment(ExecutionEnvironment::new("JavaSE-17", ["c"]))
            .build();

        base.merge(overlay);

        assert_eq!(base.scheduler.debounce_ms, 50);
        assert_eq!(base.scheduler.cache_capacity, 1024);
        assert_eq!(base.logging.level, "trace");
        assert_eq!(base.profiles.environments.len(), 2);
        let java17 = base
            .profiles
            .environments
            .iter()
            .find(|env| env.id == "JavaSE-17")
            .unwrap();
        assert!(java17.system_packages.contains("c"));
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
scheduler:
  debounce_ms: 10
profiles:
  environments:
    - id: JavaSE-17
      system_packages: [javax.xml]
"#;
        let config: ResolverConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scheduler.debounce_ms, 10);
        assert_eq!(config.scheduler.queue_size, 10000);
        assert_eq!(config.profiles.environments[0].id, "JavaSE-17");
    }
}
