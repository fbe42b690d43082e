//! 核心模块
//!
//! 包含解析器配置。

pub mod config;

pub use config::{
    LogConfig, ProfilesConfig, ResolverConfig, ResolverConfigBuilder, SchedulerConfig,
};
