//! # Bundle Classpath - 模块类路径解析
//!
//! 为工作区中的每个模块计算编译类路径，并在输入变化时于后台增量更新：
//!
//! - **模块注册表**: 工作区模块与目标平台模块的不可变快照，工作区优先
//! - **执行环境存储**: 各执行环境由系统提供的包
//! - **依赖解析器**: 由必需模块、导入包和次要依赖计算有序类路径及诊断
//! - **更新调度器**: 按模块合并、防抖的后台重算
//! - **类路径服务**: 拉取查询与变更通知
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use bundle_classpath::{ClasspathService, PlatformParser, ResolverConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let platform = PlatformParser::parse_file(Path::new("platform.yaml")).await?;
//!     let service = ClasspathService::with_profiles(
//!         ResolverConfig::default(),
//!         platform.registry(),
//!         platform.profile_store(),
//!     );
//!
//!     let mut changes = service.subscribe();
//!     if let Some(app) = platform.find("org.example.app") {
//!         let resolution = service.get_classpath(&app.identity()).await?;
//!         for entry in &resolution.classpath {
//!             println!("{}", entry.location.display());
//!         }
//!     }
//!
//!     while let Ok(event) = changes.recv().await {
//!         println!("类路径已变更: {}", event.module());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 版本、模块描述、注册表、执行环境与解析器
//! - `classpath` - 解析结果类型
//! - `scheduler` - 后台更新调度
//! - `api` - 类路径服务
//! - `core` - 配置
//! - `utils` - 错误类型、ID 与日志

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod classpath;
pub mod core;
pub mod module;
pub mod scheduler;
pub mod utils;

// 重导出常用类型，方便使用
pub use api::ClasspathService;

pub use classpath::{
    AccessKind, AccessRule, ClasspathEntry, Diagnostic, EntryKind, ResolvedClasspath,
    Resolution, Severity,
};

pub use module::{
    resolve_classpath, ExecutionEnvironment, ExportPackage, ImportPackageRef, ModuleDescriptor,
    ModuleIdentity, ModuleRegistry, Origin, PlatformDefinition, PlatformParser, ProfileStore,
    RequiredModuleRef, SecondaryDependencyRef, Version, VersionRange, Visibility,
};

pub use scheduler::{ClasspathEvent, ClasspathSubscription, JobHandle, JobOutcome, UpdateScheduler};

pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
pub use utils::{generate_id, CoreError, Result};

pub use core::config::{LogConfig, ResolverConfig, ResolverConfigBuilder, SchedulerConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
