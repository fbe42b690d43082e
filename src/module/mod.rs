//! 模块管理模块
//!
//! 包含类路径解析的核心组件：
//! - 版本与版本范围
//! - 模块描述定义
//! - 模块注册表
//! - 执行环境配置存储
//! - 依赖图与类路径解析器
//! - 平台定义解析器

pub mod dependency;
pub mod metadata;
pub mod parser;
pub mod profile;
pub mod registry;
pub mod version;

// 重导出常用类型
pub use dependency::{resolve_classpath, DependencyGraph, DependencyResolver};
pub use metadata::{
    DependencyEdge, ExportPackage, ImportPackageRef, ModuleDescriptor, ModuleIdentity, Origin,
    RequiredModuleRef, SecondaryDependencyRef, Visibility,
};
pub use parser::{PlatformDefinition, PlatformParser};
pub use profile::{
    ExecutionEnvironment, FileProfileSource, ProfileSnapshot, ProfileSource, ProfileStore,
    StaticProfileSource,
};
pub use registry::{Lookup, ModuleRegistry, RegistrySnapshot, Unresolved};
pub use version::{Version, VersionRange};
