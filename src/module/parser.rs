//! 平台定义解析器
//!
//! 从 YAML 文件加载一组模块描述与执行环境（"平台定义"），供命令行工具和测试使用。
//! 只校验标识符的形状（符号名、包名），不涉及清单语法。
//!
//! ```yaml
//! default_environment: JavaSE-17
//! profiles:
//!   - id: JavaSE-17
//!     system_packages: [javax.xml]
//! workspace:
//!   - symbolic_name: org.example.app
//!     version: "1.0.0"
//!     requires:
//!       - symbolic_name: org.example.core
//! external:
//!   - symbolic_name: org.example.core
//!     version: "1.2.0"
//! ```

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::module::metadata::{ModuleDescriptor, Origin};
use crate::module::profile::{ExecutionEnvironment, ProfileStore};
use crate::module::registry::ModuleRegistry;
use crate::utils::{CoreError, Result};

/// 平台定义
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformDefinition {
    /// 默认执行环境
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,

    /// 执行环境
    #[serde(default)]
    pub profiles: Vec<ExecutionEnvironment>,

    /// 工作区模块
    #[serde(default)]
    pub workspace: Vec<ModuleDescriptor>,

    /// 外部模块
    #[serde(default)]
    pub external: Vec<ModuleDescriptor>,
}

impl PlatformDefinition {
    /// 全部模块描述，工作区在前
    pub fn descriptors(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.workspace.iter().chain(self.external.iter())
    }

    /// 按符号名查找模块，工作区优先，同名时取最高版本
    pub fn find(&self, symbolic_name: &str) -> Option<&ModuleDescriptor> {
        fn best<'l>(list: &'l [ModuleDescriptor], name: &str) -> Option<&'l ModuleDescriptor> {
            list.iter()
                .filter(|d| d.symbolic_name == name)
                .max_by(|a, b| a.version.cmp(&b.version))
        }
        best(&self.workspace, symbolic_name).or_else(|| best(&self.external, symbolic_name))
    }

    /// 构建注册表
    pub fn registry(&self) -> ModuleRegistry {
        ModuleRegistry::from_descriptors(self.descriptors().cloned())
    }

    /// 构建执行环境存储
    pub fn profile_store(&self) -> ProfileStore {
        ProfileStore::new(self.profiles.clone(), self.default_environment.clone())
    }
}

/// 平台定义解析器
#[derive(Debug, Clone, Default)]
pub struct PlatformParser;

impl PlatformParser {
    /// 创建解析器
    pub fn new() -> Self {
        Self
    }

    /// 从文件解析平台定义
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取时返回 IO 错误
    /// - 内容不符合 YAML 格式或版本写法无效时返回 YAML 错误
    /// - 标识符校验失败时返回 `InvalidMetadata` 错误
    pub async fn parse_file(path: &Path) -> Result<PlatformDefinition> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_string(&content)
    }

    /// 从字符串解析平台定义
    pub fn parse_string(content: &str) -> Result<PlatformDefinition> {
        let mut platform: PlatformDefinition = serde_yaml::from_str(content)?;

        for desc in &mut platform.workspace {
            desc.origin = Origin::Workspace;
        }
        for desc in &mut platform.external {
            desc.origin = Origin::External;
        }

        Self::validate(&platform)?;
        tracing::debug!(
            workspace = platform.workspace.len(),
            external = platform.external.len(),
            profiles = platform.profiles.len(),
            "平台定义已解析"
        );
        Ok(platform)
    }

    /// 校验平台定义
    ///
    /// 收集所有问题后一次性返回。
    pub fn validate(platform: &PlatformDefinition) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        for desc in platform.descriptors() {
            Self::validate_descriptor(desc, &mut errors);
        }

        for profile in &platform.profiles {
            if profile.id.trim().is_empty() {
                errors.push("执行环境标识不能为空".to_string());
            }
            for package in &profile.system_packages {
                if !is_valid_package_name(package) {
                    errors.push(format!(
                        "执行环境 '{}' 的系统包 '{}' 格式无效",
                        profile.id, package
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidMetadata(errors.join("; ")))
        }
    }

    fn validate_descriptor(desc: &ModuleDescriptor, errors: &mut Vec<String>) {
        if !is_valid_symbolic_name(&desc.symbolic_name) {
            errors.push(format!("模块符号名 '{}' 格式无效", desc.symbolic_name));
        }

        let owner = desc.identity();
        for (index, required) in desc.requires.iter().enumerate() {
            if !is_valid_symbolic_name(&required.symbolic_name) {
                errors.push(format!(
                    "模块 '{}' 的第 {} 个依赖 '{}' 格式无效",
                    owner,
                    index + 1,
                    required.symbolic_name
                ));
            }
        }
        if let Some(host) = &desc.host {
            if !is_valid_symbolic_name(&host.symbolic_name) {
                errors.push(format!("模块 '{}' 的宿主 '{}' 格式无效", owner, host.symbolic_name));
            }
        }
        for secondary in &desc.secondary_dependencies {
            if !is_valid_symbolic_name(&secondary.symbolic_name) {
                errors.push(format!(
                    "模块 '{}' 的次要依赖 '{}' 格式无效",
                    owner, secondary.symbolic_name
                ));
            }
        }
        for import in &desc.imports {
            if !is_valid_package_name(&import.name) {
                errors.push(format!("模块 '{}' 导入的包 '{}' 格式无效", owner, import.name));
            }
        }
        for export in &desc.exports {
            if !is_valid_package_name(&export.name) {
                errors.push(format!("模块 '{}' 导出的包 '{}' 格式无效", owner, export.name));
            }
        }
    }
}

/// 符号名：以点分隔的标识符段，段内允许字母、数字、`_` 和 `-`
pub fn is_valid_symbolic_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+)*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// 包名：以点分隔的 Java 标识符
pub fn is_valid_package_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}
