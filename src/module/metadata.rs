//! 模块描述定义
//!
//! 定义解析器消费的模块描述数据结构。描述由外部的清单解析器生成，
//! 加载后不可变；清单被编辑时整体替换，从不原地修改。

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::module::version::{Version, VersionRange};

/// 模块来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// 工作区中正在编辑的模块
    Workspace,
    /// 目标平台中安装的外部模块
    #[default]
    External,
}

impl Origin {
    /// 是否来自工作区
    pub fn is_workspace(&self) -> bool {
        matches!(self, Origin::Workspace)
    }
}

/// 依赖可见性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// 仅对依赖方自身可见
    #[default]
    Private,
    /// 对依赖方的使用者同样可见
    Reexport,
}

/// 模块标识：符号名 + 版本
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity {
    /// 符号名
    pub symbolic_name: String,
    /// 版本
    pub version: Version,
}

impl ModuleIdentity {
    /// 创建模块标识
    pub fn new(symbolic_name: impl Into<String>, version: Version) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version,
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.symbolic_name, self.version)
    }
}

/// 导出包声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPackage {
    /// 包名
    pub name: String,

    /// 包版本
    #[serde(default)]
    pub version: Version,

    /// 是否为内部包（对非友元模块不鼓励访问）
    #[serde(default)]
    pub internal: bool,

    /// 友元模块符号名列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<String>,
}

impl ExportPackage {
    /// 创建公开导出
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            internal: false,
            friends: vec![],
        }
    }

    /// 标记为内部包
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// 设置友元模块
    pub fn with_friends<I, S>(mut self, friends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.friends = friends.into_iter().map(Into::into).collect();
        self
    }

    /// 对指定模块而言是否不鼓励访问
    ///
    /// 声明了友元时，只有友元可以正常访问；否则由 `internal` 决定。
    pub fn is_discouraged_for(&self, symbolic_name: &str) -> bool {
        if !self.friends.is_empty() {
            return !self.friends.iter().any(|f| f == symbolic_name);
        }
        self.internal
    }
}

/// 导入包声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPackageRef {
    /// 包名
    pub name: String,

    /// 可接受的版本范围
    #[serde(default)]
    pub version_range: VersionRange,

    /// 是否可选
    #[serde(default)]
    pub optional: bool,
}

impl ImportPackageRef {
    /// 创建必需导入，接受任意版本
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_range: VersionRange::Any,
            optional: false,
        }
    }

    /// 设置版本范围
    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.version_range = range;
        self
    }

    /// 设置为可选导入
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// 模块依赖声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredModuleRef {
    /// 目标模块符号名
    pub symbolic_name: String,

    /// 可接受的版本范围
    #[serde(default)]
    pub version_range: VersionRange,

    /// 可见性
    #[serde(default)]
    pub visibility: Visibility,

    /// 是否可选
    #[serde(default)]
    pub optional: bool,
}

impl RequiredModuleRef {
    /// 创建私有、必需的模块依赖，接受任意版本
    pub fn new(symbolic_name: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version_range: VersionRange::Any,
            visibility: Visibility::Private,
            optional: false,
        }
    }

    /// 设置版本范围
    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.version_range = range;
        self
    }

    /// 设置为再导出
    pub fn reexport(mut self) -> Self {
        self.visibility = Visibility::Reexport;
        self
    }

    /// 设置为可选依赖
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 是否为再导出依赖
    pub fn is_reexported(&self) -> bool {
        self.visibility == Visibility::Reexport
    }
}

/// 次要依赖：只扩展编译期类路径，不参与传递
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecondaryDependencyRef {
    /// 目标模块符号名
    pub symbolic_name: String,
}

impl SecondaryDependencyRef {
    /// 创建次要依赖
    pub fn new(symbolic_name: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
        }
    }
}

/// 依赖边
///
/// 解析器通过对这一种类型做 `match` 区分三种依赖，不使用多态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyEdge<'a> {
    /// 模块依赖
    Require(&'a RequiredModuleRef),
    /// 包导入
    Import(&'a ImportPackageRef),
    /// 次要依赖
    Secondary(&'a SecondaryDependencyRef),
}

impl<'a> DependencyEdge<'a> {
    /// 依赖边引用的名称（模块符号名或包名）
    pub fn target(&self) -> &'a str {
        match *self {
            DependencyEdge::Require(r) => &r.symbolic_name,
            DependencyEdge::Import(i) => &i.name,
            DependencyEdge::Secondary(s) => &s.symbolic_name,
        }
    }
}

impl fmt::Display for DependencyEdge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyEdge::Require(r) => {
                write!(f, "require {} {}", r.symbolic_name, r.version_range)?;
                if r.is_reexported() {
                    write!(f, " (reexport)")?;
                }
                Ok(())
            }
            DependencyEdge::Import(i) => write!(f, "import {} {}", i.name, i.version_range),
            DependencyEdge::Secondary(s) => write!(f, "secondary {}", s.symbolic_name),
        }
    }
}

/// 模块描述
///
/// 对应一个清单的解析结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// 符号名
    pub symbolic_name: String,

    /// 版本
    pub version: Version,

    /// 来源
    #[serde(default)]
    pub origin: Origin,

    /// 二进制位置（未设置时由标识推导）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,

    /// 源码附件位置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<PathBuf>,

    /// 导出包
    #[serde(default)]
    pub exports: Vec<ExportPackage>,

    /// 导入包
    #[serde(default)]
    pub imports: Vec<ImportPackageRef>,

    /// 依赖模块
    #[serde(default)]
    pub requires: Vec<RequiredModuleRef>,

    /// 次要依赖
    #[serde(default)]
    pub secondary_dependencies: Vec<SecondaryDependencyRef>,

    /// 兼容的执行环境
    #[serde(default)]
    pub execution_environments: Vec<String>,

    /// 附加类库
    #[serde(default)]
    pub extra_classpath: Vec<PathBuf>,

    /// 宿主模块；设置时本模块是片段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<RequiredModuleRef>,

    /// 是否为补丁片段，补丁片段排在宿主之前
    #[serde(default)]
    pub patch: bool,

    /// 作为宿主时，片段是否扩展其 API
    #[serde(default)]
    pub extensible_api: bool,
}

impl ModuleDescriptor {
    /// 创建新的外部模块描述
    pub fn new(symbolic_name: impl Into<String>, version: Version) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version,
            origin: Origin::External,
            location: None,
            source_location: None,
            exports: vec![],
            imports: vec![],
            requires: vec![],
            secondary_dependencies: vec![],
            execution_environments: vec![],
            extra_classpath: vec![],
            host: None,
            patch: false,
            extensible_api: false,
        }
    }

    /// 获取模块标识
    pub fn identity(&self) -> ModuleIdentity {
        ModuleIdentity::new(self.symbolic_name.clone(), self.version.clone())
    }

    /// 二进制位置
    ///
    /// 工作区模块默认为 `<name>/bin`，外部模块默认为 `<name>_<version>.jar`。
    pub fn binary_location(&self) -> PathBuf {
        match &self.location {
            Some(location) => location.clone(),
            None if self.origin.is_workspace() => {
                PathBuf::from(&self.symbolic_name).join("bin")
            }
            None => PathBuf::from(format!("{}_{}.jar", self.symbolic_name, self.version)),
        }
    }

    /// 是否导出指定包
    pub fn exports_package(&self, package: &str) -> bool {
        self.exports.iter().any(|e| e.name == package)
    }

    /// 按声明顺序遍历所有依赖边：模块依赖、包导入、次要依赖
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge<'_>> {
        self.requires
            .iter()
            .map(DependencyEdge::Require)
            .chain(self.imports.iter().map(DependencyEdge::Import))
            .chain(
                self.secondary_dependencies
                    .iter()
                    .map(DependencyEdge::Secondary),
            )
    }

    // ==================== 构建方法 ====================

    /// 标记为工作区模块
    pub fn in_workspace(mut self) -> Self {
        self.origin = Origin::Workspace;
        self
    }

    /// 设置二进制位置
    pub fn at_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// 设置源码附件位置
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source_location = Some(source.into());
        self
    }

    /// 添加模块依赖
    pub fn require(mut self, required: RequiredModuleRef) -> Self {
        self.requires.push(required);
        self
    }

    /// 添加包导入
    pub fn import(mut self, import: ImportPackageRef) -> Self {
        self.imports.push(import);
        self
    }

    /// 添加导出包
    pub fn export(mut self, export: ExportPackage) -> Self {
        self.exports.push(export);
        self
    }

    /// 设置为指定宿主的片段
    pub fn fragment_of(mut self, host: RequiredModuleRef) -> Self {
        self.host = Some(host);
        self
    }

    /// 设置为补丁片段
    pub fn patch_fragment(mut self) -> Self {
        self.patch = true;
        self
    }

    /// 允许片段扩展本模块的 API
    pub fn with_extensible_api(mut self) -> Self {
        self.extensible_api = true;
        self
    }

    /// 是否为片段
    pub fn is_fragment(&self) -> bool {
        self.host.is_some()
    }

    /// 是否为给定模块的片段
    pub fn is_fragment_of(&self, host: &ModuleDescriptor) -> bool {
        self.host.as_ref().is_some_and(|h| {
            h.symbolic_name == host.symbolic_name && h.version_range.matches(&host.version)
        })
    }

    /// 添加次要依赖
    pub fn secondary(mut self, symbolic_name: impl Into<String>) -> Self {
        self.secondary_dependencies
            .push(SecondaryDependencyRef::new(symbolic_name));
        self
    }

    /// 声明兼容的执行环境
    pub fn environment(mut self, environment_id: impl Into<String>) -> Self {
        self.execution_environments.push(environment_id.into());
        self
    }

    /// 添加附加类库
    pub fn extra_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_classpath.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let id = ModuleIdentity::new("org.example.core", Version::new(1, 2, 0));
        assert_eq!(id.to_string(), "org.example.core_1.2.0");
    }

    #[test]
    fn test_default_binary_location() {
        let external = ModuleDescriptor::new("a", Version::new(1, 0, 0));
        assert_eq!(external.binary_location(), PathBuf::from("a_1.0.0.jar"));

        let workspace = ModuleDescriptor::new("b", Version::new(1, 0, 0)).in_workspace();
        assert_eq!(workspace.binary_location(), PathBuf::from("b").join("bin"));

        let explicit = ModuleDescriptor::new("c", Version::new(1, 0, 0)).at_location("/opt/c.jar");
        assert_eq!(explicit.binary_location(), PathBuf::from("/opt/c.jar"));
    }

    #[test]
    fn test_edges_in_declaration_order() {
        let desc = ModuleDescriptor::new("root", Version::new(1, 0, 0))
            .secondary("s")
            .import(ImportPackageRef::new("org.example.api"))
            .require(RequiredModuleRef::new("r").reexport());

        let targets: Vec<&str> = desc.edges().map(|e| e.target()).collect();
        assert_eq!(targets, vec!["r", "org.example.api", "s"]);
        assert!(matches!(desc.edges().next(), Some(DependencyEdge::Require(r)) if r.is_reexported()));
    }

    #[test]
    fn test_export_access() {
        let public = ExportPackage::new("p", Version::default());
        assert!(!public.is_discouraged_for("anyone"));

        let internal = ExportPackage::new("p.internal", Version::default()).internal();
        assert!(internal.is_discouraged_for("anyone"));

        let friends = ExportPackage::new("p.friends", Version::default())
            .internal()
            .with_friends(["buddy"]);
        assert!(!friends.is_discouraged_for("buddy"));
        assert!(friends.is_discouraged_for("stranger"));
    }

    #[test]
    fn test_descriptor_yaml_defaults() {
        let yaml = r#"
symbolic_name: org.example.ui
version: "2.1"
requires:
  - symbolic_name: org.example.core
    version_range: "[1.0,2.0)"
    visibility: reexport
imports:
  - name: javax.xml
    optional: true
secondary_dependencies: [org.example.tools]
"#;
        let desc: ModuleDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(desc.version, Version::new(2, 1, 0));
        assert_eq!(desc.origin, Origin::External);
        assert!(desc.requires[0].is_reexported());
        assert!(desc.imports[0].optional);
        assert!(desc.imports[0].version_range.is_any());
        assert_eq!(desc.secondary_dependencies[0].symbolic_name, "org.example.tools");
    }

    #[test]
    fn test_fragment_yaml() {
        let yaml = r#"
symbolic_name: org.example.core.nl
version: "1.0"
host:
  symbolic_name: org.example.core
  version_range: "[1.0,2.0)"
patch: true
"#;
        let fragment: ModuleDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert!(fragment.is_fragment());
        assert!(fragment.patch);

        let host = ModuleDescriptor::new("org.example.core", Version::new(1, 5, 0));
        assert!(fragment.is_fragment_of(&host));
        let newer = ModuleDescriptor::new("org.example.core", Version::new(2, 0, 0));
        assert!(!fragment.is_fragment_of(&newer));
        assert!(!host.extensible_api);
    }
}
