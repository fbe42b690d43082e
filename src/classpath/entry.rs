//! 类路径条目与访问规则

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::module::metadata::ModuleIdentity;

/// 访问规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// 可访问
    Accessible,
    /// 不鼓励访问（内部包）
    Discouraged,
}

/// 访问规则
///
/// `pattern` 为路径形式的包匹配模式，例如 `org/example/api/*`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRule {
    /// 包匹配模式
    pub pattern: String,
    /// 访问类型
    pub kind: AccessKind,
}

impl AccessRule {
    /// 由包名生成访问规则
    ///
    /// ```rust
    /// use bundle_classpath::classpath::{AccessKind, AccessRule};
    ///
    /// let rule = AccessRule::for_package("org.example.api", AccessKind::Accessible);
    /// assert_eq!(rule.pattern, "org/example/api/*");
    /// ```
    pub fn for_package(package: &str, kind: AccessKind) -> Self {
        Self {
            pattern: format!("{}/*", package.replace('.', "/")),
            kind,
        }
    }
}

/// 条目类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// 模块
    #[default]
    Module,
    /// 附加类库
    Library,
}

/// 类路径条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClasspathEntry {
    /// 二进制位置
    pub location: PathBuf,

    /// 源码附件位置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<PathBuf>,

    /// 贡献该条目的模块
    pub module: ModuleIdentity,

    /// 条目类型
    #[serde(default)]
    pub kind: EntryKind,

    /// 访问规则
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_rules: Vec<AccessRule>,
}

/// 解析得到的有序类路径
///
/// 按发现顺序排列，按二进制位置去重（保留第一次出现的条目）。
/// 交付后不再修改。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedClasspath {
    entries: Vec<ClasspathEntry>,
    #[serde(skip)]
    seen: HashSet<PathBuf>,
}

impl ResolvedClasspath {
    /// 创建空类路径
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加条目，位置重复时忽略
    ///
    /// # 返回
    ///
    /// 条目是否被追加
    pub(crate) fn push(&mut self, entry: ClasspathEntry) -> bool {
        if !self.seen.insert(entry.location.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// 全部条目
    pub fn entries(&self) -> &[ClasspathEntry] {
        &self.entries
    }

    /// 贡献条目的模块符号名，按条目顺序
    pub fn module_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Module)
            .map(|e| e.module.symbolic_name.as_str())
            .collect()
    }

    /// 是否包含指定模块贡献的条目
    pub fn contains_module(&self, symbolic_name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.kind == EntryKind::Module && e.module.symbolic_name == symbolic_name)
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按顺序遍历条目
    pub fn iter(&self) -> impl Iterator<Item = &ClasspathEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedClasspath {
    type Item = &'a ClasspathEntry;
    type IntoIter = std::slice::Iter<'a, ClasspathEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
