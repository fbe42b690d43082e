//! 一次解析的完整结果

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classpath::{Diagnostic, ResolvedClasspath, Severity};
use crate::module::metadata::ModuleIdentity;

/// 解析结果
///
/// 包含有序类路径、诊断信息以及产生该结果的注册表代数和执行环境。
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// 根模块
    pub root: ModuleIdentity,
    /// 类路径
    pub classpath: ResolvedClasspath,
    /// 诊断
    pub diagnostics: Vec<Diagnostic>,
    /// 使用的注册表快照代数
    pub generation: u64,
    /// 用于裁剪系统包的执行环境
    pub profile: Option<String>,
    /// 计算时间
    pub computed_at: DateTime<Utc>,
}

impl Resolution {
    /// 是否存在错误级诊断
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// 指定级别的诊断
    pub fn diagnostics_of(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity == severity)
    }

    /// 两次结果对使用方是否等价
    ///
    /// 只比较类路径、诊断与执行环境，忽略代数和时间戳。
    pub fn same_output(&self, other: &Resolution) -> bool {
        self.root == other.root
            && self.classpath == other.classpath
            && self.diagnostics == other.diagnostics
            && self.profile == other.profile
    }
}
