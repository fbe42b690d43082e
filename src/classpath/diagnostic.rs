//! 解析诊断
//!
//! 未解析的引用、版本不匹配和缺失的导入都不会中断解析，
//! 而是以诊断的形式附加在结果上。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 提示（可选引用未解析）
    Info,
    /// 警告（传递路径上的引用未解析）
    Warning,
    /// 错误（根模块的必需引用未解析）
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// 单条诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 级别
    pub severity: Severity,
    /// 描述
    pub message: String,
    /// 出问题的引用，例如 `require org.example.core [1.0.0,2.0.0)`
    pub reference: String,
}

impl Diagnostic {
    /// 创建诊断
    pub fn new(severity: Severity, message: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            reference: reference.into(),
        }
    }

    /// 是否为错误级
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.message, self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::new(Severity::Error, "模块未找到", "require a *");
        assert_eq!(diag.to_string(), "[error] 模块未找到 (require a *)");
        assert!(diag.is_error());
    }
}
