//! 类路径模块
//!
//! 解析器输出的数据结构：
//! - 类路径条目与访问规则
//! - 诊断信息
//! - 一次解析的完整结果

pub mod diagnostic;
pub mod entry;
pub mod resolution;

pub use diagnostic::{Diagnostic, Severity};
pub use entry::{AccessKind, AccessRule, ClasspathEntry, EntryKind, ResolvedClasspath};
pub use resolution::Resolution;
