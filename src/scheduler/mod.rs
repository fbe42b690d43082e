//! 更新调度模块
//!
//! 包含后台重算的各个组件：
//! - 待重算队列（按模块合并、防抖）
//! - 后台调度器与任务句柄
//! - 类路径缓存
//! - 类路径变更通知

pub mod cache;
pub mod notifier;
pub mod queue;
pub mod worker;

// 重导出常用类型
pub use cache::{CacheStats, ClasspathCache};
pub use notifier::{ClasspathEvent, ClasspathNotifier, ClasspathSubscription};
pub use queue::{JobOutcome, PendingQueue};
pub use worker::{JobHandle, SchedulerStats, UpdateScheduler};
