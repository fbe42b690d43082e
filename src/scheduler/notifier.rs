//! 类路径变更通知
//!
//! 使用一个类型化的广播通道代替监听器链：每次批量重算后，
//! 对输出发生变化的模块发布 `Changed`，对已从注册表移除的模块发布 `Removed`。

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::classpath::Resolution;
use crate::module::metadata::ModuleIdentity;
use crate::utils::{generate_prefixed_id, CoreError, Result};

/// 默认通道容量
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// 类路径事件
#[derive(Debug, Clone)]
pub enum ClasspathEvent {
    /// 类路径已变化
    Changed {
        /// 模块
        module: ModuleIdentity,
        /// 新的解析结果
        resolution: Arc<Resolution>,
    },
    /// 模块已移除
    Removed {
        /// 模块
        module: ModuleIdentity,
    },
}

impl ClasspathEvent {
    /// 事件涉及的模块
    pub fn module(&self) -> &ModuleIdentity {
        match self {
            ClasspathEvent::Changed { module, .. } | ClasspathEvent::Removed { module } => module,
        }
    }
}

/// 通知发布方
#[derive(Debug, Clone)]
pub struct ClasspathNotifier {
    sender: broadcast::Sender<ClasspathEvent>,
}

impl Default for ClasspathNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ClasspathNotifier {
    /// 创建通知器，`capacity` 为每个订阅者可积压的事件数
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> ClasspathSubscription {
        let subscription = ClasspathSubscription {
            id: generate_prefixed_id("sub"),
            receiver: self.sender.subscribe(),
        };
        tracing::debug!(subscription = %subscription.id, "新增类路径订阅");
        subscription
    }

    /// 发布事件
    ///
    /// # 返回
    ///
    /// 收到事件的订阅者数量，没有订阅者时为 0
    pub fn publish(&self, event: ClasspathEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 一个订阅
#[derive(Debug)]
pub struct ClasspathSubscription {
    id: String,
    receiver: broadcast::Receiver<ClasspathEvent>,
}

impl ClasspathSubscription {
    /// 订阅 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 等待下一个事件
    ///
    /// 订阅者处理过慢而丢失的事件只记录警告，继续接收后续事件。
    ///
    /// # Errors
    ///
    /// 发布方全部释放后返回 `CoreError::Cancelled`
    pub async fn recv(&mut self) -> Result<ClasspathEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = %self.id, skipped, "订阅者处理过慢，丢失部分事件");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(CoreError::Cancelled),
            }
        }
    }

    /// 非阻塞地取出一个已到达的事件
    pub fn try_recv(&mut self) -> Option<ClasspathEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = %self.id, skipped, "订阅者处理过慢，丢失部分事件");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::version::Version;

    fn removed(name: &str) -> ClasspathEvent {
        ClasspathEvent::Removed {
            module: ModuleIdentity::new(name, Version::new(1, 0, 0)),
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let notifier = ClasspathNotifier::default();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();
        assert_ne!(first.id(), second.id());
        assert_eq!(notifier.subscriber_count(), 2);

        assert_eq!(notifier.publish(removed("a")), 2);

        assert_eq!(first.recv().await.unwrap().module().symbolic_name, "a");
        assert_eq!(second.recv().await.unwrap().module().symbolic_name, "a");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = ClasspathNotifier::default();
        assert_eq!(notifier.publish(removed("a")), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let notifier = ClasspathNotifier::new(2);
        let mut subscription = notifier.subscribe();
        for name in ["a", "b", "c", "d"] {
            notifier.publish(removed(name));
        }

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.module().symbolic_name, "c");
        assert_eq!(subscription.try_recv().unwrap().module().symbolic_name, "d");
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_is_cancelled() {
        let notifier = ClasspathNotifier::default();
        let mut subscription = notifier.subscribe();
        drop(notifier);

        assert!(matches!(subscription.recv().await, Err(CoreError::Cancelled)));
    }
}
