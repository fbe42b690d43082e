//! 待重算队列
//!
//! 按模块合并尚未开始的重算请求。每个模块最多一个排队条目：
//! 新请求与已有条目合并，共享同一个完成信号。已开始执行的模块再次被请求时
//! 会新建条目，在当前执行结束后再次重算。执行中的模块保留一个完成信号接收端，
//! 供只需等待当前结果的查询使用。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::classpath::Resolution;
use crate::module::metadata::ModuleIdentity;
use crate::utils::{CoreError, Result};

/// 默认队列上限
pub const DEFAULT_QUEUE_SIZE: usize = 10000;

/// 单个模块一次重算的结果
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// 已重算
    Updated(Arc<Resolution>),
    /// 模块已不在注册表中
    Removed,
    /// 重算失败（解析过程 panic）
    Failed(String),
}

/// 完成信号：`None` 表示尚未完成
pub type CompletionSender = watch::Sender<Option<JobOutcome>>;
/// 完成信号的接收端
pub type CompletionReceiver = watch::Receiver<Option<JobOutcome>>;

/// 排队条目
#[derive(Debug)]
struct PendingEntry {
    ready_at: Instant,
    immediate: bool,
    done: CompletionSender,
}

/// 一次请求的入队结果
#[derive(Debug)]
pub struct Enqueued {
    /// 完成信号
    pub receiver: CompletionReceiver,
    /// 是否与已有条目合并
    pub coalesced: bool,
}

/// 待重算队列
#[derive(Debug)]
pub struct PendingQueue {
    pending: HashMap<ModuleIdentity, PendingEntry>,
    running: HashMap<ModuleIdentity, CompletionReceiver>,
    max_size: usize,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

impl PendingQueue {
    /// 创建队列，`max_size` 为排队模块数上限
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: HashMap::new(),
            running: HashMap::new(),
            max_size,
        }
    }

    /// 请求重算一个模块
    ///
    /// - `immediate` 请求立即就绪；
    /// - 非立即请求在 `now + debounce` 就绪，再次请求会顺延，已是立即的条目不受影响。
    ///
    /// # Errors
    ///
    /// 需要新建条目而队列已满时返回 `CoreError::QueueFull`
    pub fn request(
        &mut self,
        identity: ModuleIdentity,
        immediate: bool,
        debounce: Duration,
        now: Instant,
    ) -> Result<Enqueued> {
        if let Some(entry) = self.pending.get_mut(&identity) {
            if immediate {
                entry.immediate = true;
                entry.ready_at = now;
            } else if !entry.immediate {
                entry.ready_at = now + debounce;
            }
            return Ok(Enqueued {
                receiver: entry.done.subscribe(),
                coalesced: true,
            });
        }

        if self.pending.len() >= self.max_size {
            return Err(CoreError::QueueFull {
                max_size: self.max_size,
                message: format!("无法为模块 '{}' 排队", identity),
            });
        }

        let (done, receiver) = watch::channel(None);
        let ready_at = if immediate { now } else { now + debounce };
        self.pending.insert(
            identity,
            PendingEntry {
                ready_at,
                immediate,
                done,
            },
        );
        Ok(Enqueued {
            receiver,
            coalesced: false,
        })
    }

    /// 检查一组模块能否全部入队
    ///
    /// 只有尚未排队的模块需要新条目；同一模块重复出现只计一次。
    ///
    /// # Errors
    ///
    /// 新条目数超出剩余容量时返回 `CoreError::QueueFull`
    pub fn ensure_capacity<'a, I>(&self, identities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ModuleIdentity>,
    {
        let fresh: HashSet<&ModuleIdentity> = identities
            .into_iter()
            .filter(|id| !self.pending.contains_key(*id))
            .collect();
        if self.pending.len() + fresh.len() > self.max_size {
            return Err(CoreError::QueueFull {
                max_size: self.max_size,
                message: format!(
                    "需要新增 {} 个条目，已排队 {} 个",
                    fresh.len(),
                    self.pending.len()
                ),
            });
        }
        Ok(())
    }

    /// 加入模块当前的重算，不新建条目
    ///
    /// - 已排队：提升为立即执行，返回该条目的完成信号；
    /// - 仅在执行中：返回执行中的完成信号；
    /// - 都不是：返回 `None`。
    pub fn join_in_flight(&mut self, identity: &ModuleIdentity, now: Instant) -> Option<Enqueued> {
        if let Some(entry) = self.pending.get_mut(identity) {
            entry.immediate = true;
            entry.ready_at = now;
            return Some(Enqueued {
                receiver: entry.done.subscribe(),
                coalesced: true,
            });
        }
        self.running.get(identity).map(|receiver| Enqueued {
            receiver: receiver.clone(),
            coalesced: true,
        })
    }

    /// 取出所有已就绪且未在执行的条目，并标记为执行中
    pub fn take_due(&mut self, now: Instant) -> Vec<(ModuleIdentity, CompletionSender)> {
        let due: Vec<ModuleIdentity> = self
            .pending
            .iter()
            .filter(|(id, entry)| entry.ready_at <= now && !self.running.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect();

        let mut batch = Vec::with_capacity(due.len());
        for identity in due {
            if let Some(entry) = self.pending.remove(&identity) {
                self.running.insert(identity.clone(), entry.done.subscribe());
                batch.push((identity, entry.done));
            }
        }
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        batch
    }

    /// 标记模块执行结束
    pub fn finish(&mut self, identity: &ModuleIdentity) {
        self.running.remove(identity);
    }

    /// 最早的就绪时间（忽略执行中的模块）
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .filter(|(id, _)| !self.running.contains_key(*id))
            .map(|(_, entry)| entry.ready_at)
            .min()
    }

    /// 模块是否已排队
    pub fn is_pending(&self, identity: &ModuleIdentity) -> bool {
        self.pending.contains_key(identity)
    }

    /// 模块是否正在执行
    pub fn is_running(&self, identity: &ModuleIdentity) -> bool {
        self.running.contains_key(identity)
    }

    /// 丢弃所有排队条目
    ///
    /// 完成信号随之释放，等待方收到取消。
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// 排队中的模块数
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 执行中的模块数
    pub fn running_len(&self) -> usize {
        self.running.len()
    }
}
