//! 后台更新调度器
//!
//! 单个 tokio 后台任务从待重算队列中取出已就绪的模块，按批次重算类路径：
//!
//! 1. 批次开始时取注册表与执行环境的当前快照，整批使用同一对快照；
//! 2. 每个模块的解析在 `spawn_blocking` 中执行，并发数由信号量限制；
//! 3. 单个模块解析 panic 只记录日志，不影响同批其他模块；
//! 4. 整批结果一次性写入缓存，随后发布变更通知并唤醒等待方。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::core::config::SchedulerConfig;
use crate::module::dependency::resolve_classpath;
use crate::module::metadata::ModuleIdentity;
use crate::module::profile::ProfileStore;
use crate::module::registry::ModuleRegistry;
use crate::scheduler::cache::ClasspathCache;
use crate::scheduler::notifier::{ClasspathEvent, ClasspathNotifier};
use crate::scheduler::queue::{CompletionReceiver, CompletionSender, JobOutcome, PendingQueue};
use crate::utils::{generate_prefixed_id, CoreError, Result};

/// 调度器统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// 收到的模块重算请求数
    pub requested: u64,
    /// 与已排队请求合并的次数
    pub coalesced: u64,
    /// 实际执行的模块重算次数
    pub executed: u64,
    /// 执行的批次数
    pub batches: u64,
    /// 解析失败（panic）次数
    pub failures: u64,
    /// 因模块被移除而淘汰的次数
    pub removed: u64,
    /// 当前排队数
    pub pending: usize,
    /// 当前执行中数
    pub running: usize,
}

#[derive(Debug, Default)]
struct Counters {
    requested: AtomicU64,
    coalesced: AtomicU64,
    executed: AtomicU64,
    batches: AtomicU64,
    failures: AtomicU64,
    removed: AtomicU64,
}

/// 一次调度请求的句柄
///
/// `join` 等待请求中的每个模块都完成重算。
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    waiters: Vec<(ModuleIdentity, CompletionReceiver)>,
}

impl JobHandle {
    /// 句柄 ID，用于日志关联
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 请求涉及的模块
    pub fn modules(&self) -> Vec<&ModuleIdentity> {
        self.waiters.iter().map(|(id, _)| id).collect()
    }

    /// 等待所有模块重算完成
    ///
    /// # Errors
    ///
    /// 调度器在模块重算前关闭时返回 `CoreError::Cancelled`
    pub async fn join(self) -> Result<Vec<(ModuleIdentity, JobOutcome)>> {
        let mut outcomes = Vec::with_capacity(self.waiters.len());
        for (identity, mut receiver) in self.waiters {
            let outcome = receiver
                .wait_for(Option::is_some)
                .await
                .map_err(|_| CoreError::Cancelled)?
                .clone();
            if let Some(outcome) = outcome {
                outcomes.push((identity, outcome));
            }
        }
        Ok(outcomes)
    }
}

struct Inner {
    registry: Arc<ModuleRegistry>,
    profiles: Arc<ProfileStore>,
    cache: Arc<ClasspathCache>,
    notifier: ClasspathNotifier,
    queue: Mutex<PendingQueue>,
    wakeup: Notify,
    permits: Arc<Semaphore>,
    debounce: Duration,
    counters: Counters,
    shutdown: AtomicBool,
}

impl Inner {
    fn queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 后台更新调度器
pub struct UpdateScheduler {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    /// 创建调度器并启动后台任务
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn start(
        registry: Arc<ModuleRegistry>,
        profiles: Arc<ProfileStore>,
        cache: Arc<ClasspathCache>,
        notifier: ClasspathNotifier,
        config: &SchedulerConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            registry,
            profiles,
            cache,
            notifier,
            queue: Mutex::new(PendingQueue::new(config.queue_size)),
            wakeup: Notify::new(),
            permits: Arc::new(Semaphore::new(config.worker_count.max(1))),
            debounce: Duration::from_millis(config.debounce_ms),
            counters: Counters::default(),
            shutdown: AtomicBool::new(false),
        });

        let worker = tokio::spawn(run_worker(Arc::clone(&inner)));
        tracing::info!(
            worker_count = config.worker_count,
            debounce_ms = config.debounce_ms,
            "更新调度器已启动"
        );

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// 请求重算一组模块
    ///
    /// # 参数
    ///
    /// * `modules` - 需要重算的模块
    /// * `immediate` - `true` 时立即执行，否则按防抖时间延后
    ///
    /// # Errors
    ///
    /// - 调度器已关闭时返回 `CoreError::SchedulerShutdown`
    /// - 队列已满时返回 `CoreError::QueueFull`
    pub fn schedule_for<I>(&self, modules: I, immediate: bool) -> Result<JobHandle>
    where
        I: IntoIterator<Item = ModuleIdentity>,
    {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(CoreError::SchedulerShutdown);
        }

        let modules: Vec<ModuleIdentity> = modules.into_iter().collect();
        let handle_id = generate_prefixed_id("job");
        let now = Instant::now();
        let mut waiters = Vec::with_capacity(modules.len());
        {
            let mut queue = self.inner.queue();
            // 容量不足时整个请求都不入队
            queue.ensure_capacity(&modules)?;
            for identity in modules {
                let enqueued =
                    queue.request(identity.clone(), immediate, self.inner.debounce, now)?;
                self.inner.counters.requested.fetch_add(1, Ordering::Relaxed);
                if enqueued.coalesced {
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                }
                waiters.push((identity, enqueued.receiver));
            }
        }

        tracing::debug!(job = %handle_id, modules = waiters.len(), immediate, "已排队重算请求");
        self.inner.wakeup.notify_one();
        Ok(JobHandle {
            id: handle_id,
            waiters,
        })
    }

    /// 等待模块当前的重算，不新建请求
    ///
    /// 已排队的条目被提升为立即执行；仅在执行中时等待本次执行的结果。
    /// 模块既未排队也未执行时返回 `None`。
    pub fn join_in_flight(&self, identity: &ModuleIdentity) -> Option<JobHandle> {
        if self.is_shutdown() {
            return None;
        }
        let enqueued = self.inner.queue().join_in_flight(identity, Instant::now())?;
        self.inner.counters.requested.fetch_add(1, Ordering::Relaxed);
        self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
        self.inner.wakeup.notify_one();

        let handle_id = generate_prefixed_id("job");
        tracing::debug!(job = %handle_id, module = %identity, "加入进行中的重算");
        Some(JobHandle {
            id: handle_id,
            waiters: vec![(identity.clone(), enqueued.receiver)],
        })
    }

    /// 模块是否已排队或正在重算
    pub fn is_in_flight(&self, identity: &ModuleIdentity) -> bool {
        let queue = self.inner.queue();
        queue.is_pending(identity) || queue.is_running(identity)
    }

    /// 统计信息
    pub fn stats(&self) -> SchedulerStats {
        let (pending, running) = {
            let queue = self.inner.queue();
            (queue.len(), queue.running_len())
        };
        let counters = &self.inner.counters;
        SchedulerStats {
            requested: counters.requested.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            executed: counters.executed.load(Ordering::Relaxed),
            batches: counters.batches.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            removed: counters.removed.load(Ordering::Relaxed),
            pending,
            running,
        }
    }

    /// 是否已关闭
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// 关闭调度器
    ///
    /// 正在执行的批次会完成；尚未开始的请求被取消，等待方收到 `Cancelled`。
    pub async fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.wakeup.notify_one();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "调度器后台任务异常退出");
            }
        }

        let cancelled = self.inner.queue().cancel_all();
        tracing::info!(cancelled, "更新调度器已关闭");
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.wakeup.notify_one();
    }
}

/// 后台任务主循环
async fn run_worker(inner: Arc<Inner>) {
    loop {
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }

        let (batch, deadline) = {
            let mut queue = inner.queue();
            let batch = queue.take_due(Instant::now());
            (batch, queue.next_deadline())
        };

        if batch.is_empty() {
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = inner.wakeup.notified() => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => inner.wakeup.notified().await,
            }
            continue;
        }

        run_batch(&inner, batch).await;
    }

    tracing::debug!("调度器后台任务退出");
}

/// 重算一个批次
async fn run_batch(inner: &Arc<Inner>, batch: Vec<(ModuleIdentity, CompletionSender)>) {
    let registry = inner.registry.snapshot();
    let profiles = inner.profiles.snapshot();
    let batch_size = batch.len();
    let started = Instant::now();

    let mut running = Vec::with_capacity(batch_size);
    let mut removals = Vec::new();
    for (identity, done) in batch {
        let Some(descriptor) = registry.get(&identity) else {
            removals.push((identity, done));
            continue;
        };

        let permit = match Arc::clone(&inner.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // 信号量只会随调度器一起释放
                inner.queue().finish(&identity);
                continue;
            }
        };
        let registry = Arc::clone(&registry);
        let profiles = Arc::clone(&profiles);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            resolve_classpath(&descriptor, &registry, &profiles)
        });
        running.push((identity, done, task));
    }

    let mut updates = Vec::with_capacity(running.len());
    let mut completions = Vec::with_capacity(batch_size);
    for (identity, done, task) in running {
        match task.await {
            Ok(resolution) => {
                let resolution = Arc::new(resolution);
                updates.push((identity.clone(), Arc::clone(&resolution)));
                completions.push((identity, done, JobOutcome::Updated(resolution)));
            }
            Err(e) => {
                inner.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(module = %identity, error = %e, "类路径解析失败");
                completions.push((identity, done, JobOutcome::Failed(e.to_string())));
            }
        }
    }
    let removed_ids: Vec<ModuleIdentity> = removals.iter().map(|(id, _)| id.clone()).collect();
    for (identity, done) in removals {
        completions.push((identity, done, JobOutcome::Removed));
    }

    let executed = updates.len() as u64;
    let change = inner.cache.apply(updates, removed_ids);

    // 先发布通知再唤醒等待方：`join` 返回时订阅者已能收到本批事件
    let changed = change.changed.len();
    let removed = change.removed.len();
    for (module, resolution) in change.changed {
        inner
            .notifier
            .publish(ClasspathEvent::Changed { module, resolution });
    }
    for module in change.removed {
        inner.notifier.publish(ClasspathEvent::Removed { module });
    }

    {
        let mut queue = inner.queue();
        for (identity, _, _) in &completions {
            queue.finish(identity);
        }
    }
    for (_, done, outcome) in completions {
        // 没有等待方时发送失败，可以忽略
        let _ = done.send(Some(outcome));
    }

    let counters = &inner.counters;
    counters.batches.fetch_add(1, Ordering::Relaxed);
    counters.executed.fetch_add(executed, Ordering::Relaxed);
    counters.removed.fetch_add(removed as u64, Ordering::Relaxed);

    tracing::debug!(
        batch = batch_size,
        changed,
        removed,
        generation = registry.generation(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "批次重算完成"
    );
}
