//! 类路径服务
//!
//! 下游工具（编译器、导航、构建）使用的统一入口：
//!
//! - 拉取：[`ClasspathService::get_classpath`]
//! - 推送：[`ClasspathService::subscribe`] 返回的类路径变更通知
//! - 输入：工作区模块的增删改、目标平台整体替换、执行环境重新加载
//!
//! 所有输入都先替换注册表或执行环境快照，再为受影响的模块排队重算。
//!
//! # 示例
//!
//! ```rust,no_run
//! use bundle_classpath::api::ClasspathService;
//! use bundle_classpath::core::config::ResolverConfig;
//! use bundle_classpath::module::{ModuleDescriptor, ModuleRegistry, RequiredModuleRef, Version};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModuleRegistry::from_descriptors(vec![
//!         ModuleDescriptor::new("org.example.core", Version::new(1, 0, 0)),
//!         ModuleDescriptor::new("org.example.app", Version::new(1, 0, 0))
//!             .in_workspace()
//!             .require(RequiredModuleRef::new("org.example.core")),
//!     ]);
//!     let service = ClasspathService::new(ResolverConfig::default(), registry);
//!
//!     let app = ModuleDescriptor::new("org.example.app", Version::new(1, 0, 0)).identity();
//!     let resolution = service.get_classpath(&app).await?;
//!     println!("{} 个条目", resolution.classpath.len());
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::classpath::Resolution;
use crate::core::config::ResolverConfig;
use crate::module::metadata::{ModuleDescriptor, ModuleIdentity};
use crate::module::profile::{ExecutionEnvironment, ProfileSource, ProfileStore};
use crate::module::registry::ModuleRegistry;
use crate::scheduler::{
    CacheStats, ClasspathCache, ClasspathNotifier, ClasspathSubscription, JobHandle, JobOutcome,
    SchedulerStats, UpdateScheduler,
};
use crate::utils::{CoreError, Result};

/// 类路径服务
pub struct ClasspathService {
    config: ResolverConfig,
    registry: Arc<ModuleRegistry>,
    profiles: Arc<ProfileStore>,
    cache: Arc<ClasspathCache>,
    notifier: ClasspathNotifier,
    scheduler: UpdateScheduler,
}

impl ClasspathService {
    /// 创建服务，执行环境取自配置
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn new(config: ResolverConfig, registry: ModuleRegistry) -> Self {
        let profiles = ProfileStore::new(
            config.profiles.environments.clone(),
            config.profiles.default_environment.clone(),
        );
        Self::with_profiles(config, registry, profiles)
    }

    /// 使用给定的执行环境存储创建服务
    pub fn with_profiles(
        config: ResolverConfig,
        registry: ModuleRegistry,
        profiles: ProfileStore,
    ) -> Self {
        let registry = Arc::new(registry);
        let profiles = Arc::new(profiles);
        let cache = Arc::new(ClasspathCache::new(config.scheduler.cache_capacity));
        let notifier = ClasspathNotifier::default();
        let scheduler = UpdateScheduler::start(
            Arc::clone(&registry),
            Arc::clone(&profiles),
            Arc::clone(&cache),
            notifier.clone(),
            &config.scheduler,
        );

        Self {
            config,
            registry,
            profiles,
            cache,
            notifier,
            scheduler,
        }
    }

    // ==================== 查询 ====================

    /// 获取模块的类路径
    ///
    /// 模块已排队或正在重算时等待这次重算，排队中的条目提升为立即执行；
    /// 否则有缓存时直接返回；都没有时排队立即重算并等待结果。
    /// 所有计算都经过调度器，同一模块不会被并发重算。
    ///
    /// # Errors
    ///
    /// - 注册表中不存在该模块时返回 `CoreError::ModuleNotFound`
    /// - 调度器已关闭时返回 `CoreError::SchedulerShutdown` 或 `CoreError::Cancelled`
    pub async fn get_classpath(&self, identity: &ModuleIdentity) -> Result<Arc<Resolution>> {
        if let Some(handle) = self.scheduler.join_in_flight(identity) {
            return single_outcome(identity, handle.join().await?);
        }
        if let Some(resolution) = self.cache.get(identity) {
            return Ok(resolution);
        }
        if self.registry.get(identity).is_none() {
            return Err(CoreError::ModuleNotFound(identity.to_string()));
        }

        let handle = self.scheduler.schedule_for([identity.clone()], true)?;
        single_outcome(identity, handle.join().await?)
    }

    /// 只读缓存，不触发计算
    pub fn cached_classpath(&self, identity: &ModuleIdentity) -> Option<Arc<Resolution>> {
        self.cache.get(identity)
    }

    /// 订阅类路径变更
    pub fn subscribe(&self) -> ClasspathSubscription {
        self.notifier.subscribe()
    }

    // ==================== 调度 ====================

    /// 请求重算一组模块
    pub fn schedule_for<I>(&self, modules: I, immediate: bool) -> Result<JobHandle>
    where
        I: IntoIterator<Item = ModuleIdentity>,
    {
        self.scheduler.schedule_for(modules, immediate)
    }

    /// 整体替换目标平台中的外部模块
    pub fn replace_external_modules(&self, descriptors: Vec<ModuleDescriptor>) -> Result<JobHandle> {
        let affected = self.registry.replace_external(descriptors);
        self.schedule_affected(affected)
    }

    /// 新增或替换工作区模块（清单被编辑）
    pub fn update_workspace_module(&self, descriptor: ModuleDescriptor) -> Result<JobHandle> {
        let affected = self.registry.upsert_workspace(descriptor);
        self.schedule_affected(affected)
    }

    /// 移除工作区模块
    pub fn remove_workspace_module(&self, identity: &ModuleIdentity) -> Result<JobHandle> {
        let affected = self.registry.remove_workspace(identity)?;
        self.schedule_affected(affected)
    }

    /// 替换执行环境，并重算所有已缓存和工作区模块
    pub fn reload_profiles(&self, environments: Vec<ExecutionEnvironment>) -> Result<JobHandle> {
        self.profiles.reload(environments);
        self.schedule_all()
    }

    /// 从来源重新加载执行环境
    pub async fn reload_profiles_from(&self, source: &dyn ProfileSource) -> Result<JobHandle> {
        self.profiles.reload_from(source).await?;
        self.schedule_all()
    }

    /// 只重算使用方关心的模块：已缓存的，或工作区中的
    fn schedule_affected(&self, affected: Vec<ModuleIdentity>) -> Result<JobHandle> {
        let workspace: BTreeSet<ModuleIdentity> =
            self.registry.snapshot().workspace_identities().into_iter().collect();
        let targets: Vec<ModuleIdentity> = affected
            .into_iter()
            .filter(|id| workspace.contains(id) || self.cache.contains(id))
            .collect();

        tracing::debug!(targets = targets.len(), "注册表已变更，排队重算受影响模块");
        self.scheduler.schedule_for(targets, false)
    }

    fn schedule_all(&self) -> Result<JobHandle> {
        let mut targets: BTreeSet<ModuleIdentity> =
            self.registry.snapshot().workspace_identities().into_iter().collect();
        targets.extend(self.cache.identities());
        self.scheduler.schedule_for(targets, false)
    }

    // ==================== 访问器 ====================

    /// 配置
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 模块注册表
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// 执行环境存储
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// 缓存统计
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 调度器统计
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// 关闭服务
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

/// 取出单模块请求的结果
fn single_outcome(
    identity: &ModuleIdentity,
    outcomes: Vec<(ModuleIdentity, JobOutcome)>,
) -> Result<Arc<Resolution>> {
    match outcomes.into_iter().next().map(|(_, outcome)| outcome) {
        Some(JobOutcome::Updated(resolution)) => Ok(resolution),
        Some(JobOutcome::Removed) | None => Err(CoreError::ModuleNotFound(identity.to_string())),
        Some(JobOutcome::Failed(reason)) => Err(CoreError::Internal(format!(
            "模块 '{}' 的类路径计算失败: {}",
            identity, reason
        ))),
    }
}
