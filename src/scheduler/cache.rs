//! 类路径缓存
//!
//! 每个模块保留最近一次解析结果。后台任务写入，任意调用方读取。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::classpath::Resolution;
use crate::module::metadata::ModuleIdentity;

/// 默认缓存容量
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 当前条目数
    pub len: usize,
    /// 容量上限
    pub capacity: usize,
}

/// 批量写入的结果
#[derive(Debug, Default)]
pub struct CacheUpdate {
    /// 输出发生变化的模块
    pub changed: Vec<(ModuleIdentity, Arc<Resolution>)>,
    /// 被移除且此前有缓存的模块
    pub removed: Vec<ModuleIdentity>,
}

/// 类路径缓存
#[derive(Debug)]
pub struct ClasspathCache {
    cache: Mutex<LruCache<ModuleIdentity, Arc<Resolution>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    capacity: usize,
}

impl Default for ClasspathCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ClasspathCache {
    /// 创建缓存，容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            capacity: capacity.get(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<ModuleIdentity, Arc<Resolution>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 读取缓存的解析结果
    pub fn get(&self, identity: &ModuleIdentity) -> Option<Arc<Resolution>> {
        let cached = self.lock().get(identity).cloned();
        let counter = if cached.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        cached
    }

    /// 是否有缓存（不影响淘汰顺序和统计）
    pub fn contains(&self, identity: &ModuleIdentity) -> bool {
        self.lock().contains(identity)
    }

    /// 所有已缓存的模块
    pub fn identities(&self) -> Vec<ModuleIdentity> {
        self.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    /// 一次性写入一批结果并移除一批模块
    ///
    /// 整批在同一把锁内完成，读取方不会看到只写了一半的批次。
    /// 返回输出实际发生变化的模块。
    pub fn apply(
        &self,
        updates: Vec<(ModuleIdentity, Arc<Resolution>)>,
        removals: Vec<ModuleIdentity>,
    ) -> CacheUpdate {
        let mut cache = self.lock();
        let mut result = CacheUpdate::default();

        for (identity, resolution) in updates {
            let unchanged = cache
                .peek(&identity)
                .is_some_and(|previous| previous.same_output(&resolution));
            cache.put(identity.clone(), Arc::clone(&resolution));
            if !unchanged {
                result.changed.push((identity, resolution));
            }
        }

        for identity in removals {
            if cache.pop(&identity).is_some() {
                result.removed.push(identity);
            }
        }

        result
    }

    /// 移除单个模块的缓存
    pub fn invalidate(&self, identity: &ModuleIdentity) -> bool {
        self.lock().pop(identity).is_some()
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 缓存条目数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::ResolvedClasspath;
    use crate::module::version::Version;
    use chrono::Utc;

    fn id(name: &str) -> ModuleIdentity {
        ModuleIdentity::new(name, Version::new(1, 0, 0))
    }

    fn resolution(name: &str, generation: u64) -> Arc<Resolution> {
        Arc::new(Resolution {
            root: id(name),
            classpath: ResolvedClasspath::new(),
            diagnostics: vec![],
            generation,
            profile: None,
            computed_at: Utc::now(),
        })
    }

    #[test]
    fn test_apply_reports_only_changes() {
        let cache = ClasspathCache::new(8);

        let update = cache.apply(vec![(id("a"), resolution("a", 1))], vec![]);
        assert_eq!(update.changed.len(), 1);

        // 只有代数不同，输出相同
        let update = cache.apply(vec![(id("a"), resolution("a", 2))], vec![]);
        assert!(update.changed.is_empty());
        assert_eq!(cache.get(&id("a")).unwrap().generation, 2);
    }

    #[test]
    fn test_apply_removals() {
        let cache = ClasspathCache::new(8);
        cache.apply(vec![(id("a"), resolution("a", 1))], vec![]);

        let update = cache.apply(vec![], vec![id("a"), id("never-cached")]);
        assert_eq!(update.removed, vec![id("a")]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_and_stats() {
        let cache = ClasspathCache::new(2);
        cache.apply(
            vec![
                (id("a"), resolution("a", 1)),
                (id("b"), resolution("b", 1)),
                (id("c"), resolution("c", 1)),
            ],
            vec![],
        );

        assert!(cache.get(&id("a")).is_none());
        assert!(cache.get(&id("c")).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ClasspathCache::new(0);
        assert_eq!(cache.stats().capacity, 1);
    }
}
