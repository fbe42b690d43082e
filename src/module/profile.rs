//! 执行环境配置存储
//!
//! 执行环境（例如 `JavaSE-17`）隐式提供一组"系统包"，解析器在计算类路径时
//! 会跳过这些包的导入。存储以不可变快照发布，`reload` 整体替换快照，
//! 正在进行的解析继续使用旧快照。

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

/// 执行环境
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    /// 环境标识
    pub id: String,

    /// 系统包
    #[serde(default)]
    pub system_packages: BTreeSet<String>,
}

impl ExecutionEnvironment {
    /// 创建执行环境
    pub fn new<I, S>(id: impl Into<String>, system_packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            system_packages: system_packages.into_iter().map(Into::into).collect(),
        }
    }
}

/// 执行环境快照
#[derive(Debug, Clone, Default)]
pub struct ProfileSnapshot {
    environments: BTreeMap<String, Arc<ExecutionEnvironment>>,
    default_environment: Option<String>,
}

impl ProfileSnapshot {
    /// 构建快照
    ///
    /// 默认环境取 `preferred`（若已知），否则取按标识降序排列的第一个。
    pub fn new(environments: Vec<ExecutionEnvironment>, preferred: Option<&str>) -> Self {
        let environments: BTreeMap<String, Arc<ExecutionEnvironment>> = environments
            .into_iter()
            .map(|env| (env.id.clone(), Arc::new(env)))
            .collect();

        let default_environment = match preferred {
            Some(id) if environments.contains_key(id) => Some(id.to_string()),
            _ => environments.keys().next_back().cloned(),
        };

        Self {
            environments,
            default_environment,
        }
    }

    /// 获取执行环境
    pub fn get(&self, id: &str) -> Option<&Arc<ExecutionEnvironment>> {
        self.environments.get(id)
    }

    /// 环境提供的系统包，未知环境返回空集
    pub fn system_packages(&self, id: &str) -> BTreeSet<String> {
        self.environments
            .get(id)
            .map(|env| env.system_packages.clone())
            .unwrap_or_default()
    }

    /// 默认环境
    pub fn default_environment(&self) -> Option<&Arc<ExecutionEnvironment>> {
        self.default_environment
            .as_deref()
            .and_then(|id| self.environments.get(id))
    }

    /// 为模块选择执行环境
    ///
    /// 取模块声明的第一个已知环境；都未知时取默认环境；没有任何环境时返回 `None`，
    /// 此时解析器不做系统包裁剪。
    pub fn select_for(&self, declared: &[String]) -> Option<&Arc<ExecutionEnvironment>> {
        declared
            .iter()
            .find_map(|id| self.environments.get(id))
            .or_else(|| self.default_environment())
    }

    /// 所有环境标识（升序）
    pub fn ids(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// 执行环境数
    pub fn len(&self) -> usize {
        self.environments.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// 执行环境来源
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// 加载全部执行环境
    async fn load(&self) -> Result<Vec<ExecutionEnvironment>>;

    /// 来源描述，用于日志
    fn describe(&self) -> String;
}

/// 固定列表来源（通常来自配置文件）
#[derive(Debug, Clone, Default)]
pub struct StaticProfileSource {
    environments: Vec<ExecutionEnvironment>,
}

impl StaticProfileSource {
    /// 使用固定的执行环境列表
    pub fn new(environments: Vec<ExecutionEnvironment>) -> Self {
        Self { environments }
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn load(&self) -> Result<Vec<ExecutionEnvironment>> {
        Ok(self.environments.clone())
    }

    fn describe(&self) -> String {
        format!("static({})", self.environments.len())
    }
}

/// YAML 文件来源
///
/// 文件内容为执行环境列表：
///
/// ```yaml
/// - id: JavaSE-17
///   system_packages: [javax.xml, javax.net]
/// ```
#[derive(Debug, Clone)]
pub struct FileProfileSource {
    path: PathBuf,
}

impl FileProfileSource {
    /// 从 YAML 文件读取执行环境列表
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProfileSource for FileProfileSource {
    async fn load(&self) -> Result<Vec<ExecutionEnvironment>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!(
                "无法读取执行环境文件 '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        let environments: Vec<ExecutionEnvironment> = serde_yaml::from_str(&content)?;
        Ok(environments)
    }

    fn describe(&self) -> String {
        format!("file({})", self.path.display())
    }
}

/// 执行环境配置存储
#[derive(Debug)]
pub struct ProfileStore {
    current: ArcSwap<ProfileSnapshot>,
    preferred_default: Option<String>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new(Vec::new(), None)
    }
}

impl ProfileStore {
    /// 创建存储
    ///
    /// # 参数
    ///
    /// * `environments` - 初始执行环境
    /// * `preferred_default` - 配置指定的默认环境
    pub fn new(environments: Vec<ExecutionEnvironment>, preferred_default: Option<String>) -> Self {
        let snapshot = ProfileSnapshot::new(environments, preferred_default.as_deref());
        if let Some(id) = &preferred_default {
            if snapshot.get(id).is_none() {
                tracing::warn!(environment = %id, "配置的默认执行环境未知，改用自动选择");
            }
        }
        Self {
            current: ArcSwap::from_pointee(snapshot),
            preferred_default,
        }
    }

    /// 获取当前快照
    pub fn snapshot(&self) -> Arc<ProfileSnapshot> {
        self.current.load_full()
    }

    /// 环境提供的系统包
    pub fn system_packages(&self, id: &str) -> BTreeSet<String> {
        self.current.load().system_packages(id)
    }

    /// 以新的执行环境列表整体替换快照
    pub fn reload(&self, environments: Vec<ExecutionEnvironment>) {
        let snapshot = ProfileSnapshot::new(environments, self.preferred_default.as_deref());
        tracing::info!(
            environments = snapshot.len(),
            default = ?snapshot.default_environment().map(|env| env.id.as_str()),
            "执行环境已重新加载"
        );
        self.current.store(Arc::new(snapshot));
    }

    /// 从来源加载并替换快照
    ///
    /// 加载失败时保留旧快照。
    pub async fn reload_from(&self, source: &dyn ProfileSource) -> Result<()> {
        let environments = source.load().await.map_err(|e| {
            tracing::warn!(source = %source.describe(), error = %e, "加载执行环境失败");
            e
        })?;
        self.reload(environments);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn java(id: &str, packages: &[&str]) -> ExecutionEnvironment {
        ExecutionEnvironment::new(id, packages.iter().copied())
    }

    #[test]
    fn test_default_is_highest_identifier() {
        let snapshot = ProfileSnapshot::new(
            vec![java("JavaSE-11", &[]), java("JavaSE-17", &[]), java("J2SE-1.5", &[])],
            None,
        );
        assert_eq!(snapshot.default_environment().unwrap().id, "JavaSE-17");
    }

    #[test]
    fn test_preferred_default() {
        let snapshot = ProfileSnapshot::new(
            vec![java("JavaSE-11", &[]), java("JavaSE-17", &[])],
            Some("JavaSE-11"),
        );
        assert_eq!(snapshot.default_environment().unwrap().id, "JavaSE-11");

        let snapshot = ProfileSnapshot::new(vec![java("JavaSE-17", &[])], Some("Unknown"));
        assert_eq!(snapshot.default_environment().unwrap().id, "JavaSE-17");
    }

    #[test]
    fn test_select_for_declared_order() {
        let snapshot = ProfileSnapshot::new(
            vec![java("JavaSE-11", &["a"]), java("JavaSE-17", &["b"])],
            None,
        );

        let declared = vec!["OSGi-Minimum".to_string(), "JavaSE-11".to_string()];
        assert_eq!(snapshot.select_for(&declared).unwrap().id, "JavaSE-11");
        assert_eq!(snapshot.select_for(&[]).unwrap().id, "JavaSE-17");

        let empty = ProfileSnapshot::default();
        assert!(empty.select_for(&declared).is_none());
    }

    #[test]
    fn test_unknown_environment_has_no_packages() {
        let store = ProfileStore::new(vec![java("JavaSE-17", &["javax.xml"])], None);
        assert!(store.system_packages("JavaSE-17").contains("javax.xml"));
        assert!(store.system_packages("JavaSE-99").is_empty());
    }

    #[test]
    fn test_reload_keeps_old_snapshot_alive() {
        let store = ProfileStore::new(vec![java("JavaSE-11", &["javax.xml"])], None);
        let before = store.snapshot();

        store.reload(vec![java("JavaSE-17", &["javax.net"])]);

        assert!(before.system_packages("JavaSE-11").contains("javax.xml"));
        assert!(store.system_packages("JavaSE-11").is_empty());
        assert!(store.system_packages("JavaSE-17").contains("javax.net"));
    }

    #[tokio::test]
    async fn test_reload_from_static_source() {
        let store = ProfileStore::default();
        let source = StaticProfileSource::new(vec![java("JavaSE-17", &["javax.xml"])]);

        store.reload_from(&source).await.unwrap();
        assert_eq!(store.snapshot().ids(), vec!["JavaSE-17".to_string()]);
    }

    #[tokio::test]
    async fn test_reload_from_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- id: JavaSE-17\n  system_packages: [javax.xml, javax.net]\n- id: JavaSE-11"
        )
        .unwrap();

        let store = ProfileStore::default();
        store
            .reload_from(&FileProfileSource::new(file.path()))
            .await
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.system_packages("JavaSE-17").len(), 2);
        assert!(snapshot.system_packages("JavaSE-11").is_empty());
    }

    #[tokio::test]
    async fn test_reload_from_missing_file_keeps_snapshot() {
        let store = ProfileStore::new(vec![java("JavaSE-17", &[])], None);
        let result = store
            .reload_from(&FileProfileSource::new("/nonexistent/profiles.yaml"))
            .await;

        assert!(matches!(result, Err(CoreError::ConfigLoadFailed(_))));
        assert_eq!(store.snapshot().len(), 1);
    }
}
