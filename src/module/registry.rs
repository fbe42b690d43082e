//! 模块注册表
//!
//! 保存所有已知的模块描述（工作区与外部目标平台），按符号名索引，
//! 同一符号名允许多个版本。
//!
//! 注册表以不可变快照 [`RegistrySnapshot`] 的形式发布：读取方通过
//! [`ModuleRegistry::snapshot`] 拿到当前快照后即可无锁查询，写入方构建新快照后
//! 用 `ArcSwap` 整体替换。正在进行的解析始终看到一个完整、一致的快照。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::module::dependency::DependencyGraph;
use crate::module::metadata::{ModuleDescriptor, ModuleIdentity, Origin};
use crate::module::version::{Version, VersionRange};
use crate::utils::{CoreError, Result};

/// 未能解析的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// 注册表中没有该符号名
    Missing,
    /// 存在该符号名，但没有版本落在要求的范围内
    VersionMismatch {
        /// 已知的全部版本（降序）
        available: Vec<Version>,
    },
}

/// 注册表查询结果
#[derive(Debug, Clone)]
pub enum Lookup {
    /// 解析成功
    Resolved(Arc<ModuleDescriptor>),
    /// 解析失败
    Unresolved(Unresolved),
}

impl Lookup {
    /// 解析成功时返回模块描述
    pub fn resolved(self) -> Option<Arc<ModuleDescriptor>> {
        match self {
            Lookup::Resolved(desc) => Some(desc),
            Lookup::Unresolved(_) => None,
        }
    }
}

/// 注册表快照
///
/// 构建完成后不再修改。索引：
/// - 工作区与外部模块：符号名 -> 按版本降序排列的描述
/// - 导出包：包名 -> 导出该包的可见模块
/// - 片段：宿主符号名 -> 声明该宿主的可见片段
/// - 依赖图：符号名之间的依赖关系，用于计算受影响模块
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    workspace: HashMap<String, Vec<Arc<ModuleDescriptor>>>,
    external: HashMap<String, Vec<Arc<ModuleDescriptor>>>,
    exporters: HashMap<String, Vec<Arc<ModuleDescriptor>>>,
    fragments: HashMap<String, Vec<Arc<ModuleDescriptor>>>,
    graph: DependencyGraph,
}

impl RegistrySnapshot {
    /// 由工作区与外部模块构建快照
    ///
    /// 同一标识重复出现时保留最后一个。
    pub fn build<W, E>(generation: u64, workspace: W, external: E) -> Self
    where
        W: IntoIterator<Item = Arc<ModuleDescriptor>>,
        E: IntoIterator<Item = Arc<ModuleDescriptor>>,
    {
        let workspace = group_by_name(workspace);
        let external = group_by_name(external);

        let mut snapshot = Self {
            generation,
            workspace,
            external,
            exporters: HashMap::new(),
            fragments: HashMap::new(),
            graph: DependencyGraph::new(),
        };
        snapshot.index_exports();
        snapshot.index_fragments();
        snapshot.index_dependencies();
        snapshot
    }

    fn index_exports(&mut self) {
        let mut exporters: HashMap<String, Vec<Arc<ModuleDescriptor>>> = HashMap::new();
        for desc in self.visible_descriptors() {
            for export in &desc.exports {
                exporters
                    .entry(export.name.clone())
                    .or_default()
                    .push(Arc::clone(desc));
            }
        }
        self.exporters = exporters;
    }

    fn index_fragments(&mut self) {
        let mut fragments: HashMap<String, Vec<Arc<ModuleDescriptor>>> = HashMap::new();
        for desc in self.visible_descriptors() {
            if let Some(host) = &desc.host {
                fragments
                    .entry(host.symbolic_name.clone())
                    .or_default()
                    .push(Arc::clone(desc));
            }
        }
        for list in fragments.values_mut() {
            list.sort_by(|a, b| {
                a.symbolic_name
                    .cmp(&b.symbolic_name)
                    .then_with(|| b.version.cmp(&a.version))
            });
        }
        self.fragments = fragments;
    }

    fn index_dependencies(&mut self) {
        let mut graph = DependencyGraph::new();
        for desc in self.visible_descriptors() {
            let name = desc.symbolic_name.as_str();
            graph.add_module(name);
            for required in &desc.requires {
                graph.add_dependency(name, &required.symbolic_name);
            }
            for secondary in &desc.secondary_dependencies {
                graph.add_dependency(name, &secondary.symbolic_name);
            }
            // 片段与宿主互相影响：宿主的使用方也会看到片段
            if let Some(host) = &desc.host {
                graph.add_dependency(name, &host.symbolic_name);
                graph.add_dependency(&host.symbolic_name, name);
            }
            for import in &desc.imports {
                for exporter in self.exporters_of(&import.name) {
                    if exporter.symbolic_name != name {
                        graph.add_dependency(name, &exporter.symbolic_name);
                    }
                }
            }
        }
        self.graph = graph;
    }

    /// 快照代数，每次替换加一
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 可见的模块数量（被遮蔽的外部模块不计）
    pub fn len(&self) -> usize {
        self.visible_descriptors().count()
    }

    /// 是否没有任何模块
    pub fn is_empty(&self) -> bool {
        self.workspace.is_empty() && self.external.is_empty()
    }

    /// 依赖图
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// 外部模块是否被同一标识的工作区模块遮蔽
    fn is_shadowed(&self, desc: &ModuleDescriptor) -> bool {
        self.workspace
            .get(&desc.symbolic_name)
            .is_some_and(|list| list.iter().any(|w| w.version == desc.version))
    }

    /// 遍历所有可见的模块描述
    pub fn visible_descriptors(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.workspace.values().flatten().chain(
            self.external
                .values()
                .flatten()
                .filter(move |desc| !self.is_shadowed(desc)),
        )
    }

    /// 所有工作区模块的标识
    pub fn workspace_identities(&self) -> Vec<ModuleIdentity> {
        let mut identities: Vec<_> = self
            .workspace
            .values()
            .flatten()
            .map(|desc| desc.identity())
            .collect();
        identities.sort();
        identities
    }

    /// 按标识精确查找，工作区优先
    pub fn get(&self, identity: &ModuleIdentity) -> Option<Arc<ModuleDescriptor>> {
        let find = |map: &HashMap<String, Vec<Arc<ModuleDescriptor>>>| {
            map.get(&identity.symbolic_name)
                .and_then(|list| list.iter().find(|d| d.version == identity.version))
                .cloned()
        };
        find(&self.workspace).or_else(|| find(&self.external))
    }

    /// 是否包含指定标识
    pub fn contains(&self, identity: &ModuleIdentity) -> bool {
        self.get(identity).is_some()
    }

    /// 按符号名与版本范围解析模块
    ///
    /// 工作区中满足范围的最高版本优先，不论外部模块版本多高；
    /// 否则取外部模块中满足范围的最高版本。
    ///
    /// # Arguments
    ///
    /// * `name` - 符号名
    /// * `range` - 可接受的版本范围
    pub fn resolve(&self, name: &str, range: &VersionRange) -> Lookup {
        let pick = |map: &HashMap<String, Vec<Arc<ModuleDescriptor>>>| {
            map.get(name)
                .and_then(|list| list.iter().find(|d| range.matches(&d.version)))
                .cloned()
        };

        if let Some(desc) = pick(&self.workspace).or_else(|| pick(&self.external)) {
            return Lookup::Resolved(desc);
        }

        let available: Vec<Version> = self
            .all_versions(name)
            .into_iter()
            .map(|desc| desc.version.clone())
            .collect();
        if available.is_empty() {
            Lookup::Unresolved(Unresolved::Missing)
        } else {
            Lookup::Unresolved(Unresolved::VersionMismatch { available })
        }
    }

    /// 符号名的全部已知版本
    ///
    /// 版本降序；同版本时工作区在前；被遮蔽的外部重复项已移除。
    pub fn all_versions(&self, name: &str) -> Vec<Arc<ModuleDescriptor>> {
        let mut versions: Vec<Arc<ModuleDescriptor>> = self
            .workspace
            .get(name)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        versions.extend(
            self.external
                .get(name)
                .into_iter()
                .flatten()
                .filter(|desc| !self.is_shadowed(desc))
                .cloned(),
        );
        versions.sort_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then_with(|| origin_rank(a.origin).cmp(&origin_rank(b.origin)))
        });
        versions
    }

    /// 导出指定包的可见模块
    pub fn exporters_of(&self, package: &str) -> &[Arc<ModuleDescriptor>] {
        self.exporters
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 附着在指定宿主上的片段
    ///
    /// 按片段符号名排序，同名片段只保留满足宿主版本的最高版本。
    pub fn fragments_of(&self, host: &ModuleDescriptor) -> Vec<Arc<ModuleDescriptor>> {
        let mut fragments: Vec<Arc<ModuleDescriptor>> = Vec::new();
        for fragment in self.fragments.get(&host.symbolic_name).into_iter().flatten() {
            if !fragment.is_fragment_of(host) {
                continue;
            }
            if fragments
                .last()
                .is_some_and(|last| last.symbolic_name == fragment.symbolic_name)
            {
                continue;
            }
            fragments.push(Arc::clone(fragment));
        }
        fragments
    }

    /// 指定符号名下所有可见模块的标识
    fn identities_of(&self, name: &str) -> impl Iterator<Item = ModuleIdentity> + '_ {
        self.all_versions(name).into_iter().map(|desc| desc.identity())
    }

    /// 计算受影响的模块
    ///
    /// 包括给定符号名自身，以及通过模块依赖、次要依赖或包导入
    /// 直接或间接依赖它们的所有模块。
    pub fn affected_by<I, S>(&self, names: I) -> Vec<ModuleIdentity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        collect_affected(&[self], &names)
    }
}

/// 工作区排在外部之前
fn origin_rank(origin: Origin) -> u8 {
    match origin {
        Origin::Workspace => 0,
        Origin::External => 1,
    }
}

/// 按符号名分组并按版本降序排列，同一版本保留最后出现的描述
fn group_by_name<I>(descriptors: I) -> HashMap<String, Vec<Arc<ModuleDescriptor>>>
where
    I: IntoIterator<Item = Arc<ModuleDescriptor>>,
{
    let mut grouped: HashMap<String, Vec<Arc<ModuleDescriptor>>> = HashMap::new();
    for desc in descriptors {
        let list = grouped.entry(desc.symbolic_name.clone()).or_default();
        list.retain(|existing| existing.version != desc.version);
        list.push(desc);
    }
    for list in grouped.values_mut() {
        list.sort_by(|a, b| b.version.cmp(&a.version));
    }
    grouped
}

/// 在一组快照上计算受影响模块的并集
///
/// 注册表变更时同时在旧快照和新快照上计算，保证被移除的依赖方也能得到通知。
fn collect_affected(snapshots: &[&RegistrySnapshot], names: &BTreeSet<String>) -> Vec<ModuleIdentity> {
    let mut affected_names: BTreeSet<String> = names.clone();
    for snapshot in snapshots {
        for name in names {
            affected_names.extend(snapshot.graph.get_all_dependents(name));
        }
    }

    let mut identities = BTreeSet::new();
    for snapshot in snapshots {
        for name in &affected_names {
            identities.extend(snapshot.identities_of(name));
        }
    }
    identities.into_iter().collect()
}

/// 模块注册表
///
/// 读多写少；写操作构建新的快照后整体替换，读取方从不阻塞。
#[derive(Debug)]
pub struct ModuleRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    /// 由一组模块描述创建注册表，按 `origin` 分入工作区或外部
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let (workspace, external): (Vec<_>, Vec<_>) = descriptors
            .into_iter()
            .map(Arc::new)
            .partition(|desc| desc.origin.is_workspace());

        let snapshot = RegistrySnapshot::build(1, workspace, external);
        tracing::debug!(modules = snapshot.len(), "注册表已初始化");
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// 获取当前快照
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// 当前快照代数
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// 可见模块数量
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// 是否没有任何模块
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// 按标识精确查找
    pub fn get(&self, identity: &ModuleIdentity) -> Option<Arc<ModuleDescriptor>> {
        self.current.load().get(identity)
    }

    /// 按符号名与版本范围解析模块
    pub fn resolve(&self, name: &str, range: &VersionRange) -> Lookup {
        self.current.load().resolve(name, range)
    }

    /// 符号名的全部已知版本
    pub fn all_versions(&self, name: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.current.load().all_versions(name)
    }

    /// 导出指定包的可见模块
    pub fn exporters_of(&self, package: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.current.load().exporters_of(package).to_vec()
    }

    /// 计算受影响的模块
    pub fn affected_by<I, S>(&self, names: I) -> Vec<ModuleIdentity>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.current.load().affected_by(names)
    }

    /// 整体替换外部模块（目标平台变更）
    ///
    /// # Returns
    ///
    /// 受影响的模块标识：内容发生变化的符号名及其所有依赖方，
    /// 在旧快照和新快照上取并集
    pub fn replace_external(&self, descriptors: Vec<ModuleDescriptor>) -> Vec<ModuleIdentity> {
        let external: Vec<Arc<ModuleDescriptor>> = descriptors
            .into_iter()
            .map(|mut desc| {
                desc.origin = Origin::External;
                Arc::new(desc)
            })
            .collect();
        let replacement = group_by_name(external.iter().cloned());

        let mut affected = Vec::new();
        self.current.rcu(|old| {
            let changed: BTreeSet<String> = old
                .external
                .keys()
                .chain(replacement.keys())
                .filter(|name| old.external.get(*name) != replacement.get(*name))
                .cloned()
                .collect();

            let next = RegistrySnapshot::build(
                old.generation + 1,
                old.workspace.values().flatten().cloned(),
                external.iter().cloned(),
            );
            affected = collect_affected(&[&**old, &next], &changed);
            Arc::new(next)
        });

        tracing::info!(
            generation = self.generation(),
            affected = affected.len(),
            "外部模块已替换"
        );
        affected
    }

    /// 新增或替换一个工作区模块
    ///
    /// 清单重新解析后描述整体替换：同一符号名的所有旧工作区描述都被移除，
    /// 即使版本号已改变。旧版本的标识也计入受影响模块。
    pub fn upsert_workspace(&self, mut descriptor: ModuleDescriptor) -> Vec<ModuleIdentity> {
        descriptor.origin = Origin::Workspace;
        let descriptor = Arc::new(descriptor);
        let name = descriptor.symbolic_name.clone();

        let mut affected = Vec::new();
        self.current.rcu(|old| {
            let workspace = old
                .workspace
                .values()
                .flatten()
                .filter(|d| d.symbolic_name != name)
                .cloned()
                .chain(std::iter::once(Arc::clone(&descriptor)));
            let next = RegistrySnapshot::build(
                old.generation + 1,
                workspace,
                old.external.values().flatten().cloned(),
            );
            affected = collect_affected(&[&**old, &next], &BTreeSet::from([name.clone()]));
            Arc::new(next)
        });

        tracing::debug!(
            module = %descriptor.identity(),
            affected = affected.len(),
            "工作区模块已更新"
        );
        affected
    }

    /// 移除一个工作区模块
    ///
    /// # Errors
    ///
    /// 工作区中不存在该标识时返回 `CoreError::ModuleNotFound`
    pub fn remove_workspace(&self, identity: &ModuleIdentity) -> Result<Vec<ModuleIdentity>> {
        let mut affected = None;
        self.current.rcu(|old| {
            let present = old
                .workspace
                .get(&identity.symbolic_name)
                .is_some_and(|list| list.iter().any(|d| d.version == identity.version));
            if !present {
                affected = None;
                return Arc::clone(old);
            }

            let workspace = old
                .workspace
                .values()
                .flatten()
                .filter(|d| d.identity() != *identity)
                .cloned();
            let next = RegistrySnapshot::build(
                old.generation + 1,
                workspace,
                old.external.values().flatten().cloned(),
            );
            affected = Some(collect_affected(
                &[&**old, &next],
                &BTreeSet::from([identity.symbolic_name.clone()]),
            ));
            Arc::new(next)
        });

        let affected = affected.ok_or_else(|| CoreError::ModuleNotFound(identity.to_string()))?;
        tracing::debug!(module = %identity, affected = affected.len(), "工作区模块已移除");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::{ExportPackage, ImportPackageRef, RequiredModuleRef};

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn external(name: &str, version: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, v(version))
    }

    fn workspace(name: &str, version: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, v(version)).in_workspace()
    }

    // ==================== 解析测试 ====================

    #[test]
    fn test_resolve_highest_satisfying() {
        let registry = ModuleRegistry::from_descriptors(vec![
            external("a", "1.0"),
            external("a", "1.5"),
            external("a", "2.0"),
        ]);

        let desc = registry.resolve("a", &range("[1.0,2.0)")).resolved().unwrap();
        assert_eq!(desc.version, v("1.5"));

        let desc = registry.resolve("a", &VersionRange::Any).resolved().unwrap();
        assert_eq!(desc.version, v("2.0"));
    }

    #[test]
    fn test_resolve_workspace_precedence() {
        let registry = ModuleRegistry::from_descriptors(vec![
            external("a", "3.0"),
            workspace("a", "1.0"),
        ]);

        let desc = registry.resolve("a", &VersionRange::Any).resolved().unwrap();
        assert_eq!(desc.origin, Origin::Workspace);
        assert_eq!(desc.version, v("1.0"));

        // 工作区版本不满足范围时回退到外部模块
        let desc = registry.resolve("a", &range("2.0")).resolved().unwrap();
        assert_eq!(desc.origin, Origin::External);
    }

    #[test]
    fn test_resolve_unresolved_reasons() {
        let registry = ModuleRegistry::from_descriptors(vec![external("a", "1.0")]);

        assert!(matches!(
            registry.resolve("missing", &VersionRange::Any),
            Lookup::Unresolved(Unresolved::Missing)
        ));

        match registry.resolve("a", &range("[2.0,3.0)")) {
            Lookup::Unresolved(Unresolved::VersionMismatch { available }) => {
                assert_eq!(available, vec![v("1.0")]);
            }
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[test]
    fn test_all_versions_order_and_shadowing() {
        let registry = ModuleRegistry::from_descriptors(vec![
            external("a", "1.0"),
            external("a", "2.0"),
            workspace("a", "1.0"),
        ]);

        let versions = registry.all_versions("a");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, v("2.0"));
        assert_eq!(versions[1].version, v("1.0"));
        assert_eq!(versions[1].origin, Origin::Workspace);
    }

    #[test]
    fn test_exporters_index() {
        let registry = ModuleRegistry::from_descriptors(vec![
            external("p1", "1.0").export(ExportPackage::new("org.api", v("1.0"))),
            external("p2", "1.0").export(ExportPackage::new("org.api", v("2.0"))),
        ]);
        let mut names: Vec<_> = registry
            .exporters_of("org.api")
            .iter()
            .map(|d| d.symbolic_name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["p1", "p2"]);
        assert!(registry.exporters_of("org.none").is_empty());
    }

    // ==================== 变更测试 ====================

    #[test]
    fn test_upsert_workspace_bumps_generation() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.generation(), 0);

        let affected = registry.upsert_workspace(external("a", "1.0"));
        assert_eq!(registry.generation(), 1);
        assert_eq!(affected, vec![ModuleIdentity::new("a", v("1.0"))]);

        let desc = registry.get(&ModuleIdentity::new("a", v("1.0"))).unwrap();
        assert!(desc.origin.is_workspace());
    }

    #[test]
    fn test_upsert_workspace_version_bump_replaces_old_descriptor() {
        let registry = ModuleRegistry::from_descriptors(vec![
            workspace("a", "1.0").export(ExportPackage::new("org.x", v("1.0"))),
            workspace("consumer", "1.0").import(ImportPackageRef::new("org.x")),
        ]);

        let affected = registry.upsert_workspace(workspace("a", "1.1"));

        let names: Vec<_> = registry
            .snapshot()
            .workspace_identities()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(names, vec!["a_1.1.0", "consumer_1.0.0"]);
        assert!(registry.get(&ModuleIdentity::new("a", v("1.0"))).is_none());
        assert!(registry.exporters_of("org.x").is_empty());

        // 旧版本与导入方都受影响
        assert!(affected.contains(&ModuleIdentity::new("a", v("1.0"))));
        assert!(affected.contains(&ModuleIdentity::new("a", v("1.1"))));
        assert!(affected.contains(&ModuleIdentity::new("consumer", v("1.0"))));
    }

    #[test]
    fn test_upsert_workspace_keeps_other_modules() {
        let registry = ModuleRegistry::from_descriptors(vec![
            workspace("a", "1.0"),
            workspace("b", "1.0"),
            external("a", "0.9"),
        ]);

        registry.upsert_workspace(workspace("a", "2.0"));

        assert!(registry.get(&ModuleIdentity::new("b", v("1.0"))).is_some());
        assert!(registry.get(&ModuleIdentity::new("a", v("0.9"))).is_some());
        let versions: Vec<_> = registry
            .all_versions("a")
            .iter()
            .map(|d| d.version.clone())
            .collect();
        assert_eq!(versions, vec![v("2.0"), v("0.9")]);
    }

    #[test]
    fn test_fragments_of_host() {
        let host_range = |r: &str| RequiredModuleRef::new("host").with_range(range(r));
        let registry = ModuleRegistry::from_descriptors(vec![
            external("host", "1.0"),
            external("frag.b", "1.0").fragment_of(host_range("[1.0,2.0)")),
            external("frag.a", "1.0").fragment_of(host_range("[1.0,2.0)")),
            external("frag.a", "1.1").fragment_of(host_range("[1.0,2.0)")),
            external("frag.old", "1.0").fragment_of(host_range("[0.1,0.9)")),
        ]);
        let host = registry.get(&ModuleIdentity::new("host", v("1.0"))).unwrap();

        let fragments: Vec<_> = registry
            .snapshot()
            .fragments_of(&host)
            .iter()
            .map(|d| d.identity().to_string())
            .collect();
        assert_eq!(fragments, vec!["frag.a_1.1.0", "frag.b_1.0.0"]);

        // 片段变更时宿主及其使用方受影响
        let affected = registry.affected_by(["frag.b"]);
        assert!(affected.contains(&ModuleIdentity::new("host", v("1.0"))));
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let registry = ModuleRegistry::from_descriptors(vec![external("a", "1.0")]);
        let before = registry.snapshot();

        registry.replace_external(vec![]);

        assert!(before.contains(&ModuleIdentity::new("a", v("1.0"))));
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.generation(), before.generation() + 1);
    }

    #[test]
    fn test_affected_includes_transitive_dependents() {
        let registry = ModuleRegistry::from_descriptors(vec![
            workspace("app", "1.0").require(RequiredModuleRef::new("ui")),
            workspace("ui", "1.0").import(ImportPackageRef::new("org.core")),
            external("core", "1.0").export(ExportPackage::new("org.core", v("1.0"))),
            external("unrelated", "1.0"),
        ]);

        let affected = registry.affected_by(["core"]);
        let names: Vec<_> = affected.iter().map(|id| id.symbolic_name.as_str()).collect();
        assert_eq!(names, vec!["app", "core", "ui"]);
    }

    #[test]
    fn test_replace_external_reports_removed_modules() {
        let registry = ModuleRegistry::from_descriptors(vec![
            workspace("app", "1.0").require(RequiredModuleRef::new("lib")),
            external("lib", "1.0"),
            external("stable", "1.0"),
        ]);

        let affected = registry.replace_external(vec![external("stable", "1.0")]);
        let names: Vec<_> = affected.iter().map(|id| id.symbolic_name.as_str()).collect();
        assert_eq!(names, vec!["app", "lib"]);
    }

    #[test]
    fn test_remove_workspace() {
        let registry = ModuleRegistry::from_descriptors(vec![workspace("a", "1.0")]);
        let id = ModuleIdentity::new("a", v("1.0"));

        assert_eq!(registry.remove_workspace(&id).unwrap(), vec![id.clone()]);
        assert!(registry.get(&id).is_none());

        let err = registry.remove_workspace(&id).unwrap_err();
        assert!(matches!(err, CoreError::ModuleNotFound(_)));
    }
}
