//! 模块依赖管理
//!
//! 本模块提供模块依赖关系的图结构和类路径解析器。
//!
//! # 主要组件
//!
//! - [`DependencyGraph`] - 依赖关系图，用于在注册表变更时计算受影响的模块
//! - [`DependencyResolver`] - 类路径解析器，按广度优先遍历计算模块的有序类路径
//!
//! # 示例
//!
//! ```rust
//! use bundle_classpath::module::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_dependency("app", "ui");
//! graph.add_dependency("ui", "core");
//!
//! assert_eq!(graph.get_dependents("core"), vec!["ui".to_string()]);
//! assert_eq!(graph.get_all_dependents("core"), vec!["ui".to_string(), "app".to_string()]);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::classpath::{
    AccessKind, AccessRule, ClasspathEntry, Diagnostic, EntryKind, Resolution, ResolvedClasspath,
    Severity,
};
use crate::module::metadata::{DependencyEdge, ModuleDescriptor, RequiredModuleRef};
use crate::module::profile::ProfileSnapshot;
use crate::module::registry::{Lookup, RegistrySnapshot, Unresolved};
use crate::module::version::VersionRange;

/// 模块依赖关系图
///
/// 节点为模块符号名。边 `a -> b` 表示 `a` 通过模块依赖、次要依赖或包导入引用了 `b`。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 正向边：模块 -> 该模块依赖的模块列表
    edges: HashMap<String, Vec<String>>,
    /// 反向边：模块 -> 依赖该模块的模块列表
    reverse_edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// 创建一个空的依赖图
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加模块节点，已存在时不重复添加
    pub fn add_module(&mut self, module: &str) {
        self.edges.entry(module.to_string()).or_default();
        self.reverse_edges.entry(module.to_string()).or_default();
    }

    /// 添加依赖关系
    ///
    /// 表示 `module` 依赖于 `dependency`，模块不存在时自动添加。
    ///
    /// # 参数
    ///
    /// * `module` - 依赖方
    /// * `dependency` - 被依赖方
    pub fn add_dependency(&mut self, module: &str, dependency: &str) {
        self.add_module(module);
        self.add_module(dependency);

        let deps = self.edges.entry(module.to_string()).or_default();
        if !deps.iter().any(|d| d == dependency) {
            deps.push(dependency.to_string());
        }

        let rev_deps = self.reverse_edges.entry(dependency.to_string()).or_default();
        if !rev_deps.iter().any(|d| d == module) {
            rev_deps.push(module.to_string());
        }
    }

    /// 移除模块及其所有依赖关系
    pub fn remove_module(&mut self, module: &str) {
        if let Some(deps) = self.edges.remove(module) {
            for dep in deps {
                if let Some(rev_deps) = self.reverse_edges.get_mut(&dep) {
                    rev_deps.retain(|d| d != module);
                }
            }
        }

        if let Some(dependents) = self.reverse_edges.remove(module) {
            for dependent in dependents {
                if let Some(deps) = self.edges.get_mut(&dependent) {
                    deps.retain(|d| d != module);
                }
            }
        }
    }

    /// 获取模块的直接依赖
    pub fn get_dependencies(&self, module: &str) -> Vec<String> {
        self.edges.get(module).cloned().unwrap_or_default()
    }

    /// 获取直接依赖该模块的模块
    pub fn get_dependents(&self, module: &str) -> Vec<String> {
        self.reverse_edges.get(module).cloned().unwrap_or_default()
    }

    /// 获取所有直接和间接依赖该模块的模块
    ///
    /// 按广度优先顺序返回，不包含模块自身；存在环时每个模块只出现一次。
    pub fn get_all_dependents(&self, module: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::from([module.to_string()]);
        let mut queue = VecDeque::from([module.to_string()]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.reverse_edges.get(&current).into_iter().flatten() {
                if visited.insert(dependent.clone()) {
                    result.push(dependent.clone());
                    queue.push_back(dependent.clone());
                }
            }
        }

        result
    }

    /// 检查是否包含指定模块
    pub fn contains_module(&self, module: &str) -> bool {
        self.edges.contains_key(module)
    }

    /// 图中模块数量
    pub fn module_count(&self) -> usize {
        self.edges.len()
    }

    /// 检查图是否为空
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// 类路径解析器
///
/// 在一个注册表快照和一个执行环境快照上计算模块的类路径。解析是纯计算：
/// 相同的输入总是得到相同的类路径和诊断，且从不返回错误。
pub struct DependencyResolver<'a> {
    registry: &'a RegistrySnapshot,
    profiles: &'a ProfileSnapshot,
}

impl<'a> DependencyResolver<'a> {
    /// 创建解析器
    ///
    /// # 参数
    ///
    /// * `registry` - 注册表快照
    /// * `profiles` - 执行环境快照
    pub fn new(registry: &'a RegistrySnapshot, profiles: &'a ProfileSnapshot) -> Self {
        Self { registry, profiles }
    }

    /// 计算根模块的类路径
    ///
    /// 条目顺序：根模块是片段时先是宿主及宿主的依赖，然后是直接依赖、
    /// 经再导出传递的依赖（广度优先）、导入包的提供方、次要依赖，
    /// 最后是根模块的附加类库。
    pub fn resolve_classpath(&self, root: &ModuleDescriptor) -> Resolution {
        let span = crate::resolution_span!(root.identity(), self.registry.generation());
        let _enter = span.enter();

        let mut walk = Walk::new(root);
        let profile = self.profiles.select_for(&root.execution_environments);
        let system_packages = profile.map(|env| &env.system_packages);

        if let Some(host) = &root.host {
            self.add_host(&mut walk, host, system_packages);
        }

        for edge in root.edges() {
            match edge {
                DependencyEdge::Require(required) => {
                    let severity = if required.optional { Severity::Info } else { Severity::Error };
                    match self.registry.resolve(&required.symbolic_name, &required.version_range) {
                        Lookup::Resolved(desc) => self.add_dependency(&mut walk, &desc, true),
                        Lookup::Unresolved(reason) => {
                            walk.unresolved_module(
                                severity,
                                edge,
                                &required.symbolic_name,
                                &required.version_range,
                                reason,
                            );
                        }
                    }
                }
                // 包导入和次要依赖排在所有模块依赖之后，下面单独处理
                DependencyEdge::Import(_) | DependencyEdge::Secondary(_) => {}
            }
        }

        self.follow_reexports(&mut walk);

        for edge in root.edges() {
            match edge {
                DependencyEdge::Require(_) => {}
                DependencyEdge::Import(import) => {
                    if system_packages.is_some_and(|pkgs| pkgs.contains(&import.name)) {
                        tracing::trace!(package = %import.name, "系统包，跳过");
                        continue;
                    }
                    if root.exports_package(&import.name) {
                        continue;
                    }
                    match self.best_exporter(root, &import.name, &import.version_range) {
                        Some(exporter) => self.add_dependency(&mut walk, &exporter, false),
                        None => {
                            let severity = if import.optional { Severity::Info } else { Severity::Error };
                            walk.diagnostics.push(Diagnostic::new(
                                severity,
                                format!(
                                    "包 '{}' 没有满足 {} 的导出方",
                                    import.name, import.version_range
                                ),
                                edge.to_string(),
                            ));
                        }
                    }
                }
                DependencyEdge::Secondary(secondary) => {
                    match self.registry.resolve(&secondary.symbolic_name, &VersionRange::Any) {
                        Lookup::Resolved(desc) => {
                            walk.visit(&desc);
                        }
                        Lookup::Unresolved(reason) => {
                            walk.unresolved_module(
                                Severity::Error,
                                edge,
                                &secondary.symbolic_name,
                                &VersionRange::Any,
                                reason,
                            );
                        }
                    }
                }
            }
        }

        for library in &root.extra_classpath {
            walk.classpath.push(ClasspathEntry {
                location: library.clone(),
                source_location: None,
                module: root.identity(),
                kind: EntryKind::Library,
                access_rules: vec![],
            });
        }

        let resolution = Resolution {
            root: root.identity(),
            classpath: walk.classpath,
            diagnostics: walk.diagnostics,
            generation: self.registry.generation(),
            profile: profile.map(|env| env.id.clone()),
            computed_at: Utc::now(),
        };

        tracing::debug!(
            entries = resolution.classpath.len(),
            diagnostics = resolution.diagnostics.len(),
            generation = resolution.generation,
            "类路径解析完成"
        );
        resolution
    }

    /// 广度优先展开再导出依赖
    ///
    /// 只跟随 `Reexport` 边；已访问的模块不会再次入队，因此环上的每个模块只处理一次。
    fn follow_reexports(&self, walk: &mut Walk<'_>) {
        while let Some(current) = walk.queue.pop_front() {
            for required in current.requires.iter().filter(|r| r.is_reexported()) {
                match self.registry.resolve(&required.symbolic_name, &required.version_range) {
                    Lookup::Resolved(desc) => self.add_dependency(walk, &desc, true),
                    Lookup::Unresolved(reason) => {
                        let severity = if required.optional { Severity::Info } else { Severity::Warning };
                        walk.unresolved_module(
                            severity,
                            DependencyEdge::Require(required),
                            &required.symbolic_name,
                            &required.version_range,
                            reason,
                        );
                    }
                }
            }
        }
    }

    /// 加入一个模块，并按宿主规则放置它的片段
    ///
    /// 宿主允许片段扩展 API 时，补丁片段排在宿主之前，其余片段排在宿主之后。
    /// `expand` 为真时新加入的模块进入再导出队列；经包导入加入时不展开，
    /// 补丁片段也排在宿主之后。
    fn add_dependency(&self, walk: &mut Walk<'_>, desc: &Arc<ModuleDescriptor>, expand: bool) {
        if walk.is_visited(desc) {
            return;
        }
        let fragments = if desc.extensible_api {
            self.registry.fragments_of(desc)
        } else {
            Vec::new()
        };
        let (patches, others): (Vec<_>, Vec<_>) =
            fragments.into_iter().partition(|fragment| expand && fragment.patch);

        for fragment in &patches {
            walk.add(fragment, expand);
        }
        walk.add(desc, expand);
        for fragment in &others {
            walk.add(fragment, expand);
        }
    }

    /// 根模块是片段时加入宿主，以及宿主的模块依赖和导入包提供方
    ///
    /// 宿主条目不带访问限制。宿主清单中无法解析的依赖只报告为警告。
    fn add_host(
        &self,
        walk: &mut Walk<'_>,
        host_ref: &RequiredModuleRef,
        system_packages: Option<&BTreeSet<String>>,
    ) {
        let host = match self.registry.resolve(&host_ref.symbolic_name, &host_ref.version_range) {
            Lookup::Resolved(host) => host,
            Lookup::Unresolved(reason) => {
                let severity = if host_ref.optional { Severity::Info } else { Severity::Error };
                walk.unresolved_module(
                    severity,
                    format_args!("host {} {}", host_ref.symbolic_name, host_ref.version_range),
                    &host_ref.symbolic_name,
                    &host_ref.version_range,
                    reason,
                );
                return;
            }
        };
        if !walk.visit_host(&host) {
            return;
        }

        for required in &host.requires {
            match self.registry.resolve(&required.symbolic_name, &required.version_range) {
                Lookup::Resolved(desc) => self.add_dependency(walk, &desc, true),
                Lookup::Unresolved(reason) => {
                    let severity = if required.optional { Severity::Info } else { Severity::Warning };
                    walk.unresolved_module(
                        severity,
                        DependencyEdge::Require(required),
                        &required.symbolic_name,
                        &required.version_range,
                        reason,
                    );
                }
            }
        }

        for import in &host.imports {
            if system_packages.is_some_and(|pkgs| pkgs.contains(&import.name))
                || host.exports_package(&import.name)
            {
                continue;
            }
            if let Some(exporter) = self.best_exporter(&host, &import.name, &import.version_range) {
                self.add_dependency(walk, &exporter, false);
            }
        }
    }

    /// 选择导入包的最佳导出方
    ///
    /// 取导出版本满足范围的最高者；版本相同时工作区优先，再按符号名字典序，
    /// 同一模块的多个版本取最高模块版本。
    fn best_exporter(
        &self,
        root: &ModuleDescriptor,
        package: &str,
        range: &VersionRange,
    ) -> Option<Arc<ModuleDescriptor>> {
        self.registry
            .exporters_of(package)
            .iter()
            .filter(|desc| desc.symbolic_name != root.symbolic_name)
            .filter_map(|desc| {
                desc.exports
                    .iter()
                    .filter(|export| export.name == package && range.matches(&export.version))
                    .map(|export| &export.version)
                    .max()
                    .map(|version| (desc, version))
            })
            .max_by(|(a, a_version), (b, b_version)| {
                a_version
                    .cmp(b_version)
                    .then_with(|| a.origin.is_workspace().cmp(&b.origin.is_workspace()))
                    .then_with(|| b.symbolic_name.cmp(&a.symbolic_name))
                    .then_with(|| a.version.cmp(&b.version))
            })
            .map(|(desc, _)| Arc::clone(desc))
    }
}

/// 计算模块的类路径
///
/// [`DependencyResolver::resolve_classpath`] 的便捷形式。
pub fn resolve_classpath(
    root: &ModuleDescriptor,
    registry: &RegistrySnapshot,
    profiles: &ProfileSnapshot,
) -> Resolution {
    DependencyResolver::new(registry, profiles).resolve_classpath(root)
}

/// 一次解析的遍历状态
struct Walk<'r> {
    root: &'r ModuleDescriptor,
    visited: HashSet<String>,
    queue: VecDeque<Arc<ModuleDescriptor>>,
    classpath: ResolvedClasspath,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> Walk<'r> {
    fn new(root: &'r ModuleDescriptor) -> Self {
        Self {
            root,
            visited: HashSet::from([root.symbolic_name.clone()]),
            queue: VecDeque::new(),
            classpath: ResolvedClasspath::new(),
            diagnostics: Vec::new(),
        }
    }

    fn is_visited(&self, desc: &ModuleDescriptor) -> bool {
        self.visited.contains(&desc.symbolic_name)
    }

    /// 访问模块，`expand` 为真时新访问的模块进入再导出队列
    fn add(&mut self, desc: &Arc<ModuleDescriptor>, expand: bool) -> bool {
        if !self.visit(desc) {
            return false;
        }
        if expand {
            self.queue.push_back(Arc::clone(desc));
        }
        true
    }

    /// 访问模块：未访问过时追加条目并返回 `true`
    fn visit(&mut self, desc: &ModuleDescriptor) -> bool {
        self.push_entry(desc, true)
    }

    /// 访问片段的宿主，宿主的所有导出包都可访问
    fn visit_host(&mut self, desc: &ModuleDescriptor) -> bool {
        self.push_entry(desc, false)
    }

    fn push_entry(&mut self, desc: &ModuleDescriptor, restricted: bool) -> bool {
        if !self.visited.insert(desc.symbolic_name.clone()) {
            return false;
        }

        let access_rules = desc
            .exports
            .iter()
            .map(|export| {
                let kind = if restricted && export.is_discouraged_for(&self.root.symbolic_name) {
                    AccessKind::Discouraged
                } else {
                    AccessKind::Accessible
                };
                AccessRule::for_package(&export.name, kind)
            })
            .collect();

        self.classpath.push(ClasspathEntry {
            location: desc.binary_location(),
            source_location: desc.source_location.clone(),
            module: desc.identity(),
            kind: EntryKind::Module,
            access_rules,
        });
        true
    }

    fn unresolved_module(
        &mut self,
        severity: Severity,
        reference: impl fmt::Display,
        name: &str,
        range: &VersionRange,
        reason: Unresolved,
    ) {
        let message = match reason {
            Unresolved::Missing => format!("模块 '{}' 未找到", name),
            Unresolved::VersionMismatch { available } => format!(
                "模块 '{}' 没有满足 {} 的版本（可用: {}）",
                name,
                range,
                available
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let reference = reference.to_string();
        tracing::debug!(%reference, %severity, "{}", message);
        self.diagnostics.push(Diagnostic::new(severity, message, reference));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::{ExportPackage, ImportPackageRef, ModuleIdentity, RequiredModuleRef};
    use crate::module::profile::ExecutionEnvironment;
    use crate::module::version::Version;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn module(name: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, v("1.0"))
    }

    fn snapshot(modules: Vec<ModuleDescriptor>) -> RegistrySnapshot {
        let (workspace, external): (Vec<_>, Vec<_>) = modules
            .into_iter()
            .map(Arc::new)
            .partition(|d| d.origin.is_workspace());
        RegistrySnapshot::build(1, workspace, external)
    }

    // ==================== DependencyGraph 测试 ====================

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("a", "b");

        assert_eq!(graph.get_dependencies("a"), vec!["b".to_string()]);
        assert_eq!(graph.get_dependents("b"), vec!["a".to_string()]);
        assert_eq!(graph.module_count(), 2);
    }

    #[test]
    fn test_remove_module() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("c", "b");

        graph.remove_module("b");

        assert!(!graph.contains_module("b"));
        assert!(graph.get_dependencies("a").is_empty());
        assert!(graph.get_dependencies("c").is_empty());
    }

    #[test]
    fn test_all_dependents_with_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");
        graph.add_dependency("d", "c");

        let mut dependents = graph.get_all_dependents("c");
        dependents.sort();
        assert_eq!(dependents, vec!["a", "b", "d"]);
    }

    // ==================== DependencyResolver 测试 ====================

    #[test]
    fn test_private_dependency_not_propagated() {
        let registry = snapshot(vec![
            module("b").require(RequiredModuleRef::new("c")),
            module("c"),
        ]);
        let root = module("a").require(RequiredModuleRef::new("b"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert_eq!(resolution.classpath.module_names(), vec!["b"]);
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_reexport_propagated() {
        let registry = snapshot(vec![
            module("b").require(RequiredModuleRef::new("c").reexport()),
            module("c"),
        ]);
        let root = module("a").require(RequiredModuleRef::new("b"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert_eq!(resolution.classpath.module_names(), vec!["b", "c"]);
    }

    #[test]
    fn test_unresolved_require_severity() {
        let registry = snapshot(vec![module("b").require(RequiredModuleRef::new("gone").reexport())]);
        let root = module("a")
            .require(RequiredModuleRef::new("missing"))
            .require(RequiredModuleRef::new("maybe").optional())
            .require(RequiredModuleRef::new("b"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        let severities: Vec<_> = resolution.diagnostics.iter().map(|d| d.severity).collect();
        assert_eq!(severities, vec![Severity::Error, Severity::Info, Severity::Warning]);
        assert_eq!(resolution.classpath.module_names(), vec!["b"]);
    }

    #[test]
    fn test_import_exporter_tie_break() {
        let registry = snapshot(vec![
            module("zeta").export(ExportPackage::new("org.api", v("1.0"))),
            module("alpha").export(ExportPackage::new("org.api", v("1.0"))),
            module("old").export(ExportPackage::new("org.api", v("0.9"))),
        ]);
        let root = module("root").import(ImportPackageRef::new("org.api"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert_eq!(resolution.classpath.module_names(), vec!["alpha"]);

        let registry = snapshot(vec![
            module("alpha").export(ExportPackage::new("org.api", v("1.0"))),
            module("zeta").in_workspace().export(ExportPackage::new("org.api", v("1.0"))),
        ]);
        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert_eq!(resolution.classpath.module_names(), vec!["zeta"]);
    }

    #[test]
    fn test_import_tie_prefers_highest_module_version() {
        let registry = snapshot(vec![
            ModuleDescriptor::new("lib", v("1.0")).export(ExportPackage::new("org.api", Version::default())),
            ModuleDescriptor::new("lib", v("2.0")).export(ExportPackage::new("org.api", Version::default())),
        ]);
        let root = module("root").import(ImportPackageRef::new("org.api"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        let modules: Vec<_> = resolution
            .classpath
            .iter()
            .map(|entry| entry.module.to_string())
            .collect();
        assert_eq!(modules, vec!["lib_2.0.0"]);
    }

    #[test]
    fn test_import_satisfied_by_root_exports() {
        let registry = snapshot(vec![module("other").export(ExportPackage::new("org.api", v("1.0")))]);
        let root = module("root")
            .export(ExportPackage::new("org.api", v("1.0")))
            .import(ImportPackageRef::new("org.api"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert!(resolution.classpath.is_empty());
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_system_packages_pruned() {
        let registry = snapshot(vec![module("xml").export(ExportPackage::new("javax.xml", v("1.0")))]);
        let profiles = ProfileSnapshot::new(
            vec![ExecutionEnvironment::new("JavaSE-17", ["javax.xml"])],
            None,
        );
        let root = module("root").import(ImportPackageRef::new("javax.xml"));

        let resolution = resolve_classpath(&root, &registry, &profiles);
        assert!(resolution.classpath.is_empty());
        assert_eq!(resolution.profile.as_deref(), Some("JavaSE-17"));
    }

    #[test]
    fn test_access_rules_and_extra_libraries() {
        let registry = snapshot(vec![module("lib")
            .export(ExportPackage::new("org.lib", v("1.0")))
            .export(ExportPackage::new("org.lib.internal", v("1.0")).internal())
            .export(ExportPackage::new("org.lib.friend", v("1.0")).internal().with_friends(["root"]))]);
        let root = module("root")
            .require(RequiredModuleRef::new("lib"))
            .extra_library("lib/extra.jar");

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        let entries = resolution.classpath.entries();
        assert_eq!(entries.len(), 2);

        let kinds: Vec<_> = entries[0].access_rules.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![AccessKind::Accessible, AccessKind::Discouraged, AccessKind::Accessible]
        );

        assert_eq!(entries[1].kind, EntryKind::Library);
        assert_eq!(entries[1].module, ModuleIdentity::new("root", v("1.0")));
    }

    #[test]
    fn test_secondary_dependencies_follow_imports() {
        let registry = snapshot(vec![
            module("sec").require(RequiredModuleRef::new("hidden").reexport()),
            module("hidden"),
            module("p").export(ExportPackage::new("org.p", v("1.0"))),
            module("r"),
        ]);
        let root = module("root")
            .secondary("sec")
            .import(ImportPackageRef::new("org.p"))
            .require(RequiredModuleRef::new("r"));

        let resolution = resolve_classpath(&root, &registry, &ProfileSnapshot::default());
        assert_eq!(resolution.classpath.module_names(), vec!["r", "p", "sec"]);
    }
}
