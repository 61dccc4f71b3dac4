//! Global Symbol Map (C2, spec §4.2).
//!
//! Grounded in the teacher's `scope.rs` (`ScopeStack`/binding registration)
//! generalized from lexical scopes to CHTL's namespace-qualified symbol
//! table: one flat map keyed by `(namespace, kind, name)` rather than a
//! stack of block scopes, since templates/customs are declared once and
//! referenced from anywhere reachable through imports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ast::{NodeId, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(pub u32);

impl NamespaceId {
    pub const GLOBAL: NamespaceId = NamespaceId(0);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SymbolKey {
    namespace: NamespaceId,
    kind: SymbolKind,
    name: String,
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub node: NodeId,
    pub namespace: NamespaceId,
    pub kind: SymbolKind,
    pub name: String,
}

#[derive(Debug, Clone)]
struct NamespaceEntry {
    name: String,
    parent: Option<NamespaceId>,
}

/// The compilation-wide symbol table: template/custom/config/namespace
/// definitions, import edges for cycle detection, and the auto-incrementing
/// counters behind `generateUniqueClassName`/`generateUniqueIdName`.
#[derive(Debug, Default)]
pub struct SymbolMap {
    symbols: IndexMap<SymbolKey, SymbolEntry>,
    namespaces: Vec<NamespaceEntry>,
    current_namespace: NamespaceId,
    /// Import edges as (importing file, imported file) for cycle detection.
    import_edges: Vec<(String, String)>,
    class_counter: i64,
    id_counter: i64,
}

impl SymbolMap {
    pub fn new(index_initial_count: i64) -> Self {
        let mut map = SymbolMap {
            symbols: IndexMap::new(),
            namespaces: vec![NamespaceEntry { name: String::new(), parent: None }],
            current_namespace: NamespaceId::GLOBAL,
            import_edges: Vec::new(),
            class_counter: index_initial_count,
            id_counter: index_initial_count,
        };
        let _ = &mut map;
        map
    }

    pub fn create_namespace(&mut self, name: &str, parent: NamespaceId) -> NamespaceId {
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(NamespaceEntry { name: name.to_string(), parent: Some(parent) });
        id
    }

    pub fn set_current_namespace(&mut self, ns: NamespaceId) {
        self.current_namespace = ns;
    }

    pub fn current_namespace(&self) -> NamespaceId {
        self.current_namespace
    }

    /// Fully-qualified dotted path for a namespace, e.g. `a.b.c`.
    pub fn qualified_name(&self, ns: NamespaceId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(ns);
        while let Some(id) = cur {
            let entry = &self.namespaces[id.0 as usize];
            if entry.name.is_empty() {
                break;
            }
            parts.push(entry.name.clone());
            cur = entry.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    pub fn register(&mut self, namespace: NamespaceId, kind: SymbolKind, name: &str, node: NodeId) -> Result<(), String> {
        let key = SymbolKey { namespace, kind: kind.clone(), name: name.to_string() };
        if self.symbols.contains_key(&key) {
            return Err(format!(
                "duplicate definition of `{name}` in namespace `{}`",
                self.qualified_name(namespace)
            ));
        }
        self.symbols.insert(
            key,
            SymbolEntry { node, namespace, kind, name: name.to_string() },
        );
        Ok(())
    }

    pub fn lookup(&self, namespace: NamespaceId, kind: &SymbolKind, name: &str) -> Option<&SymbolEntry> {
        let key = SymbolKey { namespace, kind: kind.clone(), name: name.to_string() };
        self.symbols.get(&key).or_else(|| {
            // Fall back to the global namespace, matching the original's
            // "unqualified reference resolves through the default
            // namespace" rule.
            if namespace != NamespaceId::GLOBAL {
                let global_key = SymbolKey { namespace: NamespaceId::GLOBAL, kind: kind.clone(), name: name.to_string() };
                self.symbols.get(&global_key)
            } else {
                None
            }
        })
    }

    pub fn lookup_by_kind(&self, kind: &SymbolKind) -> Vec<&SymbolEntry> {
        self.symbols.values().filter(|e| &e.kind == kind).collect()
    }

    /// Finds a namespace by its own (non-qualified) name, for resolving a
    /// reference's `from <namespace>` qualifier.
    pub fn find_namespace(&self, name: &str) -> Option<NamespaceId> {
        self.namespaces.iter().position(|entry| entry.name == name).map(|idx| NamespaceId(idx as u32))
    }

    pub fn record_import(&mut self, from: &str, to: &str) {
        self.import_edges.push((from.to_string(), to.to_string()));
    }

    /// DFS cycle check over the recorded import edges (spec §4.7 "import
    /// resolution detects cycles").
    pub fn has_cycle(&self) -> Option<Vec<String>> {
        let mut adjacency: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (from, to) in &self.import_edges {
            adjacency.entry(from.as_str()).or_default().push(to.as_str());
        }

        let mut visiting: HashSet<&str> = HashSet::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            adjacency: &IndexMap<&'a str, Vec<&'a str>>,
            visiting: &mut HashSet<&'a str>,
            visited: &mut HashSet<&'a str>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            if visiting.contains(node) {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                return Some(stack[start..].iter().map(|s| s.to_string()).collect());
            }
            if visited.contains(node) {
                return None;
            }
            visiting.insert(node);
            stack.push(node);
            if let Some(next) = adjacency.get(node) {
                for n in next {
                    if let Some(cycle) = visit(n, adjacency, visiting, visited, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            visiting.remove(node);
            visited.insert(node);
            None
        }

        for node in adjacency.keys() {
            if let Some(cycle) = visit(node, &adjacency, &mut visiting, &mut visited, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// Next auto-generated class name for selector automation (spec §4.7.5),
    /// e.g. `chtl-auto-0`, honoring `INDEX_INITIAL_COUNT`.
    pub fn generate_unique_class_name(&mut self) -> String {
        let n = self.class_counter;
        self.class_counter += 1;
        format!("chtl-auto-{n}")
    }

    pub fn generate_unique_id_name(&mut self) -> String {
        let n = self.id_counter;
        self.id_counter += 1;
        format!("chtl-auto-id-{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;

    #[test]
    fn register_then_lookup_round_trips() {
        let mut map = SymbolMap::new(0);
        map.register(NamespaceId::GLOBAL, SymbolKind::TemplateStyle, "Box", NodeId(1)).unwrap();
        let found = map.lookup(NamespaceId::GLOBAL, &SymbolKind::TemplateStyle, "Box");
        assert!(found.is_some());
    }

    #[test]
    fn duplicate_registration_errors() {
        let mut map = SymbolMap::new(0);
        map.register(NamespaceId::GLOBAL, SymbolKind::TemplateStyle, "Box", NodeId(1)).unwrap();
        let err = map.register(NamespaceId::GLOBAL, SymbolKind::TemplateStyle, "Box", NodeId(2));
        assert!(err.is_err());
    }

    #[test]
    fn lookup_falls_back_to_global_namespace() {
        let mut map = SymbolMap::new(0);
        map.register(NamespaceId::GLOBAL, SymbolKind::TemplateStyle, "Box", NodeId(1)).unwrap();
        let ns = map.create_namespace("feature", NamespaceId::GLOBAL);
        let found = map.lookup(ns, &SymbolKind::TemplateStyle, "Box");
        assert!(found.is_some());
    }

    #[test]
    fn cycle_detection_finds_self_import_loop() {
        let mut map = SymbolMap::new(0);
        map.record_import("a.chtl", "b.chtl");
        map.record_import("b.chtl", "a.chtl");
        assert!(map.has_cycle().is_some());
    }

    #[test]
    fn no_cycle_for_dag_imports() {
        let mut map = SymbolMap::new(0);
        map.record_import("a.chtl", "b.chtl");
        map.record_import("b.chtl", "c.chtl");
        assert!(map.has_cycle().is_none());
    }

    #[test]
    fn unique_names_respect_initial_count() {
        let mut map = SymbolMap::new(5);
        assert_eq!(map.generate_unique_class_name(), "chtl-auto-5");
        assert_eq!(map.generate_unique_class_name(), "chtl-auto-6");
    }
}
