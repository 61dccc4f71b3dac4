//! Cross-file import resolution (spec §4.7 pass 1).
//!
//! Grounded in the teacher's `discovery.rs` (file-graph walking) for the
//! loader abstraction, and `symbols.rs`'s `has_cycle` for cycle detection —
//! generalized from the teacher's single-project file discovery to CHTL's
//! per-import graph that must reject cycles before any definition is used.

use std::collections::HashSet;

use crate::ast::{Arena, Node, NodeId};
use crate::diagnostics::{CompileError, Diagnostic, DiagnosticCode};
use crate::symbols::SymbolMap;

/// Abstracts file loading so the resolver never touches `std::fs` directly,
/// matching the teacher's pattern of injecting a `FileSystem`-like trait
/// into `discovery.rs` rather than calling `std::fs` inline.
pub trait SourceLoader {
    fn load(&self, path: &str) -> std::io::Result<String>;
    /// Resolves an import path relative to the file that imported it.
    fn resolve_path(&self, importing_file: &str, import_path: &str) -> String;
}

/// A loader backed directly by the filesystem, used by the CLI binary.
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn resolve_path(&self, importing_file: &str, import_path: &str) -> String {
        if import_path.starts_with('.') {
            let base = std::path::Path::new(importing_file).parent().unwrap_or_else(|| std::path::Path::new("."));
            base.join(import_path).to_string_lossy().into_owned()
        } else {
            import_path.to_string()
        }
    }
}

/// Parses `entry_path`, then recursively follows `[Import] @Chtl "..."`
/// declarations, grafting each imported file's top-level Template/Custom
/// definitions into the returned arena. Returns [`CompileError::Fatal`] on
/// an import cycle. Each file (entry and every import) discovers and
/// applies its own `[Configuration]` independently, since configuration is
/// not shared across file boundaries (spec §4.9).
pub fn resolve_imports(
    entry_path: &str,
    entry_source: &str,
    loader: &dyn SourceLoader,
) -> Result<(Arena, Vec<Diagnostic>), CompileError> {
    let mut diagnostics = Vec::new();
    let parsed = super::parse_file_with_its_own_configuration(entry_source, entry_path);
    diagnostics.extend(parsed.diagnostics);
    let mut arena = parsed.arena;

    let mut symbols = SymbolMap::new(0);
    let mut visiting = HashSet::new();
    visiting.insert(entry_path.to_string());
    load_imports_recursive(&mut arena, NodeId::ROOT, entry_path, loader, &mut symbols, &mut visiting, &mut diagnostics)?;

    if let Some(cycle) = symbols.has_cycle() {
        return Err(CompileError::Fatal(Diagnostic::error(
            DiagnosticCode::Resolution,
            entry_path,
            1,
            1,
            format!("import cycle detected: {}", cycle.join(" -> ")),
        )));
    }

    Ok((arena, diagnostics))
}

fn load_imports_recursive(
    arena: &mut Arena,
    at: NodeId,
    current_path: &str,
    loader: &dyn SourceLoader,
    symbols: &mut SymbolMap,
    visiting: &mut HashSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), CompileError> {
    let import_nodes: Vec<NodeId> = arena
        .children_of(at)
        .iter()
        .copied()
        .filter(|id| matches!(arena.node(*id), Node::ImportDecl(decl) if matches!(decl.kind, crate::ast::AtType::Chtl)))
        .collect();

    for import_id in import_nodes {
        let decl = match arena.node(import_id) {
            Node::ImportDecl(decl) => decl.clone(),
            _ => continue,
        };
        let resolved = loader.resolve_path(current_path, &decl.path);
        symbols.record_import(current_path, &resolved);

        if visiting.contains(&resolved) {
            continue; // surfaced by the has_cycle() check in resolve_imports
        }

        let source = match loader.load(&resolved) {
            Ok(s) => s,
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::Io,
                    current_path,
                    1,
                    1,
                    format!("cannot read imported file `{resolved}`: {e}"),
                ));
                continue;
            }
        };

        let parsed = super::parse_file_with_its_own_configuration(&source, &resolved);
        diagnostics.extend(parsed.diagnostics);

        for child in parsed.arena.children_of(NodeId::ROOT).to_vec() {
            graft(arena, &parsed.arena, child, NodeId::ROOT);
        }

        visiting.insert(resolved.clone());
        load_imports_recursive(arena, NodeId::ROOT, &resolved, loader, symbols, visiting, diagnostics)?;
        visiting.remove(&resolved);
    }

    Ok(())
}

/// Deep-copies a node subtree from `src` into `dest`, preserving child
/// order (spec §3 invariant 1).
fn graft(dest: &mut Arena, src: &Arena, src_node: NodeId, dest_parent: NodeId) -> NodeId {
    let entry = src.get(src_node);
    let new_id = dest.push(entry.node.clone(), dest_parent, entry.position);
    for child in src.children_of(src_node).to_vec() {
        graft(dest, src, child, new_id);
    }
    new_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeLoader(RefCell<HashMap<String, String>>);

    impl SourceLoader for FakeLoader {
        fn load(&self, path: &str) -> std::io::Result<String> {
            self.0
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
        }

        fn resolve_path(&self, _importing_file: &str, import_path: &str) -> String {
            import_path.to_string()
        }
    }

    #[test]
    fn grafts_imported_template_into_entry_arena() {
        let mut files = HashMap::new();
        files.insert("lib.chtl".to_string(), "[Template] @Style Box { width: 1px; }".to_string());
        let loader = FakeLoader(RefCell::new(files));
        let (arena, diags) = resolve_imports("main.chtl", "[Import] @Chtl from \"lib.chtl\";", &loader).unwrap();
        assert!(diags.iter().all(|d| !d.is_error()));
        assert!(arena.children_of(NodeId::ROOT).iter().any(|id| matches!(arena.node(*id), Node::TemplateStyle { .. })));
    }

    #[test]
    fn detects_import_cycle() {
        let mut files = HashMap::new();
        files.insert("a.chtl".to_string(), "[Import] @Chtl from \"b.chtl\";".to_string());
        files.insert("b.chtl".to_string(), "[Import] @Chtl from \"a.chtl\";".to_string());
        let loader = FakeLoader(RefCell::new(files));
        let result = resolve_imports("a.chtl", "[Import] @Chtl from \"b.chtl\";", &loader);
        assert!(result.is_err());
    }
}
