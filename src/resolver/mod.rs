//! Semantic resolution (C6, spec §4.7): the ordered passes that turn a
//! freshly-parsed [`Arena`] into one ready for code generation.
//!
//! Grounded in the teacher's `transform.rs` (`TransformPass` sequence run
//! over the AST) and `finalize.rs` (post-pass invariant checks);
//! generalized from JSX's prop/child normalization passes to CHTL's
//! namespace population, reference expansion, specialization, inheritance,
//! constraint checking, and selector automation.

mod constraints;
pub mod imports;
pub mod selector_automation;
mod specialize;

use crate::ast::{Arena, AtType, Node, NodeId, SymbolKind};
use crate::config::{CompilerConfig, ConfigurationEngine};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::symbols::{NamespaceId, SymbolMap};

pub struct ResolveOutput {
    pub arena: Arena,
    pub config: CompilerConfig,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs every pass in spec §4.7's fixed order over one already-parsed file.
/// Cross-file import resolution is handled by [`imports`] before this is
/// called; this function assumes all definitions reachable from `arena`
/// (including imported ones) have already been merged in by the caller.
pub fn resolve(mut arena: Arena, path: &str) -> ResolveOutput {
    let mut bag = DiagnosticBag::new(false);
    let mut symbols = SymbolMap::new(0);
    let mut engine = ConfigurationEngine::new();

    activate_configuration(&arena, &mut engine, &mut bag, path);
    let config = engine.active_config();
    symbols = SymbolMap::new(config.index_initial_count);

    populate_namespace(&arena, NodeId::ROOT, NamespaceId::GLOBAL, &mut symbols, &mut bag, path);
    specialize::expand_references(&mut arena, &symbols, &mut bag, path);
    specialize::apply_inheritance(&mut arena, &symbols, &mut bag, path);
    specialize::resolve_var_refs(&mut arena, &mut bag, path);
    constraints::check_except_constraints(&arena, &mut bag, path);
    selector_automation::apply(&mut arena, &config, &mut symbols);

    ResolveOutput { arena, config, diagnostics: bag.into_vec() }
}

/// Parses `source` twice when it declares its own configuration: once with
/// the default config to discover any `[Configuration]`/`use @Config`
/// directives (which can only be found after parsing), then again with the
/// real [`CompilerConfig`] so keyword aliasing actually affects lexing
/// (spec §4.9 — config is a property of the token stream, not just a
/// post-parse annotation). Files with no configuration directive parse
/// once, since a second pass would be a no-op.
pub fn parse_file_with_its_own_configuration(source: &str, path: &str) -> crate::parser::ParseOutput {
    let discovery = crate::parser::parse_source(source, path, &CompilerConfig::default());
    if !file_declares_configuration(&discovery.arena) {
        return discovery;
    }

    let mut bag = DiagnosticBag::new(false);
    let mut engine = ConfigurationEngine::new();
    activate_configuration(&discovery.arena, &mut engine, &mut bag, path);
    let real_config = engine.active_config();

    let mut reparsed = crate::parser::parse_source(source, path, &real_config);
    reparsed.diagnostics.extend(bag.into_vec());
    reparsed
}

fn file_declares_configuration(arena: &Arena) -> bool {
    walk(arena, NodeId::ROOT).into_iter().any(|id| {
        matches!(
            arena.node(id),
            Node::ConfigurationGroup { .. } | Node::UseDecl(crate::ast::UseKind::Config(_))
        )
    })
}

/// Pass 1 (of the intra-file passes): find `[Configuration]` groups and any
/// `use @Config Name;` activation, registering each group with `engine`.
fn activate_configuration(arena: &Arena, engine: &mut ConfigurationEngine, bag: &mut DiagnosticBag, path: &str) {
    let mut to_activate = None;
    for id in walk(arena, NodeId::ROOT) {
        match arena.node(id) {
            Node::ConfigurationGroup { name, options, name_aliases, origin_types } => {
                let mut cfg = CompilerConfig::default();
                cfg.name = name.clone();
                for (key, value) in options {
                    cfg.apply_known_option(key, value.clone());
                }
                for (canonical, alias) in name_aliases {
                    cfg.name_aliases.insert(canonical.clone(), alias.clone());
                }
                for marker in origin_types {
                    cfg.origin_types.insert(marker.clone(), ());
                }
                engine.register(cfg);
            }
            Node::UseDecl(crate::ast::UseKind::Config(name)) => {
                to_activate = Some(name.clone());
            }
            _ => {}
        }
    }
    if let Some(name) = to_activate {
        if engine.activate(&name).is_err() {
            bag.push(Diagnostic::error(DiagnosticCode::Semantic, path, 1, 1, format!("unknown configuration group `{name}`")));
        }
    } else if engine.get("default").is_none() {
        engine.register(CompilerConfig::default());
        let _ = engine.activate("default");
    }
}

/// Pass 2: register every `[Template]`/`[Custom]` definition and
/// `[Namespace]` block into the symbol map, recursing into namespace bodies
/// with the namespace's own id as the registration scope.
fn populate_namespace(arena: &Arena, at: NodeId, ns: NamespaceId, symbols: &mut SymbolMap, bag: &mut DiagnosticBag, path: &str) {
    symbols.set_current_namespace(ns);
    for child in arena.children_of(at).to_vec() {
        match arena.node(child) {
            Node::Namespace { name } => {
                let child_ns = symbols.create_namespace(name, ns);
                populate_namespace(arena, child, child_ns, symbols, bag, path);
            }
            Node::TemplateStyle { name, .. } => register(symbols, bag, path, ns, SymbolKind::TemplateStyle, name, child),
            Node::TemplateElement { name, .. } => register(symbols, bag, path, ns, SymbolKind::TemplateElement, name, child),
            Node::TemplateVar { name, .. } => register(symbols, bag, path, ns, SymbolKind::TemplateVar, name, child),
            Node::CustomStyle { name, .. } => register(symbols, bag, path, ns, SymbolKind::CustomStyle, name, child),
            Node::CustomElement { name, .. } => register(symbols, bag, path, ns, SymbolKind::CustomElement, name, child),
            Node::CustomVar { name, .. } => register(symbols, bag, path, ns, SymbolKind::CustomVar, name, child),
            _ => {}
        }
    }
}

fn register(symbols: &mut SymbolMap, bag: &mut DiagnosticBag, path: &str, ns: NamespaceId, kind: SymbolKind, name: &str, node: NodeId) {
    if let Err(message) = symbols.register(ns, kind, name, node) {
        bag.push(Diagnostic::error(DiagnosticCode::Semantic, path, 1, 1, message));
    }
}

/// Depth-first pre-order walk, used by passes that need to visit every node
/// once without mutating structure mid-walk.
pub(crate) fn walk(arena: &Arena, from: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        out.push(id);
        let children = arena.children_of(id);
        for child in children.iter().rev() {
            stack.push(*child);
        }
    }
    out
}

pub(crate) fn resolve_symbol_kind(at_type: &AtType, is_custom_context: bool) -> Option<SymbolKind> {
    at_type.symbol_kind(is_custom_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    #[test]
    fn default_configuration_activates_when_none_declared() {
        let config = CompilerConfig::default();
        let out = crate::parser::parse_source("div { text { \"hi\" } }", "t.chtl", &config);
        let result = resolve(out.arena, "t.chtl");
        assert_eq!(result.config.name, "default");
    }

    /// A `[Name]` alias changes what the *lexer* recognizes as the
    /// `inherit` keyword, so discovering it requires a real reparse rather
    /// than a post-hoc annotation of the first parse's tree.
    #[test]
    fn name_alias_from_own_configuration_is_honored_while_lexing() {
        let source = r#"
            [Configuration] @Config C {
                [Name] {
                    inherit: extends;
                }
            }
            use @Config C;
            [Template] @Style Base { width: 1px; }
            [Template] @Style Child {
                extends @Style Base;
            }
        "#;
        let out = parse_file_with_its_own_configuration(source, "t.chtl");
        assert!(out.diagnostics.iter().all(|d| !d.is_error()), "{:?}", out.diagnostics);
        let child = walk(&out.arena, NodeId::ROOT)
            .into_iter()
            .find_map(|id| match out.arena.node(id) {
                Node::TemplateStyle { name, inherits, .. } if name == "Child" => Some(inherits.clone()),
                _ => None,
            })
            .expect("Child template style");
        assert_eq!(child, vec!["@Style Base".to_string()]);
    }

    #[test]
    fn file_without_configuration_parses_once() {
        let out = parse_file_with_its_own_configuration("div { text { \"hi\" } }", "t.chtl");
        assert!(out.diagnostics.iter().all(|d| !d.is_error()));
    }
}
