//! Constraint checking (spec §4.7 pass 7): `except` declarations forbid a
//! named tag, template/custom reference, or origin kind from appearing
//! within the scope they're declared in.
//!
//! Grounded in the teacher's `validate.rs` (post-transform structural
//! checks run as a dedicated pass after transformation, not interleaved
//! with it). Runs after `specialize::expand_references`, so a forbidden
//! `Reference` node is long gone by the time this pass walks the tree; it
//! checks the grafted nodes' `resolved_symbol` (stamped by
//! [`super::specialize`] with the originating template/custom name) instead
//! of matching a node kind that no longer exists.

use crate::ast::{AtType, Node, NodeId};
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};

pub fn check_except_constraints(arena: &crate::ast::Arena, bag: &mut DiagnosticBag, path: &str) {
    check_scope(arena, NodeId::ROOT, &[], bag, path);
}

fn origin_marker(at_type: &AtType) -> String {
    match at_type {
        AtType::Html => "@Html".to_string(),
        AtType::JavaScript => "@JavaScript".to_string(),
        AtType::Style => "@Style".to_string(),
        AtType::Element => "@Element".to_string(),
        AtType::Var => "@Var".to_string(),
        AtType::Chtl => "@Chtl".to_string(),
        AtType::CJmod => "@CJmod".to_string(),
        AtType::Config => "@Config".to_string(),
        AtType::Custom(name) => format!("@{name}"),
    }
}

fn check_scope(arena: &crate::ast::Arena, at: NodeId, forbidden: &[String], bag: &mut DiagnosticBag, path: &str) {
    let mut scoped_forbidden = forbidden.to_vec();
    for child in arena.children_of(at) {
        if let Node::ExceptNode { targets } = arena.node(*child) {
            scoped_forbidden.extend(targets.iter().map(|t| t.selector.clone()));
        }
    }

    for child in arena.children_of(at).to_vec() {
        let violating_name = match arena.node(child) {
            Node::Element { tag, .. } if scoped_forbidden.iter().any(|f| f == tag) => Some(tag.clone()),
            Node::OriginBlock { origin_type, .. } => {
                let marker = origin_marker(origin_type);
                if scoped_forbidden.iter().any(|f| f == &marker) { Some(marker) } else { None }
            }
            _ => None,
        }
        .or_else(|| match &arena.get(child).resolved_symbol {
            Some(sym) if scoped_forbidden.iter().any(|f| f == sym) => Some(sym.clone()),
            _ => None,
        });

        if let Some(name) = violating_name {
            let pos = arena.get(child).position;
            bag.push(Diagnostic::error(
                DiagnosticCode::Semantic,
                path,
                pos.line,
                pos.column,
                format!("`{name}` is excluded by an `except` constraint in this scope"),
            ));
        }
        check_scope(arena, child, &scoped_forbidden, bag, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    #[test]
    fn except_forbids_matching_child_tag() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { except span; span { text { \"x\" } } }", "t.chtl", &config);
        let mut bag = DiagnosticBag::new(false);
        check_except_constraints(&parsed.arena, &mut bag, "t.chtl");
        assert!(bag.has_errors());
    }

    #[test]
    fn except_does_not_affect_sibling_scopes() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { except span; } p { span { text { \"x\" } } }", "t.chtl", &config);
        let mut bag = DiagnosticBag::new(false);
        check_except_constraints(&parsed.arena, &mut bag, "t.chtl");
        assert!(!bag.has_errors());
    }

    #[test]
    fn except_forbids_custom_element_reference_after_expansion() {
        use crate::symbols::{NamespaceId, SymbolMap};

        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(
            "[Custom] @Element Box { span { text { \"a\" } } } div { except Box; @Element Box; }",
            "t.chtl",
            &config,
        );
        let mut arena = parsed.arena;
        let mut symbols = SymbolMap::new(0);
        let mut bag = DiagnosticBag::new(false);
        super::populate_namespace(&arena, NodeId::ROOT, NamespaceId::GLOBAL, &mut symbols, &mut bag, "t.chtl");
        super::specialize::expand_references(&mut arena, &symbols, &mut bag, "t.chtl");
        check_except_constraints(&arena, &mut bag, "t.chtl");
        assert!(bag.has_errors());
    }

    #[test]
    fn except_forbids_origin_kind_block() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(
            "div { except @Html; [Origin] @Html { <b>raw</b> } }",
            "t.chtl",
            &config,
        );
        let mut bag = DiagnosticBag::new(false);
        check_except_constraints(&parsed.arena, &mut bag, "t.chtl");
        assert!(bag.has_errors());
    }
}
