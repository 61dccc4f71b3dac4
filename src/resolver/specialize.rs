//! Reference expansion, inheritance merging, and specialization (spec
//! §4.6, §4.7 passes 4-6).
//!
//! Grounded in the teacher's `component.rs` (component instantiation +
//! prop override merging): CHTL's `@Style Box;` reference plays the role
//! the teacher's component-instantiation call plays, and `delete`/`insert`/
//! `replace` play the role the teacher's prop-override map plays, just
//! expressed as an ordered op list instead of a single merge.

use std::collections::HashMap;

use crate::ast::{AtType, AttributeValue, InlineDecl, Node, NodeId, PositionKeyword, SpecArg, SpecOp, SymbolKind, ValueLiteral};
use crate::ast::Arena;
use crate::diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
use crate::symbols::{NamespaceId, SymbolMap};
use crate::token::Position;

/// Pass 4: replace every `Reference` node with the (specialized, inherited)
/// body of the template/custom it names.
pub fn expand_references(arena: &mut Arena, symbols: &SymbolMap, bag: &mut DiagnosticBag, path: &str) {
    let mut worklist: Vec<NodeId> = super::walk(arena, NodeId::ROOT)
        .into_iter()
        .filter(|id| matches!(arena.node(*id), Node::Reference { .. }))
        .collect();

    // Process innermost references first so a reference nested inside a
    // Custom's specialization body is expanded before its enclosing
    // reference is grafted outward.
    worklist.sort_by_key(|id| std::cmp::Reverse(id.0));

    for reference_id in worklist {
        expand_one(arena, reference_id, symbols, bag, path);
    }
}

fn expand_one(arena: &mut Arena, reference_id: NodeId, symbols: &SymbolMap, bag: &mut DiagnosticBag, path: &str) {
    let (at_type, name, spec_args, from) = match arena.node(reference_id) {
        Node::Reference { at_type, qualified_name, spec_args, from, .. } => (at_type.clone(), qualified_name.clone(), spec_args.clone(), from.clone()),
        _ => return,
    };
    let parent = match arena.parent_of(reference_id) {
        Some(p) => p,
        None => return,
    };

    let definition = lookup_definition(symbols, &at_type, &name, from.as_deref());
    let definition = match definition {
        Some(id) => id,
        None => {
            bag.push(Diagnostic::error(DiagnosticCode::Resolution, path, 1, 1, format!("unresolved reference to `{name}`")));
            return;
        }
    };

    let index = arena.children_of(parent).iter().position(|id| *id == reference_id).unwrap_or(0);
    arena.remove_child(parent, reference_id);

    match arena.node(definition).clone() {
        Node::TemplateStyle { properties, .. } => {
            let mut props = properties;
            apply_style_ops(&mut props, &collect_ops(arena, definition));
            apply_style_ops(&mut props, &spec_args_to_ops(&spec_args));
            for (offset, decl) in props.into_iter().enumerate() {
                let pos = arena.get(reference_id).position;
                arena.insert_at(Node::InlineStyleDecl(decl), parent, index + offset, pos);
            }
        }
        Node::CustomStyle { properties, valueless, .. } => {
            let mut props = properties;
            apply_style_ops(&mut props, &collect_ops(arena, definition));
            fill_valueless(&mut props, &valueless, &spec_args, &name, reference_id, arena, bag, path);
            apply_style_ops(&mut props, &spec_args_to_ops(&spec_args));
            for (offset, decl) in props.into_iter().enumerate() {
                let pos = arena.get(reference_id).position;
                arena.insert_at(Node::InlineStyleDecl(decl), parent, index + offset, pos);
            }
        }
        Node::TemplateElement { .. } | Node::CustomElement { .. } => {
            let mut inserted_at = index;
            for child in arena.children_of(definition).to_vec() {
                let new_id = graft_in_place(arena, child, parent, inserted_at);
                arena.get_mut(new_id).resolved_symbol = Some(name.clone());
                inserted_at += 1;
            }
            apply_element_ops(arena, parent, index, &collect_ops(arena, definition));
            apply_element_ops(arena, parent, index, &spec_args_to_ops(&spec_args));
        }
        Node::TemplateVar { .. } | Node::CustomVar { .. } => {
            // Var groups are referenced by value (`ThemeColor(tableColor)`)
            // rather than spliced as nodes; nothing to graft here.
        }
        _ => {}
    }
}

/// Fills in each of a `CustomStyle`'s `valueless` properties from the
/// matching `SpecArg::Attribute` supplied at the reference's use site (spec
/// §3 invariant 5), emitting a Resolution error for any key left uncovered.
fn fill_valueless(
    props: &mut Vec<InlineDecl>,
    valueless: &[String],
    spec_args: &[SpecArg],
    name: &str,
    reference_id: NodeId,
    arena: &Arena,
    bag: &mut DiagnosticBag,
    path: &str,
) {
    for key in valueless {
        let provided = spec_args.iter().find_map(|arg| match arg {
            SpecArg::Attribute { name: attr_name, value } if attr_name == key => Some(value.clone()),
            _ => None,
        });
        match provided {
            Some(value) => props.push(InlineDecl { property: key.clone(), value }),
            None => {
                let pos = arena.get(reference_id).position;
                bag.push(Diagnostic::error(
                    DiagnosticCode::Resolution,
                    path,
                    pos.line,
                    pos.column,
                    format!("missing value for valueless property `{key}` of `{name}`"),
                ));
            }
        }
    }
}

/// Resolves a reference to its definition node. A `from <namespace>`
/// qualifier is resolved to that namespace's id first; an unqualified
/// reference (or one naming an unknown namespace) looks up through the
/// global namespace, which in turn falls back per [`SymbolMap::lookup`].
fn lookup_definition(symbols: &SymbolMap, at_type: &AtType, name: &str, from: Option<&str>) -> Option<NodeId> {
    let namespace = from.and_then(|ns| symbols.find_namespace(ns)).unwrap_or(NamespaceId::GLOBAL);
    for is_custom in [false, true] {
        if let Some(kind) = at_type.symbol_kind(is_custom) {
            if let Some(entry) = symbols.lookup(namespace, &kind, name) {
                return Some(entry.node);
            }
        }
    }
    None
}

fn collect_ops(arena: &Arena, definition: NodeId) -> Vec<SpecOp> {
    match arena.node(definition) {
        Node::CustomStyle { ops, .. } | Node::CustomElement { ops, .. } | Node::CustomVar { ops, .. } => ops.clone(),
        _ => Vec::new(),
    }
}

fn spec_args_to_ops(spec_args: &[SpecArg]) -> Vec<SpecOp> {
    spec_args
        .iter()
        .filter_map(|arg| match arg {
            SpecArg::Op(op) => Some(op.clone()),
            SpecArg::Attribute { .. } => None,
        })
        .collect()
}

/// Applies `delete`/`replace`(as a value override) ops to a flat property
/// list, in declaration order (later ops win, spec §4.6.5).
fn apply_style_ops(props: &mut Vec<InlineDecl>, ops: &[SpecOp]) {
    for op in ops {
        match op {
            SpecOp::DeleteProp(name) => props.retain(|p| &p.property != name),
            SpecOp::ModifyProp { name, value } => {
                if let Some(existing) = props.iter_mut().find(|p| &p.property == name) {
                    existing.value = value.clone();
                } else {
                    props.push(InlineDecl { property: name.clone(), value: value.clone() });
                }
            }
            _ => {}
        }
    }
}

/// Applies element-level `delete`/`insert`/`replace` ops over the children
/// grafted at `[index, index + n)` under `parent`.
fn apply_element_ops(arena: &mut Arena, parent: NodeId, base_index: usize, ops: &[SpecOp]) {
    for op in ops {
        match op {
            SpecOp::DeleteElement(target) => {
                if let Some(id) = find_target(arena, parent, target) {
                    arena.remove_child(parent, id);
                }
            }
            SpecOp::ReplaceElement { target, body } => {
                if let Some(id) = find_target(arena, parent, target) {
                    let idx = arena.children_of(parent).iter().position(|c| *c == id).unwrap_or(base_index);
                    arena.remove_child(parent, id);
                    for (offset, new_child) in body.iter().enumerate() {
                        let pos = arena.get(*new_child).position;
                        let node = arena.node(*new_child).clone();
                        arena.insert_at(node, parent, idx + offset, pos);
                    }
                }
            }
            SpecOp::InsertElement { position, target, body } => {
                let anchor = find_target(arena, parent, target);
                let insert_idx = match (position, anchor) {
                    (PositionKeyword::AtTop, _) => 0,
                    (PositionKeyword::AtBottom, _) => arena.children_of(parent).len(),
                    (PositionKeyword::After, Some(id)) => {
                        arena.children_of(parent).iter().position(|c| *c == id).map(|i| i + 1).unwrap_or(arena.children_of(parent).len())
                    }
                    (PositionKeyword::Before, Some(id)) => {
                        arena.children_of(parent).iter().position(|c| *c == id).unwrap_or(0)
                    }
                    _ => arena.children_of(parent).len(),
                };
                for (offset, new_child) in body.iter().enumerate() {
                    let pos = arena.get(*new_child).position;
                    let node = arena.node(*new_child).clone();
                    arena.insert_at(node, parent, insert_idx + offset, pos);
                }
            }
            _ => {}
        }
    }
}

fn find_target(arena: &Arena, parent: NodeId, target: &crate::ast::Target) -> Option<NodeId> {
    let mut matches = arena.children_of(parent).iter().copied().filter(|id| match arena.node(*id) {
        Node::Element { tag, .. } => tag == &target.selector,
        _ => false,
    });
    match target.index {
        Some(idx) => matches.nth(idx as usize),
        None => matches.next(),
    }
}

fn graft_in_place(arena: &mut Arena, src: NodeId, dest_parent: NodeId, index: usize) -> NodeId {
    let node = arena.node(src).clone();
    let position = arena.get(src).position;
    let children = arena.children_of(src).to_vec();
    let new_id = arena.insert_at(node, dest_parent, index, position);
    for child in children {
        let child_index = arena.children_of(new_id).len();
        graft_in_place(arena, child, new_id, child_index);
    }
    new_id
}

/// Pass 5: merge `inherit @Element Base;` bodies into the inheriting
/// Template/Custom, prepending the parent's members before the child's own
/// (child members still declared after can further specialize via their
/// own delete/insert/replace ops, spec §4.6.4).
pub fn apply_inheritance(arena: &mut Arena, symbols: &SymbolMap, bag: &mut DiagnosticBag, path: &str) {
    let defs: Vec<NodeId> = super::walk(arena, NodeId::ROOT)
        .into_iter()
        .filter(|id| {
            matches!(
                arena.node(*id),
                Node::TemplateStyle { .. }
                    | Node::TemplateElement { .. }
                    | Node::TemplateVar { .. }
                    | Node::CustomStyle { .. }
                    | Node::CustomElement { .. }
                    | Node::CustomVar { .. }
            )
        })
        .collect();

    for def in defs {
        let inherits = match arena.node(def) {
            Node::TemplateStyle { inherits, .. }
            | Node::TemplateElement { inherits, .. }
            | Node::TemplateVar { inherits, .. }
            | Node::CustomStyle { inherits, .. }
            | Node::CustomElement { inherits, .. }
            | Node::CustomVar { inherits, .. } => inherits.clone(),
            _ => Vec::new(),
        };
        for parent_ref in inherits {
            let parent_name = parent_ref.rsplit(' ').next().unwrap_or(&parent_ref).to_string();
            let kind = def_symbol_kind(arena.node(def));
            let parent_node = kind.and_then(|k| symbols.lookup(NamespaceId::GLOBAL, &k, &parent_name)).map(|e| e.node);
            match parent_node {
                Some(parent_id) => merge_inherited(arena, def, parent_id),
                None => bag.push(Diagnostic::error(DiagnosticCode::Resolution, path, 1, 1, format!("unresolved inherit target `{parent_name}`"))),
            }
        }
    }
}

fn def_symbol_kind(node: &Node) -> Option<SymbolKind> {
    match node {
        Node::TemplateStyle { .. } => Some(SymbolKind::TemplateStyle),
        Node::CustomStyle { .. } => Some(SymbolKind::CustomStyle),
        Node::TemplateElement { .. } => Some(SymbolKind::TemplateElement),
        Node::CustomElement { .. } => Some(SymbolKind::CustomElement),
        Node::TemplateVar { .. } => Some(SymbolKind::TemplateVar),
        Node::CustomVar { .. } => Some(SymbolKind::CustomVar),
        _ => None,
    }
}

fn merge_inherited(arena: &mut Arena, def: NodeId, parent_def: NodeId) {
    match (arena.node(parent_def).clone(), arena.node(def).clone()) {
        (Node::TemplateStyle { properties: parent_props, .. }, Node::TemplateStyle { .. })
        | (Node::CustomStyle { properties: parent_props, .. }, Node::CustomStyle { .. }) => {
            if let Node::TemplateStyle { properties, .. } | Node::CustomStyle { properties, .. } = &mut arena.get_mut(def).node {
                let mut merged = parent_props;
                merged.retain(|p| !properties.iter().any(|c: &InlineDecl| c.property == p.property));
                merged.append(properties);
                *properties = merged;
            }
        }
        (Node::TemplateVar { vars: parent_vars, .. }, Node::TemplateVar { .. })
        | (Node::CustomVar { vars: parent_vars, .. }, Node::CustomVar { .. }) => {
            if let Node::TemplateVar { vars, .. } | Node::CustomVar { vars, .. } = &mut arena.get_mut(def).node {
                let mut merged: Vec<(String, ValueLiteral)> = parent_vars;
                merged.retain(|(name, _)| !vars.iter().any(|(n, _)| n == name));
                merged.append(vars);
                *vars = merged;
            }
        }
        (Node::TemplateElement { .. }, Node::TemplateElement { .. }) | (Node::CustomElement { .. }, Node::CustomElement { .. }) => {
            let children = arena.children_of(parent_def).to_vec();
            for (offset, child) in children.into_iter().enumerate() {
                graft_in_place(arena, child, def, offset);
            }
        }
        _ => {}
    }
}

/// Pass 6: resolve every `ThemeColor(tableColor)`-style `ValueLiteral::VarRef`
/// against the (already inheritance-merged) `[Template] @Var`/`[Custom] @Var`
/// groups in the tree. Var references have no `from <namespace>` qualifier
/// in the grammar (spec §3), so — matching the inherit-target resolution
/// choice in [`apply_inheritance`] — lookup always goes through a flat,
/// namespace-less table rather than `SymbolMap`.
pub fn resolve_var_refs(arena: &mut Arena, bag: &mut DiagnosticBag, path: &str) {
    let mut table: HashMap<String, HashMap<String, ValueLiteral>> = HashMap::new();
    for id in super::walk(arena, NodeId::ROOT) {
        match arena.node(id) {
            Node::TemplateVar { name, vars, .. } | Node::CustomVar { name, vars, .. } => {
                table.insert(name.clone(), vars.iter().cloned().collect());
            }
            _ => {}
        }
    }

    for id in super::walk(arena, NodeId::ROOT) {
        let pos = arena.get(id).position;
        match &mut arena.get_mut(id).node {
            Node::InlineStyleDecl(decl) => resolve_value(&mut decl.value, &table, bag, path, pos),
            Node::StyleSelectorRule(rule) => {
                for decl in &mut rule.declarations {
                    resolve_value(&mut decl.value, &table, bag, path, pos);
                }
            }
            Node::Element { attributes, .. } => {
                for attr in attributes.iter_mut() {
                    if let AttributeValue::Literal(value) = &mut attr.value {
                        resolve_value(value, &table, bag, path, pos);
                    }
                }
            }
            _ => {}
        }
    }
}

fn resolve_value(value: &mut ValueLiteral, table: &HashMap<String, HashMap<String, ValueLiteral>>, bag: &mut DiagnosticBag, path: &str, pos: Position) {
    if let ValueLiteral::VarRef { template, key } = value {
        match table.get(template).and_then(|vars| vars.get(key)) {
            Some(resolved) => *value = resolved.clone(),
            None => {
                bag.push(Diagnostic::error(
                    DiagnosticCode::Resolution,
                    path,
                    pos.line,
                    pos.column,
                    format!("unresolved variable reference `{template}({key})`"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    fn resolve(src: &str) -> (Arena, Vec<Diagnostic>) {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(src, "t.chtl", &config);
        let mut arena = parsed.arena;
        let mut symbols = SymbolMap::new(0);
        let mut bag = DiagnosticBag::new(false);
        super::populate_namespace(&arena, NodeId::ROOT, NamespaceId::GLOBAL, &mut symbols, &mut bag, "t.chtl");
        expand_references(&mut arena, &symbols, &mut bag, "t.chtl");
        apply_inheritance(&mut arena, &symbols, &mut bag, "t.chtl");
        (arena, bag.into_vec())
    }

    #[test]
    fn template_style_reference_expands_to_inline_decls() {
        let (arena, diags) = resolve("[Template] @Style Box { width: 100px; } div { style { @Style Box; } }");
        assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
        let div = arena.children_of(NodeId::ROOT).iter().find(|id| matches!(arena.node(**id), Node::Element { .. })).copied().unwrap();
        let style_block = arena.children_of(div)[0];
        assert!(matches!(arena.node(arena.children_of(style_block)[0]), Node::InlineStyleDecl(_)));
    }

    #[test]
    fn namespaced_reference_resolves_through_its_declared_namespace() {
        let (arena, diags) = resolve(
            "[Namespace] ui { [Template] @Style Accent { color: red; } } div { style { @Style Accent from ui; } }",
        );
        assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
        let div = arena.children_of(NodeId::ROOT).iter().find(|id| matches!(arena.node(**id), Node::Element { .. })).copied().unwrap();
        let style_block = arena.children_of(div)[0];
        match arena.node(arena.children_of(style_block)[0]) {
            Node::InlineStyleDecl(decl) => assert_eq!(decl.value.raw(), "red"),
            other => panic!("expected inline style decl, got {other:?}"),
        }
    }

    #[test]
    fn custom_style_valueless_property_is_filled_from_spec_args() {
        let (arena, diags) = resolve(
            "[Custom] @Style Card { width: 100px; color; } div { style { @Style Card { color: red; } } }",
        );
        assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
        let div = arena.children_of(NodeId::ROOT).iter().find(|id| matches!(arena.node(**id), Node::Element { .. })).copied().unwrap();
        let style_block = arena.children_of(div)[0];
        let decls: Vec<(&str, &str)> = arena.children_of(style_block).iter().filter_map(|id| match arena.node(*id) {
            Node::InlineStyleDecl(decl) => Some((decl.property.as_str(), decl.value.raw())),
            _ => None,
        }).collect();
        assert!(decls.contains(&("color", "red")));
    }

    #[test]
    fn custom_style_missing_valueless_property_is_a_resolution_error() {
        let (_, diags) = resolve(
            "[Custom] @Style Card { width: 100px; color; } div { style { @Style Card; } }",
        );
        assert!(diags.iter().any(|d| d.is_error()));
    }

    #[test]
    fn var_ref_resolves_to_its_templates_value() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(
            "[Template] @Var ThemeColor { tableColor: red; } div { style { color: ThemeColor(tableColor); } }",
            "t.chtl",
            &config,
        );
        let mut arena = parsed.arena;
        let mut bag = DiagnosticBag::new(false);
        resolve_var_refs(&mut arena, &mut bag, "t.chtl");
        assert!(!bag.has_errors());
        let div = arena.children_of(NodeId::ROOT)[0];
        let style_block = arena.children_of(div)[0];
        match arena.node(arena.children_of(style_block)[0]) {
            Node::InlineStyleDecl(decl) => assert_eq!(decl.value.raw(), "red"),
            other => panic!("expected inline style decl, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_var_ref_is_a_resolution_error() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { style { color: ThemeColor(tableColor); } }", "t.chtl", &config);
        let mut arena = parsed.arena;
        let mut bag = DiagnosticBag::new(false);
        resolve_var_refs(&mut arena, &mut bag, "t.chtl");
        assert!(bag.has_errors());
    }

    #[test]
    fn custom_element_delete_removes_matched_child() {
        let (arena, diags) = resolve(
            "[Custom] @Element Box { span { text { \"a\" } } p { text { \"b\" } } delete span[0]; } div { @Element Box; }",
        );
        assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
        let div = arena.children_of(NodeId::ROOT).iter().find(|id| matches!(arena.node(**id), Node::Element { tag, .. } if tag == "div")).copied().unwrap();
        let tags: Vec<&str> = arena.children_of(div).iter().filter_map(|id| match arena.node(*id) {
            Node::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }).collect();
        assert_eq!(tags, vec!["p"]);
    }
}
