//! CSS emitter (spec §4.8).
//!
//! Collects every `StyleSelectorRule` reachable in the resolved tree into
//! one stylesheet, in source order. Bare property declarations inside a
//! `style {}` block are rendered as an inline `style=""` attribute by
//! [`crate::resolver::selector_automation`] and never reach this emitter —
//! only rules with an explicit selector (`.cls`, `#id`, `&:hover`) do.

use crate::ast::{Arena, AttributeValue, Node, NodeId, SelectorKind, ValueLiteral};

pub fn emit(arena: &Arena) -> String {
    let mut out = String::new();
    collect(arena, NodeId::ROOT, None, &mut out);
    out
}

/// The enclosing element's own identity, used to resolve the `&`
/// reference-selector (spec §4.7): auto-class if one is set, else
/// auto-id, else the element's tag name.
fn reference_selector(arena: &Arena, element: NodeId) -> String {
    if let Node::Element { tag, attributes } = arena.node(element) {
        if let Some(class) = attribute_value(attributes, "class") {
            return format!(".{}", class.split_whitespace().next().unwrap_or(&class));
        }
        if let Some(id) = attribute_value(attributes, "id") {
            return format!("#{id}");
        }
        return tag.clone();
    }
    String::new()
}

fn attribute_value(attributes: &[crate::ast::Attribute], name: &str) -> Option<String> {
    attributes.iter().find(|a| a.name == name).and_then(|a| match &a.value {
        AttributeValue::Literal(ValueLiteral::Quoted(v) | ValueLiteral::Unquoted(v)) => Some(v.clone()),
        _ => None,
    })
}

fn collect(arena: &Arena, at: NodeId, enclosing_element: Option<NodeId>, out: &mut String) {
    for child in arena.children_of(at).to_vec() {
        let mut next_element = enclosing_element;
        match arena.node(child) {
            Node::Element { .. } => next_element = Some(child),
            Node::LocalStyleBlock => {
                for rule_id in arena.children_of(child).to_vec() {
                    if let Node::StyleSelectorRule(rule) = arena.node(rule_id) {
                        let reference = enclosing_element.map(|e| reference_selector(arena, e)).unwrap_or_default();
                        emit_rule(rule, &reference, out);
                    }
                }
            }
            Node::OriginBlock { origin_type, raw, .. } if matches!(origin_type, crate::ast::AtType::Style) => {
                out.push_str(raw);
                out.push('\n');
            }
            _ => {}
        }
        collect(arena, child, next_element, out);
    }
}

fn emit_rule(rule: &crate::ast::SelectorRule, reference: &str, out: &mut String) {
    let selector = match rule.kind {
        SelectorKind::Class => format!(".{}", rule.name),
        SelectorKind::Id => format!("#{}", rule.name),
        SelectorKind::PseudoClass => format!("{reference}:{}", rule.name),
        SelectorKind::PseudoElement => format!("{reference}::{}", rule.name),
        SelectorKind::Reference | SelectorKind::Compound | SelectorKind::Element => rule.name.clone(),
    };
    out.push_str(&selector);
    out.push_str(" {\n");
    for decl in &rule.declarations {
        out.push_str("  ");
        out.push_str(&decl.property);
        out.push_str(": ");
        out.push_str(decl.value.raw());
        out.push_str(";\n");
    }
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    #[test]
    fn emits_class_selector_rule() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { style { .box { color: red; } } }", "t.chtl", &config);
        let css = emit(&parsed.arena);
        assert!(css.contains(".box {"));
        assert!(css.contains("color: red;"));
    }

    #[test]
    fn bare_properties_are_not_emitted_as_rules() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { style { color: red; } }", "t.chtl", &config);
        let css = emit(&parsed.arena);
        assert!(css.is_empty());
    }

    #[test]
    fn reference_selector_resolves_to_auto_class() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { style { .box { color: red; } &:hover { color: blue; } } }", "t.chtl", &config);
        let mut arena = parsed.arena;
        let mut symbols = crate::symbols::SymbolMap::new(0);
        crate::resolver::selector_automation::apply(&mut arena, &config, &mut symbols);
        let css = emit(&arena);
        assert!(css.contains(".box:hover {"));
        assert!(!css.contains("&:hover"));
    }
}
