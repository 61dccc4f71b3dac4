//! Selector automation (spec §4.7.5, §4.7 pass 8).
//!
//! Grounded in `original_source/src/Common/SelectorAutomationManager.h`:
//! when a local `style {}` block (or, if enabled, a `script {}` block)
//! references a class/id selector that the enclosing element doesn't carry
//! as an attribute yet, the attribute is synthesized automatically so the
//! selector actually matches at runtime. Style-side is on by default;
//! script-side is off by default (see [`crate::config::AutomationFlags`]).

use crate::ast::{Attribute, AttributeValue, Node, NodeId, SelectorKind, ValueLiteral};
use crate::ast::Arena;
use crate::config::CompilerConfig;
use crate::symbols::SymbolMap;

pub fn apply(arena: &mut Arena, config: &CompilerConfig, symbols: &mut SymbolMap) {
    let elements: Vec<NodeId> = super::walk(arena, NodeId::ROOT)
        .into_iter()
        .filter(|id| matches!(arena.node(*id), Node::Element { .. }))
        .collect();

    for element in elements {
        let mut wanted_classes: Vec<String> = Vec::new();
        let mut wanted_ids: Vec<String> = Vec::new();
        let mut inline_style_parts: Vec<String> = Vec::new();

        for child in arena.children_of(element).to_vec() {
            match arena.node(child) {
                Node::LocalStyleBlock => {
                    for rule_id in arena.children_of(child).to_vec() {
                        if let Node::InlineStyleDecl(decl) = arena.node(rule_id) {
                            inline_style_parts.push(format!("{}: {}", decl.property, decl.value.raw()));
                        }
                    }
                }
                _ => {}
            }
            match arena.node(child) {
                Node::LocalStyleBlock if !config.automation.disable_style_auto_add_class || !config.automation.disable_style_auto_add_id => {
                    for rule_id in arena.children_of(child).to_vec() {
                        if let Node::StyleSelectorRule(rule) = arena.node(rule_id) {
                            match rule.kind {
                                SelectorKind::Class if !config.automation.disable_style_auto_add_class => {
                                    wanted_classes.push(rule.name.clone());
                                }
                                SelectorKind::Id if !config.automation.disable_style_auto_add_id => {
                                    wanted_ids.push(rule.name.clone());
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Node::LocalScriptBlock if !config.automation.disable_script_auto_add_class || !config.automation.disable_script_auto_add_id => {
                    for script_child in super::walk(arena, child) {
                        if let Node::EnhancedSelector { raw } = arena.node(script_child) {
                            if let Some(name) = raw.strip_prefix('.') {
                                if !config.automation.disable_script_auto_add_class {
                                    wanted_classes.push(name.to_string());
                                }
                            } else if let Some(name) = raw.strip_prefix('#') {
                                if !config.automation.disable_script_auto_add_id {
                                    wanted_ids.push(name.to_string());
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if wanted_classes.is_empty() && wanted_ids.is_empty() && inline_style_parts.is_empty() {
            continue;
        }

        // Only the first class selector encountered auto-adds its name (spec
        // §4.7); later ones are expected to already be present on the
        // element, not appended to the synthesized attribute.
        let first_class = wanted_classes.first().cloned().into_iter().collect::<Vec<_>>();

        let entry = arena.get_mut(element);
        if let Node::Element { attributes, .. } = &mut entry.node {
            ensure_attribute(attributes, "class", &first_class, symbols);
            ensure_attribute(attributes, "id", &wanted_ids, symbols);
            if !inline_style_parts.is_empty() {
                let style_value = format!("{};", inline_style_parts.join("; "));
                attributes.push(Attribute {
                    name: "style".to_string(),
                    value: AttributeValue::Literal(ValueLiteral::Unquoted(style_value)),
                });
            }
        }
    }
}

fn ensure_attribute(attributes: &mut Vec<Attribute>, attr_name: &str, wanted: &[String], symbols: &mut SymbolMap) {
    if wanted.is_empty() {
        return;
    }
    if let Some(existing) = attributes.iter_mut().find(|a| a.name == attr_name) {
        if let AttributeValue::Literal(ValueLiteral::Quoted(v) | ValueLiteral::Unquoted(v)) = &mut existing.value {
            for name in wanted {
                if !v.split_whitespace().any(|tok| tok == name) {
                    if !v.is_empty() {
                        v.push(' ');
                    }
                    v.push_str(name);
                }
            }
        }
        return;
    }
    let value = if wanted.len() == 1 {
        wanted[0].clone()
    } else {
        wanted.join(" ")
    };
    let _ = symbols; // reserved for anonymous-selector name generation (spec §4.7.5)
    attributes.push(Attribute { name: attr_name.to_string(), value: AttributeValue::Literal(ValueLiteral::Unquoted(value)) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    fn run(src: &str, config: &CompilerConfig) -> Arena {
        let parsed = crate::parser::parse_source(src, "t.chtl", config);
        let mut arena = parsed.arena;
        let mut symbols = SymbolMap::new(0);
        apply(&mut arena, config, &mut symbols);
        arena
    }

    #[test]
    fn style_side_auto_adds_class_by_default() {
        let config = CompilerConfig::default();
        let arena = run("div { style { .box { color: red; } } }", &config);
        let div = arena.children_of(NodeId::ROOT)[0];
        match arena.node(div) {
            Node::Element { attributes, .. } => {
                assert!(attributes.iter().any(|a| a.name == "class"));
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn bare_style_properties_become_inline_style_attribute() {
        let config = CompilerConfig::default();
        let arena = run("div { style { color: red; } }", &config);
        let div = arena.children_of(NodeId::ROOT)[0];
        match arena.node(div) {
            Node::Element { attributes, .. } => {
                let style = attributes.iter().find(|a| a.name == "style").expect("style attribute");
                match &style.value {
                    AttributeValue::Literal(ValueLiteral::Unquoted(v)) => assert!(v.contains("color: red")),
                    _ => panic!("expected unquoted style value"),
                }
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn script_side_does_not_auto_add_by_default() {
        let config = CompilerConfig::default();
        let arena = run("div { script { {{.box}}->addEventListener('click', fn); } }", &config);
        let div = arena.children_of(NodeId::ROOT)[0];
        match arena.node(div) {
            Node::Element { attributes, .. } => {
                assert!(!attributes.iter().any(|a| a.name == "class"));
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn only_the_first_class_selector_is_auto_added() {
        let config = CompilerConfig::default();
        let arena = run("div { style { .a { color: red; } .b { color: blue; } } }", &config);
        let div = arena.children_of(NodeId::ROOT)[0];
        match arena.node(div) {
            Node::Element { attributes, .. } => {
                let class = attributes.iter().find(|a| a.name == "class").expect("class attribute");
                match &class.value {
                    AttributeValue::Literal(ValueLiteral::Unquoted(v)) => assert_eq!(v, "a"),
                    _ => panic!("expected unquoted class value"),
                }
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn existing_class_attribute_is_extended_not_duplicated() {
        let config = CompilerConfig::default();
        let arena = run("div { id: box; style { .box { color: red; } } }", &config);
        let div = arena.children_of(NodeId::ROOT)[0];
        match arena.node(div) {
            Node::Element { attributes, .. } => {
                let class_count = attributes.iter().filter(|a| a.name == "class").count();
                assert_eq!(class_count, 1);
            }
            _ => panic!("expected element"),
        }
    }
}
