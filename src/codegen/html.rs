//! HTML emitter (spec §4.8).
//!
//! Grounded in the teacher's `codegen.rs` `generate_jsx_element`-style
//! recursive emitter; generalized to CHTL's own attribute/child shape.
//! Local `style {}`/`script {}` blocks are skipped here — they're handled
//! by [`super::css`]/[`super::js`] — everything else renders in source
//! child order (spec §3 invariant 1).

use crate::ast::{Arena, AttributeValue, Node, NodeId, ValueLiteral};

const VOID_ELEMENTS: &[&str] = &["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr"];

pub fn emit(arena: &Arena) -> String {
    let mut out = String::new();
    for child in arena.children_of(NodeId::ROOT) {
        emit_node(arena, *child, &mut out, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn emit_node(arena: &Arena, id: NodeId, out: &mut String, depth: usize) {
    match arena.node(id) {
        Node::Element { tag, attributes } => {
            indent(out, depth);
            out.push('<');
            out.push_str(tag);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape_attr(attribute_text(&attr.value)));
                out.push('"');
            }
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                out.push_str(" />\n");
                return;
            }
            out.push_str(">\n");
            for child in arena.children_of(id) {
                emit_node(arena, *child, out, depth + 1);
            }
            indent(out, depth);
            out.push_str("</");
            out.push_str(tag);
            out.push_str(">\n");
        }
        Node::Text { content, .. } => {
            indent(out, depth);
            out.push_str(&escape_text(content));
            out.push('\n');
        }
        Node::Comment { content, .. } => {
            indent(out, depth);
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->\n");
        }
        Node::OriginBlock { origin_type, raw, .. } if matches!(origin_type, crate::ast::AtType::Html) => {
            out.push_str(raw);
            out.push('\n');
        }
        Node::Namespace { .. } => {
            for child in arena.children_of(id) {
                emit_node(arena, *child, out, depth);
            }
        }
        _ => {}
    }
}

fn attribute_text(value: &AttributeValue) -> &str {
    match value {
        AttributeValue::Literal(ValueLiteral::Quoted(s)) | AttributeValue::Literal(ValueLiteral::Unquoted(s)) => s,
        AttributeValue::Literal(ValueLiteral::VarRef { key, .. }) => key,
        AttributeValue::Expression(expr) => expr,
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    #[test]
    fn emits_nested_element_with_text() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { text { \"hello\" } }", "t.chtl", &config);
        let html = emit(&parsed.arena);
        assert!(html.contains("<div>"));
        assert!(html.contains("hello"));
        assert!(html.contains("</div>"));
    }

    #[test]
    fn void_elements_self_close() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("img { src: \"a.png\"; }", "t.chtl", &config);
        let html = emit(&parsed.arena);
        assert!(html.contains("<img") && html.trim_end().ends_with("/>"));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { title: \"a&b\"; }", "t.chtl", &config);
        let html = emit(&parsed.arena);
        assert!(html.contains("a&amp;b"));
    }
}
