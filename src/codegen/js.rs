//! JavaScript emitter (spec §4.8): lowers CHTL-JS constructs to plain JS
//! and passes embedded JavaScript through `oxc_parser`/`oxc_codegen` so the
//! emitted output is always syntactically normalized.
//!
//! Grounded in the teacher's `component.rs::rename_symbols_safe`
//! (`Allocator` + `SourceType::default()` + `Parser::new(...).parse()`,
//! falling back to the original text when Oxc reports parse errors) and
//! `codegen.rs` (`Codegen::new().build(&program).code`).

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::ast::{AnimateCall, Arena, Node, NodeId};

pub fn emit(arena: &Arena) -> String {
    let mut out = String::new();
    collect(arena, NodeId::ROOT, &mut out);
    out
}

fn collect(arena: &Arena, at: NodeId, out: &mut String) {
    for child in arena.children_of(at).to_vec() {
        match arena.node(child) {
            Node::LocalScriptBlock => emit_script_block(arena, child, out),
            Node::OriginBlock { origin_type, raw, .. } if matches!(origin_type, crate::ast::AtType::JavaScript) => {
                out.push_str(&normalize_js(raw));
                out.push('\n');
            }
            _ => {}
        }
        collect(arena, child, out);
    }
}

fn emit_script_block(arena: &Arena, block: NodeId, out: &mut String) {
    for child in arena.children_of(block).to_vec() {
        match arena.node(child) {
            Node::RawJs { code } => {
                out.push_str(&normalize_js(code));
                out.push('\n');
            }
            Node::EnhancedSelector { raw } => {
                out.push_str(&format!("{};\n", selector_expr(raw)));
            }
            Node::ArrowExpr { lhs, rhs } => {
                out.push_str(&format!("{}.{};\n", selector_expr(lhs), normalize_js(rhs)));
            }
            Node::EventBind { lhs, event, body } => {
                out.push_str(&format!(
                    "{}.addEventListener({}, function() {{ {} }});\n",
                    selector_expr(lhs),
                    quote(event),
                    normalize_js(body)
                ));
            }
            Node::ListenCall { target, handlers } => {
                for (event, handler) in handlers {
                    out.push_str(&format!(
                        "{}.addEventListener({}, {});\n",
                        selector_expr(target),
                        quote(event),
                        normalize_js(handler)
                    ));
                }
            }
            Node::DelegateCall { parent, children, handlers } => {
                let selector_list = children.iter().map(|c| format!("'{c}'")).collect::<Vec<_>>().join(", ");
                for (event, handler) in handlers {
                    out.push_str(&format!(
                        "{}.addEventListener({}, function(e) {{ var __targets = [{selector_list}]; for (var __i = 0; __i < __targets.length; __i++) {{ if (e.target.matches(__targets[__i])) {{ ({}).call(e.target, e); break; }} }} }});\n",
                        selector_expr(parent),
                        quote(event),
                        normalize_js(handler)
                    ));
                }
            }
            Node::AnimateCall(call) => emit_animate(call, out),
            Node::VirDeclaration { name, handlers } => {
                let body = handlers.iter().map(|(k, v)| format!("{k}: {}", normalize_js(v))).collect::<Vec<_>>().join(", ");
                out.push_str(&format!("const {name} = {{ {body} }};\n"));
            }
            _ => {}
        }
    }
}

fn emit_animate(call: &AnimateCall, out: &mut String) {
    let mut keyframes = Vec::new();
    for kf in &call.keyframes {
        let props = kf
            .styles
            .iter()
            .map(|s| format!("{}: '{}'", s.property, s.value.raw()))
            .collect::<Vec<_>>()
            .join(", ");
        let offset = kf.at.trim_end_matches('%').parse::<f32>().map(|v| (v / 100.0).to_string()).unwrap_or_else(|_| "0".to_string());
        keyframes.push(format!("{{ offset: {offset}, {props} }}"));
    }
    let duration = call.duration.clone().unwrap_or_else(|| "400".to_string());
    let easing = call.easing.clone().map(|e| format!("'{e}'")).unwrap_or_else(|| "'ease'".to_string());
    let iterations = if call.loop_ { "Infinity" } else { "1" };
    out.push_str(&format!(
        "{}.animate([{}], {{ duration: {}, easing: {}, iterations: {}, delay: {} }});\n",
        selector_expr(&call.target),
        keyframes.join(", "),
        duration,
        easing,
        iterations,
        call.delay.clone().unwrap_or_else(|| "0".to_string()),
    ));
}

fn quote(selector: &str) -> String {
    format!("'{}'", selector.replace('\'', "\\'"))
}

/// Lowers a `{{selector}}` body to the DOM lookup expression it selects
/// (spec §4.8): an indexed form (`button[0]`) goes through
/// `querySelectorAll(...)[i]`; a bare tag name with no `.`/`#` prefix goes
/// through `getElementsByTagName`; everything else is a plain
/// `querySelector` call.
fn selector_expr(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(open) = raw.find('[') {
        if let Some(index) = raw.strip_suffix(']').map(|s| &s[open + 1..]) {
            let base = &raw[..open];
            return format!("document.querySelectorAll({})[{}]", quote(base), index);
        }
    }
    if raw.starts_with('.') || raw.starts_with('#') {
        format!("document.querySelector({})", quote(raw))
    } else {
        format!("document.getElementsByTagName({})", quote(raw))
    }
}

/// Round-trips `code` through `oxc_parser`/`oxc_codegen` to normalize it;
/// falls back to the raw text verbatim if Oxc can't parse the fragment
/// (e.g. it's a partial expression captured out of its surrounding
/// statement), matching the teacher's `rename_symbols_safe` fallback.
fn normalize_js(code: &str) -> String {
    if code.trim().is_empty() {
        return String::new();
    }
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() {
        return code.to_string();
    }
    Codegen::new().build(&ret.program).code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    #[test]
    fn enhanced_selector_arrow_lowers_to_query_selector_call() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(
            "div { script { {{.box}}->addEventListener('click', function(){}); } }",
            "t.chtl",
            &config,
        );
        let js = emit(&parsed.arena);
        assert!(js.contains("document.querySelector"));
    }

    #[test]
    fn event_bind_lowers_to_add_event_listener() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { script { {{.box}} &-> click { doThing(); } } }", "t.chtl", &config);
        let js = emit(&parsed.arena);
        assert!(js.contains("addEventListener"));
        assert!(js.contains("'click'"));
    }

    #[test]
    fn indexed_enhanced_selector_lowers_to_query_selector_all_index() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source(
            "div { script { {{button[0]}}->addEventListener('click', function(){}); } }",
            "t.chtl",
            &config,
        );
        let js = emit(&parsed.arena);
        assert!(js.contains("document.querySelectorAll('button')[0]"));
    }

    #[test]
    fn bare_tag_enhanced_selector_lowers_to_get_elements_by_tag_name() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { script { {{button}} } }", "t.chtl", &config);
        let js = emit(&parsed.arena);
        assert!(js.contains("document.getElementsByTagName('button')"));
    }

    #[test]
    fn plain_identifier_arrow_lowers_to_dot_access() {
        let config = CompilerConfig::default();
        let parsed = crate::parser::parse_source("div { script { vir obj = { greet: function(){} }; obj->greet(); } }", "t.chtl", &config);
        let js = emit(&parsed.arena);
        assert!(js.contains("obj.greet()"));
    }

    #[test]
    fn plain_raw_js_passes_through_normalized() {
        let code = "let x = 1 + 2;";
        assert_eq!(normalize_js(code).trim(), "let x = 1 + 2;");
    }

    #[test]
    fn unparseable_fragment_falls_back_to_verbatim() {
        let code = "this is not valid javascript {{{";
        assert_eq!(normalize_js(code), code);
    }
}
