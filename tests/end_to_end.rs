//! End-to-end scenarios (spec §8): compile a whole source string through
//! `chtl::compile_string` and check the generated HTML/CSS/JS, rather than
//! inspecting the intermediate arena the way the per-module unit tests do.

use chtl::CompileOptions;

fn compile(source: &str) -> chtl::CompileOutput {
    chtl::compile_string(source, "t.chtl", &CompileOptions::default()).expect("compilation should succeed")
}

#[test]
fn simple_element_with_text_lowers_to_html() {
    let out = compile(r#"div { text { "hello" } }"#);
    assert!(out.generated.html.contains("<div>"));
    assert!(out.generated.html.contains("hello"));
    assert!(out.generated.html.contains("</div>"));
}

#[test]
fn template_style_reference_expands_into_inline_style_attribute() {
    let out = compile(
        r#"
        [Template] @Style Card {
            width: 200px;
            color: blue;
        }
        div {
            style {
                @Style Card;
            }
        }
        "#,
    );
    assert!(out.generated.html.contains("style="));
    assert!(out.generated.html.contains("width: 200px"));
    assert!(out.generated.html.contains("color: blue"));
    assert!(out.generated.css.is_empty());
}

#[test]
fn custom_element_delete_and_insert_specialize_the_instance() {
    let out = compile(
        r#"
        [Custom] @Element Panel {
            span { text { "original" } }
            p { text { "keep" } }
        }
        div {
            @Element Panel {
                delete span[0];
                insert after p { h2 { text { "added" } } }
            }
        }
        "#,
    );
    assert!(!out.generated.html.contains("original"));
    assert!(out.generated.html.contains("keep"));
    assert!(out.generated.html.contains("added"));
    assert!(out.generated.html.contains("<h2>"));
}

#[test]
fn namespaced_template_reference_resolves_across_a_namespace_block() {
    let out = compile(
        r#"
        [Namespace] ui {
            [Template] @Style Accent {
                color: red;
            }
        }
        div {
            style {
                @Style Accent from ui;
            }
        }
        "#,
    );
    assert!(out.generated.html.contains("color: red"));
}

#[test]
fn enhanced_selector_event_binding_lowers_to_add_event_listener() {
    let out = compile(
        r#"
        div {
            id: panel;
            script {
                {{#panel}} &-> click {
                    console.log('clicked');
                }
            }
        }
        "#,
    );
    assert!(out.generated.js.contains("addEventListener"));
    assert!(out.generated.js.contains("'click'"));
    assert!(out.generated.js.contains("querySelector"));
}

#[test]
fn except_constraint_violation_is_reported_as_an_error_diagnostic() {
    let result = chtl::compile_string(
        r#"
        div {
            except span;
            span { text { "forbidden" } }
        }
        "#,
        "t.chtl",
        &CompileOptions { strict: true, cache_dir: None },
    );
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.diagnostics().iter().any(|d| d.is_error()));
}

#[test]
fn style_side_selector_automation_adds_missing_class_attribute() {
    let out = compile(
        r#"
        div {
            style {
                .highlight {
                    background: yellow;
                }
            }
        }
        "#,
    );
    assert!(out.generated.html.contains(r#"class="highlight""#));
    assert!(out.generated.css.contains(".highlight {"));
    assert!(out.generated.css.contains("background: yellow;"));
}
