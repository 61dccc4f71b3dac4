//! Code generation (C7, spec §4.8): walks the resolved [`Arena`] and emits
//! HTML, a collected stylesheet, and lowered JavaScript.
//!
//! Grounded in the teacher's `codegen.rs` tree-walk emitter shape (one
//! function per node kind, an output `String` built incrementally)
//! generalized from JSX-to-React-calls to CHTL's HTML/CSS/JS triad.

pub mod css;
pub mod html;
pub mod js;

use crate::ast::Arena;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub html: String,
    pub css: String,
    pub js: String,
}

/// Runs all three emitters over one resolved arena, matching spec §4.8's
/// "HTML, CSS and JS are generated from the same resolved tree, not from
/// three independent passes over the source".
pub fn generate(arena: &Arena) -> GeneratedOutput {
    let html = html::emit(arena);
    let css = css::emit(arena);
    let js = js::emit(arena);
    GeneratedOutput { html, css, js }
}
