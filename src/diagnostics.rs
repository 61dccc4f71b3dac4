//! Structured diagnostics shared by every compiler stage.
//!
//! Grounded in the teacher's `CompilerError` (`validate.rs`), generalized
//! into `thiserror` variants since CHTL's error taxonomy (spec §7) has real
//! branches that need `?`-propagation across stage boundaries instead of one
//! flat struct.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic code family per spec §7's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    Scan,
    Lex,
    Parse,
    Resolution,
    Semantic,
    Generation,
    Io,
    Internal,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticCode::Scan => "scan",
            DiagnosticCode::Lex => "lex",
            DiagnosticCode::Parse => "parse",
            DiagnosticCode::Resolution => "resolution",
            DiagnosticCode::Semantic => "semantic",
            DiagnosticCode::Generation => "generation",
            DiagnosticCode::Io => "io",
            DiagnosticCode::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, path: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            path: path.into(),
            line,
            column,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(code: DiagnosticCode, path: impl Into<String>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            path: path.into(),
            line,
            column,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}]: {}",
            self.path,
            self.line,
            self.column,
            match self.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            },
            self.code,
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// The top-level error a call to [`crate::compile_string`] / [`crate::compile_file`]
/// returns.
///
/// Exit-code mapping for a CLI wrapper (spec §6): `Io` → 2, `Fatal` → 3,
/// `Failed` → 1.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fatal: {0}")]
    Fatal(Diagnostic),
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Failed(Vec<Diagnostic>),
}

impl CompileError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Io { .. } => 2,
            CompileError::Fatal(_) => 3,
            CompileError::Failed(_) => 1,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Io { .. } => &[],
            CompileError::Fatal(d) => std::slice::from_ref(d),
            CompileError::Failed(ds) => ds,
        }
    }
}

/// Accumulates diagnostics for one compilation job, mirroring the teacher's
/// `ScanResult`/errors+warnings pattern (`original_source`'s
/// `CHTLUnifiedScanner`'s `ScanResult`) but shared across every stage.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    strict: bool,
}

impl DiagnosticBag {
    pub fn new(strict: bool) -> Self {
        DiagnosticBag {
            diagnostics: Vec::new(),
            strict,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let d = Diagnostic::error(DiagnosticCode::Parse, "a.chtl", 3, 5, "unexpected token")
            .with_hint("did you mean `inherit`?");
        let s = d.to_string();
        assert!(s.contains("a.chtl:3:5"));
        assert!(s.contains("did you mean"));
    }

    #[test]
    fn bag_tracks_errors() {
        let mut bag = DiagnosticBag::new(false);
        assert!(!bag.has_errors());
        bag.push(Diagnostic::warning(DiagnosticCode::Scan, "x", 1, 1, "shrug"));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error(DiagnosticCode::Scan, "x", 1, 1, "boom"));
        assert!(bag.has_errors());
    }
}
