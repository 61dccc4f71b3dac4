//! Unified fragment scanner (C1, spec §4.1).
//!
//! Grounded in `original_source/src_new/Scanner/CHTLUnifiedScanner.h`: the
//! fragment/strategy/context/result shapes below follow that header's class
//! layout closely, translated from its C++ ownership model into an
//! allocation-light slice-based Rust scanner that hands the lexer `&str`
//! spans instead of copied fragment buffers.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentType {
    Chtl,
    LocalStyle,
    LocalScript,
    CHTLJs,
    RawOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStrategy {
    /// Scan greedily to the matching brace, honoring nested braces and
    /// string literals.
    BraceMatched,
    /// Scan until a two-pointer keyword lookahead finds a CHTL-JS construct
    /// (`{{`, `->`, `&->`, `listen`, `vir`, ...), used inside script bodies.
    KeywordLookahead,
    /// Scan to end-of-input verbatim, used for `[Origin]` raw blocks.
    Verbatim,
}

#[derive(Debug, Clone)]
pub struct ScanContext {
    pub fragment_type: FragmentType,
    pub strategy: ScanStrategy,
    pub depth: usize,
}

/// A contiguous slice of the source file tagged with the fragment kind it
/// belongs to. `start`/`end` are byte offsets into the original source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_type: FragmentType,
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub fragments: Vec<Fragment>,
    pub errors: Vec<Diagnostic>,
}

/// Front/back two-pointer lookahead used by [`UnifiedScanner`] to find the
/// boundary of a CHTL-JS construct embedded inside a local script block,
/// grounded in the original's CJMOD sub-scanner keyword search.
pub struct KeywordScanner<'a> {
    source: &'a str,
    keywords: &'a [&'a str],
}

impl<'a> KeywordScanner<'a> {
    pub fn new(source: &'a str, keywords: &'a [&'a str]) -> Self {
        KeywordScanner { source, keywords }
    }

    /// Returns the byte offset of the first keyword occurrence at or after
    /// `from`, preferring the earliest match; ties broken by longest
    /// keyword (longest-match disambiguation, spec §4.5).
    pub fn find_next(&self, from: usize) -> Option<(usize, &'a str)> {
        let haystack = self.source.get(from..)?;
        let mut best: Option<(usize, &str)> = None;
        for kw in self.keywords {
            if let Some(pos) = haystack.find(kw) {
                let abs = from + pos;
                best = match best {
                    Some((bpos, bkw)) if bpos < abs || (bpos == abs && bkw.len() >= kw.len()) => Some((bpos, bkw)),
                    _ => Some((abs, kw)),
                };
            }
        }
        best
    }
}

/// Splits one CHTL source file into typed fragments, repairing boundaries
/// that would otherwise split a brace or a string literal mid-token (spec
/// §4.1 "boundary repair").
pub struct UnifiedScanner<'a> {
    source: &'a str,
    path: String,
}

impl<'a> UnifiedScanner<'a> {
    pub fn new(source: &'a str, path: impl Into<String>) -> Self {
        UnifiedScanner { source, path: path.into() }
    }

    pub fn scan(&self) -> ScanResult {
        let mut fragments = Vec::new();
        let mut errors = Vec::new();
        let bytes = self.source.as_bytes();
        let mut i = 0usize;
        let mut line = 1u32;
        let mut fragment_start = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line += 1;
                    i += 1;
                }
                b'"' | b'\'' => {
                    i = self.skip_string(bytes, i);
                }
                b's' if self.source[i..].starts_with("style") && self.preceded_by_boundary(i) => {
                    if let Some(end) = self.find_brace_block(bytes, i + "style".len()) {
                        if fragment_start < i {
                            fragments.push(Fragment { fragment_type: FragmentType::Chtl, start: fragment_start, end: i, line });
                        }
                        fragments.push(Fragment { fragment_type: FragmentType::LocalStyle, start: i, end, line });
                        fragment_start = end;
                        i = end;
                    } else {
                        i += 1;
                    }
                }
                b's' if self.source[i..].starts_with("script") && self.preceded_by_boundary(i) => {
                    if let Some(end) = self.find_brace_block(bytes, i + "script".len()) {
                        if fragment_start < i {
                            fragments.push(Fragment { fragment_type: FragmentType::Chtl, start: fragment_start, end: i, line });
                        }
                        let scanner = KeywordScanner::new(&self.source[i..end], &["{{", "->", "&->", "vir", "listen", "delegate", "animate"]);
                        let kind = if scanner.find_next(0).is_some() { FragmentType::CHTLJs } else { FragmentType::LocalScript };
                        fragments.push(Fragment { fragment_type: kind, start: i, end, line });
                        fragment_start = end;
                        i = end;
                    } else {
                        i += 1;
                    }
                }
                b'[' if self.source[i..].starts_with("[Origin]") => {
                    if let Some(end) = self.find_brace_block(bytes, i + "[Origin]".len()) {
                        if fragment_start < i {
                            fragments.push(Fragment { fragment_type: FragmentType::Chtl, start: fragment_start, end: i, line });
                        }
                        fragments.push(Fragment { fragment_type: FragmentType::RawOrigin, start: i, end, line });
                        fragment_start = end;
                        i = end;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        if fragment_start < self.source.len() {
            fragments.push(Fragment { fragment_type: FragmentType::Chtl, start: fragment_start, end: self.source.len(), line });
        }

        if fragments.is_empty() && !self.source.trim().is_empty() {
            errors.push(Diagnostic::warning(DiagnosticCode::Scan, &self.path, 1, 1, "scanner produced no fragments for non-empty input"));
        }

        ScanResult { fragments, errors }
    }

    fn preceded_by_boundary(&self, i: usize) -> bool {
        i == 0 || !self.source.as_bytes()[i - 1].is_ascii_alphanumeric()
    }

    fn skip_string(&self, bytes: &[u8], start: usize) -> usize {
        let quote = bytes[start];
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == quote {
                return i + 1;
            }
            i += 1;
        }
        bytes.len()
    }

    /// Finds the end (exclusive) of a brace-delimited block starting at or
    /// after `from`, honoring nesting and string literals.
    fn find_brace_block(&self, bytes: &[u8], from: usize) -> Option<usize> {
        let mut i = from;
        while i < bytes.len() && bytes[i] != b'{' {
            if !bytes[i].is_ascii_whitespace() {
                return None;
            }
            i += 1;
        }
        i += 1;
        let mut depth = 1usize;
        while i < bytes.len() && depth > 0 {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(bytes, i);
                    continue;
                }
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
        if depth == 0 {
            Some(i)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_style_block_from_surrounding_chtl() {
        let src = "div { style { color: red; } text { hi } }";
        let result = UnifiedScanner::new(src, "t.chtl").scan();
        assert!(result.fragments.iter().any(|f| f.fragment_type == FragmentType::LocalStyle));
        assert!(result.fragments.iter().any(|f| f.fragment_type == FragmentType::Chtl));
    }

    #[test]
    fn detects_chtljs_inside_script_block() {
        let src = "div { script { {{.box}}->addEventListener('click', fn); } }";
        let result = UnifiedScanner::new(src, "t.chtl").scan();
        assert!(result.fragments.iter().any(|f| f.fragment_type == FragmentType::CHTLJs));
    }

    #[test]
    fn plain_script_without_enhanced_syntax_stays_local_script() {
        let src = "div { script { console.log('hi'); } }";
        let result = UnifiedScanner::new(src, "t.chtl").scan();
        assert!(result.fragments.iter().any(|f| f.fragment_type == FragmentType::LocalScript));
        assert!(!result.fragments.iter().any(|f| f.fragment_type == FragmentType::CHTLJs));
    }

    #[test]
    fn origin_block_is_scanned_verbatim() {
        let src = "[Origin] @Html { <div>raw</div> }";
        let result = UnifiedScanner::new(src, "t.chtl").scan();
        assert!(result.fragments.iter().any(|f| f.fragment_type == FragmentType::RawOrigin));
    }

    #[test]
    fn brace_inside_string_literal_does_not_close_block_early() {
        let src = "div { style { content: \"}\"; color: red; } }";
        let result = UnifiedScanner::new(src, "t.chtl").scan();
        let style = result.fragments.iter().find(|f| f.fragment_type == FragmentType::LocalStyle).unwrap();
        assert!(src[style.start..style.end].contains("color: red"));
    }
}
