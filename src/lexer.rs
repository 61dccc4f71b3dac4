//! CHTL and CHTL-JS lexers (C4, spec §4.4).
//!
//! Grounded in the teacher's `parse.rs` character-scanning helpers
//! (`peek`/`advance`/`skip_whitespace`), generalized into a shared
//! `LexerBase` that both `ChtlLexer` and `ChtlJsLexer` build on, since CHTL
//! and CHTL-JS share punctuation and literal handling but diverge on
//! keyword sets and on whether `{{`/`->`/`&->` are recognized.

use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::token::{CommentKind, LiteralForm, Position, Token, TokenKind, BLOCK_MARKERS, CORE_KEYWORDS};

/// Character-level cursor shared by both lexers, mirroring the teacher's
/// `Parser` struct's `chars: Vec<char>` + `pos` fields.
struct LexerBase<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    path: &'a str,
}

impl<'a> LexerBase<'a> {
    fn new(source: &str, path: &'a str) -> Self {
        LexerBase { chars: source.chars().collect(), pos: 0, line: 1, column: 1, path }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn position(&self) -> Position {
        Position { line: self.line, column: self.column, offset: self.pos as u32 }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        let mut idx = self.pos;
        for expected in s.chars() {
            match self.chars.get(idx) {
                Some(c) if *c == expected => idx += 1,
                _ => return false,
            }
        }
        true
    }

    fn advance_n(&mut self, n: usize) -> String {
        let mut out = String::new();
        for _ in 0..n {
            if let Some(c) = self.advance() {
                out.push(c);
            }
        }
        out
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Lexer for plain CHTL source (spec §4.4). Produces keyword tokens with
/// CE-equivalence (`:` and `=` both lex as [`TokenKind::Colon`]) and honors
/// `[Name]`-declared keyword aliases via the active [`CompilerConfig`].
pub struct ChtlLexer<'a> {
    base: LexerBase<'a>,
    config: &'a CompilerConfig,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> ChtlLexer<'a> {
    pub fn new(source: &str, path: &'a str, config: &'a CompilerConfig) -> Self {
        ChtlLexer { base: LexerBase::new(source, path), config, diagnostics: Vec::new() }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Token {
        self.base.skip_whitespace();
        let pos = self.base.position();

        if self.base.is_at_end() {
            return Token::new(TokenKind::Eof, "", pos);
        }

        if self.base.starts_with("--") {
            return self.lex_comment_generator(pos);
        }
        if self.base.starts_with("//") {
            return self.lex_line_comment(pos);
        }
        if self.base.starts_with("/*") {
            return self.lex_block_comment(pos);
        }

        let c = self.base.peek().unwrap();
        match c {
            '"' => self.lex_quoted(pos, '"', LiteralForm::DoubleQuoted),
            '\'' => self.lex_quoted(pos, '\'', LiteralForm::SingleQuoted),
            '{' => self.single(pos, TokenKind::LBrace),
            '}' => self.single(pos, TokenKind::RBrace),
            '[' => self.lex_bracket_marker(pos),
            ']' => self.single(pos, TokenKind::RBracket),
            '(' => self.single(pos, TokenKind::LParen),
            ')' => self.single(pos, TokenKind::RParen),
            ':' | '=' => self.single_as(pos, TokenKind::Colon),
            ';' => self.single(pos, TokenKind::Semicolon),
            ',' => self.single(pos, TokenKind::Comma),
            '&' => self.single(pos, TokenKind::Ampersand),
            '.' => self.single(pos, TokenKind::Dot),
            '#' => self.single(pos, TokenKind::Hash),
            '@' => self.lex_at_type(pos),
            c if c.is_ascii_digit() => self.lex_number(pos),
            c if is_ident_start(c) => self.lex_identifier_or_unquoted(pos),
            _ => self.single(pos, TokenKind::Unknown),
        }
    }

    fn single(&mut self, pos: Position, kind: TokenKind) -> Token {
        let c = self.base.advance().unwrap();
        Token::new(kind, c.to_string(), pos)
    }

    /// Consumes exactly one char but always lexes it as `kind` regardless of
    /// whether it was `:` or `=` (CE-equivalence, spec §4.4).
    fn single_as(&mut self, pos: Position, kind: TokenKind) -> Token {
        let c = self.base.advance().unwrap();
        Token::new(kind, c.to_string(), pos)
    }

    fn lex_comment_generator(&mut self, pos: Position) -> Token {
        self.base.advance_n(2);
        let mut content = String::new();
        while let Some(c) = self.base.peek() {
            if c == '\n' {
                break;
            }
            content.push(c);
            self.base.advance();
        }
        Token::new(TokenKind::Comment(CommentKind::Generator), content, pos)
    }

    fn lex_line_comment(&mut self, pos: Position) -> Token {
        self.base.advance_n(2);
        let mut content = String::new();
        while let Some(c) = self.base.peek() {
            if c == '\n' {
                break;
            }
            content.push(c);
            self.base.advance();
        }
        Token::new(TokenKind::Comment(CommentKind::Line), content, pos)
    }

    fn lex_block_comment(&mut self, pos: Position) -> Token {
        self.base.advance_n(2);
        let mut content = String::new();
        while !self.base.is_at_end() && !self.base.starts_with("*/") {
            content.push(self.base.advance().unwrap());
        }
        if self.base.starts_with("*/") {
            self.base.advance_n(2);
        } else {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::Lex,
                self.base.path,
                pos.line,
                pos.column,
                "unterminated block comment",
            ));
        }
        Token::new(TokenKind::Comment(CommentKind::Block), content, pos)
    }

    fn lex_quoted(&mut self, pos: Position, quote: char, form: LiteralForm) -> Token {
        self.base.advance();
        let mut content = String::new();
        loop {
            match self.base.peek() {
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        DiagnosticCode::Lex,
                        self.base.path,
                        pos.line,
                        pos.column,
                        "unterminated string literal",
                    ));
                    break;
                }
                Some(c) if c == quote => {
                    self.base.advance();
                    break;
                }
                Some('\\') => {
                    self.base.advance();
                    if let Some(escaped) = self.base.advance() {
                        content.push(escaped);
                    }
                }
                Some(c) => {
                    content.push(c);
                    self.base.advance();
                }
            }
        }
        Token::new(TokenKind::Literal(form), content, pos)
    }

    fn lex_bracket_marker(&mut self, pos: Position) -> Token {
        self.base.advance();
        for (name, kind) in BLOCK_MARKERS {
            if self.base.starts_with(name) && self.base.peek_at(name.len()) == Some(']') {
                self.base.advance_n(name.len());
                self.base.advance();
                return Token::new(kind.clone(), format!("[{name}]"), pos);
            }
        }
        Token::new(TokenKind::LBracket, "[", pos)
    }

    fn lex_at_type(&mut self, pos: Position) -> Token {
        self.base.advance();
        let mut name = String::from("@");
        while matches!(self.base.peek(), Some(c) if is_ident_continue(c)) {
            name.push(self.base.advance().unwrap());
        }
        Token::new(TokenKind::AtType, name, pos)
    }

    fn lex_number(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while matches!(self.base.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            text.push(self.base.advance().unwrap());
        }
        // Units like `px`/`%` attach as part of an unquoted value downstream
        // in the parser, not here; the lexer only emits the numeric part.
        while matches!(self.base.peek(), Some(c) if c.is_alphabetic() || c == '%') {
            text.push(self.base.advance().unwrap());
        }
        Token::new(TokenKind::Number, text, pos)
    }

    fn lex_identifier_or_unquoted(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while matches!(self.base.peek(), Some(c) if is_ident_continue(c)) {
            text.push(self.base.advance().unwrap());
        }
        // "at top" / "at bottom" are two-word keywords; check longest match
        // before falling back to single-word core keywords or identifiers.
        if text == "at" {
            let save = (self.base.pos, self.base.line, self.base.column);
            self.base.skip_whitespace();
            let mut word = String::new();
            while matches!(self.base.peek(), Some(c) if is_ident_continue(c)) {
                word.push(self.base.advance().unwrap());
            }
            match word.as_str() {
                "top" => return Token::new(TokenKind::KwAtTop, "at top", pos),
                "bottom" => return Token::new(TokenKind::KwAtBottom, "at bottom", pos),
                _ => {
                    self.base.pos = save.0;
                    self.base.line = save.1;
                    self.base.column = save.2;
                }
            }
        }

        for (spelling, kind) in CORE_KEYWORDS {
            if self.config.keyword_matches(&text, spelling) {
                return Token::new(kind.clone(), text, pos);
            }
        }

        Token::new(TokenKind::Identifier, text, pos)
    }
}

/// Lexer for CHTL-JS fragments (spec §4.4, §3): a superset of `ChtlLexer`
/// that also recognizes `{{`, `->`, `&->`, and the `vir`/`listen`/
/// `delegate`/`animate` keywords. CHTL-JS tokens fall back to plain
/// identifiers/punctuators for anything that is ordinary JavaScript, which
/// `parser::chtljs` hands off to `oxc_parser` for full expression parsing.
pub struct ChtlJsLexer<'a> {
    base: LexerBase<'a>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> ChtlJsLexer<'a> {
    pub fn new(source: &str, path: &'a str) -> Self {
        ChtlJsLexer { base: LexerBase::new(source, path), diagnostics: Vec::new() }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Token {
        self.base.skip_whitespace();
        let pos = self.base.position();
        if self.base.is_at_end() {
            return Token::new(TokenKind::Eof, "", pos);
        }
        if self.base.starts_with("{{") {
            self.base.advance_n(2);
            return Token::new(TokenKind::DoubleLBrace, "{{", pos);
        }
        if self.base.starts_with("}}") {
            self.base.advance_n(2);
            return Token::new(TokenKind::DoubleRBrace, "}}", pos);
        }
        if self.base.starts_with("&->") {
            self.base.advance_n(3);
            return Token::new(TokenKind::EventArrow, "&->", pos);
        }
        if self.base.starts_with("->") {
            self.base.advance_n(2);
            return Token::new(TokenKind::Arrow, "->", pos);
        }
        let c = self.base.peek().unwrap();
        match c {
            '"' => return self.lex_string(pos, '"'),
            '\'' => return self.lex_string(pos, '\''),
            '{' => {
                self.base.advance();
                return Token::new(TokenKind::LBrace, "{", pos);
            }
            '}' => {
                self.base.advance();
                return Token::new(TokenKind::RBrace, "}", pos);
            }
            '(' => {
                self.base.advance();
                return Token::new(TokenKind::LParen, "(", pos);
            }
            ')' => {
                self.base.advance();
                return Token::new(TokenKind::RParen, ")", pos);
            }
            ':' | '=' => {
                self.base.advance();
                return Token::new(TokenKind::Colon, c.to_string(), pos);
            }
            ';' => {
                self.base.advance();
                return Token::new(TokenKind::Semicolon, ";", pos);
            }
            ',' => {
                self.base.advance();
                return Token::new(TokenKind::Comma, ",", pos);
            }
            '.' => {
                self.base.advance();
                return Token::new(TokenKind::Dot, ".", pos);
            }
            '&' => {
                self.base.advance();
                return Token::new(TokenKind::Ampersand, "&", pos);
            }
            _ if is_ident_start(c) => return self.lex_identifier(pos),
            _ => {
                self.base.advance();
                return Token::new(TokenKind::Unknown, c.to_string(), pos);
            }
        }
    }

    fn lex_string(&mut self, pos: Position, quote: char) -> Token {
        self.base.advance();
        let mut content = String::new();
        while let Some(c) = self.base.peek() {
            if c == quote {
                self.base.advance();
                break;
            }
            content.push(c);
            self.base.advance();
        }
        let form = if quote == '"' { LiteralForm::DoubleQuoted } else { LiteralForm::SingleQuoted };
        Token::new(TokenKind::Literal(form), content, pos)
    }

    fn lex_identifier(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while matches!(self.base.peek(), Some(c) if is_ident_continue(c)) {
            text.push(self.base.advance().unwrap());
        }
        let kind = match text.as_str() {
            "vir" => TokenKind::KwVir,
            "listen" => TokenKind::KwListen,
            "delegate" => TokenKind::KwDelegate,
            "animate" => TokenKind::KwAnimate,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_and_equals_lex_identically() {
        let config = CompilerConfig::default();
        let (a, _) = ChtlLexer::new("x: y", "t", &config).tokenize();
        let (b, _) = ChtlLexer::new("x= y", "t", &config).tokenize();
        assert_eq!(a[1].kind, TokenKind::Colon);
        assert_eq!(b[1].kind, TokenKind::Colon);
    }

    #[test]
    fn generator_comment_keeps_its_text() {
        let config = CompilerConfig::default();
        let (tokens, _) = ChtlLexer::new("-- hello world\n", "t", &config).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Comment(CommentKind::Generator));
        assert_eq!(tokens[0].lexeme.trim(), "hello world");
    }

    #[test]
    fn at_top_lexes_as_single_keyword() {
        let config = CompilerConfig::default();
        let (tokens, _) = ChtlLexer::new("at top", "t", &config).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::KwAtTop);
    }

    #[test]
    fn alias_resolves_to_canonical_kind() {
        let mut config = CompilerConfig::default();
        config.name_aliases.insert("inherit".to_string(), "extends".to_string());
        let (tokens, _) = ChtlLexer::new("extends", "t", &config).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::KwInherit);
    }

    #[test]
    fn unrecognized_word_is_plain_identifier() {
        let config = CompilerConfig::default();
        let (tokens, _) = ChtlLexer::new("MyBox", "t", &config).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn chtljs_lexer_recognizes_enhanced_selector_and_arrow() {
        let (tokens, _) = ChtlJsLexer::new("{{.box}}->addEventListener", "t").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::DoubleLBrace);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Arrow));
    }

    #[test]
    fn chtljs_lexer_recognizes_event_bind_arrow() {
        let (tokens, _) = ChtlJsLexer::new("{{.box}} &-> click", "t").tokenize();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::EventArrow));
    }
}
