//! CHTL-JS construct parser (spec §4.5 "CHTL-JS"), invoked by
//! [`super::Parser::parse_local_script`] on the raw text of a `script { }`
//! body.
//!
//! Grounded in the teacher's `jsx_lowerer.rs`: same "recognize a handful of
//! special call shapes, fall back to passing the rest through verbatim"
//! strategy, generalized from JSX's `React.createElement` lowering to
//! CHTL-JS's enhanced-selector / listen / delegate / animate / vir
//! constructs. Plain JavaScript in between is kept as opaque
//! [`Node::RawJs`] text; `codegen::js` is what hands that over to
//! `oxc_parser` for real AST construction at code-generation time.

use crate::ast::{AnimateCall, Arena, Keyframe, Node, NodeId};
use crate::diagnostics::Diagnostic;
use crate::token::{Position, Token, TokenKind};

pub struct CHTLJsParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    path: &'a str,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CHTLJsParser<'a> {
    pub fn new(tokens: Vec<Token>, path: &'a str) -> Self {
        CHTLJsParser { tokens, pos: 0, path, diagnostics: Vec::new() }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn parse_into(&mut self, arena: &mut Arena, parent: NodeId) {
        while !self.at_eof() {
            if self.check(&TokenKind::DoubleLBrace) {
                self.parse_enhanced_selector_expr(arena, parent);
            } else if self.check(&TokenKind::KwVir) {
                self.parse_vir(arena, parent);
            } else if self.check(&TokenKind::KwAnimate) {
                let pos = self.peek().position;
                self.advance();
                let call = self.parse_animate_call(pos);
                arena.push(Node::AnimateCall(call), parent, pos);
                self.matches(&TokenKind::Semicolon);
            } else {
                self.parse_raw_statement(arena, parent);
            }
        }
    }

    fn parse_enhanced_selector_expr(&mut self, arena: &mut Arena, parent: NodeId) {
        let pos = self.peek().position;
        self.advance(); // `{{`
        let mut raw = String::new();
        while !self.check(&TokenKind::DoubleRBrace) && !self.at_eof() {
            raw.push_str(&self.advance().lexeme);
        }
        self.matches(&TokenKind::DoubleRBrace);
        let selector_node = arena.push(Node::EnhancedSelector { raw: raw.clone() }, parent, pos);
        let _ = selector_node;

        if self.matches(&TokenKind::EventArrow) {
            let event = self.advance().lexeme;
            let body = self.capture_balanced_or_until_semicolon();
            arena.push(Node::EventBind { lhs: raw, event, body }, parent, pos);
            return;
        }

        if self.matches(&TokenKind::Arrow) {
            match self.peek().kind.clone() {
                TokenKind::KwListen => {
                    self.advance();
                    let handlers = self.parse_call_object();
                    arena.push(Node::ListenCall { target: raw, handlers }, parent, pos);
                }
                TokenKind::KwDelegate => {
                    self.advance();
                    let (children, handlers) = self.parse_delegate_object();
                    arena.push(Node::DelegateCall { parent: raw, children, handlers }, parent, pos);
                }
                _ => {
                    let rhs = self.capture_until_semicolon();
                    arena.push(Node::ArrowExpr { lhs: raw, rhs }, parent, pos);
                }
            }
            self.matches(&TokenKind::Semicolon);
        }
    }

    fn parse_vir(&mut self, arena: &mut Arena, parent: NodeId) {
        let pos = self.peek().position;
        self.advance();
        let name = if matches!(self.peek().kind, TokenKind::Identifier) {
            self.advance().lexeme
        } else {
            String::new()
        };
        self.matches(&TokenKind::Colon);
        let handlers = if self.check(&TokenKind::LBrace) {
            self.parse_object_literal()
        } else {
            Vec::new()
        };
        self.matches(&TokenKind::Semicolon);
        arena.push(Node::VirDeclaration { name, handlers }, parent, pos);
    }

    /// Parses `listen({ click: fn, ... })` — skips the outer call
    /// parentheses and delegates to the object-literal reader.
    fn parse_call_object(&mut self) -> Vec<(String, String)> {
        self.matches(&TokenKind::LParen);
        let handlers = if self.check(&TokenKind::LBrace) { self.parse_object_literal() } else { Vec::new() };
        self.matches(&TokenKind::RParen);
        handlers
    }

    fn parse_delegate_object(&mut self) -> (Vec<String>, Vec<(String, String)>) {
        self.matches(&TokenKind::LParen);
        let mut children = Vec::new();
        let mut handlers = Vec::new();
        if self.check(&TokenKind::LBrace) {
            for (key, value) in self.parse_object_literal() {
                if key == "target" {
                    children = value
                        .trim_matches(|c| c == '[' || c == ']')
                        .split(',')
                        .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                } else {
                    handlers.push((key, value));
                }
            }
        }
        self.matches(&TokenKind::RParen);
        (children, handlers)
    }

    /// Parses a `{ key: value, key2: value2 }` object literal, reading each
    /// value as a balanced run of tokens (handles nested `{}`/`()`).
    fn parse_object_literal(&mut self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        self.matches(&TokenKind::LBrace);
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let key = self.advance().lexeme;
            self.matches(&TokenKind::Colon);
            let value = self.capture_object_value();
            pairs.push((key, value));
            self.matches(&TokenKind::Comma);
        }
        self.matches(&TokenKind::RBrace);
        pairs
    }

    fn capture_object_value(&mut self) -> String {
        let mut depth = 0i32;
        let mut out = String::new();
        loop {
            if self.at_eof() {
                break;
            }
            match self.peek().kind {
                TokenKind::LBrace | TokenKind::LParen => depth += 1,
                TokenKind::RBrace | TokenKind::RParen if depth > 0 => depth -= 1,
                TokenKind::RBrace if depth == 0 => break,
                TokenKind::Comma if depth == 0 => break,
                _ => {}
            }
            out.push_str(&self.advance().lexeme);
            out.push(' ');
        }
        out.trim().to_string()
    }

    fn capture_until_semicolon(&mut self) -> String {
        let mut out = String::new();
        while !self.check(&TokenKind::Semicolon) && !self.at_eof() {
            out.push_str(&self.advance().lexeme);
            out.push(' ');
        }
        out.trim().to_string()
    }

    fn capture_balanced_or_until_semicolon(&mut self) -> String {
        if self.check(&TokenKind::LBrace) {
            self.advance();
            let mut depth = 1i32;
            let mut out = String::new();
            while depth > 0 && !self.at_eof() {
                match self.peek().kind {
                    TokenKind::LBrace => depth += 1,
                    TokenKind::RBrace => {
                        depth -= 1;
                        if depth == 0 {
                            self.advance();
                            break;
                        }
                    }
                    _ => {}
                }
                out.push_str(&self.advance().lexeme);
                out.push(' ');
            }
            out.trim().to_string()
        } else {
            self.capture_until_semicolon()
        }
    }

    fn parse_animate_call(&mut self, pos: Position) -> AnimateCall {
        let mut call = AnimateCall { target: String::new(), duration: None, easing: None, loop_: false, delay: None, keyframes: Vec::new() };
        self.matches(&TokenKind::LParen);
        if self.check(&TokenKind::LBrace) {
            for (key, value) in self.parse_object_literal() {
                match key.as_str() {
                    "target" => call.target = value.trim_matches(|c| c == '\'' || c == '"').to_string(),
                    "duration" => call.duration = Some(value),
                    "easing" => call.easing = Some(value),
                    "delay" => call.delay = Some(value),
                    "loop" => call.loop_ = value.trim() == "true",
                    other => call.keyframes.push(Keyframe {
                        at: other.to_string(),
                        styles: vec![crate::ast::InlineDecl {
                            property: "raw".to_string(),
                            value: crate::ast::ValueLiteral::Unquoted(value),
                        }],
                    }),
                }
            }
        }
        self.matches(&TokenKind::RParen);
        let _ = pos;
        call
    }

    fn parse_raw_statement(&mut self, arena: &mut Arena, parent: NodeId) {
        let pos = self.peek().position;
        let mut code = String::new();
        let mut depth = 0i32;
        loop {
            if self.at_eof() {
                break;
            }
            match self.peek().kind {
                TokenKind::LBrace | TokenKind::LParen => depth += 1,
                TokenKind::RBrace | TokenKind::RParen => depth -= 1,
                TokenKind::Semicolon if depth <= 0 => {
                    code.push_str(&self.advance().lexeme);
                    break;
                }
                TokenKind::DoubleLBrace | TokenKind::KwVir | TokenKind::KwAnimate if depth <= 0 => break,
                TokenKind::Arrow => {
                    // `obj->member` lowers to `obj.member` unconditionally
                    // (spec §4.8), not just right after a `{{selector}}`.
                    self.advance();
                    code.push('.');
                    continue;
                }
                _ => {}
            }
            code.push_str(&self.advance().lexeme);
            code.push(' ');
        }
        let code = code.trim().to_string();
        if !code.is_empty() {
            arena.push(Node::RawJs { code }, parent, pos);
        }
    }
}
