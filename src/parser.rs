//! Recursive-descent parser (C5, spec §4.5).
//!
//! Grounded in the teacher's `parse.rs`: same recursive-descent shape
//! (`parse_*` per construct, `peek`/`expect`/`synchronize`), generalized
//! from JSX-flavored markup to CHTL's own grammar. Depth and token budgets
//! mirror `parse.rs`'s `MAX_RECURSION_DEPTH` guard against pathological
//! input.

mod chtljs;

use crate::ast::{
    Arena, AtType, Attribute, AttributeValue, ImportDecl, InlineDecl, Node, NodeId, PositionKeyword,
    SelectorKind, SelectorRule, SpecOp, Target, UseKind, ValueLiteral,
};
use crate::config::{CompilerConfig, OptionValue};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::state_machine::{Event, StateMachine};
use crate::token::{CommentKind, LiteralForm, Position, Token, TokenKind};

pub const MAX_RECURSION_DEPTH: usize = 1000;
pub const MAX_TOKENS: usize = 1_000_000;

pub struct ParseOutput {
    pub arena: Arena,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    arena: Arena,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
    path: &'a str,
    config: &'a CompilerConfig,
    source: &'a str,
    /// Tracks the CHTL/CHTL-JS context the parser is nested in (spec §4.3).
    /// Transition failures are non-fatal here: the recursive-descent grammar
    /// already enforces legal nesting, so a rejected transition only means
    /// this bookkeeping stack and the grammar briefly disagree (e.g. panic-
    /// mode recovery skipped a frame) rather than a real parse error.
    machine: StateMachine,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, path: &'a str, config: &'a CompilerConfig, source: &'a str) -> Self {
        Parser {
            tokens,
            pos: 0,
            arena: Arena::new(),
            diagnostics: Vec::new(),
            depth: 0,
            path,
            config,
            source,
            machine: StateMachine::new(),
        }
    }

    /// Pushes `event` and returns whether the transition was legal, leaving
    /// the stack unchanged on rejection.
    fn enter_context(&mut self, event: Event) -> bool {
        self.machine.push_event(event).is_ok()
    }

    /// Pops the context pushed by a matching `enter_context`, if any.
    fn exit_context(&mut self, entered: bool) {
        if entered {
            self.machine.pop();
        }
    }

    pub fn parse(mut self) -> ParseOutput {
        if self.tokens.len() > MAX_TOKENS {
            self.error(Position::START, "input exceeds the maximum token budget");
            return ParseOutput { arena: self.arena, diagnostics: self.diagnostics };
        }
        while !self.at_eof() {
            if let Some(id) = self.parse_top_level_item(NodeId::ROOT) {
                let _ = id;
            }
        }
        ParseOutput { arena: self.arena, diagnostics: self.diagnostics }
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
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

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let pos = self.peek().position;
            self.error(pos, format!("expected {what}, found `{}`", self.peek().lexeme));
            None
        }
    }

    fn error(&mut self, pos: Position, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(DiagnosticCode::Parse, self.path, pos.line, pos.column, message));
    }

    /// Panic-mode recovery: skip tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        while !self.at_eof() {
            if matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Semicolon) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn enter(&mut self) -> Result<(), ()> {
        self.depth += 1;
        if self.depth > MAX_RECURSION_DEPTH {
            let pos = self.peek().position;
            self.error(pos, "nesting exceeds the maximum recursion depth");
            self.depth -= 1;
            return Err(());
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn skip_comments(&mut self, parent: NodeId) {
        while let TokenKind::Comment(kind) = self.peek().kind.clone() {
            let tok = self.advance();
            if matches!(kind, CommentKind::Generator) {
                self.arena.push(Node::Comment { kind, content: tok.lexeme }, parent, tok.position);
            }
        }
    }

    // ---- top level ----

    fn parse_top_level_item(&mut self, parent: NodeId) -> Option<NodeId> {
        self.skip_comments(parent);
        if self.at_eof() {
            return None;
        }
        if self.enter().is_err() {
            self.synchronize();
            return None;
        }
        let result = match &self.peek().kind {
            TokenKind::BlockTemplate => self.parse_definition(parent, false),
            TokenKind::BlockCustom => self.parse_definition(parent, true),
            TokenKind::BlockOrigin => self.parse_origin(parent),
            TokenKind::BlockImport => self.parse_import(parent),
            TokenKind::BlockNamespace => self.parse_namespace(parent),
            TokenKind::BlockConfiguration => self.parse_configuration(parent),
            TokenKind::KwUse => self.parse_use(parent),
            TokenKind::Identifier => self.parse_element(parent),
            TokenKind::AtType => self.parse_reference(parent),
            _ => {
                let pos = self.peek().position;
                self.error(pos, format!("unexpected token `{}` at top level", self.peek().lexeme));
                self.synchronize();
                None
            }
        };
        self.exit();
        result
    }

    fn parse_block_body(&mut self, parent: NodeId, mut item: impl FnMut(&mut Self, NodeId) -> Option<NodeId>) {
        self.expect(&TokenKind::LBrace, "`{`");
        loop {
            self.skip_comments(parent);
            if self.at_eof() || self.check(&TokenKind::RBrace) {
                break;
            }
            if self.enter().is_err() {
                self.synchronize();
                break;
            }
            if item(self, parent).is_none() && !self.check(&TokenKind::RBrace) && !self.at_eof() {
                self.synchronize();
            }
            self.exit();
        }
        self.expect(&TokenKind::RBrace, "`}`");
    }

    // ---- elements ----

    fn parse_element(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let tag = tok.lexeme.clone();
        let node = self.arena.push(Node::Element { tag, attributes: Vec::new() }, parent, tok.position);
        let entered = self.enter_context(Event::EnterElement);
        self.parse_block_body(node, |p, parent| p.parse_element_member(parent));
        self.exit_context(entered);
        Some(node)
    }

    fn parse_element_member(&mut self, parent: NodeId) -> Option<NodeId> {
        match self.peek().kind.clone() {
            TokenKind::KwText => self.parse_text_block(parent),
            TokenKind::KwStyle => self.parse_local_style(parent),
            TokenKind::KwScript => self.parse_local_script(parent),
            TokenKind::Identifier if self.is_attribute_ahead() => self.parse_attribute_into_parent(parent),
            TokenKind::Identifier => self.parse_element(parent),
            TokenKind::AtType => self.parse_reference(parent),
            TokenKind::KwInherit => self.parse_inherit(parent),
            TokenKind::KwExcept => self.parse_except(parent),
            _ => {
                let pos = self.peek().position;
                self.error(pos, format!("unexpected token `{}` inside element body", self.peek().lexeme));
                None
            }
        }
    }

    fn is_attribute_ahead(&self) -> bool {
        matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::Colon))
    }

    /// Attributes (`id: "x";`) are folded onto the enclosing `Element` node
    /// rather than becoming children, matching spec §3's attribute list.
    /// Inside a Custom reference's specialization body the same
    /// `name: value;` syntax fills in a valueless property instead, and
    /// folds onto the `Reference` as a `SpecArg::Attribute`.
    fn parse_attribute_into_parent(&mut self, parent: NodeId) -> Option<NodeId> {
        let name_tok = self.advance();
        self.expect(&TokenKind::Colon, "`:`")?;
        let value = self.parse_value_literal()?;
        self.matches(&TokenKind::Semicolon);
        match &mut self.arena.get_mut(parent).node {
            Node::Element { attributes, .. } => {
                attributes.push(Attribute { name: name_tok.lexeme, value: AttributeValue::Literal(value) });
            }
            Node::Reference { spec_args, .. } => {
                spec_args.push(crate::ast::SpecArg::Attribute { name: name_tok.lexeme, value });
            }
            _ => {}
        }
        Some(parent)
    }

    fn parse_text_block(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        self.expect(&TokenKind::LBrace, "`{`")?;
        let value = self.parse_value_literal()?;
        self.matches(&TokenKind::Semicolon);
        self.expect(&TokenKind::RBrace, "`}`")?;
        let unquoted = matches!(value, ValueLiteral::Unquoted(_));
        Some(self.arena.push(Node::Text { content: value.raw().to_string(), unquoted }, parent, tok.position))
    }

    fn parse_value_literal(&mut self) -> Option<ValueLiteral> {
        match self.peek().kind.clone() {
            TokenKind::Literal(LiteralForm::DoubleQuoted) | TokenKind::Literal(LiteralForm::SingleQuoted) => {
                let tok = self.advance();
                Some(ValueLiteral::Quoted(tok.lexeme))
            }
            // `ThemeColor(tableColor)` — a Var-template/custom value
            // reference, resolved by key during specialization (spec §4.6
            // step 4).
            TokenKind::Identifier if matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::LParen)) => {
                let template = self.advance().lexeme;
                self.advance();
                let key = if matches!(self.peek().kind, TokenKind::Identifier) {
                    self.advance().lexeme
                } else {
                    String::new()
                };
                self.expect(&TokenKind::RParen, "`)`");
                Some(ValueLiteral::VarRef { template, key })
            }
            TokenKind::Literal(LiteralForm::Unquoted) | TokenKind::Identifier | TokenKind::Number => {
                let mut parts = Vec::new();
                while !matches!(self.peek().kind, TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Comma | TokenKind::Eof) {
                    parts.push(self.advance().lexeme);
                }
                Some(ValueLiteral::Unquoted(parts.join(" ")))
            }
            _ => {
                let pos = self.peek().position;
                self.error(pos, "expected a value literal");
                None
            }
        }
    }

    // ---- local style / script ----

    fn parse_local_style(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let node = self.arena.push(Node::LocalStyleBlock, parent, tok.position);
        let entered = self.enter_context(Event::EnterStyleBlock);
        self.parse_block_body(node, |p, parent| p.parse_style_member(parent));
        self.exit_context(entered);
        Some(node)
    }

    fn parse_style_member(&mut self, parent: NodeId) -> Option<NodeId> {
        match self.peek().kind.clone() {
            TokenKind::Dot | TokenKind::Hash | TokenKind::Ampersand => self.parse_selector_rule(parent),
            TokenKind::AtType => self.parse_reference(parent),
            TokenKind::Identifier if matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::LBrace)) => {
                self.parse_selector_rule(parent)
            }
            TokenKind::Identifier => self.parse_inline_style_decl(parent),
            _ => {
                let pos = self.peek().position;
                self.error(pos, "expected a style declaration or selector rule");
                None
            }
        }
    }

    fn parse_inline_style_decl(&mut self, parent: NodeId) -> Option<NodeId> {
        let name_tok = self.advance();
        self.expect(&TokenKind::Colon, "`:`")?;
        let value = self.parse_value_literal()?;
        self.matches(&TokenKind::Semicolon);
        Some(self.arena.push(
            Node::InlineStyleDecl(InlineDecl { property: name_tok.lexeme, value }),
            parent,
            name_tok.position,
        ))
    }

    fn parse_selector_rule(&mut self, parent: NodeId) -> Option<NodeId> {
        let pos = self.peek().position;
        let (kind, name) = match self.peek().kind.clone() {
            TokenKind::Dot => {
                self.advance();
                (SelectorKind::Class, self.advance().lexeme)
            }
            TokenKind::Hash => {
                self.advance();
                (SelectorKind::Id, self.advance().lexeme)
            }
            TokenKind::Ampersand => {
                self.advance();
                let rest = self.advance().lexeme;
                (SelectorKind::PseudoClass, rest)
            }
            _ => (SelectorKind::Compound, self.advance().lexeme),
        };
        self.expect(&TokenKind::LBrace, "`{`")?;
        let entered = self.enter_context(Event::EnterSelectorRule);
        let mut declarations = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let name_tok = self.advance();
            if !self.matches(&TokenKind::Colon) {
                break;
            }
            if let Some(value) = self.parse_value_literal() {
                declarations.push(InlineDecl { property: name_tok.lexeme, value });
            }
            self.matches(&TokenKind::Semicolon);
        }
        self.exit_context(entered);
        self.expect(&TokenKind::RBrace, "`}`")?;
        Some(self.arena.push(Node::StyleSelectorRule(SelectorRule { kind, name, declarations }), parent, pos))
    }

    fn parse_local_script(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        self.expect(&TokenKind::LBrace, "`{`")?;
        let entered = self.enter_context(Event::EnterScriptBlock);
        let node = self.arena.push(Node::LocalScriptBlock, parent, tok.position);
        let start_offset = self.peek().position.offset as usize;
        let mut depth = 1usize;
        while depth > 0 && !self.at_eof() {
            match self.peek().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        let end_offset = self.peek().position.offset as usize;
        let raw = self.source.get(start_offset..end_offset).unwrap_or_default();
        self.exit_context(entered);
        self.expect(&TokenKind::RBrace, "`}`")?;

        let (body_tokens, lex_diags) = crate::lexer::ChtlJsLexer::new(raw, self.path).tokenize();
        self.diagnostics.extend(lex_diags);
        let mut sub = chtljs::CHTLJsParser::new(body_tokens, self.path);
        sub.parse_into(&mut self.arena, node);
        self.diagnostics.extend(sub.into_diagnostics());
        Some(node)
    }

    // ---- references / inherit / except ----

    fn parse_reference(&mut self, parent: NodeId) -> Option<NodeId> {
        let at_tok = self.advance();
        let at_type = AtType::from_marker(&at_tok.lexeme, &Default::default());
        let name_tok = self.expect(&TokenKind::Identifier, "a template/custom name")?;
        let mut from = None;
        if self.matches(&TokenKind::KwFrom) {
            from = Some(self.expect(&TokenKind::Identifier, "a namespace name")?.lexeme);
        }
        let node = self.arena.push(
            Node::Reference { at_type, qualified_name: name_tok.lexeme, from, spec_args: Vec::new() },
            parent,
            at_tok.position,
        );
        if self.check(&TokenKind::LBrace) {
            self.parse_specialization_body(node)?;
        } else {
            self.matches(&TokenKind::Semicolon);
        }
        Some(node)
    }

    fn parse_specialization_body(&mut self, parent: NodeId) -> Option<()> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            self.skip_comments(parent);
            if self.check(&TokenKind::RBrace) {
                break;
            }
            match self.peek().kind.clone() {
                TokenKind::KwDelete => {
                    self.parse_delete_op(parent);
                }
                TokenKind::KwInsert => {
                    self.parse_insert_op(parent);
                }
                TokenKind::KwReplace => {
                    self.parse_replace_op(parent);
                }
                TokenKind::Identifier => {
                    self.parse_attribute_into_parent(parent);
                }
                _ => {
                    self.synchronize();
                }
            }
        }
        self.expect(&TokenKind::RBrace, "`}`");
        Some(())
    }

    fn parse_target(&mut self) -> Target {
        let selector = self.advance().lexeme;
        let mut index = None;
        if self.matches(&TokenKind::LBracket) {
            if let TokenKind::Number = self.peek().kind {
                index = self.advance().lexeme.parse().ok();
            }
            self.matches(&TokenKind::RBracket);
        }
        Target { selector, index }
    }

    fn parse_delete_op(&mut self, parent: NodeId) {
        let pos = self.advance().position;
        let target = self.parse_target();
        self.matches(&TokenKind::Semicolon);
        self.arena.push(Node::Sentinel { reason: "delete-op-placeholder".into() }, parent, pos);
        self.attach_spec_op(parent, SpecOp::DeleteElement(target));
    }

    fn parse_insert_op(&mut self, parent: NodeId) {
        let pos = self.advance().position;
        let position = match self.peek().kind.clone() {
            TokenKind::KwAfter => {
                self.advance();
                PositionKeyword::After
            }
            TokenKind::KwBefore => {
                self.advance();
                PositionKeyword::Before
            }
            TokenKind::KwAtTop => {
                self.advance();
                PositionKeyword::AtTop
            }
            TokenKind::KwAtBottom => {
                self.advance();
                PositionKeyword::AtBottom
            }
            _ => PositionKeyword::AtBottom,
        };
        let target = self.parse_target();
        let mut body = Vec::new();
        if self.check(&TokenKind::LBrace) {
            self.advance();
            while !self.check(&TokenKind::RBrace) && !self.at_eof() {
                if let Some(id) = self.parse_element_member(parent) {
                    body.push(id);
                } else {
                    self.synchronize();
                }
            }
            self.expect(&TokenKind::RBrace, "`}`");
        }
        self.matches(&TokenKind::Semicolon);
        let _ = pos;
        self.attach_spec_op(parent, SpecOp::InsertElement { position, target, body });
    }

    fn parse_replace_op(&mut self, parent: NodeId) {
        let _pos = self.advance().position;
        let target = self.parse_target();
        let mut body = Vec::new();
        if self.check(&TokenKind::LBrace) {
            self.advance();
            while !self.check(&TokenKind::RBrace) && !self.at_eof() {
                if let Some(id) = self.parse_element_member(parent) {
                    body.push(id);
                } else {
                    self.synchronize();
                }
            }
            self.expect(&TokenKind::RBrace, "`}`");
        }
        self.matches(&TokenKind::Semicolon);
        self.attach_spec_op(parent, SpecOp::ReplaceElement { target, body });
    }

    fn attach_spec_op(&mut self, node: NodeId, op: SpecOp) {
        match &mut self.arena.get_mut(node).node {
            Node::CustomStyle { ops, .. } | Node::CustomElement { ops, .. } | Node::CustomVar { ops, .. } => {
                ops.push(op);
            }
            Node::Reference { spec_args, .. } => {
                spec_args.push(crate::ast::SpecArg::Op(op));
            }
            _ => {}
        }
    }

    fn parse_inherit(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let mut reference = String::new();
        if matches!(self.peek().kind, TokenKind::AtType) {
            reference.push_str(&self.advance().lexeme);
            reference.push(' ');
        }
        reference.push_str(&self.expect(&TokenKind::Identifier, "a template/custom name")?.lexeme);
        self.matches(&TokenKind::Semicolon);
        Some(self.arena.push(Node::InheritNode { reference }, parent, tok.position))
    }

    fn parse_except(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let mut targets = vec![self.parse_target()];
        while self.matches(&TokenKind::Comma) {
            targets.push(self.parse_target());
        }
        self.matches(&TokenKind::Semicolon);
        Some(self.arena.push(Node::ExceptNode { targets }, parent, tok.position))
    }

    // ---- templates / customs ----

    fn parse_definition(&mut self, parent: NodeId, is_custom: bool) -> Option<NodeId> {
        let tok = self.advance();
        let at_tok = self.expect(&TokenKind::AtType, "`@Style`/`@Element`/`@Var`")?;
        let name_tok = self.expect(&TokenKind::Identifier, "a definition name")?;
        let name = name_tok.lexeme;

        let node = match at_tok.lexeme.as_str() {
            "@Style" if !is_custom => self.arena.push(Node::TemplateStyle { name, properties: Vec::new(), inherits: Vec::new() }, parent, tok.position),
            "@Style" => self.arena.push(Node::CustomStyle { name, properties: Vec::new(), valueless: Vec::new(), inherits: Vec::new(), ops: Vec::new() }, parent, tok.position),
            "@Element" if !is_custom => self.arena.push(Node::TemplateElement { name, inherits: Vec::new() }, parent, tok.position),
            "@Element" => self.arena.push(Node::CustomElement { name, inherits: Vec::new(), ops: Vec::new() }, parent, tok.position),
            "@Var" if !is_custom => self.arena.push(Node::TemplateVar { name, vars: Vec::new(), inherits: Vec::new() }, parent, tok.position),
            "@Var" => self.arena.push(Node::CustomVar { name, vars: Vec::new(), inherits: Vec::new(), ops: Vec::new() }, parent, tok.position),
            other => {
                self.error(at_tok.position, format!("unknown definition type `{other}`"));
                return None;
            }
        };

        self.expect(&TokenKind::LBrace, "`{`")?;
        let entered = self.enter_context(if is_custom { Event::EnterCustom } else { Event::EnterTemplate });
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            self.skip_comments(node);
            if self.check(&TokenKind::RBrace) {
                break;
            }
            match self.peek().kind.clone() {
                TokenKind::KwInherit => {
                    let inh = self.parse_inherit_name();
                    self.push_inherit(node, inh);
                }
                TokenKind::Identifier => {
                    self.parse_definition_member(node);
                }
                TokenKind::KwDelete if is_custom => {
                    self.parse_delete_op(node);
                }
                TokenKind::KwInsert if is_custom => {
                    self.parse_insert_op(node);
                }
                TokenKind::KwReplace if is_custom => {
                    self.parse_replace_op(node);
                }
                TokenKind::KwStyle => {
                    self.parse_local_style(node);
                }
                TokenKind::AtType => {
                    self.parse_reference(node);
                }
                _ => self.synchronize(),
            }
        }
        self.exit_context(entered);
        self.expect(&TokenKind::RBrace, "`}`");
        Some(node)
    }

    fn parse_inherit_name(&mut self) -> String {
        self.advance();
        let mut reference = String::new();
        if matches!(self.peek().kind, TokenKind::AtType) {
            reference.push_str(&self.advance().lexeme);
            reference.push(' ');
        }
        reference.push_str(&self.advance().lexeme);
        self.matches(&TokenKind::Semicolon);
        reference
    }

    fn push_inherit(&mut self, node: NodeId, parent_name: String) {
        match &mut self.arena.get_mut(node).node {
            Node::TemplateStyle { inherits, .. }
            | Node::TemplateElement { inherits, .. }
            | Node::TemplateVar { inherits, .. }
            | Node::CustomStyle { inherits, .. }
            | Node::CustomElement { inherits, .. }
            | Node::CustomVar { inherits, .. } => inherits.push(parent_name),
            _ => {}
        }
    }

    fn parse_definition_member(&mut self, node: NodeId) {
        let name_tok = self.advance();
        if self.matches(&TokenKind::Colon) {
            if let Some(value) = self.parse_value_literal() {
                self.matches(&TokenKind::Semicolon);
                self.push_property(node, name_tok.lexeme, value);
            }
        } else {
            // Valueless property declaration inside a Custom (spec §4.6.3).
            self.matches(&TokenKind::Semicolon);
            if let Node::CustomStyle { valueless, .. } = &mut self.arena.get_mut(node).node {
                valueless.push(name_tok.lexeme);
            }
        }
    }

    fn push_property(&mut self, node: NodeId, name: String, value: ValueLiteral) {
        match &mut self.arena.get_mut(node).node {
            Node::TemplateStyle { properties, .. } | Node::CustomStyle { properties, .. } => {
                properties.push(InlineDecl { property: name, value });
            }
            Node::TemplateVar { vars, .. } | Node::CustomVar { vars, .. } => {
                vars.push((name, value));
            }
            _ => {}
        }
    }

    // ---- origin ----

    fn parse_origin(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let at_tok = self.expect(&TokenKind::AtType, "an origin type, e.g. `@Html`")?;
        let mut name = None;
        if let TokenKind::Identifier = self.peek().kind {
            name = Some(self.advance().lexeme);
        }
        self.expect(&TokenKind::LBrace, "`{`")?;
        let entered = self.enter_context(Event::EnterOrigin);
        let start_offset = self.peek().position.offset as usize;
        let mut depth = 1usize;
        while depth > 0 && !self.at_eof() {
            match self.peek().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        let end_offset = self.peek().position.offset as usize;
        let raw = self.source.get(start_offset..end_offset).unwrap_or_default().to_string();
        self.exit_context(entered);
        self.expect(&TokenKind::RBrace, "`}`")?;
        let origin_type = AtType::from_marker(&at_tok.lexeme, &Default::default());
        Some(self.arena.push(Node::OriginBlock { origin_type, name, raw }, parent, tok.position))
    }

    // ---- import / namespace / configuration / use ----

    fn parse_import(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let at_tok = self.expect(&TokenKind::AtType, "an import kind, e.g. `@Chtl`")?;
        let mut symbol = None;
        let mut wildcard = false;
        if self.matches(&TokenKind::Dot) || matches!(self.peek().kind, TokenKind::Identifier) {
            if matches!(self.peek().kind, TokenKind::Identifier) {
                symbol = Some(self.advance().lexeme);
            }
        }
        if self.matches(&TokenKind::KwFrom) {
        }
        let path_tok = self.expect(&TokenKind::Literal(LiteralForm::DoubleQuoted), "an import path string").or_else(|| {
            if matches!(self.peek().kind, TokenKind::Identifier) {
                Some(self.advance())
            } else {
                None
            }
        });
        let path = path_tok.map(|t| t.lexeme).unwrap_or_default();
        let mut alias = None;
        if self.matches(&TokenKind::KwAs) {
            alias = Some(self.advance().lexeme);
        }
        if path.ends_with('*') {
            wildcard = true;
        }
        self.matches(&TokenKind::Semicolon);
        let kind = AtType::from_marker(&at_tok.lexeme, &Default::default());
        Some(self.arena.push(Node::ImportDecl(ImportDecl { kind, path, symbol, alias, wildcard }), parent, tok.position))
    }

    fn parse_namespace(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let name = self.expect(&TokenKind::Identifier, "a namespace name")?.lexeme;
        let node = self.arena.push(Node::Namespace { name }, parent, tok.position);
        if self.check(&TokenKind::LBrace) {
            let entered = self.enter_context(Event::EnterNamespace);
            self.parse_block_body(node, |p, parent| p.parse_top_level_item(parent));
            self.exit_context(entered);
        } else {
            self.matches(&TokenKind::Semicolon);
        }
        Some(node)
    }

    /// `[Configuration] @Config Name { ... }` — parses the option list, the
    /// `[Name]` alias block, and the `[OriginType]` registration block into
    /// the group so the resolver can build a real
    /// [`crate::config::CompilerConfig`] from it (spec §4.9) instead of just
    /// remembering the group's name.
    fn parse_configuration(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        let mut name = "default".to_string();
        if self.matches(&TokenKind::AtType) {
            // `@Config`
        }
        if let TokenKind::Identifier = self.peek().kind {
            name = self.advance().lexeme;
        }
        let mut options = Vec::new();
        let mut name_aliases = Vec::new();
        let mut origin_types = Vec::new();
        self.expect(&TokenKind::LBrace, "`{`")?;
        let entered = self.enter_context(Event::EnterConfiguration);
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            if matches!(self.peek().kind, TokenKind::BlockName) {
                self.advance();
                self.expect(&TokenKind::LBrace, "`{`");
                let name_entered = self.enter_context(Event::EnterNameBlock);
                while !self.check(&TokenKind::RBrace) && !self.at_eof() {
                    if matches!(self.peek().kind, TokenKind::Identifier) {
                        let canonical = self.advance().lexeme;
                        self.matches(&TokenKind::Colon);
                        if matches!(self.peek().kind, TokenKind::Identifier) {
                            name_aliases.push((canonical, self.advance().lexeme));
                        }
                        self.matches(&TokenKind::Semicolon);
                        continue;
                    }
                    self.advance();
                }
                self.exit_context(name_entered);
                self.expect(&TokenKind::RBrace, "`}`");
                continue;
            }
            if matches!(self.peek().kind, TokenKind::BlockOriginType) {
                self.advance();
                self.expect(&TokenKind::LBrace, "`{`");
                while !self.check(&TokenKind::RBrace) && !self.at_eof() {
                    if matches!(self.peek().kind, TokenKind::AtType) {
                        origin_types.push(self.advance().lexeme);
                    } else {
                        self.advance();
                        continue;
                    }
                    self.matches(&TokenKind::Comma);
                    self.matches(&TokenKind::Semicolon);
                }
                self.expect(&TokenKind::RBrace, "`}`");
                continue;
            }
            if matches!(self.peek().kind, TokenKind::Identifier) {
                let key = self.advance().lexeme;
                self.matches(&TokenKind::Colon);
                let value = self.parse_config_value();
                options.push((key, value));
                self.matches(&TokenKind::Semicolon);
                continue;
            }
            self.advance();
        }
        self.exit_context(entered);
        self.expect(&TokenKind::RBrace, "`}`");
        let node = self.arena.push(
            Node::ConfigurationGroup { name, options, name_aliases, origin_types },
            parent,
            tok.position,
        );
        Some(node)
    }

    /// One option's right-hand side: a bracketed group (`[@Style, @style]`),
    /// a bare integer, `true`/`false`, or an opaque word/string — the
    /// scalar/array/group shapes `OptionValue` distinguishes.
    fn parse_config_value(&mut self) -> OptionValue {
        if self.matches(&TokenKind::LBracket) {
            let mut items = Vec::new();
            while !self.check(&TokenKind::RBracket) && !self.at_eof() {
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                items.push(self.advance().lexeme);
            }
            self.matches(&TokenKind::RBracket);
            return OptionValue::Group(items);
        }
        match self.peek().kind.clone() {
            TokenKind::Number => OptionValue::Int(self.advance().lexeme.parse().unwrap_or(0)),
            TokenKind::Identifier if matches!(self.peek().lexeme.as_str(), "true" | "false") => {
                OptionValue::Bool(self.advance().lexeme == "true")
            }
            _ => OptionValue::String(self.advance().lexeme),
        }
    }

    fn parse_use(&mut self, parent: NodeId) -> Option<NodeId> {
        let tok = self.advance();
        if self.matches(&TokenKind::KwHtml5) {
            self.matches(&TokenKind::Semicolon);
            return Some(self.arena.push(Node::UseDecl(UseKind::Html5), parent, tok.position));
        }
        self.matches(&TokenKind::AtType);
        let name = self.expect(&TokenKind::Identifier, "a configuration name")?.lexeme;
        self.matches(&TokenKind::Semicolon);
        Some(self.arena.push(Node::UseDecl(UseKind::Config(name)), parent, tok.position))
    }
}

/// Parse one complete CHTL source file into an [`Arena`] of [`Node`]s.
pub fn parse_source(source: &str, path: &str, config: &CompilerConfig) -> ParseOutput {
    let scan = crate::scanner::UnifiedScanner::new(source, path).scan();
    let (tokens, mut lex_diags) = crate::lexer::ChtlLexer::new(source, path, config).tokenize();
    let mut out = Parser::new(tokens, path, config, source).parse();
    let mut diagnostics = scan.errors;
    diagnostics.append(&mut lex_diags);
    diagnostics.append(&mut out.diagnostics);
    out.diagnostics = diagnostics;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;

    fn parse(src: &str) -> ParseOutput {
        let config = CompilerConfig::default();
        parse_source(src, "t.chtl", &config)
    }

    #[test]
    fn parses_simple_element_with_text() {
        let out = parse("div { text { \"hello\" } }");
        assert!(out.diagnostics.iter().all(|d| !d.is_error()), "{:?}", out.diagnostics);
        let root_children = out.arena.children_of(NodeId::ROOT);
        assert_eq!(root_children.len(), 1);
        assert!(matches!(out.arena.node(root_children[0]), Node::Element { .. }));
    }

    #[test]
    fn parses_attribute_with_ce_equivalence() {
        let out = parse("div { id = box; }");
        let div = out.arena.children_of(NodeId::ROOT)[0];
        match out.arena.node(div) {
            Node::Element { attributes, .. } => assert_eq!(attributes.len(), 1),
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn parses_template_style_definition() {
        let out = parse("[Template] @Style Box { width: 100px; }");
        assert!(out.diagnostics.iter().all(|d| !d.is_error()), "{:?}", out.diagnostics);
        let def = out.arena.children_of(NodeId::ROOT)[0];
        assert!(matches!(out.arena.node(def), Node::TemplateStyle { .. }));
    }

    #[test]
    fn parses_custom_with_delete_op() {
        let out = parse("[Custom] @Element Box { inherit @Element Base; delete span[0]; }");
        assert!(out.diagnostics.iter().all(|d| !d.is_error()), "{:?}", out.diagnostics);
        let def = out.arena.children_of(NodeId::ROOT)[0];
        match out.arena.node(def) {
            Node::CustomElement { ops, inherits, .. } => {
                assert_eq!(inherits.len(), 1);
                assert_eq!(ops.len(), 1);
            }
            _ => panic!("expected custom element"),
        }
    }

    #[test]
    fn parses_namespaced_template_reference() {
        let out = parse("div { @Style Box from ui; }");
        let div = out.arena.children_of(NodeId::ROOT)[0];
        let reference = out.arena.children_of(div)[0];
        match out.arena.node(reference) {
            Node::Reference { from, .. } => assert_eq!(from.as_deref(), Some("ui")),
            _ => panic!("expected reference"),
        }
    }

    #[test]
    fn recovers_from_malformed_top_level_token() {
        let out = parse("$$$ div { text { \"ok\" } }");
        assert!(out.diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn parses_configuration_group_body_instead_of_discarding_it() {
        let out = parse(
            r#"
            [Configuration] @Config MyConfig {
                INDEX_INITIAL_COUNT = 1;
                CUSTOM_STYLE = [@Style, @style, @CSS];
                [Name] {
                    inherit: extends;
                }
            }
            "#,
        );
        assert!(out.diagnostics.iter().all(|d| !d.is_error()), "{:?}", out.diagnostics);
        let def = out.arena.children_of(NodeId::ROOT)[0];
        match out.arena.node(def) {
            Node::ConfigurationGroup { name, options, name_aliases, .. } => {
                assert_eq!(name, "MyConfig");
                assert!(options.iter().any(|(k, v)| k == "INDEX_INITIAL_COUNT" && matches!(v, crate::config::OptionValue::Int(1))));
                assert!(options.iter().any(|(k, v)| k == "CUSTOM_STYLE" && matches!(v, crate::config::OptionValue::Group(items) if items.len() == 3)));
                assert_eq!(name_aliases, vec![("inherit".to_string(), "extends".to_string())]);
            }
            _ => panic!("expected configuration group"),
        }
    }
}
