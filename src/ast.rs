//! AST node taxonomy (spec §3) as a single closed sum type over an arena.
//!
//! Per spec §9's redesign notes: one unified `Node` enum rather than the
//! original's two overlapping hierarchies, and arena-indexed children with
//! parent pointers stored as indices (no reference counting, no cycles).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    Class,
    Id,
    PseudoClass,
    PseudoElement,
    Reference,
    Compound,
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    TemplateStyle,
    TemplateElement,
    TemplateVar,
    CustomStyle,
    CustomElement,
    CustomVar,
    Origin,
    Namespace,
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtType {
    Style,
    Element,
    Var,
    Html,
    JavaScript,
    Chtl,
    CJmod,
    Config,
    /// A user-registered origin type (e.g. `@Vue`), carrying its spelling
    /// without the leading `@`.
    Custom(String),
}

impl AtType {
    pub fn from_marker(marker: &str, registered: &HashMap<String, ()>) -> AtType {
        match marker {
            "@Style" => AtType::Style,
            "@Element" => AtType::Element,
            "@Var" => AtType::Var,
            "@Html" => AtType::Html,
            "@JavaScript" => AtType::JavaScript,
            "@Chtl" => AtType::Chtl,
            "@CJmod" => AtType::CJmod,
            "@Config" => AtType::Config,
            other => {
                let name = other.trim_start_matches('@').to_string();
                debug_assert!(registered.contains_key(&name) || true);
                AtType::Custom(name)
            }
        }
    }

    /// The symbol kind a `Reference` of this `AtType` should resolve to,
    /// when paired with whether the definition is a Template or a Custom.
    pub fn symbol_kind(&self, is_custom: bool) -> Option<SymbolKind> {
        match (self, is_custom) {
            (AtType::Style, false) => Some(SymbolKind::TemplateStyle),
            (AtType::Style, true) => Some(SymbolKind::CustomStyle),
            (AtType::Element, false) => Some(SymbolKind::TemplateElement),
            (AtType::Element, true) => Some(SymbolKind::CustomElement),
            (AtType::Var, false) => Some(SymbolKind::TemplateVar),
            (AtType::Var, true) => Some(SymbolKind::CustomVar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKeyword {
    After,
    Before,
    Replace,
    AtTop,
    AtBottom,
}

/// A target used by `except`, `delete`, `insert ... <target>`, specialized
/// with an optional index selector (`div[1]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub selector: String,
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecOp {
    DeleteProp(String),
    DeleteInherit(String),
    DeleteElement(Target),
    InsertElement { position: PositionKeyword, target: Target, body: Vec<NodeId> },
    ReplaceElement { target: Target, body: Vec<NodeId> },
    ModifyProp { name: String, value: ValueLiteral },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueLiteral {
    Quoted(String),
    Unquoted(String),
    /// `ThemeColor(tableColor)` style var reference, resolved during
    /// reference expansion.
    VarRef { template: String, key: String },
}

impl ValueLiteral {
    pub fn raw(&self) -> &str {
        match self {
            ValueLiteral::Quoted(s) | ValueLiteral::Unquoted(s) => s,
            ValueLiteral::VarRef { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineDecl {
    pub property: String,
    pub value: ValueLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRule {
    pub kind: SelectorKind,
    pub name: String,
    pub declarations: Vec<InlineDecl>,
}

/// The closed node taxonomy (spec §3). Each variant owns only its direct
/// data; tree structure is expressed through `Arena::children_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Root,
    Element { tag: String, attributes: Vec<Attribute> },
    Text { content: String, unquoted: bool },
    Comment { kind: crate::token::CommentKind, content: String },

    LocalStyleBlock,
    LocalScriptBlock,
    InlineStyleDecl(InlineDecl),
    StyleSelectorRule(SelectorRule),

    EnhancedSelector { raw: String },
    ArrowExpr { lhs: String, rhs: String },
    EventBind { lhs: String, event: String, body: String },
    ListenCall { target: String, handlers: Vec<(String, String)> },
    DelegateCall { parent: String, children: Vec<String>, handlers: Vec<(String, String)> },
    AnimateCall(AnimateCall),
    VirDeclaration { name: String, handlers: Vec<(String, String)> },
    RawJs { code: String },

    TemplateStyle { name: String, properties: Vec<InlineDecl>, inherits: Vec<String> },
    TemplateElement { name: String, inherits: Vec<String> },
    TemplateVar { name: String, vars: Vec<(String, ValueLiteral)>, inherits: Vec<String> },
    CustomStyle { name: String, properties: Vec<InlineDecl>, valueless: Vec<String>, inherits: Vec<String>, ops: Vec<SpecOp> },
    CustomElement { name: String, inherits: Vec<String>, ops: Vec<SpecOp> },
    CustomVar { name: String, vars: Vec<(String, ValueLiteral)>, inherits: Vec<String>, ops: Vec<SpecOp> },

    OriginBlock { origin_type: AtType, name: Option<String>, raw: String },

    Namespace { name: String },
    ImportDecl(ImportDecl),
    /// `[Configuration] @Config Name { ... }`. Carries the parsed body so
    /// the resolver can actually build a [`crate::config::CompilerConfig`]
    /// from it instead of just remembering the group's name.
    ConfigurationGroup {
        name: String,
        options: Vec<(String, crate::config::OptionValue)>,
        name_aliases: Vec<(String, String)>,
        origin_types: Vec<String>,
    },
    UseDecl(UseKind),

    Reference { at_type: AtType, qualified_name: String, from: Option<String>, spec_args: Vec<SpecArg> },
    InheritNode { reference: String },
    ExceptNode { targets: Vec<Target> },

    /// Produced by the parser when recovery swallows a malformed block.
    Sentinel { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecArg {
    Attribute { name: String, value: ValueLiteral },
    Op(SpecOp),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimateCall {
    pub target: String,
    pub duration: Option<String>,
    pub easing: Option<String>,
    pub loop_: bool,
    pub delay: Option<String>,
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyframe {
    pub at: String,
    pub styles: Vec<InlineDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseKind {
    Html5,
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub kind: AtType,
    pub path: String,
    pub symbol: Option<String>,
    pub alias: Option<String>,
    pub wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Literal(ValueLiteral),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub node: Node,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub position: Position,
    /// Set by the resolver once a `Reference` is resolved (spec invariant 2).
    pub resolved_symbol: Option<String>,
}

/// Arena owning every AST node for one file's compilation. Child order is
/// preserved (spec §4.5 "Elements preserve child order").
#[derive(Debug, Default)]
pub struct Arena {
    entries: Vec<NodeEntry>,
}

impl Arena {
    pub fn new() -> Self {
        let mut arena = Arena { entries: Vec::new() };
        arena.entries.push(NodeEntry {
            node: Node::Root,
            parent: None,
            children: Vec::new(),
            position: Position::START,
            resolved_symbol: None,
        });
        arena
    }

    pub fn push(&mut self, node: Node, parent: NodeId, position: Position) -> NodeId {
        let id = NodeId(self.entries.len() as u32);
        self.entries.push(NodeEntry {
            node,
            parent: Some(parent),
            children: Vec::new(),
            position,
            resolved_symbol: None,
        });
        self.entries[parent.0 as usize].children.push(id);
        id
    }

    /// Insert `node` as a child of `parent` at a specific index, used by
    /// `insert after/before/at top/at bottom` specialization (spec §4.6.5).
    pub fn insert_at(&mut self, node: Node, parent: NodeId, index: usize, position: Position) -> NodeId {
        let id = NodeId(self.entries.len() as u32);
        self.entries.push(NodeEntry {
            node,
            parent: Some(parent),
            children: Vec::new(),
            position,
            resolved_symbol: None,
        });
        let children = &mut self.entries[parent.0 as usize].children;
        let index = index.min(children.len());
        children.insert(index, id);
        id
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.entries[parent.0 as usize].children.retain(|c| *c != child);
    }

    pub fn get(&self, id: NodeId) -> &NodeEntry {
        &self.entries[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        &mut self.entries[id.0 as usize]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.entries[id.0 as usize].node
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0 as usize].children
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.entries[id.0 as usize].parent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Invariant 1 (spec §3): every non-root node appears in its parent's
    /// child list exactly once.
    pub fn check_parent_child_invariant(&self) -> bool {
        for (idx, entry) in self.entries.iter().enumerate() {
            if let Some(parent) = entry.parent {
                let id = NodeId(idx as u32);
                let count = self.entries[parent.0 as usize]
                    .children
                    .iter()
                    .filter(|c| **c == id)
                    .count();
                if count != 1 {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_preserves_child_order() {
        let mut arena = Arena::new();
        let a = arena.push(Node::Text { content: "a".into(), unquoted: false }, NodeId::ROOT, Position::START);
        let b = arena.push(Node::Text { content: "b".into(), unquoted: false }, NodeId::ROOT, Position::START);
        assert_eq!(arena.children_of(NodeId::ROOT), &[a, b]);
        assert!(arena.check_parent_child_invariant());
    }

    #[test]
    fn insert_at_respects_index() {
        let mut arena = Arena::new();
        let a = arena.push(Node::Text { content: "a".into(), unquoted: false }, NodeId::ROOT, Position::START);
        let c = arena.push(Node::Text { content: "c".into(), unquoted: false }, NodeId::ROOT, Position::START);
        let b = arena.insert_at(Node::Text { content: "b".into(), unquoted: false }, NodeId::ROOT, 1, Position::START);
        assert_eq!(arena.children_of(NodeId::ROOT), &[a, b, c]);
    }

    #[test]
    fn remove_child_drops_from_parent_list() {
        let mut arena = Arena::new();
        let a = arena.push(Node::Text { content: "a".into(), unquoted: false }, NodeId::ROOT, Position::START);
        arena.remove_child(NodeId::ROOT, a);
        assert!(arena.children_of(NodeId::ROOT).is_empty());
    }
}
