//! Lexer/parser context state machine (C3, spec §4.3).
//!
//! Grounded in the teacher's `scope.rs` stack discipline, generalized from
//! a lexical-scope stack into a context stack plus a declarative transition
//! table. The table is a `once_cell::sync::Lazy<Vec<TransitionRule>>`
//! rather than a match arm per pair, mirroring how `parse.rs` builds its
//! dispatch tables once and reuses them across the whole file.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Context {
    TopLevel,
    ElementBody,
    LocalStyleBlock,
    StyleSelectorRule,
    LocalScriptBlock,
    /// Inside `{{ ... }}` or following `->`/`&->` within a script block.
    CHTLJsExpression,
    TemplateBody,
    CustomBody,
    OriginBody,
    NamespaceBody,
    ConfigurationBody,
    NameBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    EnterElement,
    EnterStyleBlock,
    EnterScriptBlock,
    EnterSelectorRule,
    EnterTemplate,
    EnterCustom,
    EnterOrigin,
    EnterNamespace,
    EnterConfiguration,
    EnterNameBlock,
    EnterEnhancedSelector,
    Exit,
}

/// One row of the transition table: in context `from`, event `event` is
/// legal and produces context `to`. `priority` breaks ties when more than
/// one rule matches the same `(from, event)` pair (longest-match style,
/// mirroring the parser's token disambiguation in spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: Context,
    pub event: Event,
    pub to: Context,
    pub priority: u8,
}

static TRANSITIONS: Lazy<Vec<TransitionRule>> = Lazy::new(|| {
    vec![
        TransitionRule { from: Context::TopLevel, event: Event::EnterElement, to: Context::ElementBody, priority: 0 },
        TransitionRule { from: Context::TopLevel, event: Event::EnterTemplate, to: Context::TemplateBody, priority: 0 },
        TransitionRule { from: Context::TopLevel, event: Event::EnterCustom, to: Context::CustomBody, priority: 0 },
        TransitionRule { from: Context::TopLevel, event: Event::EnterOrigin, to: Context::OriginBody, priority: 0 },
        TransitionRule { from: Context::TopLevel, event: Event::EnterNamespace, to: Context::NamespaceBody, priority: 0 },
        TransitionRule { from: Context::TopLevel, event: Event::EnterConfiguration, to: Context::ConfigurationBody, priority: 0 },
        TransitionRule { from: Context::ElementBody, event: Event::EnterElement, to: Context::ElementBody, priority: 0 },
        TransitionRule { from: Context::ElementBody, event: Event::EnterStyleBlock, to: Context::LocalStyleBlock, priority: 0 },
        TransitionRule { from: Context::ElementBody, event: Event::EnterScriptBlock, to: Context::LocalScriptBlock, priority: 0 },
        TransitionRule { from: Context::TemplateBody, event: Event::EnterStyleBlock, to: Context::LocalStyleBlock, priority: 0 },
        TransitionRule { from: Context::CustomBody, event: Event::EnterStyleBlock, to: Context::LocalStyleBlock, priority: 0 },
        TransitionRule { from: Context::CustomBody, event: Event::EnterElement, to: Context::ElementBody, priority: 0 },
        TransitionRule { from: Context::LocalStyleBlock, event: Event::EnterSelectorRule, to: Context::StyleSelectorRule, priority: 0 },
        TransitionRule { from: Context::LocalScriptBlock, event: Event::EnterEnhancedSelector, to: Context::CHTLJsExpression, priority: 0 },
        TransitionRule { from: Context::ConfigurationBody, event: Event::EnterNameBlock, to: Context::NameBlock, priority: 0 },
    ]
});

/// A pushdown stack of lexer/parser contexts, mirroring the teacher's
/// `ScopeStack` push/pop discipline but over `Context` instead of lexical
/// bindings.
#[derive(Debug)]
pub struct StateMachine {
    stack: Vec<Context>,
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine { stack: vec![Context::TopLevel] }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Context {
        *self.stack.last().expect("state machine stack is never empty")
    }

    /// Apply `event` from the current context, pushing the resulting
    /// context. Errors if no transition rule matches.
    pub fn push_event(&mut self, event: Event) -> Result<Context, String> {
        let from = self.current();
        let best = TRANSITIONS
            .iter()
            .filter(|r| r.from == from && r.event == event)
            .max_by_key(|r| r.priority);
        match best {
            Some(rule) => {
                self.stack.push(rule.to);
                Ok(rule.to)
            }
            None => Err(format!("no transition for {event:?} from {from:?}")),
        }
    }

    pub fn pop(&mut self) -> Option<Context> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_in_chtljs_context(&self) -> bool {
        matches!(self.current(), Context::CHTLJsExpression | Context::LocalScriptBlock)
    }

    pub fn can_use_enhanced_selectors(&self) -> bool {
        self.is_in_chtljs_context()
    }

    pub fn can_use_arrow_operator(&self) -> bool {
        self.is_in_chtljs_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_exit_style_block() {
        let mut sm = StateMachine::new();
        sm.push_event(Event::EnterElement).unwrap();
        sm.push_event(Event::EnterStyleBlock).unwrap();
        assert_eq!(sm.current(), Context::LocalStyleBlock);
        assert!(sm.pop().is_some());
        assert_eq!(sm.current(), Context::ElementBody);
    }

    #[test]
    fn enhanced_selectors_only_legal_inside_script() {
        let mut sm = StateMachine::new();
        assert!(!sm.can_use_enhanced_selectors());
        sm.push_event(Event::EnterElement).unwrap();
        sm.push_event(Event::EnterScriptBlock).unwrap();
        assert!(sm.can_use_enhanced_selectors());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut sm = StateMachine::new();
        let result = sm.push_event(Event::EnterSelectorRule);
        assert!(result.is_err());
    }

    #[test]
    fn root_context_cannot_be_popped() {
        let mut sm = StateMachine::new();
        assert!(sm.pop().is_none());
        assert_eq!(sm.depth(), 1);
    }
}
