//! Configuration Engine (C9, spec §4.9).
//!
//! Grounded in `original_source/src/CHTL/CHTLConfig/AdvancedConfigurationManager.h`
//! for the option catalogue; the group-option / alias-map shape follows the
//! teacher's `ScopeBindings`-style plain-struct-with-sets idiom
//! (`validate.rs`) rather than a virtual option hierarchy.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single named option: scalar, array-of-strings, or a group option
/// (`CUSTOM_STYLE = [@Style, @style, @CSS]`) declaring syntactic aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<String>),
    /// A group option, with an optional (min, max) element-count bound.
    Group(Vec<String>),
}

/// Known boolean/int flags the spec enumerates by name (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationFlags {
    pub disable_style_auto_add_class: bool,
    pub disable_style_auto_add_id: bool,
    pub disable_script_auto_add_class: bool,
    pub disable_script_auto_add_id: bool,
}

impl Default for AutomationFlags {
    fn default() -> Self {
        // Matches original_source/src/Common/SelectorAutomationManager.h's
        // AutomationConfig default member initializers verbatim: style-side
        // automation is on by default, script-side is off by default.
        AutomationFlags {
            disable_style_auto_add_class: false,
            disable_style_auto_add_id: false,
            disable_script_auto_add_class: true,
            disable_script_auto_add_id: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub name: String,
    pub index_initial_count: i64,
    pub disable_name_group: bool,
    pub debug_mode: bool,
    pub disable_default_namespace: bool,
    pub disable_custom_origin_type: bool,
    pub automation: AutomationFlags,
    /// `[Name]` block: maps a canonical core keyword to the user's chosen
    /// alias spelling, e.g. `inherit` -> `extends`. The canonical spelling
    /// always remains valid in addition to any alias (spec §9 Open Q #2).
    pub name_aliases: IndexMap<String, String>,
    /// `[OriginType]` block: user-registered raw-embed marker names, valid
    /// only while this configuration is active (spec §3 invariant 8).
    pub origin_types: IndexMap<String, ()>,
    /// Any other scalar/array/group option not covered by a named field
    /// above, keyed by its declared name (e.g. `CUSTOM_STYLE`).
    pub options: IndexMap<String, OptionValue>,
    /// Name of a parent configuration this one inherits from, if any.
    pub inherits: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            name: "default".to_string(),
            index_initial_count: 0,
            disable_name_group: false,
            debug_mode: false,
            disable_default_namespace: false,
            disable_custom_origin_type: false,
            automation: AutomationFlags::default(),
            name_aliases: IndexMap::new(),
            origin_types: IndexMap::new(),
            options: IndexMap::new(),
            inherits: None,
        }
    }
}

impl CompilerConfig {
    /// Resolve `name` against a known flag/option, applying a user alias if
    /// one was declared for it. User aliases override defaults; core
    /// keywords are never suppressed (spec §9 Open Q #2).
    pub fn apply_known_option(&mut self, key: &str, value: OptionValue) {
        match (key, &value) {
            ("INDEX_INITIAL_COUNT", OptionValue::Int(n)) => self.index_initial_count = *n,
            ("DISABLE_NAME_GROUP", OptionValue::Bool(b)) => self.disable_name_group = *b,
            ("DEBUG_MODE", OptionValue::Bool(b)) => self.debug_mode = *b,
            ("DISABLE_DEFAULT_NAMESPACE", OptionValue::Bool(b)) => self.disable_default_namespace = *b,
            ("DISABLE_CUSTOM_ORIGIN_TYPE", OptionValue::Bool(b)) => self.disable_custom_origin_type = *b,
            ("DISABLE_STYLE_AUTO_ADD_CLASS", OptionValue::Bool(b)) => self.automation.disable_style_auto_add_class = *b,
            ("DISABLE_STYLE_AUTO_ADD_ID", OptionValue::Bool(b)) => self.automation.disable_style_auto_add_id = *b,
            ("DISABLE_SCRIPT_AUTO_ADD_CLASS", OptionValue::Bool(b)) => self.automation.disable_script_auto_add_class = *b,
            ("DISABLE_SCRIPT_AUTO_ADD_ID", OptionValue::Bool(b)) => self.automation.disable_script_auto_add_id = *b,
            _ => {
                self.options.insert(key.to_string(), value);
            }
        }
    }

    /// Merge `parent` underneath `self`, overriding by key (configuration
    /// inheritance, spec §4.9's closing paragraph).
    pub fn inherit_from(mut self, parent: &CompilerConfig) -> Self {
        for (k, v) in &parent.options {
            self.options.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &parent.name_aliases {
            self.name_aliases.entry(k.clone()).or_insert_with(|| v.clone());
        }
        for (k, v) in &parent.origin_types {
            self.origin_types.entry(k.clone()).or_insert(*v);
        }
        self.inherits = Some(parent.name.clone());
        self
    }

    /// Returns the alias for a core keyword, if the active `[Name]` block
    /// declared one.
    pub fn alias_for(&self, canonical: &str) -> Option<&str> {
        self.name_aliases.get(canonical).map(String::as_str)
    }

    /// True if `spelling` resolves to `canonical`, either directly or via an
    /// alias.
    pub fn keyword_matches(&self, spelling: &str, canonical: &str) -> bool {
        spelling == canonical || self.alias_for(canonical) == Some(spelling)
    }

    pub fn group_option(&self, key: &str) -> Option<&[String]> {
        match self.options.get(key) {
            Some(OptionValue::Group(v)) | Some(OptionValue::Array(v)) => Some(v),
            _ => None,
        }
    }

    /// Enforce a group option's declared (min, max) element-count bound.
    pub fn validate_group_size(key: &str, values: &[String], bound: (usize, usize)) -> Result<(), String> {
        let (min, max) = bound;
        if values.len() < min || values.len() > max {
            return Err(format!(
                "group option {key} expects between {min} and {max} entries, got {}",
                values.len()
            ));
        }
        Ok(())
    }
}

/// Registry of named configuration groups plus the one currently active,
/// owned by the compilation job (spec §4.9, §5 "no global singleton").
#[derive(Debug, Default)]
pub struct ConfigurationEngine {
    groups: HashMap<String, CompilerConfig>,
    active: Option<String>,
}

impl ConfigurationEngine {
    pub fn new() -> Self {
        ConfigurationEngine::default()
    }

    pub fn register(&mut self, config: CompilerConfig) {
        self.groups.insert(config.name.clone(), config);
    }

    pub fn activate(&mut self, name: &str) -> Result<(), String> {
        if !self.groups.contains_key(name) {
            return Err(format!("unknown configuration group `{name}`"));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active_config(&self) -> CompilerConfig {
        self.active
            .as_ref()
            .and_then(|name| self.groups.get(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&CompilerConfig> {
        self.groups.get(name)
    }
}

impl Clone for CompilerConfig {
    fn clone(&self) -> Self {
        CompilerConfig {
            name: self.name.clone(),
            index_initial_count: self.index_initial_count,
            disable_name_group: self.disable_name_group,
            debug_mode: self.debug_mode,
            disable_default_namespace: self.disable_default_namespace,
            disable_custom_origin_type: self.disable_custom_origin_type,
            automation: self.automation.clone(),
            name_aliases: self.name_aliases.clone(),
            origin_types: self.origin_types.clone(),
            options: self.options.clone(),
            inherits: self.inherits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automation_defaults_match_original_manager() {
        let flags = AutomationFlags::default();
        assert!(!flags.disable_style_auto_add_class);
        assert!(!flags.disable_style_auto_add_id);
        assert!(flags.disable_script_auto_add_class);
        assert!(flags.disable_script_auto_add_id);
    }

    #[test]
    fn alias_never_suppresses_canonical() {
        let mut cfg = CompilerConfig::default();
        cfg.name_aliases.insert("inherit".to_string(), "extends".to_string());
        assert!(cfg.keyword_matches("inherit", "inherit"));
        assert!(cfg.keyword_matches("extends", "inherit"));
        assert!(!cfg.keyword_matches("derives", "inherit"));
    }

    #[test]
    fn inherit_from_overrides_by_presence_not_clobber() {
        let mut parent = CompilerConfig::default();
        parent.apply_known_option("DEBUG_MODE", OptionValue::Bool(true));
        parent.options.insert("CUSTOM_STYLE".to_string(), OptionValue::Group(vec!["@Style".to_string()]));

        let mut child = CompilerConfig::default();
        child.name = "child".to_string();
        child.options.insert(
            "CUSTOM_STYLE".to_string(),
            OptionValue::Group(vec!["@Style".to_string(), "@CSS".to_string()]),
        );
        let merged = child.inherit_from(&parent);
        assert_eq!(merged.group_option("CUSTOM_STYLE").unwrap().len(), 2);
        assert_eq!(merged.inherits, Some("default".to_string()));
    }

    #[test]
    fn group_size_bound_enforced() {
        let values = vec!["@Style".to_string()];
        assert!(CompilerConfig::validate_group_size("X", &values, (2, 4)).is_err());
        assert!(CompilerConfig::validate_group_size("X", &values, (1, 4)).is_ok());
    }
}
