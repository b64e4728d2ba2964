/// Rule collection model and its chrome.storage.local representation

use crate::rule::{LegacyRule, Rule, RuleKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Storage key holding the rule collection
pub const RULES_KEY: &str = "renameRules";

/// Storage key of the single-rule record used before collections
pub const LEGACY_RULE_KEY: &str = "renameRule";

/// Root storage structure: the whole persisted rule collection
///
/// Order is insertion order and decides the order rewrites compose in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleStore {
    #[serde(rename = "renameRules")]
    pub rules: Vec<Rule>,
}

/// Result of merging imported rules into a collection
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub rules: Vec<Rule>,
    pub added: usize,
    pub skipped: usize,
}

impl RuleStore {
    pub fn new() -> Self {
        RuleStore { rules: Vec::new() }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        RuleStore { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append a rule unless an identical one (ignoring id) is already stored
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        let key = rule.identity_key();
        if self.rules.iter().any(|existing| existing.identity_key() == key) {
            return false;
        }

        self.rules.push(rule);
        true
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let original_len = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() < original_len
    }

    pub fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        self.rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .map(|rule| {
                rule.enabled = enabled;
            })
            .is_some()
    }

    /// Flip `enabled`, returning the new state
    pub fn toggle_rule(&mut self, rule_id: &str) -> Option<bool> {
        self.rules.iter_mut().find(|r| r.id == rule_id).map(|rule| {
            rule.enabled = !rule.enabled;
            rule.enabled
        })
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Enabled rules with a target, in stored order
    pub fn active_rules(&self) -> Vec<Rule> {
        self.rules.iter().filter(|r| r.is_active()).cloned().collect()
    }

    /// Merge incoming rules, then drop any remaining duplicates
    pub fn merge(&mut self, incoming: Vec<Rule>) -> (usize, usize) {
        let outcome = merge_rules(&self.rules, incoming);
        self.rules = dedupe_rules(outcome.rules);
        (outcome.added, outcome.skipped)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the first rule per identity key, preserving order
pub fn dedupe_rules(rules: Vec<Rule>) -> Vec<Rule> {
    let mut seen: HashSet<RuleKey> = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.identity_key()))
        .collect()
}

/// `existing` followed by every incoming rule whose identity key is new
pub fn merge_rules(existing: &[Rule], incoming: Vec<Rule>) -> MergeOutcome {
    let incoming_len = incoming.len();
    let mut seen: HashSet<RuleKey> = existing.iter().map(Rule::identity_key).collect();

    let mut rules = existing.to_vec();
    rules.extend(
        incoming
            .into_iter()
            .filter(|rule| seen.insert(rule.identity_key())),
    );

    let added = rules.len() - existing.len();
    MergeOutcome {
        rules,
        added,
        skipped: incoming_len - added,
    }
}

/// Raw contents of the two storage keys as read from the browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    #[serde(default)]
    pub rename_rules: Option<serde_json::Value>,
    #[serde(default)]
    pub rename_rule: Option<serde_json::Value>,
}

/// Where a loaded collection came from
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The collection key was present
    Native(RuleStore),
    /// Built from the legacy record; must be written back before use
    Migrated(RuleStore),
    /// Neither key held anything usable
    Empty,
}

impl LoadOutcome {
    pub fn needs_write(&self) -> bool {
        matches!(self, LoadOutcome::Migrated(_))
    }

    pub fn into_store(self) -> RuleStore {
        match self {
            LoadOutcome::Native(store) | LoadOutcome::Migrated(store) => store,
            LoadOutcome::Empty => RuleStore::new(),
        }
    }
}

impl StoredState {
    /// Interpret the raw storage contents
    ///
    /// A collection array always wins over a legacy record, even when empty.
    /// Entries that are not objects or have no target text are dropped;
    /// null or mistyped optional fields fall back to defaults.
    pub fn load(self) -> LoadOutcome {
        if let Some(serde_json::Value::Array(entries)) = self.rename_rules {
            let rules = entries.iter().filter_map(Rule::from_value).collect();
            return LoadOutcome::Native(RuleStore::from_rules(rules));
        }

        self.rename_rule
            .as_ref()
            .and_then(LegacyRule::from_value)
            .map(|legacy| LoadOutcome::Migrated(RuleStore::from_rules(vec![Rule::from_legacy(&legacy)])))
            .unwrap_or(LoadOutcome::Empty)
    }
}
