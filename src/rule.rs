/// Data structures for Tab Retitler
use crate::error::RuleError;
use crate::normalize::{get_rule_exact_url_key, normalize_domain, normalize_url_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

fn default_enabled() -> bool {
    true
}

fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

/// Only an explicit `false` disables; absent or mistyped means enabled
fn enabled_field(value: &Value) -> bool {
    value.get("enabled") != Some(&Value::Bool(false))
}

/// A text substitution applied to tab titles
///
/// An empty `domain` matches every site. `url_exact` (or `domain` plus
/// `url_path`) narrows the rule to a single page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub target_text: String,
    #[serde(default)]
    pub replacement_text: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_exact: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Fields that make two rules duplicates regardless of `id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    target_text: String,
    replacement_text: String,
    domain: String,
    exact_url: String,
}

impl Rule {
    /// Fresh opaque rule id
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Rule scoped to a domain (or every domain when `domain` is empty)
    pub fn new(target_text: &str, replacement_text: &str, domain: &str) -> Rule {
        Rule {
            id: Rule::new_id(),
            target_text: target_text.to_string(),
            replacement_text: replacement_text.to_string(),
            domain: normalize_domain(domain),
            url_path: None,
            url_exact: None,
            enabled: true,
        }
    }

    /// Read a rule-like object field by field
    ///
    /// `None` only when `targetText` is missing, not a string, or empty.
    /// Null or mistyped optional fields fall back to defaults instead of
    /// discarding the rule, and a missing id is replaced with a fresh one.
    pub fn from_value(value: &Value) -> Option<Rule> {
        let target_text = string_field(value, "targetText").filter(|t| !t.is_empty())?;

        Some(Rule {
            id: string_field(value, "id")
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(Rule::new_id),
            target_text: target_text.to_string(),
            replacement_text: string_field(value, "replacementText").unwrap_or_default().to_string(),
            domain: string_field(value, "domain").unwrap_or_default().to_string(),
            url_path: string_field(value, "urlPath").map(str::to_string),
            url_exact: string_field(value, "urlExact").map(str::to_string),
            enabled: enabled_field(value),
        })
    }

    /// Rule synthesized from the pre-collection single-rule record
    ///
    /// The id is derived from the record's text so repeated migrations of
    /// the same record agree.
    pub fn from_legacy(legacy: &LegacyRule) -> Rule {
        let seed = format!("{}\u{1f}{}", legacy.target_text, legacy.replacement_text);
        Rule {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string(),
            target_text: legacy.target_text.clone(),
            replacement_text: legacy.replacement_text.clone(),
            domain: String::new(),
            url_path: None,
            url_exact: None,
            enabled: legacy.enabled,
        }
    }

    /// A rule with no target text never takes part in matching
    pub fn is_active(&self) -> bool {
        self.enabled && !self.target_text.is_empty()
    }

    pub fn identity_key(&self) -> RuleKey {
        RuleKey {
            target_text: self.target_text.clone(),
            replacement_text: self.replacement_text.clone(),
            domain: normalize_domain(&self.domain),
            exact_url: get_rule_exact_url_key(self),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.target_text, self.replacement_text)?;

        let exact = get_rule_exact_url_key(self);
        if !exact.is_empty() {
            write!(f, " [{}]", exact)
        } else if !self.domain.is_empty() {
            write!(f, " [{}]", self.domain)
        } else {
            write!(f, " [all domains]")
        }
    }
}

/// Single-rule record stored before rules became a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRule {
    #[serde(default)]
    pub target_text: String,
    #[serde(default)]
    pub replacement_text: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl LegacyRule {
    /// Lenient read of the stored legacy record; `None` without a target
    pub fn from_value(value: &Value) -> Option<LegacyRule> {
        let target_text = string_field(value, "targetText").filter(|t| !t.is_empty())?;

        Some(LegacyRule {
            target_text: target_text.to_string(),
            replacement_text: string_field(value, "replacementText").unwrap_or_default().to_string(),
            enabled: enabled_field(value),
        })
    }
}

/// Rule fields as typed into the popup form
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleDraft {
    pub target_text: String,
    pub replacement_text: String,
    pub domain: String,
    pub url_path: String,
}

impl RuleDraft {
    /// Validate the form and build an enabled rule with a fresh id
    pub fn into_rule(self) -> Result<Rule, RuleError> {
        let target_text = self.target_text.trim();
        if target_text.is_empty() {
            return Err(RuleError::EmptyTarget);
        }

        let mut rule = Rule::new(target_text, self.replacement_text.trim(), &self.domain);

        let url_path = normalize_url_path(&self.url_path);
        if !url_path.is_empty() {
            if rule.domain.is_empty() {
                return Err(RuleError::PathWithoutDomain);
            }

            rule.url_path = Some(url_path);
            let exact = get_rule_exact_url_key(&rule);
            if exact.is_empty() {
                return Err(RuleError::InvalidExactUrl(format!(
                    "{}{}",
                    rule.domain,
                    rule.url_path.as_deref().unwrap_or_default()
                )));
            }
            rule.url_exact = Some(exact);
        }

        Ok(rule)
    }
}

/// Information about a browser tab
///
/// The browser may withhold `url` and `title` for tabs the extension cannot
/// see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TabInfo {
    pub fn new(id: i32, url: &str, title: &str) -> TabInfo {
        TabInfo {
            id,
            url: Some(url.to_string()),
            title: Some(title.to_string()),
        }
    }
}
