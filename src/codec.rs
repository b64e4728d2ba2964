/// Import/export of rule collections as portable JSON documents

use crate::error::ImportError;
use crate::normalize::{normalize_domain, normalize_exact_url_key, normalize_url_path};
use crate::rule::Rule;
use crate::storage::{RuleStore, RULES_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into every export
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Prefix of the suggested download filename
pub const EXPORT_FILENAME_PREFIX: &str = "tab-retitler-rules-";

/// Document produced by an export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub rules: Vec<Rule>,
}

impl ExportDocument {
    pub fn new(rules: &[Rule], exported_at: DateTime<Utc>) -> Self {
        ExportDocument {
            version: EXPORT_FORMAT_VERSION,
            exported_at,
            rules: rules.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn filename(&self) -> String {
        format!("{}{}.json", EXPORT_FILENAME_PREFIX, self.exported_at.timestamp_millis())
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub store: RuleStore,
    pub added: usize,
    pub skipped: usize,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!("Imported {} rule(s), skipped {} duplicate(s).", self.added, self.skipped)
    }
}

/// Turn one untrusted rule-like object into a rule
///
/// Returns `None` when there is no usable target text. Anything else that is
/// missing or mistyped falls back to a default.
pub fn sanitize_rule(candidate: &Value) -> Option<Rule> {
    let mut rule = Rule::from_value(candidate)?;

    rule.target_text = rule.target_text.trim().to_string();
    if rule.target_text.is_empty() {
        return None;
    }

    rule.replacement_text = rule.replacement_text.trim().to_string();
    rule.domain = normalize_domain(&rule.domain);
    rule.url_path = rule
        .url_path
        .as_deref()
        .map(normalize_url_path)
        .filter(|path| !path.is_empty());
    rule.url_exact = rule
        .url_exact
        .as_deref()
        .map(normalize_exact_url_key)
        .filter(|key| !key.is_empty());

    Some(rule)
}

/// Locate the rule array in an import document
///
/// Accepts a bare array, or an object carrying `renameRules` or `rules`.
fn rule_candidates(document: &Value) -> Option<&Vec<Value>> {
    match document {
        Value::Array(candidates) => Some(candidates),
        Value::Object(fields) => [RULES_KEY, "rules"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

/// Parse and sanitize an import document without touching any collection
pub fn parse_import(text: &str) -> Result<Vec<Rule>, ImportError> {
    let document: Value = serde_json::from_str(text)?;
    let candidates = rule_candidates(&document).ok_or(ImportError::MissingRules)?;

    let rules: Vec<Rule> = candidates.iter().filter_map(sanitize_rule).collect();
    if rules.is_empty() {
        return Err(ImportError::NoValidRules);
    }

    Ok(rules)
}

/// Merge an import document into `existing`
///
/// On failure `existing` is untouched; the caller persists `report.store`.
pub fn import_rules(existing: &RuleStore, text: &str) -> Result<ImportReport, ImportError> {
    let incoming = parse_import(text)?;

    let mut store = existing.clone();
    let (added, skipped) = store.merge(incoming);

    Ok(ImportReport {
        store,
        added,
        skipped,
    })
}
