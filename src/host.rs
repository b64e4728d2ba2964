/// Contracts for the browser-side collaborators
///
/// The core never calls browser APIs directly. `extension::ChromeHost`
/// implements these over chrome.* and tests use an in-memory fake.
use crate::error::HostError;
use crate::rule::TabInfo;
use crate::storage::{RuleStore, StoredState};
use serde::{Deserialize, Serialize};

/// Persisted rule collection
#[allow(async_fn_in_trait)]
pub trait RuleStorage {
    /// Raw contents of the collection key and the legacy key
    async fn read(&self) -> Result<StoredState, HostError>;

    /// Replace the whole collection in one write and drop the legacy record
    async fn write(&self, store: &RuleStore) -> Result<(), HostError>;

    /// Remove the collection and the legacy record
    async fn clear(&self) -> Result<(), HostError>;
}

/// Open tabs
#[allow(async_fn_in_trait)]
pub trait TabSource {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError>;

    async fn get_tab(&self, tab_id: i32) -> Result<Option<TabInfo>, HostError>;
}

/// Sets a tab's document title; fails for pages that cannot be scripted
#[allow(async_fn_in_trait)]
pub trait TitleWriter {
    async fn set_title(&self, tab_id: i32, title: &str) -> Result<(), HostError>;
}

/// Fire-and-forget broadcast to the other extension pages
pub trait Notifier {
    fn broadcast(&self, message: Message);
}

/// Runtime messages exchanged between popup, rules page and background
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Message {
    /// Re-match and rewrite every open tab
    #[serde(rename = "APPLY_RULE_NOW")]
    ApplyRulesNow,
    /// Informational; nothing needs to happen
    #[serde(rename = "CLEAR_RULE")]
    RulesCleared,
}

/// The parts of a tab update event the background cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabChange {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TabChange {
    /// A finished load or a new title may need rewriting
    pub fn should_reapply(&self) -> bool {
        self.status.as_deref() == Some("complete") || self.title.is_some()
    }
}
