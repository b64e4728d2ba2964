/// Tab operations: matching, rewriting, and the rule-management flows

use crate::codec::{import_rules, ExportDocument, ImportReport};
use crate::error::{HostError, Result};
use crate::host::{Message, Notifier, RuleStorage, TabSource, TitleWriter};
use crate::matcher::matching_rules;
use crate::rewrite::apply_rules_to_text;
use crate::rule::{Rule, RuleDraft, TabInfo};
use crate::storage::RuleStore;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, info};

/// New title for one tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleUpdate {
    pub tab_id: i32,
    pub title: String,
}

/// Title a tab should get, or `None` when nothing would change
///
/// `rules` is the stored collection; inactive rules are skipped here.
pub fn compute_update(rules: &[Rule], tab: &TabInfo) -> Option<TitleUpdate> {
    let title = tab.title.as_deref()?;
    let url = tab.url.as_deref().unwrap_or_default();

    let matched = matching_rules(rules, url);
    if matched.is_empty() {
        return None;
    }

    let updated = apply_rules_to_text(title, matched);
    if updated == title {
        return None;
    }

    Some(TitleUpdate {
        tab_id: tab.id,
        title: updated,
    })
}

/// Title updates for every tab that needs one, in tab order
pub fn compute_updates(rules: &[Rule], tabs: &[TabInfo]) -> Vec<TitleUpdate> {
    tabs.iter()
        .filter_map(|tab| compute_update(rules, tab))
        .collect()
}

/// Load the collection, finishing a legacy migration before returning
pub async fn load_rules<S: RuleStorage>(storage: &S) -> std::result::Result<RuleStore, HostError> {
    let outcome = storage.read().await?.load();

    let migrated = outcome.needs_write();
    let store = outcome.into_store();
    if migrated {
        info!("Migrating legacy rule into the rule collection");
        storage.write(&store).await?;
    }

    debug!("Loaded {} rule(s)", store.len());
    Ok(store)
}

async fn write_update<W: TitleWriter>(writer: &W, update: &TitleUpdate) -> bool {
    match writer.set_title(update.tab_id, &update.title).await {
        Ok(()) => true,
        Err(e) => {
            // chrome:// and web store pages cannot be scripted
            debug!("Skipping tab {}: {}", update.tab_id, e);
            false
        }
    }
}

/// Rewrite every open tab; returns how many titles were written
///
/// Writes run concurrently and a failing tab does not affect the others.
pub async fn apply_to_all_tabs<H>(host: &H) -> std::result::Result<usize, HostError>
where
    H: RuleStorage + TabSource + TitleWriter,
{
    let store = load_rules(host).await?;
    let rules = store.active_rules();
    if rules.is_empty() {
        return Ok(0);
    }

    let tabs = host.list_tabs().await?;
    let updates = compute_updates(&rules, &tabs);

    let written = join_all(updates.iter().map(|update| write_update(host, update)))
        .await
        .into_iter()
        .filter(|ok| *ok)
        .count();

    debug!("Rewrote {} of {} tab title(s)", written, tabs.len());
    Ok(written)
}

/// Rewrite a single tab; returns whether its title was written
pub async fn apply_to_tab<H>(host: &H, tab_id: i32) -> std::result::Result<bool, HostError>
where
    H: RuleStorage + TabSource + TitleWriter,
{
    let store = load_rules(host).await?;
    let rules = store.active_rules();
    if rules.is_empty() {
        return Ok(false);
    }

    let Some(tab) = host.get_tab(tab_id).await? else {
        return Ok(false);
    };

    match compute_update(&rules, &tab) {
        Some(update) => Ok(write_update(host, &update).await),
        None => Ok(false),
    }
}

/// React to a runtime message
pub async fn handle_message<H>(host: &H, message: Message) -> std::result::Result<usize, HostError>
where
    H: RuleStorage + TabSource + TitleWriter,
{
    match message {
        Message::ApplyRulesNow => apply_to_all_tabs(host).await,
        Message::RulesCleared => Ok(0),
    }
}

/// Validate and store a rule from the popup form, then apply it
///
/// Returns `false` when an identical rule already existed.
pub async fn save_rule<H>(host: &H, draft: RuleDraft) -> Result<bool>
where
    H: RuleStorage + Notifier,
{
    let rule = draft.into_rule()?;
    let mut store = load_rules(host).await?;

    let label = rule.to_string();
    let added = store.add_rule(rule);
    host.write(&store).await?;
    host.broadcast(Message::ApplyRulesNow);

    if added {
        info!("Saved rule {}", label);
    } else {
        debug!("Rule {} already exists", label);
    }
    Ok(added)
}

pub async fn delete_rule<H>(host: &H, rule_id: &str) -> Result<bool>
where
    H: RuleStorage + Notifier,
{
    let mut store = load_rules(host).await?;
    if !store.remove_rule(rule_id) {
        return Ok(false);
    }

    host.write(&store).await?;
    host.broadcast(Message::ApplyRulesNow);
    Ok(true)
}

pub async fn set_rule_enabled<H>(host: &H, rule_id: &str, enabled: bool) -> Result<bool>
where
    H: RuleStorage + Notifier,
{
    let mut store = load_rules(host).await?;
    if !store.set_enabled(rule_id, enabled) {
        return Ok(false);
    }

    host.write(&store).await?;
    host.broadcast(Message::ApplyRulesNow);
    Ok(true)
}

/// Flip a rule's enabled flag; `None` when no rule has `rule_id`
pub async fn toggle_rule<H>(host: &H, rule_id: &str) -> Result<Option<bool>>
where
    H: RuleStorage + Notifier,
{
    let mut store = load_rules(host).await?;
    let Some(enabled) = store.toggle_rule(rule_id) else {
        return Ok(None);
    };

    host.write(&store).await?;
    host.broadcast(Message::ApplyRulesNow);
    debug!("Rule {} is now {}", rule_id, if enabled { "enabled" } else { "disabled" });
    Ok(Some(enabled))
}

/// Delete every rule, including a legacy record
pub async fn clear_rules<H>(host: &H) -> Result<()>
where
    H: RuleStorage + Notifier,
{
    host.clear().await?;
    host.broadcast(Message::RulesCleared);
    info!("Cleared all rules");
    Ok(())
}

/// Merge an import document into the stored collection
///
/// Nothing is written when the document is rejected.
pub async fn import_document<H>(host: &H, text: &str) -> Result<ImportReport>
where
    H: RuleStorage + Notifier,
{
    let store = load_rules(host).await?;
    let report = import_rules(&store, text)?;

    host.write(&report.store).await?;
    host.broadcast(Message::ApplyRulesNow);
    info!("Import added {} rule(s), skipped {}", report.added, report.skipped);
    Ok(report)
}

pub async fn export_document<S: RuleStorage>(storage: &S) -> Result<ExportDocument> {
    let store = load_rules(storage).await?;
    Ok(ExportDocument::new(&store.rules, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ImportError, RuleError};
    use crate::storage::StoredState;
    use futures::executor::block_on;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    fn create_test_tab(id: i32, url: &str, title: &str) -> TabInfo {
        TabInfo::new(id, url, title)
    }

    /// In-memory browser
    struct FakeHost {
        storage: RefCell<Value>,
        tabs: Vec<TabInfo>,
        unscriptable: HashSet<i32>,
        titles: RefCell<HashMap<i32, String>>,
        messages: RefCell<Vec<Message>>,
        writes: RefCell<usize>,
    }

    impl FakeHost {
        fn new(storage: Value, tabs: Vec<TabInfo>) -> Self {
            FakeHost {
                storage: RefCell::new(storage),
                tabs,
                unscriptable: HashSet::new(),
                titles: RefCell::new(HashMap::new()),
                messages: RefCell::new(Vec::new()),
                writes: RefCell::new(0),
            }
        }

        fn with_rules(rules: Vec<Rule>, tabs: Vec<TabInfo>) -> Self {
            FakeHost::new(serde_json::to_value(RuleStore::from_rules(rules)).unwrap(), tabs)
        }

        fn title(&self, tab_id: i32) -> Option<String> {
            self.titles.borrow().get(&tab_id).cloned()
        }

        fn stored_rules(&self) -> Vec<Rule> {
            let state: StoredState = serde_json::from_value(self.storage.borrow().clone()).unwrap();
            state.load().into_store().rules
        }
    }

    impl RuleStorage for FakeHost {
        async fn read(&self) -> std::result::Result<StoredState, HostError> {
            serde_json::from_value(self.storage.borrow().clone())
                .map_err(|e| HostError::new("storage.get", e.to_string()))
        }

        async fn write(&self, store: &RuleStore) -> std::result::Result<(), HostError> {
            *self.storage.borrow_mut() = serde_json::to_value(store).unwrap();
            *self.writes.borrow_mut() += 1;
            Ok(())
        }

        async fn clear(&self) -> std::result::Result<(), HostError> {
            *self.storage.borrow_mut() = json!({});
            Ok(())
        }
    }

    impl TabSource for FakeHost {
        async fn list_tabs(&self) -> std::result::Result<Vec<TabInfo>, HostError> {
            Ok(self.tabs.clone())
        }

        async fn get_tab(&self, tab_id: i32) -> std::result::Result<Option<TabInfo>, HostError> {
            Ok(self.tabs.iter().find(|t| t.id == tab_id).cloned())
        }
    }

    impl TitleWriter for FakeHost {
        async fn set_title(&self, tab_id: i32, title: &str) -> std::result::Result<(), HostError> {
            if self.unscriptable.contains(&tab_id) {
                return Err(HostError::new("setTitle", "Cannot access a chrome:// URL"));
            }
            self.titles.borrow_mut().insert(tab_id, title.to_string());
            Ok(())
        }
    }

    impl Notifier for FakeHost {
        fn broadcast(&self, message: Message) {
            self.messages.borrow_mut().push(message);
        }
    }

    #[test]
    fn test_compute_update_scenario() {
        let rules = vec![Rule::new("Inbox", "", "mail.example.com")];

        let matched = create_test_tab(1, "https://mail.example.com/u/0", "Inbox (3) - Mail");
        let other = create_test_tab(2, "https://other.com/", "Inbox (3) - Mail");

        assert_eq!(
            compute_update(&rules, &matched),
            Some(TitleUpdate {
                tab_id: 1,
                title: " (3) - Mail".to_string()
            })
        );
        assert_eq!(compute_update(&rules, &other), None);
    }

    #[test]
    fn test_compute_update_chains_rules() {
        let rules = vec![Rule::new("Inbox", "Mail", ""), Rule::new("Mail", "Post", "")];
        let tab = create_test_tab(1, "https://example.com/", "Inbox");

        assert_eq!(compute_update(&rules, &tab).unwrap().title, "Post");
    }

    #[test]
    fn test_compute_update_skips_unchanged_and_untitled() {
        let rules = vec![Rule::new("Inbox", "Inbox", "")];
        let unchanged = create_test_tab(1, "https://example.com/", "Inbox");
        let untitled = TabInfo {
            id: 2,
            url: Some("https://example.com/".to_string()),
            title: None,
        };

        assert_eq!(compute_update(&rules, &unchanged), None);
        assert_eq!(compute_update(&rules, &untitled), None);
    }

    #[test]
    fn test_compute_update_global_rule_without_url() {
        let rules = vec![Rule::new("Inbox", "Mail", "")];
        let tab = TabInfo {
            id: 3,
            url: None,
            title: Some("Inbox".to_string()),
        };

        assert_eq!(compute_update(&rules, &tab).unwrap().title, "Mail");
    }

    #[test]
    fn test_compute_updates() {
        let rules = vec![Rule::new("Inbox", "", "example.com")];
        let tabs = vec![
            create_test_tab(1, "https://example.com/", "Inbox"),
            create_test_tab(2, "https://other.com/", "Inbox"),
            create_test_tab(3, "https://sub.example.com/", "Inbox 2"),
        ];

        let ids: Vec<i32> = compute_updates(&rules, &tabs).iter().map(|u| u.tab_id).collect();

        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_apply_to_all_tabs_swallows_unscriptable() {
        let mut host = FakeHost::with_rules(
            vec![Rule::new("Inbox", "Mail", "")],
            vec![
                create_test_tab(1, "chrome://extensions", "Inbox"),
                create_test_tab(2, "https://example.com/", "Inbox"),
            ],
        );
        host.unscriptable.insert(1);

        let written = block_on(apply_to_all_tabs(&host)).unwrap();

        assert_eq!(written, 1);
        assert_eq!(host.title(1), None);
        assert_eq!(host.title(2).as_deref(), Some("Mail"));
    }

    #[test]
    fn test_apply_to_all_tabs_ignores_disabled() {
        let mut rule = Rule::new("Inbox", "Mail", "");
        rule.enabled = false;
        let host = FakeHost::with_rules(vec![rule], vec![create_test_tab(1, "https://example.com/", "Inbox")]);

        assert_eq!(block_on(apply_to_all_tabs(&host)).unwrap(), 0);
        assert_eq!(host.title(1), None);
    }

    #[test]
    fn test_apply_to_tab() {
        let host = FakeHost::with_rules(
            vec![Rule::new("Inbox", "", "mail.example.com")],
            vec![
                create_test_tab(1, "https://mail.example.com/u/0", "Inbox (3) - Mail"),
                create_test_tab(2, "https://other.com/", "Inbox"),
            ],
        );

        assert!(block_on(apply_to_tab(&host, 1)).unwrap());
        assert!(!block_on(apply_to_tab(&host, 2)).unwrap());
        assert!(!block_on(apply_to_tab(&host, 99)).unwrap());
        assert_eq!(host.title(1).as_deref(), Some(" (3) - Mail"));
    }

    #[test]
    fn test_load_rules_migrates_once() {
        let host = FakeHost::new(
            json!({"renameRule": {"targetText": "Inbox", "replacementText": "Mail"}}),
            vec![create_test_tab(1, "https://example.com/", "Inbox")],
        );

        let first = block_on(load_rules(&host)).unwrap();
        let second = block_on(load_rules(&host)).unwrap();

        assert_eq!(first, second);
        assert_eq!(*host.writes.borrow(), 1);
        assert!(host.storage.borrow().get("renameRule").is_none());
        assert_eq!(block_on(apply_to_all_tabs(&host)).unwrap(), 1);
    }

    #[test]
    fn test_handle_message() {
        let host = FakeHost::with_rules(
            vec![Rule::new("Inbox", "Mail", "")],
            vec![create_test_tab(1, "https://example.com/", "Inbox")],
        );

        assert_eq!(block_on(handle_message(&host, Message::RulesCleared)).unwrap(), 0);
        assert_eq!(host.title(1), None);
        assert_eq!(block_on(handle_message(&host, Message::ApplyRulesNow)).unwrap(), 1);
    }

    #[test]
    fn test_save_rule() {
        let host = FakeHost::new(json!({}), Vec::new());
        let draft = RuleDraft {
            target_text: "Inbox".to_string(),
            domain: "Mail.Example.com".to_string(),
            ..RuleDraft::default()
        };

        assert!(block_on(save_rule(&host, draft.clone())).unwrap());
        assert!(!block_on(save_rule(&host, draft)).unwrap());

        let rules = host.stored_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].domain, "mail.example.com");
        assert_eq!(*host.messages.borrow(), vec![Message::ApplyRulesNow, Message::ApplyRulesNow]);
    }

    #[test]
    fn test_save_rule_rejects_invalid_draft() {
        let host = FakeHost::new(json!({}), Vec::new());

        let result = block_on(save_rule(&host, RuleDraft::default()));

        assert!(matches!(result, Err(Error::Rule(RuleError::EmptyTarget))));
        assert_eq!(*host.writes.borrow(), 0);
        assert!(host.messages.borrow().is_empty());
    }

    #[test]
    fn test_delete_and_toggle_rule() {
        let mut keep = Rule::new("Keep", "", "");
        keep.id = "keep".to_string();
        let mut stale = Rule::new("Stale", "", "");
        stale.id = "stale".to_string();
        let host = FakeHost::with_rules(vec![keep, stale], Vec::new());

        assert!(block_on(delete_rule(&host, "stale")).unwrap());
        assert!(!block_on(delete_rule(&host, "stale")).unwrap());
        assert!(block_on(set_rule_enabled(&host, "keep", false)).unwrap());

        let rules = host.stored_rules();
        assert_eq!(rules.len(), 1);
        assert!(!rules[0].enabled);
    }

    #[test]
    fn test_toggle_rule() {
        let mut rule = Rule::new("Inbox", "Mail", "");
        rule.id = "rule-1".to_string();
        let host = FakeHost::with_rules(vec![rule], vec![create_test_tab(1, "https://example.com/", "Inbox")]);

        assert_eq!(block_on(toggle_rule(&host, "rule-1")).unwrap(), Some(false));
        assert!(!host.stored_rules()[0].enabled);
        assert_eq!(block_on(apply_to_all_tabs(&host)).unwrap(), 0);

        assert_eq!(block_on(toggle_rule(&host, "rule-1")).unwrap(), Some(true));
        assert!(host.stored_rules()[0].enabled);

        assert_eq!(block_on(toggle_rule(&host, "missing")).unwrap(), None);
        assert_eq!(*host.writes.borrow(), 2);
        assert_eq!(*host.messages.borrow(), vec![Message::ApplyRulesNow, Message::ApplyRulesNow]);
    }

    #[test]
    fn test_load_rules_migrates_legacy_record_with_null_fields() {
        let host = FakeHost::new(
            json!({"renameRule": {"targetText": "Inbox", "replacementText": null, "enabled": null}}),
            vec![create_test_tab(1, "https://example.com/", "Inbox")],
        );

        let store = block_on(load_rules(&host)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(*host.writes.borrow(), 1);
        assert_eq!(host.stored_rules()[0].replacement_text, "");
        assert_eq!(block_on(apply_to_all_tabs(&host)).unwrap(), 1);
        assert_eq!(host.title(1).as_deref(), Some(""));
    }

    #[test]
    fn test_clear_rules() {
        let host = FakeHost::new(
            json!({"renameRules": [{"id": "a", "targetText": "A"}], "renameRule": {"targetText": "B"}}),
            Vec::new(),
        );

        block_on(clear_rules(&host)).unwrap();

        assert!(host.stored_rules().is_empty());
        assert_eq!(*host.messages.borrow(), vec![Message::RulesCleared]);
    }

    #[test]
    fn test_import_document() {
        let host = FakeHost::with_rules(vec![Rule::new("Inbox", "", "")], Vec::new());

        let report = block_on(import_document(
            &host,
            r#"{"rules":[{"targetText":"Inbox"},{"targetText":"Spam","replacementText":"Junk"}]}"#,
        ))
        .unwrap();

        assert_eq!((report.added, report.skipped), (1, 1));
        assert_eq!(host.stored_rules().len(), 2);
        assert_eq!(*host.messages.borrow(), vec![Message::ApplyRulesNow]);
    }

    #[test]
    fn test_import_document_failure_leaves_storage_alone() {
        let host = FakeHost::with_rules(vec![Rule::new("Inbox", "", "")], Vec::new());

        let result = block_on(import_document(&host, r#"{"rules":[]}"#));

        assert!(matches!(result, Err(Error::Import(ImportError::NoValidRules))));
        assert_eq!(*host.writes.borrow(), 0);
        assert_eq!(host.stored_rules().len(), 1);
    }

    #[test]
    fn test_export_document() {
        let host = FakeHost::with_rules(vec![Rule::new("Inbox", "", "")], Vec::new());

        let document = block_on(export_document(&host)).unwrap();

        assert_eq!(document.version, 1);
        assert_eq!(document.rules.len(), 1);
    }
}
