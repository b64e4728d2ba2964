/// Chrome extension adapter: binds the core to chrome.* through host.js

use crate::codec::ExportDocument;
use crate::error::HostError;
use crate::host::{Message, Notifier, RuleStorage, TabChange, TabSource, TitleWriter};
use crate::operations;
use crate::rule::{RuleDraft, TabInfo};
use crate::storage::{RuleStore, StoredState, LEGACY_RULE_KEY, RULES_KEY};
use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

// Import JS bridge functions
#[wasm_bindgen(module = "/host.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(value: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(keys: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getTab(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setTabTitle(tab_id: i32, title: &str) -> Result<(), JsValue>;

    fn sendMessage(message: JsValue);
}

fn js_error(operation: &'static str) -> impl Fn(JsValue) -> HostError {
    move |e| HostError::new(operation, format!("{:?}", e))
}

fn serde_error(operation: &'static str) -> impl Fn(serde_wasm_bindgen::Error) -> HostError {
    move |e| HostError::new(operation, e.to_string())
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// chrome.storage / chrome.tabs / chrome.scripting / chrome.runtime
pub struct ChromeHost;

impl RuleStorage for ChromeHost {
    async fn read(&self) -> Result<StoredState, HostError> {
        let keys = serde_wasm_bindgen::to_value(&[RULES_KEY, LEGACY_RULE_KEY])
            .map_err(serde_error("storage.get"))?;
        let stored_js = getStorage(keys).await.map_err(js_error("storage.get"))?;

        if stored_js.is_null() || stored_js.is_undefined() {
            Ok(StoredState::default())
        } else {
            serde_wasm_bindgen::from_value(stored_js).map_err(serde_error("storage.get"))
        }
    }

    async fn write(&self, store: &RuleStore) -> Result<(), HostError> {
        let store_js = serde_wasm_bindgen::to_value(store).map_err(serde_error("storage.set"))?;
        setStorage(store_js).await.map_err(js_error("storage.set"))?;

        let legacy = serde_wasm_bindgen::to_value(&[LEGACY_RULE_KEY])
            .map_err(serde_error("storage.remove"))?;
        removeStorage(legacy).await.map_err(js_error("storage.remove"))
    }

    async fn clear(&self) -> Result<(), HostError> {
        let keys = serde_wasm_bindgen::to_value(&[RULES_KEY, LEGACY_RULE_KEY])
            .map_err(serde_error("storage.remove"))?;
        removeStorage(keys).await.map_err(js_error("storage.remove"))
    }
}

impl TabSource for ChromeHost {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let tabs_js = queryTabs().await.map_err(js_error("tabs.query"))?;
        serde_wasm_bindgen::from_value(tabs_js).map_err(serde_error("tabs.query"))
    }

    async fn get_tab(&self, tab_id: i32) -> Result<Option<TabInfo>, HostError> {
        let tab_js = getTab(tab_id).await.map_err(js_error("tabs.get"))?;
        if tab_js.is_null() || tab_js.is_undefined() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(tab_js)
            .map(Some)
            .map_err(serde_error("tabs.get"))
    }
}

impl TitleWriter for ChromeHost {
    async fn set_title(&self, tab_id: i32, title: &str) -> Result<(), HostError> {
        setTabTitle(tab_id, title).await.map_err(js_error("scripting.executeScript"))
    }
}

impl Notifier for ChromeHost {
    fn broadcast(&self, message: Message) {
        match serde_wasm_bindgen::to_value(&message) {
            Ok(message_js) => sendMessage(message_js),
            Err(e) => warn!("Failed to serialize {:?}: {}", message, e),
        }
    }
}

// Background event handlers

fn spawn_apply_all() {
    spawn_local(async {
        if let Err(e) = operations::apply_to_all_tabs(&ChromeHost).await {
            warn!("Applying rules to all tabs failed: {}", e);
        }
    });
}

fn spawn_apply_tab(tab_id: i32) {
    spawn_local(async move {
        if let Err(e) = operations::apply_to_tab(&ChromeHost, tab_id).await {
            warn!("Applying rules to tab {} failed: {}", tab_id, e);
        }
    });
}

/// runtime.onInstalled and runtime.onStartup
#[wasm_bindgen]
pub fn on_startup() {
    spawn_apply_all();
}

/// tabs.onCreated
#[wasm_bindgen]
pub fn on_tab_created(tab_id: Option<i32>) {
    if let Some(tab_id) = tab_id {
        spawn_apply_tab(tab_id);
    }
}

/// tabs.onUpdated
#[wasm_bindgen]
pub fn on_tab_updated(tab_id: i32, change_info: JsValue) {
    let change: TabChange = serde_wasm_bindgen::from_value(change_info).unwrap_or_default();
    if change.should_reapply() {
        spawn_apply_tab(tab_id);
    }
}

/// runtime.onMessage; unknown messages are ignored
#[wasm_bindgen]
pub fn on_message(message: JsValue) {
    let Ok(message) = serde_wasm_bindgen::from_value::<Message>(message) else {
        return;
    };

    spawn_local(async move {
        if let Err(e) = operations::handle_message(&ChromeHost, message).await {
            warn!("Handling {:?} failed: {}", message, e);
        }
    });
}

// Popup and rules page API

#[wasm_bindgen]
pub async fn list_rules() -> Result<JsValue, JsValue> {
    let store = operations::load_rules(&ChromeHost).await.map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&store.rules).map_err(to_js_error)
}

/// Save the popup form; resolves to `false` if the rule already existed
#[wasm_bindgen]
pub async fn save_rule(draft: JsValue) -> Result<bool, JsValue> {
    let draft: RuleDraft = serde_wasm_bindgen::from_value(draft).map_err(to_js_error)?;
    operations::save_rule(&ChromeHost, draft).await.map_err(to_js_error)
}

#[wasm_bindgen]
pub async fn delete_rule(rule_id: String) -> Result<bool, JsValue> {
    operations::delete_rule(&ChromeHost, &rule_id).await.map_err(to_js_error)
}

#[wasm_bindgen]
pub async fn set_rule_enabled(rule_id: String, enabled: bool) -> Result<bool, JsValue> {
    operations::set_rule_enabled(&ChromeHost, &rule_id, enabled)
        .await
        .map_err(to_js_error)
}

/// Resolves to the rule's new enabled state, or `undefined` for an unknown id
#[wasm_bindgen]
pub async fn toggle_rule(rule_id: String) -> Result<Option<bool>, JsValue> {
    operations::toggle_rule(&ChromeHost, &rule_id)
        .await
        .map_err(to_js_error)
}

#[wasm_bindgen]
pub async fn clear_rules() -> Result<(), JsValue> {
    operations::clear_rules(&ChromeHost).await.map_err(to_js_error)
}

/// Import a picked file's text; resolves to a status line for the user
#[wasm_bindgen]
pub async fn import_rules(text: String) -> Result<String, JsValue> {
    operations::import_document(&ChromeHost, &text)
        .await
        .map(|report| report.summary())
        .map_err(to_js_error)
}

#[derive(Serialize)]
struct ExportFile {
    filename: String,
    contents: String,
}

/// Export the collection; resolves to `{ filename, contents }` for download
#[wasm_bindgen]
pub async fn export_rules() -> Result<JsValue, JsValue> {
    let document: ExportDocument = operations::export_document(&ChromeHost)
        .await
        .map_err(to_js_error)?;

    let file = ExportFile {
        filename: document.filename(),
        contents: document.to_json().map_err(to_js_error)?,
    };
    serde_wasm_bindgen::to_value(&file).map_err(to_js_error)
}
