/// Tab Retitler - Chrome Extension for rewriting tab titles
/// Built with Rust + WASM

pub mod codec;
pub mod error;
pub mod extension;
pub mod host;
pub mod matcher;
pub mod normalize;
pub mod operations;
pub mod rewrite;
pub mod rule;
pub mod storage;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export core normalization for the popup's domain field preview
#[wasm_bindgen]
pub fn normalize_domain(input: &str) -> String {
    normalize::normalize_domain(input)
}

/// Title a tab would get under the given rules, for the popup's live preview
#[wasm_bindgen]
pub fn preview_title(title: &str, tab_url: &str, rules: JsValue) -> Result<String, JsValue> {
    let rules: Vec<rule::Rule> = serde_wasm_bindgen::from_value(rules)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse rules: {}", e)))?;

    let matched = matcher::matching_rules(&rules, tab_url);
    Ok(rewrite::apply_rules_to_text(title, matched))
}
