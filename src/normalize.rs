/// Canonical domain and URL keys for Tab Retitler
///
/// Users type bare hostnames, scheme-prefixed URLs, and paths with or without
/// a leading slash. Everything here funnels those variants into one string so
/// that matching is a plain equality check.
use crate::rule::Rule;
use url::Url;

/// Scheme assumed when user input has none
pub const DEFAULT_SCHEME: &str = "https://";

fn with_default_scheme(input: &str) -> String {
    if input.contains("://") {
        input.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, input)
    }
}

/// Build `host + path + search + hash` for a parsed URL
///
/// Returns an empty key when the URL has no host (about:blank, data: URLs).
fn url_key(url: &Url) -> String {
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return String::new(),
    };

    let mut key = host;
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }

    let path = url.path();
    key.push_str(if path.is_empty() { "/" } else { path });

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
        key.push('#');
        key.push_str(fragment);
    }

    key
}

/// Normalize a user-entered domain to a lowercase hostname
///
/// Strict tier: parse as a URL (assuming https when no scheme is given) and
/// take the hostname. Fallback tier: the trimmed, lowercased input with a
/// single trailing slash removed.
///
/// Examples:
/// - `Example.COM/` → `example.com`
/// - `https://Mail.Example.com/inbox` → `mail.example.com`
/// - `` → ``
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return String::new();
    }

    match Url::parse(&with_default_scheme(&trimmed)) {
        Ok(url) => url.host_str().unwrap_or_default().to_lowercase(),
        Err(_) => trimmed
            .strip_suffix('/')
            .unwrap_or(&trimmed)
            .to_string(),
    }
}

/// Ensure a path fragment starts with `/`
pub fn normalize_url_path(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Normalize a user-entered URL to an exact-URL key
///
/// Empty when the input does not parse or has no host.
pub fn normalize_exact_url_key(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    Url::parse(&with_default_scheme(trimmed))
        .map(|url| url_key(&url))
        .unwrap_or_default()
}

/// Hostname of an absolute tab URL, lowercased (no scheme inference)
pub fn get_hostname(tab_url: &str) -> String {
    if tab_url.is_empty() {
        return String::new();
    }

    Url::parse(tab_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}

/// Exact-URL key of an absolute tab URL (no scheme inference)
pub fn get_url_key(tab_url: &str) -> String {
    if tab_url.is_empty() {
        return String::new();
    }

    Url::parse(tab_url)
        .map(|url| url_key(&url))
        .unwrap_or_default()
}

/// Exact-URL key a rule is scoped to, if any
///
/// An explicit `url_exact` wins when it normalizes to a key. Otherwise a
/// `domain` plus `url_path` pair is composed and normalized.
pub fn get_rule_exact_url_key(rule: &Rule) -> String {
    if let Some(exact) = rule.url_exact.as_deref() {
        let key = normalize_exact_url_key(exact);
        if !key.is_empty() {
            return key;
        }
    }

    let domain = rule.domain.trim();
    let path = rule.url_path.as_deref().map(normalize_url_path).unwrap_or_default();
    if domain.is_empty() || path.is_empty() {
        return String::new();
    }

    normalize_exact_url_key(&format!("{}{}", domain, path))
}
