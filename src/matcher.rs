/// Decide which rules apply to a tab
use crate::normalize::{get_hostname, get_rule_exact_url_key, get_url_key, normalize_domain};
use crate::rule::Rule;

/// Domain scope check: empty rule domain matches everything, otherwise the
/// hostname must equal the domain or be a subdomain of it
pub fn rule_matches_domain(rule: &Rule, hostname: &str) -> bool {
    let rule_domain = normalize_domain(&rule.domain);
    if rule_domain.is_empty() {
        return true;
    }
    if hostname.is_empty() {
        return false;
    }

    hostname == rule_domain
        || hostname
            .strip_suffix(rule_domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Exact-URL scope check: rules without an exact key match everything
pub fn rule_matches_exact_url(rule: &Rule, tab_url: &str) -> bool {
    let rule_key = get_rule_exact_url_key(rule);
    if rule_key.is_empty() {
        return true;
    }

    let tab_key = get_url_key(tab_url);
    !tab_key.is_empty() && tab_key == rule_key
}

pub fn rule_matches_tab(rule: &Rule, tab_url: &str) -> bool {
    rule_matches_domain(rule, &get_hostname(tab_url)) && rule_matches_exact_url(rule, tab_url)
}

/// Active rules that apply to `tab_url`, in stored order
pub fn matching_rules<'a>(rules: &'a [Rule], tab_url: &str) -> Vec<&'a Rule> {
    let hostname = get_hostname(tab_url);

    rules
        .iter()
        .filter(|rule| rule.is_active())
        .filter(|rule| rule_matches_domain(rule, &hostname) && rule_matches_exact_url(rule, tab_url))
        .collect()
}
