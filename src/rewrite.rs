/// Title substitution
use crate::rule::Rule;

/// Replace every non-overlapping occurrence of `target_text`, left to right
///
/// Literal substring replacement, not a pattern. An empty title or target
/// leaves the title untouched.
pub fn replace_title_text(title: &str, target_text: &str, replacement_text: &str) -> String {
    if title.is_empty() || target_text.is_empty() || !title.contains(target_text) {
        return title.to_string();
    }

    title.replace(target_text, replacement_text)
}

/// Apply rules in order, each one seeing the previous rule's output
pub fn apply_rules_to_text<'a, I>(title: &str, rules: I) -> String
where
    I: IntoIterator<Item = &'a Rule>,
{
    rules.into_iter().fold(title.to_string(), |current, rule| {
        replace_title_text(&current, &rule.target_text, &rule.replacement_text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_title_text_basic() {
        assert_eq!(replace_title_text("Inbox (3) - Mail", "Inbox", ""), " (3) - Mail");
        assert_eq!(replace_title_text("a-a-a", "a", "b"), "b-b-b");
    }

    #[test]
    fn test_replace_title_text_no_op() {
        assert_eq!(replace_title_text("Inbox", "", "x"), "Inbox");
        assert_eq!(replace_title_text("Inbox", "Outbox", "x"), "Inbox");
        assert_eq!(replace_title_text("", "Inbox", "x"), "");
    }

    #[test]
    fn test_replace_title_text_non_overlapping() {
        assert_eq!(replace_title_text("aaa", "aa", "b"), "ba");
        assert_eq!(replace_title_text("aaaa", "aa", "b"), "bb");
    }

    #[test]
    fn test_replace_title_text_removes_target() {
        let titles = ["Inbox", "Inbox Inbox", "xInboxInboxy", "no match"];
        for title in titles {
            assert!(!replace_title_text(title, "Inbox", "Mail").contains("Inbox"));
        }
    }

    #[test]
    fn test_replace_title_text_is_literal() {
        assert_eq!(replace_title_text("a.b.c", ".", "-"), "a-b-c");
        assert_eq!(replace_title_text("(1) x", "(1)", ""), " x");
    }

    #[test]
    fn test_apply_rules_is_order_sensitive() {
        let rules = vec![Rule::new("a", "b", ""), Rule::new("b", "c", "")];
        assert_eq!(apply_rules_to_text("a", &rules), "c");

        let reversed: Vec<Rule> = rules.into_iter().rev().collect();
        assert_eq!(apply_rules_to_text("a", &reversed), "b");
    }

    #[test]
    fn test_apply_no_rules() {
        let rules: Vec<Rule> = Vec::new();
        assert_eq!(apply_rules_to_text("Inbox", &rules), "Inbox");
    }
}
