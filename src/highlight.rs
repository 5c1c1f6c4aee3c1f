use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher for the search query, used to mark matches in titles.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_has_no_regex() {
        assert!(build_highlight_regex("").is_none());
    }

    #[test]
    fn matches_ignore_case() {
        let regex = build_highlight_regex("sh").expect("regex");
        let matches: Vec<_> = regex.find_iter("Shirt and shoes").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["Sh", "sh"]);
    }

    #[test]
    fn metacharacters_are_literal() {
        let regex = build_highlight_regex("a+b").expect("regex");
        assert!(regex.is_match("A+B cap"));
        assert!(!regex.is_match("aab"));
    }
}
