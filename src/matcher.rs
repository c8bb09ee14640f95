// 🔍 Name Matcher - do two free-text school names denote the same school?
//
// Three rules, tried in order:
//   1. Exact match after normalization
//   2. Containment ("Browns" vs "Browns Primary School")
//   3. Token overlap: share of the FIRST name's significant tokens found in
//      the second name must exceed the threshold
//
// Rule 3 is one-directional. Pass the externally-sourced name first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    Exact,
    Containment,
    TokenOverlap,
}

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::Exact => "exact",
            MatchRule::Containment => "containment",
            MatchRule::TokenOverlap => "token-overlap",
        }
    }
}

/// Heuristic matcher. The defaults (0.5 overlap, tokens longer than 3
/// characters) were tuned against the Parklands/Blouberg dataset; treat them
/// as tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NameMatcher {
    /// Overlap ratio that must be strictly exceeded (default: 0.5)
    pub overlap_threshold: f64,

    /// Tokens this long or shorter are ignored for overlap (default: 3)
    pub min_token_len: usize,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NameMatcher {
    pub fn new() -> Self {
        NameMatcher {
            overlap_threshold: 0.5,
            min_token_len: 3,
        }
    }

    pub fn matches(&self, first: &str, second: &str) -> bool {
        self.match_rule(first, second).is_some()
    }

    /// Which rule (if any) declares the names equal
    pub fn match_rule(&self, first: &str, second: &str) -> Option<MatchRule> {
        let a = normalize_name(first);
        let b = normalize_name(second);

        // An empty name is contained in everything; never let it match
        if a.is_empty() || b.is_empty() {
            return None;
        }

        if a == b {
            return Some(MatchRule::Exact);
        }

        if a.contains(&b) || b.contains(&a) {
            return Some(MatchRule::Containment);
        }

        let first_tokens = self.significant_tokens(&a);
        if first_tokens.is_empty() {
            return None;
        }
        let second_tokens = self.significant_tokens(&b);
        let common = first_tokens
            .iter()
            .filter(|t| second_tokens.contains(t))
            .count();

        if common as f64 / first_tokens.len() as f64 > self.overlap_threshold {
            Some(MatchRule::TokenOverlap)
        } else {
            None
        }
    }

    fn significant_tokens<'a>(&self, normalized: &'a str) -> Vec<&'a str> {
        normalized
            .split(' ')
            .filter(|t| t.chars().count() > self.min_token_len)
            .collect()
    }
}

/// Match with the default tuning
pub fn names_match(first: &str, second: &str) -> bool {
    NameMatcher::new().matches(first, second)
}

/// Lower-case, collapse whitespace runs to one space, drop anything that is
/// not a word character or whitespace, trim.
pub fn normalize_name(name: &str) -> String {
    let collapsed = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    collapsed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}
