//! Keyword tables used to classify free-text replies.
//!
//! Every table is an ordered list of `(pattern, result)`; the first rule that
//! matches wins. Matching is case-insensitive.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Style;

#[derive(Clone, Copy, Debug)]
pub enum Pattern {
    /// Input contains the keyword anywhere.
    Contains(&'static str),
    /// Trimmed input equals the keyword.
    Exact(&'static str),
}

impl Pattern {
    fn matches(self, lowered: &str) -> bool {
        match self {
            Pattern::Contains(k) => lowered.contains(k),
            Pattern::Exact(k) => lowered.trim() == k,
        }
    }
}

pub type Rule<T> = (Pattern, T);

pub fn classify<T: Copy>(rules: &[Rule<T>], input: &str) -> Option<T> {
    let lowered = input.to_lowercase();
    rules
        .iter()
        .find(|(p, _)| p.matches(&lowered))
        .map(|(_, v)| *v)
}

pub const STYLE_MATCHERS: &[Rule<Style>] = &[
    (Pattern::Contains("urban"), Style::Urban),
    (Pattern::Contains("1"), Style::Urban),
    (Pattern::Contains("clásico"), Style::Classic),
    (Pattern::Contains("clasico"), Style::Classic),
    (Pattern::Contains("classic"), Style::Classic),
    (Pattern::Contains("2"), Style::Classic),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogChoice {
    Online,
    Here,
}

/// Anything not listed means "show it here".
pub const CATALOG_CHOICE_MATCHERS: &[Rule<CatalogChoice>] = &[
    (Pattern::Contains("online"), CatalogChoice::Online),
    (Pattern::Contains("web"), CatalogChoice::Online),
    (Pattern::Contains("1"), CatalogChoice::Online),
];

pub const ADD_MORE_MATCHERS: &[Rule<bool>] = &[
    (Pattern::Contains("sí"), true),
    (Pattern::Contains("si"), true),
    (Pattern::Contains("yes"), true),
    (Pattern::Contains("agregar"), true),
    (Pattern::Contains("más"), true),
    (Pattern::Exact("1"), true),
];

pub fn classify_style(input: &str) -> Option<Style> {
    classify(STYLE_MATCHERS, input)
}

pub fn classify_catalog_choice(input: &str) -> CatalogChoice {
    classify(CATALOG_CHOICE_MATCHERS, input).unwrap_or(CatalogChoice::Here)
}

pub fn wants_more(input: &str) -> bool {
    classify(ADD_MORE_MATCHERS, input).unwrap_or(false)
}

fn integer_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// First integer literal in the text. Missing, zero or oversized numbers give 1.
pub fn extract_quantity(text: &str) -> u32 {
    integer_re()
        .and_then(|re| re.find(text))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|q| *q > 0)
        .unwrap_or(1)
}
