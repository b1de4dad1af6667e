//! Locator pattern parsing.
//!
//! Candidate lists throughout the session flows are written in a compact
//! pattern language: plain CSS, CSS with a `:has-text('…')` text filter,
//! `text=…` for matching by visible text, and `label=…` for matching by
//! accessible label. Parsing happens once per interaction, in the adapter.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// CSS selector, optionally filtered to elements containing `has_text`.
    Css {
        selector: String,
        has_text: Option<String>,
    },
    /// Element whose trimmed visible text contains the given string.
    Text(String),
    /// Element carrying the given accessible label.
    Label(String),
}

fn has_text_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // button:has-text('Join now')  /  div[role='button']:has-text("Next")
        Regex::new(r#"^(?s)(.+?):has-text\((?:'(.*)'|"(.*)")\)$"#).expect("valid has-text regex")
    })
}

pub fn parse(pattern: &str) -> Pattern {
    if let Some(text) = pattern.strip_prefix("text=") {
        return Pattern::Text(text.to_string());
    }
    if let Some(label) = pattern.strip_prefix("label=") {
        return Pattern::Label(label.to_string());
    }
    if let Some(caps) = has_text_regex().captures(pattern) {
        let text = caps
            .get(2)
            .or_else(|| caps.get(3))
            .expect("has-text regex matched without a quoted group");
        return Pattern::Css {
            selector: caps[1].to_string(),
            has_text: Some(text.as_str().to_string()),
        };
    }
    Pattern::Css {
        selector: pattern.to_string(),
        has_text: None,
    }
}

impl Pattern {
    /// Closest plain-CSS equivalent, used where an element handle has to be
    /// located through the backend's query API (typing, key presses).
    pub fn css_approximation(&self) -> String {
        match self {
            Pattern::Css { selector, .. } => selector.clone(),
            Pattern::Text(_) => "body".to_string(),
            Pattern::Label(label) => format!("[aria-label=\"{}\"]", label),
        }
    }
}
