//! String interpolation into rawtext JSON.
//!
//! `{name}` becomes the display terms of the counter or struct field `name`,
//! `{@selector}` becomes an entity reference. Anything else, including braces
//! around unknown names, passes through as text.

use crate::compiler::middle_end::scoreboard::ScoreboardManager;
use regex::Regex;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub enum RawTerm {
    Text(String),
    Score { name: String, objective: String },
    Selector(String),
}

impl RawTerm {
    pub fn text(text: impl Into<String>) -> Self {
        RawTerm::Text(text.into())
    }

    pub fn score(name: impl Into<String>, objective: impl Into<String>) -> Self {
        RawTerm::Score { name: name.into(), objective: objective.into() }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawTerm::Text(text) => json!({ "text": text }),
            RawTerm::Score { name, objective } => {
                json!({ "score": { "name": name, "objective": objective } })
            }
            RawTerm::Selector(selector) => json!({ "selector": selector }),
        }
    }
}

/// `{"rawtext":[...]}` for the given terms.
pub fn to_rawtext(terms: &[RawTerm]) -> String {
    let parts: Vec<serde_json::Value> = terms.iter().map(RawTerm::to_json).collect();
    json!({ "rawtext": parts }).to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedText {
    pub terms: Vec<RawTerm>,
    /// Commands that must run before the text is shown.
    pub setup: Vec<String>,
    /// Set when the text reads scores of the executing entity.
    pub advanced: bool,
}

impl FormattedText {
    pub fn to_rawtext(&self) -> String {
        to_rawtext(&self.terms)
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(RawTerm::Text(last)) = self.terms.last_mut() {
            last.push_str(text);
        } else {
            self.terms.push(RawTerm::text(text));
        }
    }
}

pub fn format(pattern: &Regex, text: &str, scoreboard: &ScoreboardManager, target: &str) -> FormattedText {
    let mut output = FormattedText::default();
    let mut last = 0;
    let mut index = 0;

    for captures in pattern.captures_iter(text) {
        let Some(whole) = captures.get(0) else { continue };
        output.push_text(&text[last..whole.start()]);
        last = whole.end();

        if let Some(name) = captures.get(2) {
            match scoreboard.get(name.as_str()) {
                Some(value) => {
                    output.setup.extend(value.raw_text_setup(target, index));
                    output.terms.extend(value.raw_text(target, index));
                    output.advanced = true;
                    index += 1;
                }
                None => output.push_text(whole.as_str()),
            }
        } else if let Some(selector) = captures.get(4) {
            output.terms.push(RawTerm::Selector(selector.as_str().to_string()));
        }
    }
    output.push_text(&text[last..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::middle_end::scoreboard::{CounterKind, ScoreboardValue};
    use crate::core::constants::FSTRING_PATTERN;

    fn scoreboard() -> ScoreboardManager {
        let mut manager = ScoreboardManager::new();
        manager.define(ScoreboardValue::new("score", CounterKind::Int)).unwrap();
        manager.define(ScoreboardValue::new("timer", CounterKind::Time)).unwrap();
        manager
    }

    #[test]
    fn test_plain_text() {
        let pattern = Regex::new(FSTRING_PATTERN).unwrap();
        let text = format(&pattern, "hello there", &scoreboard(), "@s");
        assert!(!text.advanced);
        assert_eq!(text.to_rawtext(), r#"{"rawtext":[{"text":"hello there"}]}"#);
    }

    #[test]
    fn test_score_and_selector() {
        let pattern = Regex::new(FSTRING_PATTERN).unwrap();
        let text = format(&pattern, "{@p} has {score} points", &scoreboard(), "@s");
        assert!(text.advanced);
        assert_eq!(
            text.terms,
            vec![
                RawTerm::Selector("@p".into()),
                RawTerm::text(" has "),
                RawTerm::score("@s", "score"),
                RawTerm::text(" points"),
            ]
        );
    }

    #[test]
    fn test_unknown_names_pass_through() {
        let pattern = Regex::new(FSTRING_PATTERN).unwrap();
        let text = format(&pattern, "{nope} {", &scoreboard(), "@s");
        assert_eq!(text.terms, vec![RawTerm::text("{nope} {")]);
    }

    #[test]
    fn test_time_uses_indexed_temporaries() {
        let pattern = Regex::new(FSTRING_PATTERN).unwrap();
        let text = format(&pattern, "{timer} / {timer}", &scoreboard(), "@s");
        assert!(text.setup.iter().any(|c| c.contains("_mcc_t_mins0")));
        assert!(text.setup.iter().any(|c| c.contains("_mcc_t_mins1")));
    }
}
