//! Numeric ranges as used by selector score filters: `5`, `1..`, `..4`, `1..5`, `!5`.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub invert: bool,
}

impl Range {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Self {
        Self { min, max, invert: false }
    }

    pub fn exact(value: i32) -> Self {
        Self::new(Some(value), Some(value))
    }

    pub fn at_least(value: i32) -> Self {
        Self::new(Some(value), None)
    }

    pub fn at_most(value: i32) -> Self {
        Self::new(None, Some(value))
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn is_single(&self) -> bool {
        self.min.is_some() && self.min == self.max
    }

    pub fn contains(&self, value: i32) -> bool {
        let inside = self.min.map_or(true, |min| value >= min)
            && self.max.map_or(true, |max| value <= max);
        inside != self.invert
    }

    pub fn parse(text: &str) -> Option<Range> {
        let (invert, body) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let range = if let Some((min, max)) = body.split_once("..") {
            let min = if min.is_empty() { None } else { Some(min.parse().ok()?) };
            let max = if max.is_empty() { None } else { Some(max.parse().ok()?) };
            if min.is_none() && max.is_none() {
                return None;
            }
            Range::new(min, max)
        } else {
            Range::exact(body.parse().ok()?)
        };

        Some(Range { invert, ..range })
    }

    pub fn map(&self, f: impl Fn(i32) -> i32) -> Range {
        Range {
            min: self.min.map(&f),
            max: self.max.map(&f),
            invert: self.invert,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            write!(f, "!")?;
        }
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => write!(f, "{}", min),
            (Some(min), Some(max)) => write!(f, "{}..{}", min, max),
            (Some(min), None) => write!(f, "{}..", min),
            (None, Some(max)) => write!(f, "..{}", max),
            (None, None) => write!(f, ".."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Range::parse("5"), Some(Range::exact(5)));
        assert_eq!(Range::parse("1.."), Some(Range::at_least(1)));
        assert_eq!(Range::parse("..4"), Some(Range::at_most(4)));
        assert_eq!(Range::parse("!1..5"), Some(Range::new(Some(1), Some(5)).inverted()));
        assert_eq!(Range::parse(".."), None);
        assert_eq!(Range::parse("x"), None);
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["5", "1..", "..4", "1..5", "!3"] {
            assert_eq!(Range::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_contains() {
        let r = Range::new(Some(1), Some(5));
        assert!(r.contains(1));
        assert!(r.contains(5));
        assert!(!r.contains(6));
        assert!(r.inverted().contains(6));
    }
}
