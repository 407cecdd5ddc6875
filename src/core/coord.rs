//! Positional arguments: absolute, relative (`~`) and facing-relative (`^`).

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub value: f32,
    pub decimal: bool,
    pub relative: bool,
    pub facing: bool,
}

impl Coord {
    /// `~`
    pub const HERE: Coord = Coord { value: 0.0, decimal: false, relative: true, facing: false };
    /// `^`
    pub const FACING_HERE: Coord = Coord { value: 0.0, decimal: false, relative: false, facing: true };

    pub fn absolute(value: i32) -> Self {
        Self { value: value as f32, decimal: false, relative: false, facing: false }
    }

    pub fn absolute_decimal(value: f32) -> Self {
        Self { value, decimal: true, relative: false, facing: false }
    }

    pub fn relative(value: f32) -> Self {
        Self { value, decimal: value.fract() != 0.0, relative: true, facing: false }
    }

    pub fn facing(value: f32) -> Self {
        Self { value, decimal: value.fract() != 0.0, relative: false, facing: true }
    }

    pub fn value_int(&self) -> i32 {
        self.value.round() as i32
    }

    pub fn is_absolute(&self) -> bool {
        !self.relative && !self.facing
    }

    /// Parse `~`, `~5`, `^-1.5` or a bare number.
    pub fn parse(text: &str) -> Option<Coord> {
        let (relative, facing, rest) = if let Some(rest) = text.strip_prefix('~') {
            (true, false, rest)
        } else if let Some(rest) = text.strip_prefix('^') {
            (false, true, rest)
        } else {
            (false, false, text)
        };

        if rest.is_empty() {
            return if relative || facing {
                Some(Coord { value: 0.0, decimal: false, relative, facing })
            } else {
                None
            };
        }

        let decimal = rest.contains('.');
        let value: f32 = rest.parse().ok()?;
        Some(Coord { value, decimal, relative, facing })
    }

    /// The lesser of two coordinates of the same kind; `a` wins otherwise.
    pub fn min(a: Coord, b: Coord) -> Coord {
        if a.relative == b.relative && a.facing == b.facing && b.value < a.value {
            b
        } else {
            a
        }
    }

    /// Whether the span between each pair of coordinates is known at compile time.
    pub fn size_known(pairs: &[(Coord, Coord)]) -> bool {
        pairs
            .iter()
            .all(|(a, b)| !a.facing && !b.facing && a.relative == b.relative)
    }

    pub fn with_value(&self, value: f32) -> Coord {
        Coord {
            value,
            decimal: self.decimal || value.fract() != 0.0,
            ..*self
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            write!(f, "~")?;
        } else if self.facing {
            write!(f, "^")?;
        }
        if (self.relative || self.facing) && self.value == 0.0 {
            return Ok(());
        }
        if self.decimal {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{}", self.value as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Coord::parse("~").unwrap().to_string(), "~");
        assert_eq!(Coord::parse("~5").unwrap().to_string(), "~5");
        assert_eq!(Coord::parse("^-1.5").unwrap().to_string(), "^-1.5");
        assert_eq!(Coord::parse("12").unwrap().to_string(), "12");
        assert!(Coord::parse("abc").is_none());
        assert!(Coord::parse("").is_none());
    }

    #[test]
    fn test_size_known() {
        let a = Coord::absolute(0);
        let b = Coord::absolute(10);
        assert!(Coord::size_known(&[(a, b)]));
        assert!(Coord::size_known(&[(Coord::HERE, Coord::relative(3.0))]));
        assert!(!Coord::size_known(&[(Coord::HERE, b)]));
        assert!(!Coord::size_known(&[(Coord::FACING_HERE, Coord::FACING_HERE)]));
    }

    #[test]
    fn test_min() {
        assert_eq!(Coord::min(Coord::absolute(4), Coord::absolute(2)), Coord::absolute(2));
        assert_eq!(Coord::min(Coord::HERE, Coord::absolute(-9)), Coord::HERE);
    }
}
