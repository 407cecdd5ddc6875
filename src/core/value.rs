//! Compile-time values.
//!
//! One tagged union backs both literal tokens and preprocessor variables.
//! Arithmetic dispatches on the pair of tags; any pair without a defined
//! meaning is a [`ValueError::InvalidOperation`].

use super::constants::MAX_DECIMAL_PRECISION;
use super::coord::Coord;
use super::range::Range;
use super::selector::Selector;
use crate::error::ValueError;
use std::cmp::Ordering;
use std::fmt;

/// Ticks in one second of game time.
pub const TICKS_PER_SECOND: i32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Text(String),
    Coord(Coord),
    Selector(Selector),
    Range(Range),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }

    /// `+`/`-` are the lower tier, `*`/`/`/`%` the higher one.
    pub fn is_high_tier(&self) -> bool {
        matches!(self, ArithOp::Mul | ArithOp::Div | ArithOp::Mod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn parse(text: &str) -> Option<CompareOp> {
        match text {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn inverted(&self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    fn test(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "decimal",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "string",
            Value::Coord(_) => "coordinate",
            Value::Selector(_) => "selector",
            Value::Range(_) => "range",
            Value::Json(_) => "json",
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Int(i) => Some(*i as f32),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Digits needed after the decimal point to represent this value exactly.
    /// Fractional digits of a float, capped at the widest decimal counter.
    pub fn precision(&self) -> usize {
        match self {
            Value::Float(f) => {
                let text = f.to_string();
                let digits = text.find('.').map_or(0, |dot| text.len() - dot - 1);
                digits.min(MAX_DECIMAL_PRECISION)
            }
            _ => 0,
        }
    }

    pub fn apply(&self, op: ArithOp, other: &Value) -> Result<Value, ValueError> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => int_op(*a, op, *b).map(Int),
            (Int(_), Float(_)) | (Float(_), Int(_)) | (Float(_), Float(_)) => {
                let a = self.as_number().unwrap_or_default();
                let b = other.as_number().unwrap_or_default();
                float_op(a, op, b).map(Float)
            }
            (Text(a), _) => text_op(a, op, other),
            (Coord(a), Coord(b)) => float_op(a.value, op, b.value).map(|v| Coord(a.with_value(v))),
            (Coord(a), Int(_) | Float(_)) => {
                let b = other.as_number().unwrap_or_default();
                float_op(a.value, op, b).map(|v| Coord(a.with_value(v)))
            }
            (Range(a), Range(b)) => Ok(Range(super::range::Range {
                min: bound_op(a.min, op, b.min)?,
                max: bound_op(a.max, op, b.max)?,
                invert: a.invert,
            })),
            (Range(a), Int(_) | Float(_)) => {
                let b = other.as_number().unwrap_or_default().round() as i32;
                Ok(Range(super::range::Range {
                    min: a.min.map(|m| int_op(m, op, b)).transpose()?,
                    max: a.max.map(|m| int_op(m, op, b)).transpose()?,
                    invert: a.invert,
                }))
            }
            _ => Err(ValueError::InvalidOperation),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        self.apply(ArithOp::Add, other)
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ValueError> {
        self.apply(ArithOp::Sub, other)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueError> {
        self.apply(ArithOp::Mul, other)
    }

    pub fn div(&self, other: &Value) -> Result<Value, ValueError> {
        self.apply(ArithOp::Div, other)
    }

    pub fn rem(&self, other: &Value) -> Result<Value, ValueError> {
        self.apply(ArithOp::Mod, other)
    }

    pub fn negate(&self) -> Result<Value, ValueError> {
        match self {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Coord(c) => Ok(Value::Coord(c.with_value(-c.value))),
            Value::Range(r) => Ok(Value::Range(Range {
                min: r.max.map(|v| -v),
                max: r.min.map(|v| -v),
                invert: r.invert,
            })),
            _ => Err(ValueError::InvalidOperation),
        }
    }

    pub fn compare(&self, op: CompareOp, other: &Value) -> Result<bool, ValueError> {
        use Value::*;
        let incomparable = || ValueError::Incomparable(self.kind_name(), other.kind_name());
        match (self, other) {
            (Int(a), Int(b)) => Ok(op.test(a.cmp(b))),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let a = self.as_number().unwrap_or_default();
                let b = other.as_number().unwrap_or_default();
                a.partial_cmp(&b).map(|o| op.test(o)).ok_or_else(incomparable)
            }
            (Text(a), Text(b)) => match op {
                CompareOp::Eq => Ok(a == b),
                CompareOp::Ne => Ok(a != b),
                _ => Ok(op.test(a.chars().count().cmp(&b.chars().count()))),
            },
            (Bool(a), Bool(b)) => match op {
                CompareOp::Eq => Ok(a == b),
                CompareOp::Ne => Ok(a != b),
                _ => Err(incomparable()),
            },
            (Coord(a), Coord(b)) => a.value.partial_cmp(&b.value).map(|o| op.test(o)).ok_or_else(incomparable),
            (Coord(a), Int(_) | Float(_)) => {
                let b = other.as_number().unwrap_or_default();
                a.value.partial_cmp(&b).map(|o| op.test(o)).ok_or_else(incomparable)
            }
            (Range(r), Int(_) | Float(_)) => {
                let n = other.as_number().unwrap_or_default();
                let below = |bound: Option<i32>, strict: bool| {
                    bound.map_or(false, |b| if strict { (b as f32) < n } else { (b as f32) <= n })
                };
                let above = |bound: Option<i32>, strict: bool| {
                    bound.map_or(false, |b| if strict { (b as f32) > n } else { (b as f32) >= n })
                };
                Ok(match op {
                    CompareOp::Eq => r.contains(n.round() as i32),
                    CompareOp::Ne => !r.contains(n.round() as i32),
                    CompareOp::Lt => below(r.max, true),
                    CompareOp::Le => below(r.max, false),
                    CompareOp::Gt => above(r.min, true),
                    CompareOp::Ge => above(r.min, false),
                })
            }
            (Selector(_), Selector(_)) | (Json(_), Json(_)) if matches!(op, CompareOp::Eq | CompareOp::Ne) => {
                let equal = self == other;
                Ok(if op == CompareOp::Eq { equal } else { !equal })
            }
            _ => Err(incomparable()),
        }
    }

    /// Index into strings, ranges and JSON arrays/objects.
    pub fn index(&self, index: &Value) -> Result<Value, ValueError> {
        match (self, index) {
            (Value::Text(text), Value::Int(i)) => {
                let length = text.chars().count();
                usize::try_from(*i)
                    .ok()
                    .and_then(|i| text.chars().nth(i))
                    .map(|c| Value::Text(c.to_string()))
                    .ok_or(ValueError::IndexOutOfRange { index: *i as i64, length })
            }
            (Value::Range(range), Value::Int(i)) => {
                let bound = match i {
                    0 => range.min,
                    1 => range.max,
                    _ => return Err(ValueError::IndexOutOfRange { index: *i as i64, length: 2 }),
                };
                bound.map(Value::Int).ok_or(ValueError::InvalidOperation)
            }
            (Value::Json(serde_json::Value::Array(items)), Value::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i))
                .and_then(Value::from_json)
                .ok_or(ValueError::IndexOutOfRange { index: *i as i64, length: items.len() }),
            (Value::Json(serde_json::Value::Object(map)), Value::Text(key)) => map
                .get(key)
                .and_then(Value::from_json)
                .ok_or(ValueError::InvalidOperation),
            _ => Err(ValueError::InvalidOperation),
        }
    }

    /// Convert a JSON node into a value. Scalars map onto their own kinds,
    /// `H:MM:SS` strings are time spans converted to ticks, containers stay JSON.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(|f| Value::Float(f as f32)),
            },
            serde_json::Value::String(s) => Some(match parse_time_span(s) {
                Some(ticks) => Value::Int(ticks),
                None => Value::Text(s.clone()),
            }),
            other => Some(Value::Json(other.clone())),
        }
    }
}

fn int_op(a: i32, op: ArithOp, b: i32) -> Result<i32, ValueError> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div => {
            if b == 0 {
                return Err(ValueError::DivideByZero);
            }
            a.wrapping_div(b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err(ValueError::DivideByZero);
            }
            a.wrapping_rem(b)
        }
    })
}

fn float_op(a: f32, op: ArithOp, b: f32) -> Result<f32, ValueError> {
    match op {
        ArithOp::Add => Ok(a + b),
        ArithOp::Sub => Ok(a - b),
        ArithOp::Mul => Ok(a * b),
        ArithOp::Div | ArithOp::Mod if b == 0.0 => Err(ValueError::DivideByZero),
        ArithOp::Div => Ok(a / b),
        ArithOp::Mod => Ok(a % b),
    }
}

fn bound_op(a: Option<i32>, op: ArithOp, b: Option<i32>) -> Result<Option<i32>, ValueError> {
    match (a, b) {
        (Some(a), Some(b)) => int_op(a, op, b).map(Some),
        _ => Ok(None),
    }
}

fn text_op(text: &str, op: ArithOp, other: &Value) -> Result<Value, ValueError> {
    let length = text.chars().count();
    match (op, other) {
        (ArithOp::Add, _) => Ok(Value::Text(format!("{}{}", text, other))),
        (ArithOp::Sub, Value::Text(suffix)) => Ok(Value::Text(
            text.strip_suffix(suffix.as_str()).unwrap_or(text).to_string(),
        )),
        (ArithOp::Sub, Value::Int(n)) => {
            let keep = length.saturating_sub((*n).max(0) as usize);
            Ok(Value::Text(text.chars().take(keep).collect()))
        }
        (ArithOp::Mul, Value::Int(_) | Value::Float(_)) => {
            let factor = other.as_number().unwrap_or_default();
            let target = (length as f32 * factor).round().max(0.0) as usize;
            Ok(Value::Text(text.chars().cycle().take(if length == 0 { 0 } else { target }).collect()))
        }
        (ArithOp::Div, Value::Int(_) | Value::Float(_)) => {
            let divisor = other.as_number().unwrap_or_default();
            if divisor == 0.0 {
                return Err(ValueError::DivideByZero);
            }
            let keep = (length as f32 / divisor).max(0.0) as usize;
            Ok(Value::Text(text.chars().take(keep).collect()))
        }
        _ => Err(ValueError::InvalidOperation),
    }
}

/// `H:MM:SS[.fff]` to game ticks.
fn parse_time_span(text: &str) -> Option<i32> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u32 = parts[0].parse().ok()?;
    let minutes: u32 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let total = hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds;
    Some((total * TICKS_PER_SECOND as f64).round() as i32)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::Coord(c) => write!(f, "{}", c),
            Value::Selector(s) => write!(f, "{}", s),
            Value::Range(r) => write!(f, "{}", r),
            Value::Json(j) => write!(f, "{}", j),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_negate_round_trip() {
        let pairs = [(Value::Int(7), Value::Int(-3)), (Value::Int(0), Value::Int(i32::MAX))];
        for (a, b) in pairs {
            let back = a.add(&b).unwrap().add(&b.negate().unwrap()).unwrap();
            assert_eq!(back, a);
        }
        let a = Value::Float(1.5);
        let b = Value::Float(0.25);
        assert_eq!(a.add(&b).unwrap().add(&b.negate().unwrap()).unwrap(), a);
    }

    #[test]
    fn test_mixed_number_order() {
        assert_eq!(Value::Int(10).sub(&Value::Float(2.5)).unwrap(), Value::Float(7.5));
        assert_eq!(Value::Int(9).div(&Value::Float(2.0)).unwrap(), Value::Float(4.5));
        assert_eq!(Value::Int(7).rem(&Value::Int(4)).unwrap(), Value::Int(3));
        assert_eq!(Value::Int(1).div(&Value::Int(0)), Err(ValueError::DivideByZero));
    }

    #[test]
    fn test_text_operations() {
        let hello = Value::Text("hello".into());
        assert_eq!(hello.add(&Value::Int(1)).unwrap(), Value::Text("hello1".into()));
        assert_eq!(hello.sub(&Value::Text("llo".into())).unwrap(), Value::Text("he".into()));
        assert_eq!(hello.sub(&Value::Int(2)).unwrap(), Value::Text("hel".into()));
        assert_eq!(Value::Text("ab".into()).mul(&Value::Int(2)).unwrap(), Value::Text("abab".into()));
        assert_eq!(hello.div(&Value::Int(2)).unwrap(), Value::Text("he".into()));
        assert_eq!(hello.rem(&Value::Int(2)), Err(ValueError::InvalidOperation));
    }

    #[test]
    fn test_bool_operations_fail() {
        assert_eq!(Value::Bool(true).add(&Value::Bool(false)), Err(ValueError::InvalidOperation));
    }

    #[test]
    fn test_compare() {
        assert!(Value::Int(3).compare(CompareOp::Lt, &Value::Float(3.5)).unwrap());
        assert!(Value::Text("abc".into()).compare(CompareOp::Gt, &Value::Text("zz".into())).unwrap());
        let range = Value::Range(Range::new(Some(1), Some(5)));
        assert!(range.compare(CompareOp::Eq, &Value::Int(3)).unwrap());
        assert!(range.compare(CompareOp::Lt, &Value::Int(6)).unwrap());
        assert!(Value::Bool(true).compare(CompareOp::Lt, &Value::Bool(false)).is_err());
    }

    #[test]
    fn test_index() {
        assert_eq!(Value::Text("abc".into()).index(&Value::Int(1)).unwrap(), Value::Text("b".into()));
        assert!(Value::Text("abc".into()).index(&Value::Int(3)).is_err());
        let json = Value::Json(serde_json::json!({"a": [1, 2.5]}));
        let inner = json.index(&Value::Text("a".into())).unwrap();
        assert_eq!(inner.index(&Value::Int(1)).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_from_json_time_span() {
        let json = serde_json::json!("0:01:30");
        assert_eq!(Value::from_json(&json), Some(Value::Int(1800)));
        assert_eq!(Value::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_precision() {
        assert_eq!(Value::Float(2.25).precision(), 2);
        assert_eq!(Value::Int(4).precision(), 0);
        assert_eq!(Value::Float(0.000_000_000_1).precision(), MAX_DECIMAL_PRECISION);
    }
}
