//! Line-tagged tokens and the "view as T" capability query.

use super::coord::Coord;
use super::range::Range;
use super::selector::Selector;
use super::value::{ArithOp, CompareOp, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Literal(Value),
    /// Unresolved name.
    Identifier(String),
    /// `$name` before substitution.
    PreprocessorRef(String),
    /// Resolved to a counter; holds the full accessor (`base` or `base:field`).
    Counter(String),
    Struct(String),
    Macro(String),
    Function(String),
    OpenParen,
    CloseParen,
    Arith(ArithOp),
    /// `=` when `None`, otherwise the compound form (`+=`, `-=`, ...).
    Assign(Option<ArithOp>),
    Compare(CompareOp),
    And,
    Not,
    OpenBlock,
    CloseBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }

    pub fn literal(value: Value, line: usize) -> Self {
        Self::new(TokenKind::Literal(value), line)
    }

    /// View this token as `T`, directly or through an implicit conversion.
    pub fn view<T: TokenView>(&self) -> Option<T> {
        T::view(&self.kind)
    }

    pub fn is<T: TokenView>(&self) -> bool {
        T::view(&self.kind).is_some()
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.kind {
            TokenKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TokenKind::Literal(v) => v.kind_name(),
            TokenKind::Identifier(_) => "identifier",
            TokenKind::PreprocessorRef(_) => "preprocessor variable",
            TokenKind::Counter(_) => "value",
            TokenKind::Struct(_) => "struct",
            TokenKind::Macro(_) => "macro",
            TokenKind::Function(_) => "function",
            TokenKind::OpenParen | TokenKind::CloseParen => "parenthesis",
            TokenKind::Arith(_) => "arithmetic operator",
            TokenKind::Assign(_) => "assignment",
            TokenKind::Compare(_) => "comparison",
            TokenKind::And => "and",
            TokenKind::Not => "not",
            TokenKind::OpenBlock | TokenKind::CloseBlock => "block",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Literal(Value::Text(s)) => write!(f, "\"{}\"", s),
            TokenKind::Literal(v) => write!(f, "{}", v),
            TokenKind::Identifier(n)
            | TokenKind::Counter(n)
            | TokenKind::Struct(n)
            | TokenKind::Macro(n)
            | TokenKind::Function(n) => write!(f, "{}", n),
            TokenKind::PreprocessorRef(n) => write!(f, "${}", n),
            TokenKind::OpenParen => write!(f, "("),
            TokenKind::CloseParen => write!(f, ")"),
            TokenKind::Arith(op) => write!(f, "{}", op.symbol()),
            TokenKind::Assign(None) => write!(f, "="),
            TokenKind::Assign(Some(op)) => write!(f, "{}=", op.symbol()),
            TokenKind::Compare(op) => write!(f, "{}", op.symbol()),
            TokenKind::And => write!(f, "and"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::OpenBlock => write!(f, "{{"),
            TokenKind::CloseBlock => write!(f, "}}"),
        }
    }
}

/// A kind a token can be viewed as.
pub trait TokenView: Sized {
    const NAME: &'static str;

    fn view(kind: &TokenKind) -> Option<Self>;
}

/// Capability check usable in directive call patterns.
pub type Capability = fn(&TokenKind) -> bool;

pub fn can_view<T: TokenView>(kind: &TokenKind) -> bool {
    T::view(kind).is_some()
}

impl TokenView for Value {
    const NAME: &'static str = "literal";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl TokenView for i32 {
    const NAME: &'static str = "integer";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

impl TokenView for f32 {
    const NAME: &'static str = "number";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(v) => v.as_number(),
            _ => None,
        }
    }
}

impl TokenView for bool {
    const NAME: &'static str = "boolean";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

impl TokenView for String {
    const NAME: &'static str = "string";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Numbers are absolute coordinates.
impl TokenView for Coord {
    const NAME: &'static str = "coordinate";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Coord(c)) => Some(*c),
            TokenKind::Literal(Value::Int(i)) => Some(Coord::absolute(*i)),
            TokenKind::Literal(Value::Float(f)) => Some(Coord::absolute_decimal(*f)),
            _ => None,
        }
    }
}

/// Strings convert through [`Selector::from_text`].
impl TokenView for Selector {
    const NAME: &'static str = "selector";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Selector(s)) => Some(s.clone()),
            TokenKind::Literal(Value::Text(t)) => Selector::from_text(t),
            _ => None,
        }
    }
}

impl TokenView for Range {
    const NAME: &'static str = "range";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(Value::Range(r)) => Some(*r),
            _ => None,
        }
    }
}

impl TokenView for CompareOp {
    const NAME: &'static str = "comparison";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Compare(op) => Some(*op),
            _ => None,
        }
    }
}

/// Any identifier, resolved or not, viewed by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(pub String);

impl TokenView for Ident {
    const NAME: &'static str = "identifier";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Identifier(n)
            | TokenKind::Counter(n)
            | TokenKind::Struct(n)
            | TokenKind::Macro(n)
            | TokenKind::Function(n) => Some(Ident(n.clone())),
            _ => None,
        }
    }
}

/// A resolved counter accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRef(pub String);

impl TokenView for CounterRef {
    const NAME: &'static str = "value";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Counter(n) => Some(CounterRef(n.clone())),
            _ => None,
        }
    }
}

/// Anything that can sit on one side of an arithmetic operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Counter(String),
}

impl TokenView for Operand {
    const NAME: &'static str = "operand";
    fn view(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Literal(v) => Some(Operand::Literal(v.clone())),
            TokenKind::Counter(n) => Some(Operand::Counter(n.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selector::Core;

    #[test]
    fn test_direct_views() {
        let token = Token::literal(Value::Int(5), 1);
        assert_eq!(token.view::<i32>(), Some(5));
        assert_eq!(token.view::<f32>(), Some(5.0));
        assert!(token.view::<String>().is_none());
    }

    #[test]
    fn test_implicit_coordinate() {
        let token = Token::literal(Value::Float(1.5), 1);
        let coord = token.view::<Coord>().unwrap();
        assert!(coord.is_absolute());
        assert_eq!(coord.to_string(), "1.5");
    }

    #[test]
    fn test_implicit_selector_from_string() {
        let token = Token::literal(Value::Text("@a".into()), 3);
        assert_eq!(token.view::<Selector>().unwrap().core, Core::A);
        let named = Token::literal(Value::Text("bob:villager".into()), 3);
        assert_eq!(named.view::<Selector>().unwrap().to_string(), "@e[type=villager,name=bob]");
    }

    #[test]
    fn test_identifier_view_covers_resolved() {
        let token = Token::new(TokenKind::Counter("score".into()), 1);
        assert_eq!(token.view::<Ident>(), Some(Ident("score".into())));
        assert!(token.is::<CounterRef>());
        assert!(!Token::new(TokenKind::Identifier("x".into()), 1).is::<CounterRef>());
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::new(TokenKind::Assign(Some(ArithOp::Add)), 1).to_string(), "+=");
        assert_eq!(Token::literal(Value::Text("hi".into()), 1).to_string(), "\"hi\"");
    }
}
