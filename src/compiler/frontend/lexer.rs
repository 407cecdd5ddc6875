//! Lexical analysis for MCC source code

use crate::core::value::{ArithOp, CompareOp};
use crate::core::{Coord, Range, Selector, Token, TokenKind, Value};
use crate::error::{CompilerError, Result};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    filename: String,
}

impl Lexer {
    pub fn new(input: &str, filename: impl Into<String>) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            filename: filename.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::tokenizer(self.filename.clone(), self.line, message)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if let Some(token) = self.next_token()? {
                tokens.push(token);
            }
        }
        log::trace!("{}: {} tokens", self.filename, tokens.len());
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Ok(None);
        }

        let start_line = self.line;
        let preceded_by_gap = self.position == 0
            || matches!(self.input[self.position - 1], ' ' | '\t' | '\n' | '\r' | '(' | ',' | '=');
        let ch = self.advance();

        let kind = match ch {
            '\n' => {
                self.line += 1;
                return Ok(None);
            }
            ',' | '\r' => return Ok(None),
            '{' => TokenKind::OpenBlock,
            '}' => TokenKind::CloseBlock,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '/' if self.peek() == Some('/') => {
                self.skip_line_comment();
                return Ok(None);
            }
            '/' if self.peek() == Some('*') => {
                self.skip_block_comment()?;
                return Ok(None);
            }
            '"' | '\'' => TokenKind::Literal(Value::Text(self.read_string(ch)?)),
            '=' => {
                if self.match_char('=') {
                    TokenKind::Compare(CompareOp::Eq)
                } else {
                    TokenKind::Assign(None)
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::Compare(CompareOp::Ne)
                } else if self.peek().map_or(false, |c| c.is_ascii_digit() || c == '.') {
                    let text = self.read_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
                    let range = Range::parse(&text).ok_or_else(|| self.error(format!("Invalid range '!{}'", text)))?;
                    TokenKind::Literal(Value::Range(range.inverted()))
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::Compare(CompareOp::Le)
                } else {
                    TokenKind::Compare(CompareOp::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Compare(CompareOp::Ge)
                } else {
                    TokenKind::Compare(CompareOp::Gt)
                }
            }
            '-' if preceded_by_gap && self.peek().map_or(false, |c| c.is_ascii_digit()) => {
                self.read_number('-')?
            }
            '+' | '-' | '*' | '/' | '%' => {
                let op = match ch {
                    '+' => ArithOp::Add,
                    '-' => ArithOp::Sub,
                    '*' => ArithOp::Mul,
                    '/' => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                if self.match_char('=') {
                    TokenKind::Assign(Some(op))
                } else {
                    TokenKind::Arith(op)
                }
            }
            '.' if self.peek() == Some('.') => {
                let text = self.read_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
                let range = Range::parse(&format!(".{}", text))
                    .ok_or_else(|| self.error(format!("Invalid range '.{}'", text)))?;
                TokenKind::Literal(Value::Range(range))
            }
            '~' | '^' => {
                let rest = self.read_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
                let text = format!("{}{}", ch, rest);
                let coord = Coord::parse(&text).ok_or_else(|| self.error(format!("Invalid coordinate '{}'", text)))?;
                TokenKind::Literal(Value::Coord(coord))
            }
            '@' => {
                let selector = self.read_selector()?;
                TokenKind::Literal(Value::Selector(selector))
            }
            '$' => {
                let name = self.read_while(is_identifier_char);
                if name.is_empty() {
                    return Err(self.error("Expected a name after '$'"));
                }
                TokenKind::PreprocessorRef(name)
            }
            c if c.is_ascii_digit() => self.read_number(c)?,
            c if c.is_alphabetic() || c == '_' => {
                let rest = self.read_while(is_identifier_char);
                let word = format!("{}{}", c, rest);
                match word.as_str() {
                    "true" => TokenKind::Literal(Value::Bool(true)),
                    "false" => TokenKind::Literal(Value::Bool(false)),
                    "and" => TokenKind::And,
                    "not" => TokenKind::Not,
                    _ => TokenKind::Identifier(word),
                }
            }
            _ => return Err(self.error(format!("Unexpected character: '{}'", ch))),
        };

        Ok(Some(Token::new(kind, start_line)))
    }

    /// Integers (with optional time suffix), decimals and ranges starting with a number.
    fn read_number(&mut self, first: char) -> Result<TokenKind> {
        let mut text = String::from(first);
        text.push_str(&self.read_while(|c| c.is_ascii_digit()));

        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            text.push_str(&self.read_while(|c| c.is_ascii_digit() || c == '.' || c == '-'));
            let range = Range::parse(&text).ok_or_else(|| self.error(format!("Invalid range '{}'", text)))?;
            return Ok(TokenKind::Literal(Value::Range(range)));
        }

        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            text.push_str(&self.read_while(|c| c.is_ascii_digit()));
            let value: f32 = text.parse().map_err(|_| self.error(format!("Invalid number '{}'", text)))?;
            return Ok(TokenKind::Literal(Value::Float(value)));
        }

        let value: i32 = text.parse().map_err(|_| self.error(format!("Invalid number '{}'", text)))?;
        let multiplier = match self.peek() {
            Some(suffix @ ('t' | 's' | 'm' | 'h')) if !self.peek_next().map_or(false, is_identifier_char) => {
                self.advance();
                match suffix {
                    't' => 1,
                    's' => 20,
                    'm' => 1200,
                    _ => 72000,
                }
            }
            _ => 1,
        };
        Ok(TokenKind::Literal(Value::Int(value.wrapping_mul(multiplier))))
    }

    fn read_selector(&mut self) -> Result<Selector> {
        let mut text = String::from("@");
        text.push_str(&self.read_while(|c| c.is_ascii_alphabetic()));
        if self.peek() == Some('[') {
            let mut depth = 0;
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.advance();
                text.push(c);
                match c {
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if depth != 0 {
                return Err(self.error(format!("Unterminated selector '{}'", text)));
            }
        }
        Selector::parse(&text).ok_or_else(|| self.error(format!("Invalid selector '{}'", text)))
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        let mut value = String::new();
        while let Some(ch) = self.peek() {
            self.advance();
            match ch {
                '\\' => {
                    let escaped = self.advance();
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' | '"' | '\'' => value.push(escaped),
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\n' => return Err(self.error("Unterminated string literal")),
                c if c == quote => return Ok(value),
                c => value.push(c),
            }
        }
        Err(self.error("Unterminated string literal"))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == ' ' || ch == '\t' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        self.advance();
        while !self.is_at_end() {
            let ch = self.advance();
            if ch == '\n' {
                self.line += 1;
            } else if ch == '*' && self.peek() == Some('/') {
                self.advance();
                return Ok(());
            }
        }
        Err(self.error("Unterminated block comment"))
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> char {
        match self.input.get(self.position) {
            Some(&ch) => {
                self.position += 1;
                ch
            }
            None => '\0',
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selector::Core;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source, "test.mcc")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operation_tokens() {
        let tokens = kinds("score += 2 * x");
        assert_eq!(tokens[0], TokenKind::Identifier("score".into()));
        assert_eq!(tokens[1], TokenKind::Assign(Some(ArithOp::Add)));
        assert_eq!(tokens[2], TokenKind::Literal(Value::Int(2)));
        assert_eq!(tokens[3], TokenKind::Arith(ArithOp::Mul));
    }

    #[test]
    fn test_negative_literal_needs_gap() {
        assert_eq!(kinds("x = -5")[2], TokenKind::Literal(Value::Int(-5)));
        let tokens = kinds("x = a-5");
        assert_eq!(tokens[3], TokenKind::Arith(ArithOp::Sub));
        assert_eq!(tokens[4], TokenKind::Literal(Value::Int(5)));
    }

    #[test]
    fn test_time_suffixes() {
        assert_eq!(kinds("3s")[0], TokenKind::Literal(Value::Int(60)));
        assert_eq!(kinds("2m")[0], TokenKind::Literal(Value::Int(2400)));
        assert_eq!(kinds("1h")[0], TokenKind::Literal(Value::Int(72000)));
        assert_eq!(kinds("7t")[0], TokenKind::Literal(Value::Int(7)));
    }

    #[test]
    fn test_ranges_and_decimals() {
        assert_eq!(kinds("1..5")[0], TokenKind::Literal(Value::Range(Range::new(Some(1), Some(5)))));
        assert_eq!(kinds("..5")[0], TokenKind::Literal(Value::Range(Range::new(None, Some(5)))));
        assert_eq!(kinds("!3")[0], TokenKind::Literal(Value::Range(Range::exact(3).inverted())));
        assert_eq!(kinds("2.5")[0], TokenKind::Literal(Value::Float(2.5)));
    }

    #[test]
    fn test_selectors_and_coordinates() {
        let tokens = kinds("tp @e[type=cow,c=1] ~ ~1 ^");
        match &tokens[1] {
            TokenKind::Literal(Value::Selector(s)) => {
                assert_eq!(s.core, Core::E);
                assert_eq!(s.count, Some(1));
            }
            other => panic!("Expected selector, got {:?}", other),
        }
        assert_eq!(tokens[3], TokenKind::Literal(Value::Coord(Coord::relative(1.0))));
        assert_eq!(tokens[4], TokenKind::Literal(Value::Coord(Coord::FACING_HERE)));
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("a = 1 // trailing\n/* block\ncomment */ b = 2", "test.mcc")
            .tokenize()
            .unwrap();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn test_logic_words_and_preprocessor() {
        let tokens = kinds("if not $x and y");
        assert_eq!(tokens[1], TokenKind::Not);
        assert_eq!(tokens[2], TokenKind::PreprocessorRef("x".into()));
        assert_eq!(tokens[3], TokenKind::And);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("print \"oops", "bad.mcc").tokenize().unwrap_err();
        assert!(matches!(err, CompilerError::Tokenizer { line: 1, .. }));
    }
}
