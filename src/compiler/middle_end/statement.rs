//! Statements, their token cursor, and per-run resolution and lowering.
//!
//! A statement's stored tokens are never touched. Every time it runs,
//! [`prepare`] builds a fresh resolved copy: preprocessor references are
//! substituted, identifiers are bound, and expressions are squashed into
//! single values while the commands computing them are emitted. Squashing
//! has side effects, so it happens exactly once per execution.
//!
//! Every squash pass restarts its scan from the front after each reduction.
//! This keeps lowering order stable at quadratic cost in the statement
//! length, which stays small in practice.

use crate::compiler::middle_end::directives::Directive;
use crate::compiler::middle_end::executor::{Executor, OrFail};
use crate::compiler::middle_end::function::assign_operand;
use crate::compiler::middle_end::scoreboard::{ops, CounterKind};
use crate::core::token::{CounterRef, Ident, Operand};
use crate::core::value::ArithOp;
use crate::core::{Token, TokenKind, TokenView, Value};
use crate::error::{CompilerError, Result};

/// Target all lowered score commands address; the prefix decides who that is.
pub const SELF_TARGET: &str = "@s";

#[derive(Debug, Clone)]
pub enum StatementKind {
    Directive(&'static Directive),
    /// `name <assign-op> ...`
    Operation,
    /// `name(...)`
    FunctionCall,
    OpenBlock { statements_inside: usize },
    CloseBlock,
    /// Lines only meaningful to an enclosing directive, such as struct fields.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub tokens: Vec<Token>,
    pub line: usize,
    pub source: String,
}

impl Statement {
    pub fn new(kind: StatementKind, tokens: Vec<Token>, line: usize, source: impl Into<String>) -> Self {
        Self { kind, tokens, line, source: source.into() }
    }

    pub fn is_open_block(&self) -> bool {
        matches!(self.kind, StatementKind::OpenBlock { .. })
    }

    pub fn statements_inside(&self) -> Option<usize> {
        match self.kind {
            StatementKind::OpenBlock { statements_inside } => Some(statements_inside),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            StatementKind::Directive(d) => format!("directive {}", d.name),
            StatementKind::Operation => "operation".to_string(),
            StatementKind::FunctionCall => "function call".to_string(),
            StatementKind::OpenBlock { statements_inside } => format!("open block ({})", statements_inside),
            StatementKind::CloseBlock => "close block".to_string(),
            StatementKind::Unknown => "unknown".to_string(),
        }
    }
}

/// Read position over one resolved statement.
#[derive(Debug, Clone)]
pub struct Cursor {
    tokens: Vec<Token>,
    index: usize,
    line: usize,
    source: String,
}

impl Cursor {
    pub fn new(tokens: Vec<Token>, line: usize, source: impl Into<String>) -> Self {
        Self { tokens, index: 0, line, source: source.into() }
    }

    /// A cursor over other tokens that reports errors at this cursor's line.
    pub fn replay(&self, tokens: Vec<Token>) -> Cursor {
        Cursor::new(tokens, self.line, self.source.clone())
    }

    pub fn error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::statement(self.line, self.source.clone(), message)
    }

    pub fn has_next(&self) -> bool {
        self.index < self.tokens.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    pub fn next(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| self.error("Unexpected end of statement."))?;
        self.index += 1;
        Ok(token)
    }

    /// Take the next token viewed as `T`.
    pub fn next_as<T: TokenView>(&mut self) -> Result<T> {
        let token = self.next()?;
        token.view::<T>().ok_or_else(|| {
            self.error(format!(
                "Invalid token type. Expected {} but got {}",
                T::NAME,
                token.kind_name()
            ))
        })
    }

    pub fn next_is<T: TokenView>(&self) -> bool {
        self.peek().map_or(false, |t| t.is::<T>())
    }

    /// Take the next token only if it can be viewed as `T`.
    pub fn try_next<T: TokenView>(&mut self) -> Option<T> {
        let value = self.peek()?.view::<T>()?;
        self.index += 1;
        Some(value)
    }

    pub fn next_kind_is(&self, kind: &TokenKind) -> bool {
        self.peek().map_or(false, |t| &t.kind == kind)
    }

    /// Consume the next token when it is the bare word `word`.
    pub fn next_word(&mut self, word: &str) -> bool {
        let matches = matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Identifier(w)) if w.eq_ignore_ascii_case(word)
        );
        if matches {
            self.index += 1;
        }
        matches
    }

    pub fn remaining(&self) -> &[Token] {
        &self.tokens[self.index.min(self.tokens.len())..]
    }

    /// Take every remaining token.
    pub fn rest(&mut self) -> Vec<Token> {
        let rest = self.remaining().to_vec();
        self.index = self.tokens.len();
        rest
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn matches_pattern(&self, pattern: &[crate::core::token::Capability]) -> bool {
        pattern.len() <= self.tokens.len()
            && pattern.iter().zip(&self.tokens).all(|(can, token)| can(&token.kind))
    }
}

/// Resolve and lower a copy of `statement`'s tokens for one execution.
pub fn prepare(executor: &mut Executor<'_>, statement: &Statement) -> Result<Cursor> {
    let resolve = match &statement.kind {
        StatementKind::Directive(directive) => directive.resolve,
        _ => true,
    };

    let mut tokens = Vec::with_capacity(statement.tokens.len());
    for token in &statement.tokens {
        let line = token.line;
        match &token.kind {
            TokenKind::Literal(Value::Text(text)) if resolve => {
                let text = executor
                    .preprocessor
                    .substitute(&executor.session.substitution_pattern, text);
                tokens.push(Token::literal(Value::Text(text), line));
            }
            TokenKind::PreprocessorRef(name) if resolve => {
                let values = executor.preprocessor.get(name).or_fail(executor)?.to_vec();
                tokens.extend(values.into_iter().map(|v| Token::literal(v, line)));
            }
            TokenKind::Identifier(name) => tokens.push(Token::new(resolve_identifier(executor, name), line)),
            _ => tokens.push(token.clone()),
        }
    }

    let start = match statement.kind {
        StatementKind::FunctionCall => 2,
        _ => 0,
    };
    squash_functions(executor, &mut tokens, start)?;
    squash_parentheses(executor, &mut tokens)?;
    squash_tier(executor, &mut tokens, true)?;
    squash_tier(executor, &mut tokens, false)?;

    Ok(Cursor::new(tokens, statement.line, statement.source.clone()))
}

/// Counter, then struct, then macro, then function; unmatched names stay plain.
fn resolve_identifier(executor: &Executor<'_>, name: &str) -> TokenKind {
    if executor.scoreboard.contains(name) {
        TokenKind::Counter(name.to_string())
    } else if executor.scoreboard.get_struct(name).is_some() {
        TokenKind::Struct(name.to_string())
    } else if executor.preprocessor.has_macro(name) {
        TokenKind::Macro(name.to_string())
    } else if executor.find_function(name).is_some() {
        TokenKind::Function(name.to_string())
    } else {
        TokenKind::Identifier(name.to_string())
    }
}

/// Index of the `)` matching the `(` at `open`.
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn squash_all(executor: &mut Executor<'_>, tokens: &mut Vec<Token>) -> Result<()> {
    squash_functions(executor, tokens, 0)?;
    squash_parentheses(executor, tokens)?;
    squash_tier(executor, tokens, true)?;
    squash_tier(executor, tokens, false)
}

/// Replace every `function(args)` span from `start` onwards with a
/// temporary holding the call's return value.
fn squash_functions(executor: &mut Executor<'_>, tokens: &mut Vec<Token>, start: usize) -> Result<()> {
    let mut i = start;
    while i < tokens.len() {
        let TokenKind::Function(name) = &tokens[i].kind else {
            i += 1;
            continue;
        };
        if !matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::OpenParen)) {
            i += 1;
            continue;
        }
        let name = name.clone();
        let line = tokens[i].line;
        let close = matching_paren(tokens, i + 1)
            .ok_or_else(|| executor.fail(format!("Unclosed parenthesis in call to '{}'.", name)))?;

        let mut args = tokens[i + 2..close].to_vec();
        squash_all(executor, &mut args)?;
        let args = to_operands(executor, &args)?;

        let index = executor
            .find_function(&name)
            .ok_or_else(|| executor.fail(format!("Unknown function '{}'.", name)))?;
        let function = executor.functions[index].clone();
        if args.len() < function.required_count() {
            return Err(executor.fail(format!("Missing parameters for function {}", function.name)));
        }
        let Some(return_value) = function.return_value.clone() else {
            return Err(executor.fail("Cannot use function in statement since it doesn't return a value."));
        };

        let call = function
            .call_commands(&mut executor.scoreboard, SELF_TARGET, &args)
            .or_fail(executor)?;
        emit_aligned(executor, call, "call");

        let temp = executor.scoreboard.request_temp(return_value.kind.clone());
        let copy = ops::assign(&mut executor.scoreboard, SELF_TARGET, &temp, None, &return_value)
            .or_fail(executor)?;
        emit_aligned(executor, copy, "call");

        tokens.splice(i..=close, [Token::new(TokenKind::Counter(temp.name), line)]);
        i = start;
    }
    Ok(())
}

/// Squash the innermost parenthesised groups that are not call argument lists.
fn squash_parentheses(executor: &mut Executor<'_>, tokens: &mut Vec<Token>) -> Result<()> {
    let mut i = 0;
    let mut open: Option<usize> = None;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::OpenParen => {
                let is_call = i > 0
                    && matches!(
                        tokens[i - 1].kind,
                        TokenKind::Function(_) | TokenKind::Identifier(_) | TokenKind::Macro(_)
                    );
                open = if is_call { None } else { Some(i) };
            }
            TokenKind::CloseParen => {
                if let Some(start) = open.take() {
                    let mut inner = tokens[start + 1..i].to_vec();
                    squash_tier(executor, &mut inner, true)?;
                    squash_tier(executor, &mut inner, false)?;
                    if inner.len() == 1 {
                        tokens.splice(start..=i, inner);
                        i = 0;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

/// Fold every `a <op> b` of one precedence tier into a single value.
fn squash_tier(executor: &mut Executor<'_>, tokens: &mut Vec<Token>, high: bool) -> Result<()> {
    let mut i = 1;
    while i + 1 < tokens.len() {
        let TokenKind::Arith(op) = tokens[i].kind else {
            i += 1;
            continue;
        };
        if op.is_high_tier() != high {
            i += 1;
            continue;
        }
        let (Some(left), Some(right)) = (tokens[i - 1].view::<Operand>(), tokens[i + 1].view::<Operand>()) else {
            i += 1;
            continue;
        };
        let line = tokens[i].line;
        let result = squash_pair(executor, left, op, right)?;
        tokens.splice(i - 1..=i + 1, [Token::new(result, line)]);
        i = 1;
    }
    Ok(())
}

fn squash_pair(executor: &mut Executor<'_>, left: Operand, op: ArithOp, right: Operand) -> Result<TokenKind> {
    match (left, right) {
        (Operand::Literal(a), Operand::Literal(b)) => {
            let folded = a.apply(op, &b).or_fail(executor)?;
            Ok(TokenKind::Literal(folded))
        }
        (Operand::Counter(a), Operand::Counter(b)) => {
            let a = executor.scoreboard.try_get(&a).or_fail(executor)?;
            let b = executor.scoreboard.try_get(&b).or_fail(executor)?;
            let temp = executor.scoreboard.request_temp(a.kind.clone());
            lower_into(executor, &temp, &a, op, &b)?;
            Ok(TokenKind::Counter(temp.name))
        }
        (Operand::Literal(a), Operand::Counter(b)) => {
            let b = executor.scoreboard.try_get(&b).or_fail(executor)?;
            let temp = executor.scoreboard.request_temp_for(&a).or_fail(executor)?;
            emit_aligned(executor, temp.set_literal(SELF_TARGET, &a), "squash");
            let commands = ops::assign(&mut executor.scoreboard, SELF_TARGET, &temp, Some(op), &b)
                .or_fail(executor)?;
            emit_aligned(executor, commands, "squash");
            Ok(TokenKind::Counter(temp.name))
        }
        (Operand::Counter(a), Operand::Literal(b)) => {
            let a = executor.scoreboard.try_get(&a).or_fail(executor)?;
            let b_temp = executor.scoreboard.request_temp_for(&b).or_fail(executor)?;
            emit_aligned(executor, b_temp.set_literal(SELF_TARGET, &b), "squash");
            let temp = executor.scoreboard.request_temp(a.kind.clone());
            lower_into(executor, &temp, &a, op, &b_temp)?;
            Ok(TokenKind::Counter(temp.name))
        }
    }
}

/// Emit lowering commands as the active entity. Under a selector other
/// than `@s` each command gets its own alignment, since temporaries belong
/// to whoever runs the statement.
fn emit_aligned(executor: &mut Executor<'_>, commands: Vec<String>, friendly: &str) {
    let active = executor.active_selector();
    let commands = if active.needs_align() {
        let align = active.as_prefix();
        commands.into_iter().map(|command| format!("{}{}", align, command)).collect()
    } else {
        commands
    };
    executor.add_commands_clean(commands, friendly);
}

/// `temp = a; temp <op>= b`
fn lower_into(
    executor: &mut Executor<'_>,
    temp: &crate::compiler::middle_end::scoreboard::ScoreboardValue,
    a: &crate::compiler::middle_end::scoreboard::ScoreboardValue,
    op: ArithOp,
    b: &crate::compiler::middle_end::scoreboard::ScoreboardValue,
) -> Result<()> {
    let set = ops::assign(&mut executor.scoreboard, SELF_TARGET, temp, None, a).or_fail(executor)?;
    emit_aligned(executor, set, "squash");
    let apply = ops::assign(&mut executor.scoreboard, SELF_TARGET, temp, Some(op), b).or_fail(executor)?;
    emit_aligned(executor, apply, "squash");
    Ok(())
}

fn to_operands(executor: &Executor<'_>, tokens: &[Token]) -> Result<Vec<Operand>> {
    tokens
        .iter()
        .map(|token| {
            token.view::<Operand>().ok_or_else(|| {
                executor.fail(format!("Invalid argument '{}'. Expected a value or literal.", token))
            })
        })
        .collect()
}

/// `counter <assign-op> operand`
pub fn run_operation(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let first = cursor.next()?;
    let Some(CounterRef(name)) = first.view::<CounterRef>() else {
        return Err(cursor.error(format!("Unknown value '{}'.", first)));
    };
    let op = match cursor.next()?.kind {
        TokenKind::Assign(op) => op,
        _ => return Err(cursor.error("Expected an assignment operator.")),
    };
    let operand = cursor.next_as::<Operand>()?;
    if cursor.has_next() {
        let extra: Vec<String> = cursor.remaining().iter().map(Token::to_string).collect();
        return Err(cursor.error(format!("Unexpected tokens after operation: {}", extra.join(" "))));
    }

    let target = executor.scoreboard.try_get(&name).or_fail(executor)?;
    let commands = match (&operand, op) {
        (_, None) => assign_operand(&mut executor.scoreboard, SELF_TARGET, &target, &operand),
        (Operand::Literal(literal), Some(op)) => {
            ops::assign_literal(&mut executor.scoreboard, SELF_TARGET, &target, Some(op), literal)
        }
        (Operand::Counter(other), Some(op)) => {
            let source = executor.scoreboard.try_get(other).or_fail(executor)?;
            ops::assign(&mut executor.scoreboard, SELF_TARGET, &target, Some(op), &source)
        }
    }
    .or_fail(executor)?;
    executor.push_selector_execute();
    executor.add_commands(commands, "operation", false);
    executor.pop_selector();
    Ok(())
}

/// `function(args)` used as a statement; the return value, if any, is ignored.
pub fn run_call(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let first = cursor.next()?;
    let name = match &first.kind {
        TokenKind::Function(name) => name.clone(),
        _ => {
            let Ident(name) = first.view::<Ident>().unwrap_or(Ident(first.to_string()));
            return Err(cursor.error(format!("Unknown function '{}'.", name)));
        }
    };
    if !cursor.next_kind_is(&TokenKind::OpenParen) {
        return Err(cursor.error(format!("Expected '(' after function name '{}'.", name)));
    }
    let close = matching_paren(cursor.tokens(), 1)
        .ok_or_else(|| cursor.error(format!("Unclosed parenthesis in call to '{}'.", name)))?;
    let args = cursor.tokens()[2..close].to_vec();
    let args = to_operands(executor, &args)?;

    let index = executor
        .find_function(&name)
        .ok_or_else(|| cursor.error(format!("Unknown function '{}'.", name)))?;
    let function = executor.functions[index].clone();
    if args.len() < function.required_count() {
        return Err(cursor.error(format!("Missing parameters for function {}", function.name)));
    }
    let commands = function
        .call_commands(&mut executor.scoreboard, SELF_TARGET, &args)
        .or_fail(executor)?;
    executor.push_selector_execute();
    executor.add_commands(commands, "call", false);
    executor.pop_selector();
    Ok(())
}

/// Kind named by a type keyword, e.g. `int`, `decimal 2`, `bool`, `time`,
/// or a struct name. Returns `None` when the next token is not a type.
pub fn parse_kind(executor: &Executor<'_>, cursor: &mut Cursor) -> Result<Option<CounterKind>> {
    let Some(token) = cursor.peek() else {
        return Ok(None);
    };
    let kind = match &token.kind {
        TokenKind::Struct(name) => {
            let definition = executor
                .scoreboard
                .get_struct(name)
                .ok_or_else(|| cursor.error(format!("Unknown struct '{}'.", name)))?;
            CounterKind::Struct(definition)
        }
        TokenKind::Identifier(word) => match word.to_lowercase().as_str() {
            "int" => CounterKind::Int,
            "time" => CounterKind::Time,
            "bool" => CounterKind::Bool,
            "decimal" => {
                cursor.next()?;
                let precision = cursor.next_as::<i32>()?;
                if precision < 0 || precision as usize > crate::core::constants::MAX_DECIMAL_PRECISION {
                    return Err(cursor.error(format!(
                        "Decimal precision must be between 0 and {}.",
                        crate::core::constants::MAX_DECIMAL_PRECISION
                    )));
                }
                return Ok(Some(CounterKind::Decimal { precision: precision as usize }));
            }
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    cursor.next()?;
    Ok(Some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(kinds: Vec<TokenKind>) -> Vec<Token> {
        kinds.into_iter().map(|k| Token::new(k, 1)).collect()
    }

    #[test]
    fn test_cursor_views() {
        let mut cursor = Cursor::new(
            tokens(vec![TokenKind::Literal(Value::Int(3)), TokenKind::Identifier("x".into())]),
            1,
            "test",
        );
        assert!(cursor.next_is::<i32>());
        assert_eq!(cursor.next_as::<i32>().unwrap(), 3);
        let err = cursor.next_as::<i32>().unwrap_err();
        assert_eq!(err.message(), "Invalid token type. Expected integer but got identifier");
        assert!(!cursor.has_next());
        assert_eq!(cursor.next().unwrap_err().message(), "Unexpected end of statement.");
    }

    #[test]
    fn test_next_word_is_case_insensitive() {
        let mut cursor = Cursor::new(tokens(vec![TokenKind::Identifier("Times".into())]), 1, "");
        assert!(!cursor.next_word("subtitle"));
        assert!(cursor.next_word("times"));
    }

    #[test]
    fn test_matching_paren() {
        let list = tokens(vec![
            TokenKind::OpenParen,
            TokenKind::OpenParen,
            TokenKind::CloseParen,
            TokenKind::CloseParen,
        ]);
        assert_eq!(matching_paren(&list, 0), Some(3));
        assert_eq!(matching_paren(&list, 1), Some(2));
    }
}
