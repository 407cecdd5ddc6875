//! Conditions and their lowering onto selector filters.
//!
//! A chain is `[not] <comparison> [and [not] <comparison>]...`. Each
//! comparison lowers to optional setup commands and one `execute` fragment
//! that narrows `@s`; the fragments of a chain concatenate into the prefix
//! that guards the conditional body.

use crate::compiler::middle_end::executor::{BlockAction, BlockHooks, Executor, OrFail};
use crate::compiler::middle_end::scoreboard::{ops, CounterKind, ScoreboardValue};
use crate::compiler::middle_end::statement::{Cursor, SELF_TARGET};
use crate::core::command;
use crate::core::constants::COUNTING_TAG;
use crate::core::token::{Ident, Operand};
use crate::core::util::decimal_factor;
use crate::core::value::CompareOp;
use crate::core::{BlockCheck, Coord, Range, Selector, TokenKind, Value};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonKind {
    /// `if flag`
    Boolean(ScoreboardValue),
    /// `if score >= 10`, `if a < b`
    Value { value: ScoreboardValue, op: CompareOp, other: Operand },
    /// `if @s[tag=x]`: the executing entity matches the selector's clauses.
    Selector(Selector),
    /// `if count @e[type=cow] > 3`
    Count { selector: Selector, op: CompareOp, other: Operand },
    /// `if any @a[tag=ready]`
    Any(Selector),
    /// `if block ~ ~-1 ~ stone`
    Block(BlockCheck),
    /// `if positioned 0 64 0 and ...`: moves every later check.
    Positioned(Coord, Coord, Coord),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub kind: ComparisonKind,
    pub inverted: bool,
}

/// Output of lowering one comparison.
struct Lowered {
    setup: Vec<String>,
    fragment: String,
}

/// Output of lowering a whole chain.
pub struct LoweredChain {
    pub setup: Vec<String>,
    /// Prefix the setup commands run under.
    pub setup_prefix: String,
    /// Prefix that runs a command only where the whole chain holds.
    pub primary: String,
}

impl Comparison {
    pub fn new(kind: ComparisonKind, inverted: bool) -> Self {
        Self { kind, inverted }
    }

    fn modifies_setup(&self) -> bool {
        matches!(self.kind, ComparisonKind::Positioned(..))
    }

    fn lower(&self, executor: &mut Executor<'_>) -> Result<Lowered> {
        match &self.kind {
            ComparisonKind::Boolean(value) => {
                let range = if self.inverted { Range::exact(0) } else { Range::exact(1) };
                Ok(Lowered { setup: Vec::new(), fragment: score_fragment(&value.name, range) })
            }
            ComparisonKind::Value { value, op, other } => {
                let op = if self.inverted { op.inverted() } else { *op };
                lower_value(executor, value, op, other)
            }
            ComparisonKind::Selector(selector) => {
                let mut filter = selector.clone();
                filter.core = crate::core::Core::S;
                if self.inverted {
                    side_channel(executor, &filter.as_prefix())
                } else {
                    Ok(Lowered { setup: Vec::new(), fragment: filter.as_prefix() })
                }
            }
            ComparisonKind::Count { selector, op, other } => {
                let op = if self.inverted { op.inverted() } else { *op };
                lower_count(executor, selector, op, other)
            }
            ComparisonKind::Any(selector) => {
                let op = if self.inverted { CompareOp::Lt } else { CompareOp::Ge };
                lower_count(executor, selector, op, &Operand::Literal(Value::Int(1)))
            }
            ComparisonKind::Block(check) => {
                let mut filter = Selector::self_selector();
                filter.block_check = Some(check.clone());
                if self.inverted {
                    side_channel(executor, &filter.as_prefix())
                } else {
                    Ok(Lowered { setup: Vec::new(), fragment: filter.as_prefix() })
                }
            }
            ComparisonKind::Positioned(x, y, z) => {
                if self.inverted {
                    return Err(executor.fail("Cannot invert a 'positioned' comparison."));
                }
                Ok(Lowered {
                    setup: Vec::new(),
                    fragment: format!("execute @s {} {} {} ", x, y, z),
                })
            }
        }
    }
}

fn score_fragment(objective: &str, range: Range) -> String {
    Selector::self_selector().with_score(objective, range).as_prefix()
}

/// Score range equivalent to `score <op> n`.
fn range_for(op: CompareOp, n: i32) -> Range {
    match op {
        CompareOp::Eq => Range::exact(n),
        CompareOp::Ne => Range::exact(n).inverted(),
        CompareOp::Lt => Range::at_most(n.saturating_sub(1)),
        CompareOp::Le => Range::at_most(n),
        CompareOp::Gt => Range::at_least(n.saturating_add(1)),
        CompareOp::Ge => Range::at_least(n),
    }
}

/// Inverts a test with no native negation: mark the entities `filter` keeps,
/// then select the unmarked ones.
fn side_channel(executor: &mut Executor<'_>, filter: &str) -> Result<Lowered> {
    let temp = executor.scoreboard.request_temp(CounterKind::Bool);
    executor.scoreboard.keep_temps();
    Ok(Lowered {
        setup: vec![
            command::score_set(SELF_TARGET, &temp.name, 0),
            format!("{}{}", filter, command::score_set(SELF_TARGET, &temp.name, 1)),
        ],
        fragment: score_fragment(&temp.name, Range::exact(0)),
    })
}

fn literal_number(executor: &Executor<'_>, literal: &Value) -> Result<f32> {
    match literal {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => other
            .as_number()
            .ok_or_else(|| executor.fail(format!("Cannot compare a value with a {}.", other.kind_name()))),
    }
}

fn precision_of(kind: &CounterKind) -> usize {
    match kind {
        CounterKind::Decimal { precision } => *precision,
        _ => 0,
    }
}

fn lower_value(
    executor: &mut Executor<'_>,
    value: &ScoreboardValue,
    op: CompareOp,
    other: &Operand,
) -> Result<Lowered> {
    if matches!(value.kind, CounterKind::Struct(_)) {
        return Err(executor.fail(format!("Cannot compare struct value '{}'.", value.name)));
    }
    let mut setup = Vec::new();
    let (objective, n) = match other {
        Operand::Literal(literal) => {
            let number = literal_number(executor, literal)?;
            let literal_precision = if matches!(literal, Value::Float(_)) { literal.precision() } else { 0 };
            if value.kind.is_integer_like() && literal_precision == 0 {
                (value.name.clone(), number.round() as i32)
            } else {
                let precision = precision_of(&value.kind).max(literal_precision);
                let (fixed, commands) = ops::fixed_point(&mut executor.scoreboard, SELF_TARGET, value, precision);
                setup.extend(commands);
                (fixed, (number * decimal_factor(precision) as f32).round() as i32)
            }
        }
        Operand::Counter(name) => {
            let other = executor.scoreboard.try_get(name).or_fail(executor)?;
            if matches!(other.kind, CounterKind::Struct(_)) {
                return Err(executor.fail(format!("Cannot compare struct value '{}'.", other.name)));
            }
            if value.kind.is_integer_like() && other.kind.is_integer_like() {
                let temp = executor.scoreboard.request_temp(CounterKind::Int);
                setup.push(command::score_copy(SELF_TARGET, &temp.name, SELF_TARGET, &value.name));
                setup.push(command::score_operation(SELF_TARGET, &temp.name, "-=", SELF_TARGET, &other.name));
                (temp.name, 0)
            } else {
                let precision = precision_of(&value.kind).max(precision_of(&other.kind));
                let (a, commands) = ops::fixed_point(&mut executor.scoreboard, SELF_TARGET, value, precision);
                setup.extend(commands);
                let (b, commands) = ops::fixed_point(&mut executor.scoreboard, SELF_TARGET, &other, precision);
                setup.extend(commands);
                setup.push(command::score_operation(SELF_TARGET, &a, "-=", SELF_TARGET, &b));
                (a, 0)
            }
        }
    };
    if !setup.is_empty() {
        executor.scoreboard.keep_temps();
    }
    Ok(Lowered { setup, fragment: score_fragment(&objective, range_for(op, n)) })
}

/// Count the entities `selector` matches into a temporary on `@s`, then
/// compare that count.
fn lower_count(executor: &mut Executor<'_>, selector: &Selector, op: CompareOp, other: &Operand) -> Result<Lowered> {
    let temp = executor.scoreboard.request_temp(CounterKind::Int);
    executor.scoreboard.keep_temps();
    let counter = format!("@e[tag={}]", COUNTING_TAG);

    let mut setup = vec![
        command::score_set(SELF_TARGET, &temp.name, 0),
        command::tag_add(SELF_TARGET, COUNTING_TAG),
        format!("{}{}", selector.as_prefix(), command::score_add(&counter, &temp.name, 1)),
        command::tag_remove(SELF_TARGET, COUNTING_TAG),
    ];

    let n = match other {
        Operand::Literal(literal) => literal_number(executor, literal)?.round() as i32,
        Operand::Counter(name) => {
            let other = executor.scoreboard.try_get(name).or_fail(executor)?;
            if !other.kind.is_integer_like() {
                return Err(executor.fail(format!("Cannot compare an entity count with {} value '{}'.", other.kind, other.name)));
            }
            setup.push(command::score_operation(SELF_TARGET, &temp.name, "-=", SELF_TARGET, &other.name));
            0
        }
    };
    Ok(Lowered { setup, fragment: score_fragment(&temp.name, range_for(op, n)) })
}

/// Read a chain of comparisons from the rest of `cursor`.
pub fn parse_chain(executor: &Executor<'_>, cursor: &mut Cursor) -> Result<Vec<Comparison>> {
    let mut chain = Vec::new();
    let mut invert = false;

    while cursor.has_next() {
        if cursor.next_kind_is(&TokenKind::Not) {
            cursor.next()?;
            invert = !invert;
            continue;
        }

        let kind = parse_one(executor, cursor)?;
        chain.push(Comparison::new(kind, invert));
        invert = false;

        if !cursor.has_next() {
            break;
        }
        let joiner = cursor.next()?;
        if joiner.kind != TokenKind::And {
            return Err(cursor.error(format!("Unexpected token '{}' in condition. Expected 'and'.", joiner)));
        }
    }
    if invert {
        return Err(cursor.error("Expected a condition after 'not'."));
    }
    Ok(chain)
}

fn parse_one(executor: &Executor<'_>, cursor: &mut Cursor) -> Result<ComparisonKind> {
    let token = cursor.next()?;
    match &token.kind {
        TokenKind::Counter(name) => {
            let value = executor.scoreboard.try_get(name).or_fail(executor)?;
            if value.kind == CounterKind::Bool && !cursor.next_is::<CompareOp>() {
                return Ok(ComparisonKind::Boolean(value));
            }
            let op = cursor.next_as::<CompareOp>()?;
            let other = cursor.next_as::<Operand>()?;
            Ok(ComparisonKind::Value { value, op, other })
        }
        TokenKind::Literal(Value::Selector(selector)) => Ok(ComparisonKind::Selector(selector.clone())),
        TokenKind::Identifier(word) => match word.to_lowercase().as_str() {
            "count" => {
                let selector = cursor.next_as::<Selector>()?;
                let op = cursor.next_as::<CompareOp>()?;
                let other = cursor.next_as::<Operand>()?;
                Ok(ComparisonKind::Count { selector, op, other })
            }
            "any" => Ok(ComparisonKind::Any(cursor.next_as::<Selector>()?)),
            "block" => {
                let x = cursor.next_as::<Coord>()?;
                let y = cursor.next_as::<Coord>()?;
                let z = cursor.next_as::<Coord>()?;
                let block = next_name(cursor)?;
                let data = cursor.try_next::<i32>();
                Ok(ComparisonKind::Block(BlockCheck::new(x, y, z, block, data)))
            }
            "positioned" => {
                let x = cursor.next_as::<Coord>()?;
                let y = cursor.next_as::<Coord>()?;
                let z = cursor.next_as::<Coord>()?;
                Ok(ComparisonKind::Positioned(x, y, z))
            }
            _ => Err(cursor.error(format!("Unknown condition '{}'.", word))),
        },
        _ => Err(cursor.error(format!("Invalid condition starting at '{}'.", token))),
    }
}

/// A block or item id given either as a string or a bare word.
pub fn next_name(cursor: &mut Cursor) -> Result<String> {
    if let Some(text) = cursor.try_next::<String>() {
        return Ok(text);
    }
    cursor.next_as::<Ident>().map(|Ident(name)| name)
}

/// Lower every comparison in order. An active selector that cannot act as
/// `@s` is aligned first, for both the setup commands and the filter.
pub fn lower_chain(executor: &mut Executor<'_>, chain: &[Comparison]) -> Result<LoweredChain> {
    let active = executor.active_selector().clone();
    let align = if active.needs_align() { active.as_prefix() } else { String::new() };

    let mut lowered = LoweredChain {
        setup: Vec::new(),
        setup_prefix: align.clone(),
        primary: align,
    };
    for comparison in chain {
        let part = comparison.lower(executor)?;
        lowered.setup.extend(part.setup);
        if comparison.modifies_setup() {
            lowered.setup_prefix.push_str(&part.fragment);
        }
        lowered.primary.push_str(&part.fragment);
    }
    Ok(lowered)
}

fn emit_setup(executor: &mut Executor<'_>, lowered: &LoweredChain) {
    if lowered.setup.is_empty() {
        return;
    }
    if lowered.setup_prefix.is_empty() {
        executor.add_commands_clean(lowered.setup.clone(), "compareSetup");
    } else {
        let outer = executor.prefix().to_string();
        executor.set_prefix(format!("{}{}", outer, lowered.setup_prefix));
        executor.add_commands(lowered.setup.clone(), "compareSetup", false);
        executor.set_prefix(outer);
    }
}

/// Compile `chain` as the condition guarding the next statement or block.
pub fn run_chain(executor: &mut Executor<'_>, chain: &[Comparison]) -> Result<()> {
    if chain.is_empty() {
        return Err(executor.fail("No valid conditions specified."));
    }
    if skip_empty_body(executor) {
        return Ok(());
    }
    let lowered = lower_chain(executor, chain)?;
    apply(executor, lowered)
}

/// A body of zero statements compiles to nothing, its condition included.
fn skip_empty_body(executor: &mut Executor<'_>) -> bool {
    if executor.peek_next().and_then(|s| s.statements_inside()) != Some(0) {
        return false;
    }
    executor.push_selector(true);
    executor.set_block_hooks(BlockHooks {
        close: vec![BlockAction::PopSelector],
        ..BlockHooks::skip()
    });
    true
}

/// `else` over a chain of several comparisons. The negation of `a and b` is
/// not `not a and not b`, so the chain result is captured into a flag that
/// is then tested inverted.
pub fn run_inverted_chain(executor: &mut Executor<'_>, chain: &[Comparison]) -> Result<()> {
    match chain {
        [] => Err(executor.fail("No valid conditions specified.")),
        [single] => {
            let mut single = single.clone();
            single.inverted = !single.inverted;
            run_chain(executor, &[single])
        }
        _ => {
            if skip_empty_body(executor) {
                return Ok(());
            }
            let active = executor.active_selector().clone();
            let align = if active.needs_align() { active.as_prefix() } else { String::new() };
            let flag = executor.scoreboard.request_temp(CounterKind::Bool);
            executor.scoreboard.keep_temps();

            executor.add_command_clean(format!("{}{}", align, command::score_set(SELF_TARGET, &flag.name, 1)));
            let lowered = lower_chain(executor, chain)?;
            emit_setup(executor, &lowered);
            executor.add_command_clean(format!(
                "{}{}",
                lowered.primary,
                command::score_set(SELF_TARGET, &flag.name, 0)
            ));
            run_chain(executor, &[Comparison::new(ComparisonKind::Boolean(flag), false)])
        }
    }
}

fn apply(executor: &mut Executor<'_>, lowered: LoweredChain) -> Result<()> {
    if !executor.has_next() {
        return Err(executor.fail("Unexpected end of file when running comparison."));
    }
    emit_setup(executor, &lowered);

    // the body runs as the aligned entity
    executor.push_selector(true);

    match executor.peek_next().and_then(|s| s.statements_inside()) {
        Some(1) => {
            executor.append_prefix(&lowered.primary);
            executor.skip_open_block();
            executor.pop_selector_after_next();
        }
        Some(_) => {
            let file = executor.next_generated_file("branch");
            executor.add_command(format!("{}{}", lowered.primary, file.call()));
            executor.set_block_hooks(BlockHooks {
                open: vec![BlockAction::PushFile(file)],
                close: vec![BlockAction::PopFile, BlockAction::PopSelector],
                skip: false,
            });
        }
        None => {
            executor.append_prefix(&lowered.primary);
            executor.pop_selector_after_next();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert_eq!(range_for(CompareOp::Gt, 3), Range::at_least(4));
        assert_eq!(range_for(CompareOp::Lt, 3), Range::at_most(2));
        assert_eq!(range_for(CompareOp::Ne, 3).to_string(), "!3");
        for op in [CompareOp::Eq, CompareOp::Lt, CompareOp::Ge] {
            for n in -2..5 {
                assert_ne!(range_for(op, 1).contains(n), range_for(op.inverted(), 1).contains(n));
            }
        }
    }

    #[test]
    fn test_score_fragment() {
        assert_eq!(score_fragment("ready", Range::exact(1)), "execute @s[scores={ready=1}] ~ ~ ~ ");
    }
}
