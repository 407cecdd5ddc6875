//! Counter arithmetic across every pair of kinds.
//!
//! Integer-like kinds map straight onto `scoreboard players operation`.
//! Fixed-point values are combined into one temporary holding
//! `whole * 10^p + part`, operated on, then split back into their two
//! objectives.

use super::{CounterKind, ScoreboardManager, ScoreboardValue};
use crate::core::command;
use crate::core::util::decimal_factor;
use crate::core::value::{ArithOp, Value};
use crate::error::ScoreboardError;

/// `a <op>= b`, or `a = b` when `op` is `None`.
pub fn assign(
    manager: &mut ScoreboardManager,
    target: &str,
    a: &ScoreboardValue,
    op: Option<ArithOp>,
    b: &ScoreboardValue,
) -> Result<Vec<String>, ScoreboardError> {
    let mut commands = Vec::new();
    match (&a.kind, &b.kind) {
        (CounterKind::Struct(left), CounterKind::Struct(right)) => {
            if left != right {
                return Err(incompatible(a, b));
            }
            for (fa, fb) in a.fields().iter().zip(b.fields().iter()) {
                commands.extend(assign(manager, target, fa, op, fb)?);
            }
        }
        (CounterKind::Struct(_), _) | (_, CounterKind::Struct(_)) => return Err(incompatible(a, b)),
        (left, right) if left.is_integer_like() && right.is_integer_like() => {
            commands.push(native(target, &a.name, op, &b.name));
        }
        // fractional part is dropped
        (left, CounterKind::Decimal { .. }) if left.is_integer_like() => {
            commands.push(native(target, &a.name, op, &b.whole()));
        }
        (CounterKind::Decimal { precision }, _) => {
            let precision = *precision;
            decimal_assign(manager, target, a, precision, op, b, &mut commands);
        }
        _ => return Err(incompatible(a, b)),
    }
    Ok(commands)
}

/// `a <op>= literal`, or `a = literal` when `op` is `None`.
pub fn assign_literal(
    manager: &mut ScoreboardManager,
    target: &str,
    a: &ScoreboardValue,
    op: Option<ArithOp>,
    literal: &Value,
) -> Result<Vec<String>, ScoreboardError> {
    let Some(op) = op else {
        return Ok(a.set_literal(target, literal));
    };
    if matches!(a.kind, CounterKind::Struct(_)) || CounterKind::for_literal(literal).is_none() {
        return Err(ScoreboardError::IncompatibleLiteral(literal.kind_name(), a.kind.to_string()));
    }

    match op {
        ArithOp::Add | ArithOp::Sub if a.kind.is_integer_like() => {
            let amount = match literal {
                Value::Int(n) => *n,
                Value::Float(f) => f.round() as i32,
                _ => i32::from(matches!(literal, Value::Bool(true))),
            };
            let amount = if op == ArithOp::Sub { -amount } else { amount };
            Ok(vec![if amount < 0 {
                command::score_remove(target, &a.name, -amount)
            } else {
                command::score_add(target, &a.name, amount)
            }])
        }
        _ => {
            // held at the target's own kind so decimals keep their precision
            let temp = manager.request_temp(a.kind.clone());
            let mut commands = temp.set_literal(target, literal);
            commands.extend(assign(manager, target, a, Some(op), &temp)?);
            Ok(commands)
        }
    }
}

fn incompatible(a: &ScoreboardValue, b: &ScoreboardValue) -> ScoreboardError {
    ScoreboardError::Incompatible(a.kind.to_string(), b.kind.to_string())
}

fn native(target: &str, a: &str, op: Option<ArithOp>, b: &str) -> String {
    match op {
        None => command::score_copy(target, a, target, b),
        Some(op) => command::score_arith(target, a, op, target, b),
    }
}

fn decimal_assign(
    manager: &mut ScoreboardManager,
    target: &str,
    a: &ScoreboardValue,
    precision: usize,
    op: Option<ArithOp>,
    b: &ScoreboardValue,
    commands: &mut Vec<String>,
) {
    let b_is_decimal = matches!(b.kind, CounterKind::Decimal { .. });

    // integer right-hand sides that only touch the whole part
    if !b_is_decimal {
        match op {
            None => {
                commands.push(command::score_copy(target, &a.whole(), target, &b.name));
                commands.push(command::score_set(target, &a.part(), 0));
                return;
            }
            Some(op @ (ArithOp::Add | ArithOp::Sub)) => {
                commands.push(command::score_arith(target, &a.whole(), op, target, &b.name));
                return;
            }
            _ => {}
        }
    }

    let unit = constant(manager, target, decimal_factor(precision), commands);
    let fixed_a = to_fixed(manager, target, a, precision, &unit, commands);

    match op {
        None => {
            let fixed_b = to_fixed(manager, target, b, precision, &unit, commands);
            commands.push(command::score_copy(target, &fixed_a, target, &fixed_b));
        }
        Some(ArithOp::Mul) if !b_is_decimal => {
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Mul, target, &b.name));
        }
        Some(ArithOp::Div) if !b_is_decimal => {
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Div, target, &b.name));
        }
        Some(ArithOp::Mul) => {
            let fixed_b = to_fixed(manager, target, b, precision, &unit, commands);
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Mul, target, &fixed_b));
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Div, target, &unit));
        }
        Some(ArithOp::Div) => {
            let fixed_b = to_fixed(manager, target, b, precision, &unit, commands);
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Mul, target, &unit));
            commands.push(command::score_arith(target, &fixed_a, ArithOp::Div, target, &fixed_b));
        }
        Some(op) => {
            let fixed_b = to_fixed(manager, target, b, precision, &unit, commands);
            commands.push(command::score_arith(target, &fixed_a, op, target, &fixed_b));
        }
    }

    commands.push(command::score_copy(target, &a.whole(), target, &fixed_a));
    commands.push(command::score_arith(target, &a.whole(), ArithOp::Div, target, &unit));
    commands.push(command::score_copy(target, &a.part(), target, &fixed_a));
    commands.push(command::score_arith(target, &a.part(), ArithOp::Mod, target, &unit));
}

/// A fresh integer temporary holding `value` scaled to `precision`
/// fractional digits, plus the commands that fill it.
pub fn fixed_point(
    manager: &mut ScoreboardManager,
    target: &str,
    value: &ScoreboardValue,
    precision: usize,
) -> (String, Vec<String>) {
    let mut commands = Vec::new();
    let unit = constant(manager, target, decimal_factor(precision), &mut commands);
    let fixed = to_fixed(manager, target, value, precision, &unit, &mut commands);
    (fixed, commands)
}

/// A fresh integer temporary holding `n`.
fn constant(manager: &mut ScoreboardManager, target: &str, n: i32, commands: &mut Vec<String>) -> String {
    let temp = manager.request_temp(CounterKind::Int);
    commands.push(command::score_set(target, &temp.name, n));
    temp.name
}

/// Load `value` into a fresh temporary as a fixed-point number at `precision`.
fn to_fixed(
    manager: &mut ScoreboardManager,
    target: &str,
    value: &ScoreboardValue,
    precision: usize,
    unit: &str,
    commands: &mut Vec<String>,
) -> String {
    let fixed = manager.request_temp(CounterKind::Int).name;
    match value.kind {
        CounterKind::Decimal { precision: own } => {
            commands.push(command::score_copy(target, &fixed, target, &value.whole()));
            commands.push(command::score_arith(target, &fixed, ArithOp::Mul, target, unit));
            let part = manager.request_temp(CounterKind::Int).name;
            commands.push(command::score_copy(target, &part, target, &value.part()));
            if own != precision {
                let (op, scale) = if own < precision {
                    (ArithOp::Mul, decimal_factor(precision - own))
                } else {
                    (ArithOp::Div, decimal_factor(own - precision))
                };
                let scale = constant(manager, target, scale, commands);
                commands.push(command::score_arith(target, &part, op, target, &scale));
            }
            commands.push(command::score_arith(target, &fixed, ArithOp::Add, target, &part));
        }
        _ => {
            commands.push(command::score_copy(target, &fixed, target, &value.name));
            commands.push(command::score_arith(target, &fixed, ArithOp::Mul, target, unit));
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str) -> ScoreboardValue {
        ScoreboardValue::new(name, CounterKind::Int)
    }

    #[test]
    fn test_integer_pairs_are_native() {
        let mut manager = ScoreboardManager::new();
        let commands = assign(&mut manager, "@s", &int("a"), Some(ArithOp::Mul), &int("b")).unwrap();
        assert_eq!(commands, vec!["scoreboard players operation @s a *= @s b"]);
        let commands = assign(&mut manager, "@s", &int("a"), None, &int("b")).unwrap();
        assert_eq!(commands, vec!["scoreboard players operation @s a = @s b"]);
    }

    #[test]
    fn test_literal_add_uses_add_and_remove() {
        let mut manager = ScoreboardManager::new();
        let a = int("a");
        assert_eq!(
            assign_literal(&mut manager, "@s", &a, Some(ArithOp::Add), &Value::Int(5)).unwrap(),
            vec!["scoreboard players add @s a 5"]
        );
        assert_eq!(
            assign_literal(&mut manager, "@s", &a, Some(ArithOp::Sub), &Value::Int(5)).unwrap(),
            vec!["scoreboard players remove @s a 5"]
        );
        assert_eq!(
            assign_literal(&mut manager, "@s", &a, Some(ArithOp::Add), &Value::Int(-2)).unwrap(),
            vec!["scoreboard players remove @s a 2"]
        );
    }

    #[test]
    fn test_literal_multiply_goes_through_temp() {
        let mut manager = ScoreboardManager::new();
        let commands =
            assign_literal(&mut manager, "@s", &int("a"), Some(ArithOp::Mul), &Value::Int(3)).unwrap();
        assert_eq!(
            commands,
            vec![
                "scoreboard players set @s _mcc_tmp0 3",
                "scoreboard players operation @s a *= @s _mcc_tmp0",
            ]
        );
    }

    #[test]
    fn test_decimal_add_splits_back() {
        let mut manager = ScoreboardManager::new();
        let a = ScoreboardValue::new("a", CounterKind::Decimal { precision: 2 });
        let b = ScoreboardValue::new("b", CounterKind::Decimal { precision: 1 });
        let commands = assign(&mut manager, "@s", &a, Some(ArithOp::Add), &b).unwrap();
        let last = &commands[commands.len() - 4..];
        assert_eq!(last[0], "scoreboard players operation @s a:w = @s _mcc_tmp1");
        assert_eq!(last[3], "scoreboard players operation @s a:d %= @s _mcc_tmp0");
        // b's single digit is scaled up to two
        assert!(commands.contains(&"scoreboard players set @s _mcc_tmp5 10".to_string()));
    }

    #[test]
    fn test_struct_operations() {
        use super::super::StructDefinition;
        use std::rc::Rc;

        let mut def = StructDefinition::new("v");
        def.add_field("x", CounterKind::Int);
        def.add_field("y", CounterKind::Int);
        let def = Rc::new(def);
        let a = ScoreboardValue::new("p", CounterKind::Struct(def.clone()));
        let b = ScoreboardValue::new("q", CounterKind::Struct(def));
        let mut manager = ScoreboardManager::new();
        let commands = assign(&mut manager, "@s", &a, None, &b).unwrap();
        assert_eq!(
            commands,
            vec![
                "scoreboard players operation @s p:a = @s q:a",
                "scoreboard players operation @s p:b = @s q:b",
            ]
        );
        assert!(assign(&mut manager, "@s", &a, None, &int("n")).is_err());
        assert!(assign_literal(&mut manager, "@s", &a, None, &Value::Int(1)).unwrap().is_empty());
        assert!(assign_literal(&mut manager, "@s", &a, Some(ArithOp::Add), &Value::Int(1)).is_err());
    }
}
