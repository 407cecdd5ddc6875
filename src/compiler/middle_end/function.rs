//! User-defined functions.

use crate::compiler::middle_end::scoreboard::ops;
use crate::compiler::middle_end::scoreboard::{CounterKind, ScoreboardManager, ScoreboardValue};
use crate::core::command;
use crate::core::constants::RETURN_PREFIX;
use crate::core::token::Operand;
use crate::core::Selector;
use crate::error::ScoreboardError;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub value: ScoreboardValue,
    pub default: Option<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Selector the body runs under.
    pub selector: Selector,
    pub params: Vec<Parameter>,
    /// Path of the backing command file.
    pub file: String,
    /// Allocated by the first `return`.
    pub return_value: Option<ScoreboardValue>,
}

impl Function {
    pub fn new(name: impl Into<String>, selector: Selector, params: Vec<Parameter>) -> Self {
        let name = name.into();
        Self { file: name.clone(), name, selector, params, return_value: None }
    }

    /// Once one parameter has a default, every later one must too.
    pub fn defaults_are_trailing(params: &[Parameter]) -> bool {
        params
            .iter()
            .skip_while(|p| p.default.is_none())
            .all(|p| p.default.is_some())
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Parameter assignments followed by the call itself. Missing trailing
    /// arguments take their defaults.
    pub fn call_commands(
        &self,
        manager: &mut ScoreboardManager,
        target: &str,
        args: &[Operand],
    ) -> Result<Vec<String>, ScoreboardError> {
        let mut commands = Vec::new();
        for (i, param) in self.params.iter().enumerate() {
            let Some(arg) = args.get(i).or(param.default.as_ref()) else {
                continue;
            };
            commands.extend(assign_operand(manager, target, &param.value, arg)?);
        }
        commands.push(command::function(&self.file));
        Ok(commands)
    }

    /// The return slot for a value of `kind`, allocating it on first use.
    /// Returns `None` when a different kind was returned before.
    pub fn return_slot(&mut self, index: usize, kind: &CounterKind) -> Option<(ScoreboardValue, bool)> {
        match &self.return_value {
            Some(existing) if existing.kind == *kind => Some((existing.clone(), false)),
            Some(_) => None,
            None => {
                let value = ScoreboardValue::new(format!("{}{}", RETURN_PREFIX, index), kind.clone());
                self.return_value = Some(value.clone());
                Some((value, true))
            }
        }
    }
}

/// `value = operand`, for either a literal or another counter.
pub fn assign_operand(
    manager: &mut ScoreboardManager,
    target: &str,
    value: &ScoreboardValue,
    operand: &Operand,
) -> Result<Vec<String>, ScoreboardError> {
    match operand {
        Operand::Literal(literal) => ops::assign_literal(manager, target, value, None, literal),
        Operand::Counter(name) => {
            let source = manager.try_get(name)?;
            ops::assign(manager, target, value, None, &source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn param(name: &str, default: Option<i32>) -> Parameter {
        Parameter {
            value: ScoreboardValue::new(name, CounterKind::Int),
            default: default.map(|d| Operand::Literal(Value::Int(d))),
        }
    }

    #[test]
    fn test_trailing_defaults() {
        assert!(Function::defaults_are_trailing(&[param("a", None), param("b", Some(1))]));
        assert!(!Function::defaults_are_trailing(&[param("a", Some(1)), param("b", None)]));
        assert!(Function::defaults_are_trailing(&[]));
    }

    #[test]
    fn test_call_uses_defaults() {
        let function = Function::new(
            "add",
            Selector::self_selector(),
            vec![param("a", None), param("b", Some(2))],
        );
        assert_eq!(function.required_count(), 1);

        let mut manager = ScoreboardManager::new();
        let commands = function
            .call_commands(&mut manager, "@s", &[Operand::Literal(Value::Int(5))])
            .unwrap();
        assert_eq!(
            commands,
            vec![
                "scoreboard players set @s a 5",
                "scoreboard players set @s b 2",
                "function add",
            ]
        );
    }

    #[test]
    fn test_return_slot_keeps_kind() {
        let mut function = Function::new("f", Selector::self_selector(), Vec::new());
        let (slot, fresh) = function.return_slot(0, &CounterKind::Int).unwrap();
        assert_eq!(slot.name, "_mcc_rv0");
        assert!(fresh);
        assert!(!function.return_slot(0, &CounterKind::Int).unwrap().1);
        assert!(function.return_slot(0, &CounterKind::Bool).is_none());
    }
}
