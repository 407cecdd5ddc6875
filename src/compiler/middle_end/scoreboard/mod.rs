//! Typed counters backed by scoreboard objectives.
//!
//! Every compiled variable is a [`ScoreboardValue`]: a name plus a
//! [`CounterKind`]. The kind decides how many objectives back the value and
//! how literals, initialisation and text display are lowered to commands.
//! Struct values carry no logic of their own; every operation on a field is
//! performed by a copy of the field's value renamed to `base:key`.

pub mod ops;

use crate::compiler::middle_end::rawtext::RawTerm;
use crate::core::command;
use crate::core::constants::*;
use crate::core::util::decimal_factor;
use crate::core::value::{Value, TICKS_PER_SECOND};
use crate::error::ScoreboardError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum CounterKind {
    Int,
    /// Ticks, displayed as `minutes:seconds`.
    Time,
    /// Fixed point with `precision` fractional digits.
    Decimal { precision: usize },
    Bool,
    Struct(Rc<StructDefinition>),
}

impl CounterKind {
    pub fn max_name_length(&self) -> usize {
        match self {
            CounterKind::Decimal { .. } => MAX_DECIMAL_NAME_LENGTH,
            CounterKind::Struct(_) => MAX_STRUCT_NAME_LENGTH,
            _ => MAX_NAME_LENGTH,
        }
    }

    /// Kinds stored in a single objective holding a plain integer.
    pub fn is_integer_like(&self) -> bool {
        matches!(self, CounterKind::Int | CounterKind::Time | CounterKind::Bool)
    }

    /// The kind a temporary needs to hold `value`.
    pub fn for_literal(value: &Value) -> Option<CounterKind> {
        match value {
            Value::Int(_) => Some(CounterKind::Int),
            Value::Float(_) => Some(CounterKind::Decimal { precision: value.precision().max(1) }),
            Value::Bool(_) => Some(CounterKind::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKind::Int => write!(f, "int"),
            CounterKind::Time => write!(f, "time"),
            CounterKind::Decimal { precision } => write!(f, "decimal {}", precision),
            CounterKind::Bool => write!(f, "bool"),
            CounterKind::Struct(def) => write!(f, "{}", def.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    /// Short key used in the mangled objective name.
    pub key: String,
    pub kind: CounterKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    /// Keys run `a`..`z`, then `aa`, `ab`, ...
    pub fn next_key(&self) -> String {
        let mut index = self.fields.len();
        let mut key = String::new();
        loop {
            key.insert(0, (b'a' + (index % 26) as u8) as char);
            if index < 26 {
                break;
            }
            index = index / 26 - 1;
        }
        key
    }

    pub fn add_field(&mut self, name: impl Into<String>, kind: CounterKind) {
        let key = self.next_key();
        self.fields.push(StructField { name: name.into(), key, kind });
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardValue {
    pub name: String,
    pub kind: CounterKind,
}

impl ScoreboardValue {
    pub fn new(name: impl Into<String>, kind: CounterKind) -> Self {
        Self { name: name.into(), kind }
    }

    pub fn whole(&self) -> String {
        format!("{}{}", self.name, DECIMAL_WHOLE_SUFFIX)
    }

    pub fn part(&self) -> String {
        format!("{}{}", self.name, DECIMAL_PART_SUFFIX)
    }

    /// Sub-field values of a struct, renamed to their mangled accessors.
    pub fn fields(&self) -> Vec<ScoreboardValue> {
        match &self.kind {
            CounterKind::Struct(def) => def
                .fields
                .iter()
                .map(|f| ScoreboardValue::new(format!("{}:{}", self.name, f.key), f.kind.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<ScoreboardValue> {
        match &self.kind {
            CounterKind::Struct(def) => def
                .field(name)
                .map(|f| ScoreboardValue::new(format!("{}:{}", self.name, f.key), f.kind.clone())),
            _ => None,
        }
    }

    /// Every objective backing this value.
    pub fn objectives(&self) -> Vec<String> {
        match &self.kind {
            CounterKind::Decimal { .. } => vec![self.whole(), self.part()],
            CounterKind::Struct(_) => self.fields().iter().flat_map(|f| f.objectives()).collect(),
            _ => vec![self.name.clone()],
        }
    }

    pub fn define(&self) -> Vec<String> {
        self.objectives().iter().map(|o| command::objective_add(o)).collect()
    }

    pub fn init(&self) -> Vec<String> {
        self.objectives()
            .iter()
            .map(|o| command::score_add("@a", o, 0))
            .collect()
    }

    /// Assign a literal. Literal kinds this counter cannot hold produce no commands.
    pub fn set_literal(&self, target: &str, value: &Value) -> Vec<String> {
        match (&self.kind, value) {
            (CounterKind::Int | CounterKind::Time, Value::Int(n)) => {
                vec![command::score_set(target, &self.name, *n)]
            }
            (CounterKind::Int | CounterKind::Time, Value::Float(f)) => {
                vec![command::score_set(target, &self.name, f.round() as i32)]
            }
            (CounterKind::Bool, Value::Bool(b)) => {
                vec![command::score_set(target, &self.name, i32::from(*b))]
            }
            (CounterKind::Bool, Value::Int(n)) => {
                vec![command::score_set(target, &self.name, n.rem_euclid(2))]
            }
            (CounterKind::Bool, Value::Float(f)) => {
                vec![command::score_set(target, &self.name, (f.round() as i32).rem_euclid(2))]
            }
            (CounterKind::Decimal { .. }, Value::Int(n)) => vec![
                command::score_set(target, &self.whole(), *n),
                command::score_set(target, &self.part(), 0),
            ],
            (CounterKind::Decimal { precision }, Value::Float(f)) => {
                let whole = f.floor();
                let part = ((f - whole) * decimal_factor(*precision) as f32).round() as i32;
                vec![
                    command::score_set(target, &self.whole(), whole as i32),
                    command::score_set(target, &self.part(), part),
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Commands that must run before [`Self::raw_text`] is displayed.
    /// `index` keeps temporaries of several interpolations in one string apart.
    pub fn raw_text_setup(&self, target: &str, index: usize) -> Vec<String> {
        match &self.kind {
            CounterKind::Time => {
                let (mins, secs, temp, unit) = time_objectives(index);
                let mut commands: Vec<String> =
                    [&mins, &secs, &temp, &unit].iter().map(|o| command::objective_add(o)).collect();
                commands.extend([
                    command::score_set(target, &unit, TICKS_PER_SECOND),
                    command::score_copy(target, &temp, target, &self.name),
                    command::score_operation(target, &temp, "/=", target, &unit),
                    command::score_copy(target, &secs, target, &temp),
                    command::score_set(target, &unit, 60),
                    command::score_operation(target, &temp, "/=", target, &unit),
                    command::score_copy(target, &mins, target, &temp),
                    command::score_operation(target, &temp, "*=", target, &unit),
                    command::score_operation(target, &secs, "-=", target, &temp),
                ]);
                commands
            }
            _ => Vec::new(),
        }
    }

    pub fn raw_text(&self, target: &str, index: usize) -> Vec<RawTerm> {
        match &self.kind {
            CounterKind::Time => {
                let (mins, secs, _, _) = time_objectives(index);
                vec![
                    RawTerm::score(target, mins),
                    RawTerm::text(":"),
                    RawTerm::score(target, secs),
                ]
            }
            CounterKind::Decimal { .. } => vec![
                RawTerm::score(target, self.whole()),
                RawTerm::text("."),
                RawTerm::score(target, self.part()),
            ],
            CounterKind::Struct(_) => {
                let mut terms = vec![RawTerm::text("[")];
                for (i, field) in self.fields().iter().enumerate() {
                    if i > 0 {
                        terms.push(RawTerm::text(", "));
                    }
                    terms.extend(field.raw_text(target, index));
                }
                terms.push(RawTerm::text("]"));
                terms
            }
            _ => vec![RawTerm::score(target, self.name.clone())],
        }
    }
}

fn time_objectives(index: usize) -> (String, String, String, String) {
    (
        format!("{}{}", TIME_MINUTES, index),
        format!("{}{}", TIME_SECONDS, index),
        format!("{}{}", TIME_TEMP, index),
        format!("{}{}", TIME_CONST, index),
    )
}

/// Owns every defined counter, struct definition and the temporary scopes.
#[derive(Debug, Default)]
pub struct ScoreboardManager {
    values: HashMap<String, ScoreboardValue>,
    structs: HashMap<String, Rc<StructDefinition>>,
    temp_index: usize,
    temp_stack: Vec<usize>,
    defined_temps: HashSet<String>,
    pending_head: Vec<String>,
}

impl ScoreboardManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_name(name: &str, kind: &CounterKind) -> Result<(), ScoreboardError> {
        let max = kind.max_name_length();
        if name.chars().count() > max {
            return Err(ScoreboardError::NameTooLong {
                name: name.to_string(),
                length: name.chars().count(),
                max,
            });
        }
        Ok(())
    }

    /// Register a value. Redefinition replaces the previous binding.
    pub fn define(&mut self, value: ScoreboardValue) -> Result<(), ScoreboardError> {
        Self::check_name(&value.name, &value.kind)?;
        log::debug!("Defined value '{}' ({})", value.name, value.kind);
        self.values.insert(value.name.to_uppercase(), value);
        Ok(())
    }

    /// Look up `name` or a struct accessor `base:field`.
    pub fn get(&self, accessor: &str) -> Option<ScoreboardValue> {
        if let Some(value) = self.values.get(&accessor.to_uppercase()) {
            return Some(value.clone());
        }
        let (base, field) = accessor.split_once(':')?;
        self.values.get(&base.to_uppercase())?.field(field)
    }

    pub fn try_get(&self, accessor: &str) -> Result<ScoreboardValue, ScoreboardError> {
        if let Some(value) = self.get(accessor) {
            return Ok(value);
        }
        match accessor.split_once(':') {
            Some((base, field)) if self.values.contains_key(&base.to_uppercase()) => {
                Err(ScoreboardError::NoField(base.to_string(), field.to_string()))
            }
            _ => Err(ScoreboardError::Unknown(accessor.to_string())),
        }
    }

    pub fn contains(&self, accessor: &str) -> bool {
        self.get(accessor).is_some()
    }

    pub fn define_struct(&mut self, definition: StructDefinition) {
        log::debug!("Defined struct '{}' with {} fields", definition.name, definition.fields.len());
        self.structs.insert(definition.name.to_uppercase(), Rc::new(definition));
    }

    pub fn get_struct(&self, name: &str) -> Option<Rc<StructDefinition>> {
        self.structs.get(&name.to_uppercase()).cloned()
    }

    pub fn push_temp_state(&mut self) {
        self.temp_stack.push(self.temp_index);
    }

    pub fn pop_temp_state(&mut self) {
        if let Some(index) = self.temp_stack.pop() {
            self.temp_index = index;
        }
    }

    /// Allocate the next temporary of `kind` in the current scope. Objectives
    /// seen for the first time are queued for the head of the root file.
    pub fn request_temp(&mut self, kind: CounterKind) -> ScoreboardValue {
        let value = ScoreboardValue::new(format!("{}{}", TEMP_PREFIX, self.temp_index), kind);
        self.temp_index += 1;
        self.define_in_head(&value);
        self.values.insert(value.name.to_uppercase(), value.clone());
        value
    }

    /// Keep every temporary allocated so far alive past the end of the
    /// current statement.
    pub fn keep_temps(&mut self) {
        if let Some(saved) = self.temp_stack.last_mut() {
            *saved = self.temp_index;
        }
    }

    pub fn request_temp_for(&mut self, literal: &Value) -> Result<ScoreboardValue, ScoreboardError> {
        let kind = CounterKind::for_literal(literal)
            .ok_or(ScoreboardError::NoTemporary(literal.kind_name()))?;
        Ok(self.request_temp(kind))
    }

    /// Queue a definition for the head of the root file, once per objective.
    pub fn define_in_head(&mut self, value: &ScoreboardValue) {
        for objective in value.objectives() {
            if self.defined_temps.insert(objective.clone()) {
                self.pending_head.push(command::objective_add(&objective));
            }
        }
    }

    pub fn take_pending_head(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_literal_split() {
        let value = ScoreboardValue::new("money", CounterKind::Decimal { precision: 2 });
        let commands = value.set_literal("@s", &Value::Float(3.25));
        assert_eq!(
            commands,
            vec![
                "scoreboard players set @s money:w 3",
                "scoreboard players set @s money:d 25",
            ]
        );
        assert_eq!(value.init().len(), 2);
    }

    #[test]
    fn test_incompatible_literal_is_silent() {
        let value = ScoreboardValue::new("x", CounterKind::Int);
        assert!(value.set_literal("@s", &Value::Text("hi".into())).is_empty());
        let flag = ScoreboardValue::new("f", CounterKind::Bool);
        assert_eq!(flag.set_literal("@s", &Value::Int(3)), vec!["scoreboard players set @s f 1"]);
    }

    #[test]
    fn test_struct_fields_are_mangled() {
        let mut def = StructDefinition::new("vec");
        def.add_field("x", CounterKind::Int);
        def.add_field("y", CounterKind::Decimal { precision: 1 });
        let mut manager = ScoreboardManager::new();
        manager.define_struct(def.clone());
        manager
            .define(ScoreboardValue::new("pos", CounterKind::Struct(Rc::new(def))))
            .unwrap();

        let x = manager.get("pos:x").unwrap();
        assert_eq!(x.name, "pos:a");
        assert_eq!(x.kind, CounterKind::Int);
        assert_eq!(
            manager.get("POS").unwrap().objectives(),
            vec!["pos:a", "pos:b:w", "pos:b:d"]
        );
        assert!(matches!(manager.try_get("pos:z"), Err(ScoreboardError::NoField(_, _))));
    }

    #[test]
    fn test_struct_keys_roll_over() {
        let mut def = StructDefinition::new("big");
        for i in 0..27 {
            def.add_field(format!("f{}", i), CounterKind::Int);
        }
        assert_eq!(def.fields[25].key, "z");
        assert_eq!(def.fields[26].key, "aa");
    }

    #[test]
    fn test_name_length_budget() {
        let mut manager = ScoreboardManager::new();
        let long = ScoreboardValue::new("fifteen_chars_x", CounterKind::Decimal { precision: 1 });
        assert!(matches!(manager.define(long), Err(ScoreboardError::NameTooLong { max: 14, .. })));
        assert!(manager
            .define(ScoreboardValue::new("fifteen_chars_x", CounterKind::Int))
            .is_ok());
    }

    #[test]
    fn test_temp_scopes_reuse_names() {
        let mut manager = ScoreboardManager::new();
        manager.push_temp_state();
        let a = manager.request_temp(CounterKind::Int);
        let b = manager.request_temp(CounterKind::Int);
        manager.pop_temp_state();
        manager.push_temp_state();
        let c = manager.request_temp(CounterKind::Int);
        manager.pop_temp_state();

        assert_eq!(a.name, "_mcc_tmp0");
        assert_eq!(b.name, "_mcc_tmp1");
        assert_eq!(c.name, a.name);
        assert_eq!(manager.take_pending_head().len(), 2);
        assert!(manager.contains("_mcc_tmp1"));

        manager.push_temp_state();
        manager.request_temp(CounterKind::Int);
        manager.keep_temps();
        manager.pop_temp_state();
        assert_eq!(manager.request_temp(CounterKind::Int).name, "_mcc_tmp1");
    }

    #[test]
    fn test_time_display_setup() {
        let timer = ScoreboardValue::new("timer", CounterKind::Time);
        let setup = timer.raw_text_setup("@s", 0);
        assert_eq!(setup[0], "scoreboard objectives add _mcc_t_mins0 dummy");
        assert!(setup.contains(&"scoreboard players set @s _mcc_t_const0 20".to_string()));
        assert_eq!(timer.raw_text("@s", 0).len(), 3);
    }
}
