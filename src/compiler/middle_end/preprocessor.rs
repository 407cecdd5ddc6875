//! Compile-time variables and macros.
//!
//! A preprocessor variable is an ordered list of [`Value`]s. Arithmetic and
//! text operations apply element by element; a single right-hand value is
//! broadcast over every element, a shorter right-hand list leaves the
//! remaining elements untouched.

use crate::compiler::middle_end::statement::Statement;
use crate::core::util::friendly_name;
use crate::core::value::{ArithOp, Value};
use crate::error::PreprocessorError;
use regex::Regex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

type Result<T> = std::result::Result<T, PreprocessorError>;

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    /// Shared with the statement list it was defined in.
    pub body: Rc<[Statement]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCase {
    Upper,
    Lower,
    Friendly,
}

#[derive(Debug, Default)]
pub struct Preprocessor {
    variables: HashMap<String, Vec<Value>>,
    macros: HashMap<String, Macro>,
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(normalize(name))
    }

    pub fn try_get(&self, name: &str) -> Option<&[Value]> {
        self.variables.get(normalize(name)).map(Vec::as_slice)
    }

    pub fn get(&self, name: &str) -> Result<&[Value]> {
        self.try_get(name)
            .ok_or_else(|| PreprocessorError::Missing(normalize(name).to_string()))
    }

    pub fn set(&mut self, name: &str, values: Vec<Value>) {
        self.variables.insert(normalize(name).to_string(), values);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Value>> {
        self.variables.remove(normalize(name))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
        self.variables
            .get_mut(normalize(name))
            .ok_or_else(|| PreprocessorError::Missing(normalize(name).to_string()))
    }

    /// `name[i] = name[i] <op> rhs[i]`, broadcasting a single right-hand value.
    pub fn apply(&mut self, name: &str, op: ArithOp, rhs: &[Value]) -> Result<()> {
        let label = normalize(name).to_string();
        let values = self.get_mut(name)?;
        for (i, value) in values.iter_mut().enumerate() {
            let Some(other) = broadcast(rhs, i) else { continue };
            *value = value.apply(op, other).map_err(|source| PreprocessorError::Operation {
                name: label.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Exponentiation by repeated multiplication.
    pub fn pow(&mut self, name: &str, rhs: &[Value]) -> Result<()> {
        let label = normalize(name).to_string();
        let values = self.get_mut(name)?;
        for (i, value) in values.iter_mut().enumerate() {
            let Some(other) = broadcast(rhs, i) else { continue };
            let Value::Int(exponent) = other else {
                return Err(PreprocessorError::NonIntegerExponent);
            };
            if *exponent < 0 {
                return Err(PreprocessorError::NonIntegerExponent);
            }
            let base = value.clone();
            let mut result = Value::Int(1);
            for _ in 0..*exponent {
                result = result.mul(&base).map_err(|source| PreprocessorError::Operation {
                    name: label.clone(),
                    source,
                })?;
            }
            *value = result;
        }
        Ok(())
    }

    pub fn swap(&mut self, a: &str, b: &str) -> Result<()> {
        let first = self.get(a)?.to_vec();
        let second = self.get(b)?.to_vec();
        self.set(a, second);
        self.set(b, first);
        Ok(())
    }

    pub fn transform_text(&mut self, input: &str, output: &str, case: TextCase) -> Result<()> {
        let values = self
            .get(input)?
            .iter()
            .map(|value| {
                let text = value.to_string();
                Value::Text(match case {
                    TextCase::Upper => text.to_uppercase(),
                    TextCase::Lower => text.to_lowercase(),
                    TextCase::Friendly => friendly_name(&text),
                })
            })
            .collect();
        self.set(output, values);
        Ok(())
    }

    pub fn sum(&self, name: &str) -> Result<Value> {
        let values = self.get(name)?;
        let failed = || PreprocessorError::Aggregate { verb: "sum", name: normalize(name).to_string() };
        let (first, rest) = values.split_first().ok_or_else(failed)?;
        rest.iter()
            .try_fold(first.clone(), |total, value| total.add(value))
            .map_err(|_| failed())
    }

    pub fn mean(&self, name: &str) -> Result<Value> {
        let count = self.get(name)?.len();
        self.sum(name)?
            .div(&Value::Int(count as i32))
            .map_err(|_| PreprocessorError::Aggregate { verb: "average", name: normalize(name).to_string() })
    }

    /// Middle element; the mean of the two middle elements for even lengths.
    pub fn median(&self, name: &str) -> Result<Value> {
        let values = self.get(name)?;
        let failed = || PreprocessorError::Aggregate {
            verb: "calculate the median of",
            name: normalize(name).to_string(),
        };
        match values.len() {
            0 => Err(failed()),
            1 => Ok(values[0].clone()),
            n if n % 2 == 1 => Ok(values[n / 2].clone()),
            n => values[n / 2]
                .add(&values[n / 2 - 1])
                .and_then(|total| total.div(&Value::Int(2)))
                .map_err(|_| failed()),
        }
    }

    pub fn get_index(&self, name: &str, index: i64) -> Result<Value> {
        let values = self.get(name)?;
        if index < 0 {
            return Err(PreprocessorError::NegativeIndex(index));
        }
        values
            .get(index as usize)
            .cloned()
            .ok_or_else(|| PreprocessorError::IndexTooLarge {
                index,
                name: normalize(name).to_string(),
                max: values.len() as i64 - 1,
            })
    }

    pub fn len(&self, name: &str) -> Result<usize> {
        Ok(self.get(name)?.len())
    }

    /// Replace every `$name` naming a known variable inside `text`.
    /// Multi-element variables are joined with spaces.
    pub fn substitute(&self, pattern: &Regex, text: &str) -> String {
        pattern
            .replace_all(text, |captures: &regex::Captures| {
                let whole = captures.get(0).map_or("", |m| m.as_str());
                match captures.get(1).and_then(|name| self.try_get(name.as_str())) {
                    Some(values) => values
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(" "),
                    None => whole.to_string(),
                }
            })
            .into_owned()
    }

    pub fn define_macro(&mut self, definition: Macro) {
        log::debug!("Defined macro '{}' ({} params)", definition.name, definition.params.len());
        self.macros.insert(definition.name.clone(), definition);
    }

    pub fn get_macro(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
}

fn broadcast(rhs: &[Value], index: usize) -> Option<&Value> {
    match rhs {
        [single] => Some(single),
        _ => rhs.get(index),
    }
}

/// Walk `root` along a `/` or `,` separated accessor and convert what is
/// found into preprocessor values. Arrays at the end of the path become one
/// value per element.
pub fn import_json(root: &serde_json::Value, accessor: &str) -> Result<Vec<Value>> {
    let mut node = root;
    let mut walked = String::from("root");

    for part in accessor.split(['/', ',']).map(str::trim).filter(|p| !p.is_empty()) {
        node = match node {
            serde_json::Value::Array(items) => {
                let index: usize = part.parse().map_err(|_| {
                    PreprocessorError::Json(format!(
                        "Array at '{}' requires index to access. Given: {}",
                        walked, part
                    ))
                })?;
                items.get(index).ok_or_else(|| {
                    PreprocessorError::Json(format!(
                        "Index {} is out of range for array at '{}' (length {}).",
                        index,
                        walked,
                        items.len()
                    ))
                })?
            }
            serde_json::Value::Object(map) => map.get(part).ok_or_else(|| {
                PreprocessorError::Json(format!("Cannot find child '{}' under token {}", part, walked))
            })?,
            _ => {
                return Err(PreprocessorError::Json(format!("Unexpected end of JSON at {}", walked)));
            }
        };
        walked.push('/');
        walked.push_str(part);
    }

    let values: Vec<Value> = match node {
        serde_json::Value::Array(items) => items.iter().filter_map(Value::from_json).collect(),
        other => Value::from_json(other).into_iter().collect(),
    };
    if values.is_empty() {
        return Err(PreprocessorError::Json(format!("Unexpected end of JSON at {}", walked)));
    }
    Ok(values)
}

/// Binds macro arguments over any same-named variables and puts the old
/// bindings back when dropped, whether the body succeeded or not.
pub struct ShadowGuard<'a, T: AsMut<Preprocessor>> {
    owner: &'a mut T,
    saved: Vec<(String, Option<Vec<Value>>)>,
}

impl<'a, T: AsMut<Preprocessor>> ShadowGuard<'a, T> {
    pub fn bind(owner: &'a mut T, bindings: Vec<(String, Vec<Value>)>) -> Self {
        let mut saved = Vec::with_capacity(bindings.len());
        let preprocessor = owner.as_mut();
        for (name, values) in bindings {
            let previous = preprocessor.remove(&name);
            saved.push((name.clone(), previous));
            preprocessor.set(&name, values);
        }
        Self { owner, saved }
    }
}

impl<T: AsMut<Preprocessor>> Deref for ShadowGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.owner
    }
}

impl<T: AsMut<Preprocessor>> DerefMut for ShadowGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.owner
    }
}

impl<T: AsMut<Preprocessor>> Drop for ShadowGuard<'_, T> {
    fn drop(&mut self) {
        let preprocessor = self.owner.as_mut();
        // reverse order so a parameter listed twice unwinds correctly
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(values) => preprocessor.set(&name, values),
                None => {
                    preprocessor.remove(&name);
                }
            }
        }
    }
}

impl AsMut<Preprocessor> for Preprocessor {
    fn as_mut(&mut self) -> &mut Preprocessor {
        self
    }
}
