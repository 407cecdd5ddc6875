//! `$` directives: compile-time variables, control flow, macros and includes.

use crate::compiler::frontend;
use crate::compiler::middle_end::executor::{BlockAction, BlockHooks, Executor, OrFail};
use crate::compiler::middle_end::preprocessor::{import_json, Macro, ShadowGuard, TextCase};
use crate::compiler::middle_end::statement::Cursor;
use crate::core::constants::{MAX_INCLUDE_DEPTH, SOURCE_EXTENSION};
use crate::core::token::Ident;
use crate::core::{ArithOp, CompareOp, TokenKind, Value};
use crate::error::{PreprocessorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn name(cursor: &mut Cursor) -> Result<String> {
    let Ident(name) = cursor.next_as::<Ident>()?;
    Ok(name)
}

/// Every remaining literal.
fn literals(cursor: &mut Cursor) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    while cursor.has_next() {
        values.push(cursor.next_as::<Value>()?);
    }
    Ok(values)
}

/// The right-hand side of an operation: another variable by name, or a list of literals.
fn operand_values(executor: &Executor<'_>, cursor: &mut Cursor) -> Result<Vec<Value>> {
    if let Some(Ident(other)) = cursor.try_next::<Ident>() {
        return Ok(executor.preprocessor.get(&other).or_fail(executor)?.to_vec());
    }
    literals(cursor)
}

pub fn var(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let name = name(cursor)?;
    let values = literals(cursor)?;
    executor.preprocessor.set(&name, values);
    Ok(())
}

fn step(executor: &mut Executor<'_>, cursor: &mut Cursor, op: ArithOp) -> Result<()> {
    let name = name(cursor)?;
    executor.preprocessor.apply(&name, op, &[Value::Int(1)]).or_fail(executor)
}

pub fn inc(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    step(executor, cursor, ArithOp::Add)
}

pub fn dec(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    step(executor, cursor, ArithOp::Sub)
}

fn arithmetic(executor: &mut Executor<'_>, cursor: &mut Cursor, op: ArithOp) -> Result<()> {
    let name = name(cursor)?;
    let rhs = operand_values(executor, cursor)?;
    executor.preprocessor.apply(&name, op, &rhs).or_fail(executor)
}

pub fn add(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    arithmetic(executor, cursor, ArithOp::Add)
}

pub fn sub(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    arithmetic(executor, cursor, ArithOp::Sub)
}

pub fn mul(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    arithmetic(executor, cursor, ArithOp::Mul)
}

pub fn div(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    arithmetic(executor, cursor, ArithOp::Div)
}

pub fn modulo(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    arithmetic(executor, cursor, ArithOp::Mod)
}

pub fn pow(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let name = name(cursor)?;
    let rhs = operand_values(executor, cursor)?;
    executor.preprocessor.pow(&name, &rhs).or_fail(executor)
}

pub fn swap(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let a = name(cursor)?;
    let b = name(cursor)?;
    executor.preprocessor.swap(&a, &b).or_fail(executor)
}

/// Element-wise; a single right-hand value is compared against every element.
fn compare_all(values: &[Value], op: CompareOp, others: &[Value]) -> std::result::Result<bool, String> {
    let mut result = true;
    for (i, value) in values.iter().enumerate() {
        let other = match others {
            [single] => single,
            _ => others
                .get(i)
                .ok_or_else(|| PreprocessorError::LengthMismatch.to_string())?,
        };
        result &= value.compare(op, other).map_err(|e| e.to_string())?;
    }
    Ok(result)
}

pub fn if_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let name = name(cursor)?;
    let op = cursor.next_as::<CompareOp>()?;
    let others = operand_values(executor, cursor)?;
    if others.is_empty() {
        return Err(cursor.error("Expected a value to compare against."));
    }
    let values = executor.preprocessor.get(&name).or_fail(executor)?.to_vec();
    let run = compare_all(&values, op, &others).or_fail(executor)?;

    if !executor.has_next() {
        return Err(cursor.error("End of file after $if statement."));
    }
    executor.set_last_preprocessor_if(run);
    run_or_skip(executor, run);
    Ok(())
}

pub fn else_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let last = executor
        .last_preprocessor_if()
        .ok_or_else(|| cursor.error("No $if statement before this $else."))?;
    if !executor.has_next() {
        return Err(cursor.error("End of file after $else statement."));
    }
    run_or_skip(executor, !last);
    Ok(())
}

fn run_or_skip(executor: &mut Executor<'_>, run: bool) {
    if executor.next_is_block() {
        let hooks = if run {
            BlockHooks {
                open: vec![BlockAction::PushSelector(executor.active_selector().clone())],
                close: vec![BlockAction::PopSelector],
                skip: false,
            }
        } else {
            BlockHooks::skip()
        };
        executor.set_block_hooks(hooks);
    } else if !run {
        executor.next_raw_statement();
    }
}

pub fn repeat(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let amount = cursor.next_as::<i32>()?;
    let tracker = cursor.try_next::<Ident>().map(|Ident(name)| name);
    let statements = executor.next_execution_set()?;
    for i in 0..amount {
        if let Some(tracker) = &tracker {
            executor.preprocessor.set(tracker, vec![Value::Int(i)]);
        }
        executor.execute_subsection(Rc::clone(&statements))?;
    }
    Ok(())
}

pub fn log(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let message = cursor.next_as::<String>()?;
    executor.log_message(message);
    Ok(())
}

pub fn macro_(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    if executor.next_is_block() {
        define_macro(executor, cursor)
    } else {
        call_macro(executor, cursor)
    }
}

fn define_macro(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let name = name(cursor)?;
    let mut params = Vec::new();
    while let Some(Ident(param)) = cursor.try_next::<Ident>() {
        params.push(param);
    }
    if executor.peek_next().and_then(|s| s.statements_inside()) == Some(0) {
        return Err(cursor.error("Cannot have empty macro."));
    }
    let body = executor.next_execution_set()?;
    executor.preprocessor.define_macro(Macro { name, params, body });
    Ok(())
}

/// Arguments arrive unresolved: a `$name` passes the whole variable, a
/// literal or bare word passes one value.
fn call_macro(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let name = name(cursor)?;
    let definition = executor
        .preprocessor
        .get_macro(&name)
        .cloned()
        .ok_or_else(|| cursor.error(format!("Macro '{}' does not exist.", name)))?;

    let mut bindings = Vec::with_capacity(definition.params.len());
    for param in &definition.params {
        let token = cursor
            .next()
            .map_err(|_| cursor.error(format!("Missing argument '{}' in macro call.", param)))?;
        let values = match &token.kind {
            TokenKind::PreprocessorRef(reference) => executor.preprocessor.get(reference).or_fail(executor)?.to_vec(),
            TokenKind::Literal(Value::Text(text)) => {
                let text = executor
                    .preprocessor
                    .substitute(&executor.session.substitution_pattern, text);
                vec![Value::Text(text)]
            }
            TokenKind::Literal(value) => vec![value.clone()],
            _ => match token.view::<Ident>() {
                Some(Ident(word)) => vec![Value::Text(word)],
                None => {
                    return Err(cursor.error(format!("Invalid argument type for '{}' in macro call.", param)));
                }
            },
        };
        bindings.push((param.clone(), values));
    }

    log::debug!("Expanding macro '{}'", definition.name);
    let mut guard = ShadowGuard::bind(&mut *executor, bindings);
    guard.execute_subsection(definition.body)
}

/// `file` against the base directory, then each include directory.
fn locate(executor: &Executor<'_>, file: &str) -> Option<PathBuf> {
    let path = Path::new(file);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    std::iter::once(&executor.base_directory)
        .chain(executor.include_directories.iter())
        .map(|directory| directory.join(path))
        .find(|candidate| candidate.is_file())
}

pub fn include(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let mut file = cursor.next_as::<String>()?;
    let extension = format!(".{}", SOURCE_EXTENSION);
    if !file.ends_with(&extension) {
        file.push_str(&extension);
    }
    let path = locate(executor, &file).ok_or_else(|| cursor.error(format!("Cannot find file '{}'.", file)))?;
    if executor.include_depth >= MAX_INCLUDE_DEPTH {
        return Err(cursor.error(format!(
            "Maximum include depth of {} reached at '{}'.",
            MAX_INCLUDE_DEPTH, file
        )));
    }

    let statements = match executor.session.cached_statements(&path) {
        Some(statements) => statements,
        None => {
            log::info!("Including {}", path.display());
            let source = fs::read_to_string(&path)
                .map_err(|e| cursor.error(format!("Cannot read file '{}': {}", file, e)))?;
            let statements = frontend::parse_source(&source, &file)?;
            executor.session.cache_statements(&path, Rc::from(statements))
        }
    };

    executor.include_depth += 1;
    let result = executor.execute_subsection(statements);
    executor.include_depth -= 1;
    result
}

fn text_case(executor: &mut Executor<'_>, cursor: &mut Cursor, case: TextCase) -> Result<()> {
    let input = name(cursor)?;
    let output = name(cursor)?;
    executor.preprocessor.transform_text(&input, &output, case).or_fail(executor)
}

pub fn str_friendly(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    text_case(executor, cursor, TextCase::Friendly)
}

pub fn str_upper(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    text_case(executor, cursor, TextCase::Upper)
}

pub fn str_lower(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    text_case(executor, cursor, TextCase::Lower)
}

pub fn sum(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let output = name(cursor)?;
    let result = executor.preprocessor.sum(&input).or_fail(executor)?;
    executor.preprocessor.set(&output, vec![result]);
    Ok(())
}

pub fn median(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let output = name(cursor)?;
    let result = executor.preprocessor.median(&input).or_fail(executor)?;
    executor.preprocessor.set(&output, vec![result]);
    Ok(())
}

pub fn mean(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let output = name(cursor)?;
    let result = executor.preprocessor.mean(&input).or_fail(executor)?;
    executor.preprocessor.set(&output, vec![result]);
    Ok(())
}

pub fn iterate(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let current = name(cursor)?;
    let values = executor.preprocessor.get(&input).or_fail(executor)?.to_vec();
    let statements = executor.next_execution_set()?;
    for value in values {
        executor.preprocessor.set(&current, vec![value]);
        executor.execute_subsection(Rc::clone(&statements))?;
    }
    Ok(())
}

pub fn get(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let index = cursor.next_as::<i32>()?;
    let output = name(cursor)?;
    let value = executor.preprocessor.get_index(&input, index as i64).or_fail(executor)?;
    executor.preprocessor.set(&output, vec![value]);
    Ok(())
}

pub fn len(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let input = name(cursor)?;
    let output = name(cursor)?;
    let length = executor.preprocessor.len(&input).or_fail(executor)?;
    executor.preprocessor.set(&output, vec![Value::Int(length as i32)]);
    Ok(())
}

pub fn json(executor: &mut Executor<'_>, cursor: &mut Cursor) -> Result<()> {
    let file = cursor.next_as::<String>()?;
    let output = name(cursor)?;
    let accessor = cursor.next_as::<String>()?;

    let path = locate(executor, &file).ok_or_else(|| cursor.error(format!("Cannot find file '{}'.", file)))?;
    let root = match executor.session.cached_json(&path) {
        Some(root) => root,
        None => {
            let text = fs::read_to_string(&path)
                .map_err(|e| cursor.error(format!("Cannot read file '{}': {}", file, e)))?;
            let parsed: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| cursor.error(format!("JSON Error: {}", e)))?;
            executor.session.cache_json(&path, parsed)
        }
    };
    let values = import_json(&root, &accessor).or_fail(executor)?;
    executor.preprocessor.set(&output, values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::compiler::backend::Project;
    use crate::compiler::frontend::parse_source;
    use crate::compiler::middle_end::executor::Executor;
    use crate::compiler::middle_end::session::CompilerSession;
    use crate::error::Result;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn run_in(source: &str, directory: &Path) -> Result<Project> {
        let mut session = CompilerSession::new()?;
        let statements = parse_source(source, "test")?;
        Executor::new(&mut session, "test")
            .with_base_directory(directory)
            .execute(statements)
    }

    fn logs(source: &str) -> Vec<String> {
        let dir = TempDir::new().unwrap();
        run_in(source, dir.path()).unwrap().log_messages
    }

    #[test]
    fn test_arithmetic_and_aggregates() {
        let messages = logs("$var x 1 2 3\n$add x 1\n$sum x total\n$len x count\n$log \"$total $count\"");
        assert_eq!(messages, vec!["9 3"]);
    }

    #[test]
    fn test_broadcast_and_shorter_lists() {
        let messages = logs("$var x 1 2 3\n$mul x 10 20\n$log \"$x\"");
        assert_eq!(messages, vec!["10 40 3"]);
    }

    #[test]
    fn test_if_else_single_statements() {
        let messages = logs("$var a 5\n$if a > 3\n$log \"big\"\n$else\n$log \"small\"\n$log \"done\"");
        assert_eq!(messages, vec!["big", "done"]);
    }

    #[test]
    fn test_if_skips_false_block() {
        let messages = logs("$var a 1\n$if a == 2 {\n$log \"two\"\n$log \"still two\"\n}\n$else {\n$log \"not two\"\n}");
        assert_eq!(messages, vec!["not two"]);
    }

    #[test]
    fn test_if_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let err = run_in("$var a 1 2 3\n$var b 1 2\n$if a == b\n$log \"x\"", dir.path()).unwrap_err();
        assert_eq!(err.message(), "Preprocessor variable lengths didn't match.");
    }

    #[test]
    fn test_repeat_with_tracker() {
        let messages = logs("$repeat 3 i\n$log \"i=$i\"");
        assert_eq!(messages, vec!["i=0", "i=1", "i=2"]);
    }

    #[test]
    fn test_iterate() {
        let messages = logs("$var names \"a\" \"b\"\n$iterate names n {\n$strupper n up\n$log \"$up\"\n}");
        assert_eq!(messages, vec!["A", "B"]);
    }

    #[test]
    fn test_macro_restores_shadowed_variable() {
        let source = "$var who \"outer\"\n$macro greet who {\n$log \"hello $who\"\n}\n$macro greet \"bob\"\n$log \"$who\"";
        assert_eq!(logs(source), vec!["hello bob", "outer"]);
    }

    #[test]
    fn test_macro_missing_argument() {
        let dir = TempDir::new().unwrap();
        let err = run_in("$macro pair a b {\n$log \"$a$b\"\n}\n$macro pair 1", dir.path()).unwrap_err();
        assert_eq!(err.message(), "Missing argument 'b' in macro call.");
    }

    #[test]
    fn test_include_and_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.mcc"), "$var included \"yes\"\n").unwrap();
        fs::write(dir.path().join("data.json"), r#"{"items": [4, 5, 6]}"#).unwrap();
        let project = run_in(
            "$include \"lib\"\n$json \"data.json\" items \"items\"\n$get items 1 second\n$log \"$included $second\"",
            dir.path(),
        )
        .unwrap();
        assert_eq!(project.log_messages, vec!["yes 5"]);
    }

    #[test]
    fn test_runaway_include_points_at_statement() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("loop.mcc"), "say \"again\"\n$include \"loop\"\n").unwrap();
        let err = run_in("say \"start\"\n$include \"loop\"", dir.path()).unwrap_err();
        assert_eq!(
            err.message(),
            format!("Maximum include depth of {} reached at 'loop.mcc'.", crate::core::constants::MAX_INCLUDE_DEPTH)
        );
        assert_eq!(err.line(), Some(2));
        assert!(err.report("main.mcc").starts_with("main.mcc:2: "));
    }

    #[test]
    fn test_missing_include() {
        let dir = TempDir::new().unwrap();
        let err = run_in("$include \"nowhere\"", dir.path()).unwrap_err();
        assert_eq!(err.message(), "Cannot find file 'nowhere.mcc'.");
    }
}
