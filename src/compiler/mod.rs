//! The compilation pipeline.
//!
//! 1. **Frontend**: lex the source and assemble statements with block sizes.
//! 2. **Middle end**: apply options to a fresh executor, then run every
//!    statement, producing command files and assets.
//! 3. **Backend**: write the project under an output directory.

pub mod backend;
pub mod frontend;
pub mod middle_end;

use crate::compiler::backend::Project;
use crate::compiler::frontend::lexer::Lexer;
use crate::compiler::middle_end::executor::Executor;
use crate::compiler::middle_end::session::{CompilerSession, Feature};
use crate::core::util::is_valid_identifier;
use crate::core::{TokenKind, Value};
use crate::error::{CompilerError, Result};
use crate::{CompilationStats, CompilerOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Compile one file's source into an in-memory project. The session is reset
/// first, so one session can serve many compilations.
pub fn compile_project(
    source: &str,
    filename: &str,
    options: &CompilerOptions,
    session: &mut CompilerSession,
) -> Result<(Project, CompilationStats)> {
    let start_time = Instant::now();
    session.reset();

    // STAGE 1: FRONTEND
    let statements = frontend::parse_source(source, filename)?;
    let statement_count = statements.len();
    if options.debug_mode {
        log::debug!("Assembled {} statements from {}", statement_count, filename);
    }

    // STAGE 2: SETUP
    let project_name = options
        .project_name
        .clone()
        .unwrap_or_else(|| project_name_for(filename));
    let mut executor = Executor::new(session, &project_name)
        .with_base_directory(base_directory_for(filename))
        .with_include_directories(options.include_directories.iter().map(PathBuf::from).collect());

    if let Some(version) = &options.target_version {
        executor.set_target_version(version);
    }
    for (name, value) in &options.custom_variables {
        if !is_valid_identifier(name) {
            return Err(CompilerError::InvalidFormat {
                message: format!("Invalid custom variable name '{}'", name),
            });
        }
        executor.preprocessor.set(name, parse_values(value));
    }
    for name in &options.features {
        let feature = Feature::parse(name).ok_or_else(|| CompilerError::InvalidFormat {
            message: format!("Unknown feature '{}'", name),
        })?;
        executor.enable_feature(feature);
    }

    // STAGE 3: EXECUTION
    let project = executor.execute(statements)?;

    let stats = CompilationStats {
        source_size: source.len() as u64,
        statement_count,
        file_count: project.files.len(),
        command_count: project.total_commands(),
        asset_count: project.assets.len(),
        compile_time_ms: start_time.elapsed().as_millis() as u64,
        ..Default::default()
    };
    if options.debug_mode {
        log::debug!("Compilation stats: {:?}", stats);
    }
    Ok((project, stats))
}

/// Text from the command line becomes literals when it lexes as literals,
/// otherwise one text value.
pub fn parse_values(text: &str) -> Vec<Value> {
    let literals: Option<Vec<Value>> = Lexer::new(text, "<define>").tokenize().ok().and_then(|tokens| {
        tokens
            .into_iter()
            .map(|token| match token.kind {
                TokenKind::Literal(value) => Some(value),
                _ => None,
            })
            .collect()
    });
    match literals {
        Some(values) if !values.is_empty() => values,
        _ => vec![Value::Text(text.to_string())],
    }
}

/// The root file is named after the source file.
pub fn project_name_for(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "main".to_string())
}

fn base_directory_for(filename: &str) -> PathBuf {
    Path::new(filename)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("5 10"), vec![Value::Int(5), Value::Int(10)]);
        assert_eq!(parse_values("hello world"), vec![Value::Text("hello world".into())]);
        assert_eq!(parse_values("\"quoted\""), vec![Value::Text("quoted".into())]);
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name_for("scripts/Main.mcc"), "main");
        assert_eq!(project_name_for(""), "main");
    }

    #[test]
    fn test_session_reuse_is_deterministic() {
        let mut session = CompilerSession::new().unwrap();
        let options = CompilerOptions::default();
        let source = "define int score\nif score > 1 {\nsay \"a\"\nsay \"b\"\n}";
        let (first, _) = compile_project(source, "test.mcc", &options, &mut session).unwrap();
        let (second, _) = compile_project(source, "test.mcc", &options, &mut session).unwrap();
        let paths = |p: &Project| p.files.iter().map(|f| f.path()).collect::<Vec<_>>();
        assert_eq!(paths(&first), paths(&second));
        assert!(first.has_file("compiler/branch0"));
    }

    #[test]
    fn test_options_apply() {
        let mut session = CompilerSession::new().unwrap();
        let mut options = CompilerOptions::default();
        options.custom_variables.insert("count".into(), "3".into());
        options.features.push("nulls".into());
        let source = "$log \"$count\"\nnull create \"x\"";
        let (project, stats) = compile_project(source, "test.mcc", &options, &mut session).unwrap();
        assert_eq!(project.log_messages, vec!["3"]);
        assert_eq!(stats.statement_count, 2);

        options.features = vec!["flying".into()];
        assert!(compile_project(source, "test.mcc", &options, &mut session).is_err());
    }
}
