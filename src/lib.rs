//! MCCompiled compiler core
//!
//! Compiles MCC scripts into trees of Minecraft Bedrock `.mcfunction` files.
//!
//! # Features
//!
//! - Typed scoreboard counters: integers, fixed-point decimals, booleans,
//!   times and structs, with full arithmetic lowering
//! - A compile-time preprocessor with list variables, macros, includes and
//!   JSON import
//! - Conditionals lowered onto selector filters, with `else` support
//! - User functions with parameters, defaults and return values
//! - Selector scoping with automatic `execute` alignment
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use mcc::{compile_file, Result};
//!
//! fn main() -> Result<()> {
//!     compile_file("main.mcc", "behavior_pack")?;
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Lexer**: source text to line-tagged tokens
//! 2. **Assembler**: tokens to statements with block sizes
//! 3. **Executor**: statements to command files, driving the preprocessor,
//!    scoreboard and directive implementations
//! 4. **Project writer**: files and assets under the output directory

pub mod cli;
pub mod compiler;
pub mod core;
pub mod error;

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

pub use compiler::backend::{Asset, AssetKind, CommandFile, Project};
pub use compiler::compile_project;
pub use compiler::middle_end::session::{CompilerSession, Feature};
pub use error::{CompilerError, Result};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compiler build information
pub const BUILD_INFO: CompilerInfo = CompilerInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    language_version: core::constants::MCC_VERSION,
    supported_features: &["nulls", "gametest", "exploders", "uninstall"],
};

#[derive(Debug, Clone)]
pub struct CompilerInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// MCC language revision this compiler follows.
    pub language_version: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Compilation options and settings
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Enable debug mode with extra logging
    pub debug_mode: bool,

    /// Name of the root function file; defaults to the source file's stem
    pub project_name: Option<String>,

    /// Directories searched by `$include` and `$json` after the source's own
    pub include_directories: Vec<String>,

    /// Preprocessor variables set before the first statement
    pub custom_variables: HashMap<String, String>,

    /// Features enabled before the first statement
    pub features: Vec<String>,

    /// Value of the `minecraftversion` preprocessor variable
    pub target_version: Option<String>,
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Original source size in bytes
    pub source_size: u64,

    /// Total size of everything written, in bytes
    pub output_size: u64,

    /// Number of assembled top-level statements
    pub statement_count: usize,

    /// Number of function files produced
    pub file_count: usize,

    /// Number of commands across all function files
    pub command_count: usize,

    /// Number of auxiliary assets produced
    pub asset_count: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Main compiler entry point with default options
pub fn compile_file(input_path: &str, output_dir: &str) -> Result<CompilationStats> {
    compile_file_with_options(input_path, output_dir, CompilerOptions::default())
}

/// Compile `input_path` and write the project under `output_dir`.
pub fn compile_file_with_options(
    input_path: &str,
    output_dir: &str,
    options: CompilerOptions,
) -> Result<CompilationStats> {
    let start_time = Instant::now();

    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Compiling '{}' into '{}'...", input_path, output_dir);
        log::debug!("Compiler options: {:?}", options);
    }

    let (project, mut stats) = compile_path(input_path, &options)?;

    stats.output_size = write_project(&project, output_dir)?;
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    for message in &project.log_messages {
        log::info!("{}", message);
    }
    if options.debug_mode {
        log::info!("Compilation successful!");
        log::info!("Files: {}, commands: {}", stats.file_count, stats.command_count);
        log::info!("Output size: {} bytes", stats.output_size);
        log::info!("Compile time: {}ms", stats.compile_time_ms);
    }

    Ok(stats)
}

/// Write a compiled project under `output_dir`, returning the bytes written.
pub fn write_project(project: &Project, output_dir: &str) -> Result<u64> {
    let written = project.write_all(Path::new(output_dir))?;
    Ok(written
        .iter()
        .filter_map(|path| fs::metadata(path).ok())
        .map(|meta| meta.len())
        .sum())
}

/// Compile a file into memory without writing anything.
pub fn compile_path(input_path: &str, options: &CompilerOptions) -> Result<(Project, CompilationStats)> {
    let source = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;
    let mut session = CompilerSession::new()?;
    compile_project(&source, input_path, options, &mut session)
}

/// Compile MCC source text into a project with default options
pub fn compile_source(source: &str, filename: &str) -> Result<Project> {
    let (project, _stats) = compile_source_with_options(source, filename, CompilerOptions::default())?;
    Ok(project)
}

/// Compile MCC source text into a project with custom options
pub fn compile_source_with_options(
    source: &str,
    filename: &str,
    options: CompilerOptions,
) -> Result<(Project, CompilationStats)> {
    let mut session = CompilerSession::new()?;
    compile_project(source, filename, &options, &mut session)
}

/// Batch-mode compilation: success or failure only. Errors are logged, not
/// returned.
pub fn compile_file_silent(input_path: &str, options: &CompilerOptions) -> bool {
    match compile_path(input_path, options) {
        Ok(_) => true,
        Err(e) => {
            log::debug!("{}: {}", input_path, e);
            false
        }
    }
}

/// Check if the compiler knows a feature by name
pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

/// Get compiler build information
pub fn build_info() -> &'static CompilerInfo {
    &BUILD_INFO
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_features_match_parser() {
        for name in BUILD_INFO.supported_features {
            assert!(Feature::parse(name).is_some(), "{}", name);
        }
        assert!(supports_feature("nulls"));
        assert!(!supports_feature("flying"));
    }

    #[test]
    fn test_compile_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("empty.mcc");
        let output_dir = temp_dir.path().join("out");
        fs::write(&input_path, "").unwrap();

        let stats = compile_file(input_path.to_str().unwrap(), output_dir.to_str().unwrap()).unwrap();
        assert_eq!(stats.source_size, 0);
        assert_eq!(stats.file_count, 1);
        assert!(output_dir.join("functions/empty.mcfunction").exists());
    }

    #[test]
    fn test_compile_writes_tree() {
        let temp_dir = TempDir::new().unwrap();
        let input_path = temp_dir.path().join("game.mcc");
        let output_dir = temp_dir.path().join("out");
        let source = "define int score = 0\nselect @a[tag=playing] {\nscore += 1\nif score >= 10 {\nglobalprint \"{@s} wins\"\nhalt\n}\n}";
        fs::write(&input_path, source).unwrap();

        let stats = compile_file(input_path.to_str().unwrap(), output_dir.to_str().unwrap()).unwrap();
        assert!(stats.output_size > 0);
        let root = fs::read_to_string(output_dir.join("functions/game.mcfunction")).unwrap();
        assert!(root.starts_with("scoreboard objectives add score dummy"));
        assert!(output_dir.join("functions/compiler/halt_execution.mcfunction").exists());
    }

    #[test]
    fn test_compile_source_error_has_line() {
        let err = compile_source("define int a\n\na = b", "test.mcc").unwrap_err();
        match err {
            CompilerError::Statement { line, code, .. } => {
                assert_eq!(line, 3);
                assert_eq!(code, "a = b");
            }
            other => panic!("Expected statement error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_statement_is_tokenizer_error() {
        match compile_source("this is not mcc", "test.mcc").unwrap_err() {
            CompilerError::Tokenizer { line, .. } => assert_eq!(line, 1),
            other => panic!("Expected tokenizer error, got {:?}", other),
        }
    }

    #[test]
    fn test_silent_mode() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.mcc");
        let bad = temp_dir.path().join("bad.mcc");
        fs::write(&good, "say \"hi\"").unwrap();
        fs::write(&bad, "say").unwrap();
        let options = CompilerOptions::default();
        assert!(compile_file_silent(good.to_str().unwrap(), &options));
        assert!(!compile_file_silent(bad.to_str().unwrap(), &options));
        assert!(!compile_file_silent("missing.mcc", &options));
    }
}
