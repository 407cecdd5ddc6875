//! Command-line front end for the compiler.

mod config;
mod handlers;

use crate::error::{CompilerError, Result};
use crate::CompilerOptions;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Instant;

pub use config::ConfigFile;

pub struct Cli {
    config: ConfigFile,
    start_time: Instant,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"));

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path).map_err(|e| {
                eprintln!("❌ {}", e.message());
                e
            })?;
        }

        let result = match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("analyze", sub_matches)) => handlers::handle_analyze_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        };
        log::debug!("Finished in {}ms", self.start_time.elapsed().as_millis());
        result
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        // RUST_LOG still wins when set
        let _ = env_logger::Builder::new()
            .filter_level(log_level)
            .parse_default_env()
            .format_timestamp_secs()
            .try_init();
    }

    /// Output directory: the flag, then the config, then `<stem>_bp` beside
    /// the input.
    pub fn output_directory(&self, matches: &ArgMatches, input_path: &str) -> String {
        matches
            .try_get_one::<String>("output")
            .ok()
            .flatten()
            .cloned()
            .or_else(|| self.config.output_directory.clone())
            .unwrap_or_else(|| default_output_directory(input_path))
    }

    /// Merge command-line flags over the loaded config file.
    pub fn build_compiler_options(&self, matches: &ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions {
            debug_mode: flag(matches, "debug"),
            project_name: self.config.project_name.clone(),
            target_version: self.config.target_version.clone(),
            ..Default::default()
        };

        if let Some(include_dirs) = many(matches, "include") {
            options.include_directories.extend(include_dirs);
        }
        if let Some(config_includes) = &self.config.include_directories {
            options.include_directories.extend(config_includes.iter().cloned());
        }

        if let Some(defines) = many(matches, "define") {
            for define in defines {
                let (key, value) = parse_define(&define)?;
                options.custom_variables.insert(key, value);
            }
        }
        if let Some(config_vars) = &self.config.custom_variables {
            for (key, value) in config_vars {
                options.custom_variables.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        if let Some(features) = many(matches, "feature") {
            options.features.extend(features);
        }
        if let Some(config_features) = &self.config.features {
            for feature in config_features {
                if !options.features.contains(feature) {
                    options.features.push(feature.clone());
                }
            }
        }
        Ok(options)
    }
}

fn build_cli() -> Command {
    Command::new(crate::NAME)
        .version(crate::VERSION)
        .about(crate::DESCRIPTION)
        .author("MCCompiled Development Team")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (.json or .toml)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity (can be used multiple times)")
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile an MCC file into a function tree")
                .arg(Arg::new("input").help("Input MCC file").required(true).index(1))
                .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory"))
                .arg(Arg::new("define").short('D').long("define").value_name("VAR=VALUE").help("Set a preprocessor variable").action(ArgAction::Append))
                .arg(Arg::new("include").short('I').long("include").value_name("DIR").help("Add include directory").action(ArgAction::Append))
                .arg(Arg::new("feature").long("feature").value_name("NAME").help("Enable a feature before the first statement").action(ArgAction::Append))
                .arg(Arg::new("debug").short('d').long("debug").help("Enable debug mode with extra logging").action(ArgAction::SetTrue))
                .arg(Arg::new("stats").long("stats").help("Show detailed compilation statistics").action(ArgAction::SetTrue))
                .arg(Arg::new("silent").short('s').long("silent").help("Print nothing; report success through the exit status").action(ArgAction::SetTrue))
                .arg(Arg::new("watch").short('w').long("watch").help("Watch for file changes and recompile").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("check")
                .about("Check MCC files for errors without writing output")
                .arg(Arg::new("input").help("Input MCC file or directory").required(true).index(1))
                .arg(Arg::new("recursive").short('r').long("recursive").help("Check all MCC files in directory recursively").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("analyze")
                .about("Show tokens, statements and generated files for an MCC file")
                .arg(Arg::new("input").help("Input MCC file").required(true).index(1)),
        )
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

fn many(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches
        .try_get_many::<String>(id)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

fn parse_define(define: &str) -> Result<(String, String)> {
    match define.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(CompilerError::InvalidFormat {
            message: format!("Invalid variable definition: {}. Use VAR=VALUE format.", define),
        }),
    }
}

fn default_output_directory(input_path: &str) -> String {
    format!("{}_bp", crate::compiler::project_name_for(input_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["mcc", "compile"];
        argv.extend_from_slice(args);
        let matches = build_cli().try_get_matches_from(argv).unwrap();
        match matches.subcommand() {
            Some(("compile", sub)) => sub.clone(),
            other => panic!("Expected compile subcommand, got {:?}", other.map(|(name, _)| name)),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_flags_win_over_config() {
        let mut cli = Cli::new();
        cli.config.custom_variables = Some([("level".to_string(), "1".to_string()), ("mode".to_string(), "easy".to_string())].into());
        cli.config.features = Some(vec!["nulls".into()]);
        let matches = compile_matches(&["game.mcc", "-D", "level=5", "--feature", "exploders", "--feature", "nulls"]);

        let options = cli.build_compiler_options(&matches).unwrap();
        assert_eq!(options.custom_variables["level"], "5");
        assert_eq!(options.custom_variables["mode"], "easy");
        assert_eq!(options.features, vec!["exploders", "nulls"]);
        assert!(!options.debug_mode);
    }

    #[test]
    fn test_bad_define() {
        let cli = Cli::new();
        let matches = compile_matches(&["game.mcc", "-D", "novalue"]);
        assert!(cli.build_compiler_options(&matches).is_err());
        assert!(parse_define("=x").is_err());
        assert_eq!(parse_define("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }

    #[test]
    fn test_output_directory_fallbacks() {
        let mut cli = Cli::new();
        let matches = compile_matches(&["scripts/Game.mcc"]);
        assert_eq!(cli.output_directory(&matches, "scripts/Game.mcc"), "game_bp");

        cli.config.output_directory = Some("pack".into());
        assert_eq!(cli.output_directory(&matches, "scripts/Game.mcc"), "pack");

        let matches = compile_matches(&["scripts/Game.mcc", "-o", "out"]);
        assert_eq!(cli.output_directory(&matches, "scripts/Game.mcc"), "out");
    }
}
