// FILE: src/cli/handlers.rs
use crate::compiler::frontend::assembler::Assembler;
use crate::compiler::frontend::lexer::Lexer;
use crate::{
    compile_file_silent, compile_file_with_options, compile_path, write_project, CompilationStats, CompilerError,
    CompilerOptions, Project, Result,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Instant;

fn input_of(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>("input")
        .cloned()
        .ok_or_else(|| CompilerError::InvalidFormat { message: "No input file given".to_string() })
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let output_dir = cli.output_directory(matches, &input_path);
    let options = cli.build_compiler_options(matches)?;

    if matches.get_flag("silent") {
        return compile_silently(&input_path, &output_dir, options);
    }
    if matches.get_flag("watch") {
        watch_and_compile(&input_path, &output_dir, options)
    } else {
        compile_single_file(&input_path, &output_dir, options, matches.get_flag("stats"))
            .map_err(|e| report(&input_path, e))
    }
}

fn compile_silently(input_path: &str, output_dir: &str, options: CompilerOptions) -> Result<()> {
    compile_file_with_options(input_path, output_dir, options).map(|_| ())
}

fn compile_single_file(input_path: &str, output_dir: &str, options: CompilerOptions, show_stats: bool) -> Result<()> {
    println!("🔨 Compiling {} -> {}", input_path, output_dir);

    let compile_start = Instant::now();
    let (project, mut stats) = compile_path(input_path, &options)?;
    stats.output_size = write_project(&project, output_dir)?;
    stats.compile_time_ms = compile_start.elapsed().as_millis() as u64;

    for message in &project.log_messages {
        println!("   [log] {}", message);
    }
    println!("✅ Compilation successful!");
    println!("   Files: {}", stats.file_count);
    println!("   Output: {} bytes", stats.output_size);
    println!("   Time: {}ms", stats.compile_time_ms);

    if show_stats {
        print_detailed_stats(&stats, &project)?;
    }
    Ok(())
}

fn watch_and_compile(input_path: &str, output_dir: &str, options: CompilerOptions) -> Result<()> {
    println!("👀 Watching {} for changes...", input_path);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| watch_error("Failed to create file watcher", e))?;

    watcher
        .watch(Path::new(input_path), RecursiveMode::NonRecursive)
        .map_err(|e| watch_error("Failed to watch file", e))?;

    match compile_file_with_options(input_path, output_dir, options.clone()) {
        Ok(_) => println!("✅ Initial compilation successful"),
        Err(e) => eprintln!("❌ {}", e.report(input_path)),
    }

    loop {
        match rx.recv() {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                println!("🔄 File changed, recompiling...");
                match compile_file_with_options(input_path, output_dir, options.clone()) {
                    Ok(stats) => println!(
                        "✅ Recompiled successfully ({} files, {}ms)",
                        stats.file_count, stats.compile_time_ms
                    ),
                    Err(e) => eprintln!("❌ {}", e.report(input_path)),
                }
            }
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn watch_error(context: &str, e: notify::Error) -> CompilerError {
    CompilerError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e)))
}

fn print_detailed_stats(stats: &CompilationStats, project: &Project) -> Result<()> {
    println!("\n📊 Detailed Statistics:");
    println!("   Source size: {} bytes", stats.source_size);
    println!("   Statements: {}", stats.statement_count);
    println!("   Function files: {}", stats.file_count);
    println!("   Commands: {}", stats.command_count);
    println!("   Assets: {}", stats.asset_count);

    if let Some(largest) = project.files.iter().max_by_key(|file| file.len()) {
        println!("   Largest file: {} ({} commands)", largest.path(), largest.len());
    }
    if stats.file_count > 0 {
        println!(
            "   Commands per file: {:.1}",
            stats.command_count as f64 / stats.file_count as f64
        );
    }

    let json = serde_json::to_string_pretty(stats).map_err(|e| CompilerError::InvalidFormat {
        message: format!("JSON serialization error: {}", e),
    })?;
    log::debug!("Stats: {}", json);
    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let options = cli.build_compiler_options(matches)?;
    let recursive = matches.get_flag("recursive");

    let files = collect_sources(&input_path, recursive)?;
    let (total_files, error_files) = check_files(&files, &options);

    if files.len() > 1 {
        println!("\n📊 Check Summary:");
        println!("   Total files: {}", total_files);
        println!("   Files with errors: {}", error_files);
        if total_files > 0 {
            println!(
                "   Success rate: {:.1}%",
                (total_files - error_files) as f64 / total_files as f64 * 100.0
            );
        }
    }

    if error_files > 0 {
        Err(CompilerError::InvalidFormat {
            message: format!("{} of {} files have errors", error_files, total_files),
        })
    } else {
        Ok(())
    }
}

/// Every `.mcc` file a check covers, sorted for stable output.
fn collect_sources(input_path: &str, recursive: bool) -> Result<Vec<String>> {
    if !Path::new(input_path).is_dir() {
        return Ok(vec![input_path.to_string()]);
    }
    let walker = walkdir::WalkDir::new(input_path).max_depth(if recursive { usize::MAX } else { 1 });
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        let is_source = entry.path().extension().map_or(false, |ext| ext == "mcc");
        if entry.file_type().is_file() && is_source {
            files.push(entry.path().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

fn check_files(files: &[String], options: &CompilerOptions) -> (usize, usize) {
    let mut error_files = 0;
    for file in files {
        if compile_file_silent(file, options) {
            println!("✅ {}", file);
        } else {
            println!("❌ {}", file);
            error_files += 1;
        }
    }
    (files.len(), error_files)
}

// --- ANALYZE ---
pub fn handle_analyze_command(cli: &super::Cli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let options = cli.build_compiler_options(matches)?;
    println!("🔬 Analyzing {}", input_path);

    let analysis = analyze_file(&input_path, &options).map_err(|e| report(&input_path, e))?;
    println!("{}", analysis);
    Ok(())
}

fn analyze_file(input_path: &str, options: &CompilerOptions) -> Result<String> {
    let source = fs::read_to_string(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path, e),
    })?;
    let mut out = String::new();

    let tokens = Lexer::new(&source, input_path).tokenize()?;
    out.push_str(&format!("Tokens ({}):\n", tokens.len()));
    for token in &tokens {
        out.push_str(&format!("  {:>4}  {}\n", token.line, token));
    }

    let statements = Assembler::new(&source, input_path).assemble(tokens)?;
    out.push_str(&format!("\nStatements ({}):\n", statements.len()));
    for statement in &statements {
        out.push_str(&format!("  {:>4}  {:<24} {}\n", statement.line, statement.describe(), statement.source));
    }

    let (project, _stats) = compile_path(input_path, options)?;
    out.push_str(&format!("\nFiles ({}):\n", project.files.len()));
    for file in &project.files {
        out.push_str(&format!("  {}.mcfunction  ({} commands)\n", file.path(), file.len()));
    }
    if !project.assets.is_empty() {
        out.push_str(&format!("\nAssets ({}):\n", project.assets.len()));
        for asset in &project.assets {
            out.push_str(&format!("  {}\n", asset.relative_path().display()));
        }
    }
    Ok(out)
}

fn report(input_path: &str, e: CompilerError) -> CompilerError {
    eprintln!("❌ {}", e.report(input_path));
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_sources() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("lib");
        fs::create_dir(&nested).unwrap();
        fs::write(temp_dir.path().join("main.mcc"), "say \"hi\"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();
        fs::write(nested.join("util.mcc"), "say \"hi\"").unwrap();

        let root = temp_dir.path().to_str().unwrap();
        assert_eq!(collect_sources(root, false).unwrap().len(), 1);
        let all = collect_sources(root, true).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|f| f.ends_with("util.mcc")));
        assert_eq!(collect_sources("single.mcc", true).unwrap(), vec!["single.mcc"]);
    }

    #[test]
    fn test_check_counts_failures() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.mcc");
        let bad = temp_dir.path().join("bad.mcc");
        fs::write(&good, "define int x\nx += 1").unwrap();
        fs::write(&bad, "x += 1").unwrap();

        let files = vec![good.to_string_lossy().into_owned(), bad.to_string_lossy().into_owned()];
        assert_eq!(check_files(&files, &CompilerOptions::default()), (2, 1));
    }

    #[test]
    fn test_analyze_lists_everything() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("game.mcc");
        fs::write(&input, "define int score\nif score > 1 {\nsay \"a\"\nsay \"b\"\n}").unwrap();

        let analysis = analyze_file(input.to_str().unwrap(), &CompilerOptions::default()).unwrap();
        assert!(analysis.contains("directive define"));
        assert!(analysis.contains("open block (2)"));
        assert!(analysis.contains("game.mcfunction"));
        assert!(analysis.contains("compiler/branch0.mcfunction"));
    }

    #[test]
    fn test_silent_compile_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("quiet.mcc");
        let output = temp_dir.path().join("out");
        fs::write(&input, "say \"hi\"").unwrap();

        compile_silently(input.to_str().unwrap(), output.to_str().unwrap(), CompilerOptions::default()).unwrap();
        assert!(output.join("functions/quiet.mcfunction").exists());
    }
}
