//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mcc::*;
use std::fs;
use tempfile::TempDir;

const GAME_LOOP: &str = r#"
define int score = 0
define int lives = 3
function bonus(int amount, int scale = 2) {
    return amount * scale + 1
}
select @a[tag=playing] {
    score += bonus(5)
    if score >= 100 {
        globalprint "{@s} reached {score} points"
        tag add winner
    } else {
        print "Score: {score}, lives: {lives}"
    }
}
"#;

fn bench_simple_compilation(c: &mut Criterion) {
    c.bench_function("simple_compilation", |b| {
        b.iter(|| compile_source(black_box("define int x = 5\nx += 2\nsay \"done\""), "simple.mcc").unwrap())
    });
}

fn bench_game_loop_compilation(c: &mut Criterion) {
    c.bench_function("game_loop_compilation", |b| {
        b.iter(|| compile_source(black_box(GAME_LOOP), "game.mcc").unwrap())
    });
}

fn bench_session_reuse(c: &mut Criterion) {
    let mut session = CompilerSession::new().unwrap();
    let options = CompilerOptions::default();
    c.bench_function("session_reuse", |b| {
        b.iter(|| compile_project(black_box(GAME_LOOP), "game.mcc", &options, &mut session).unwrap())
    });
}

fn bench_large_file_compilation(c: &mut Criterion) {
    let mut content = String::from("define int counter\n");
    for i in 0..500 {
        content.push_str(&format!("if counter == {} {{\nsay \"step {}\"\ncounter += 1\n}}\n", i, i));
    }

    c.bench_function("large_file_compilation", |b| {
        b.iter(|| compile_source(black_box(&content), "large.mcc").unwrap())
    });
}

fn bench_preprocessor_unrolling(c: &mut Criterion) {
    let content = "define int total\n$repeat 200 i\ntotal += $i\n";
    c.bench_function("preprocessor_unrolling", |b| {
        b.iter(|| compile_source(black_box(content), "unroll.mcc").unwrap())
    });
}

fn bench_write_project(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("game.mcc");
    let output_dir = temp_dir.path().join("out");
    fs::write(&input_path, GAME_LOOP).unwrap();

    c.bench_function("compile_and_write", |b| {
        b.iter(|| {
            compile_file(
                black_box(input_path.to_str().unwrap()),
                black_box(output_dir.to_str().unwrap()),
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_game_loop_compilation,
    bench_session_reuse,
    bench_large_file_compilation,
    bench_preprocessor_unrolling,
    bench_write_project
);
criterion_main!(benches);
