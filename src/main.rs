//! MCCompiled command-line binary

use mcc::cli::Cli;
use std::process;

fn main() {
    let mut cli = Cli::new();
    // handlers print their own diagnostics
    if cli.run().is_err() {
        process::exit(1);
    }
}
