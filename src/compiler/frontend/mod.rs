//! Source text to statements.

pub mod assembler;
pub mod lexer;

use crate::compiler::middle_end::statement::Statement;
use crate::error::Result;
use assembler::Assembler;
use lexer::Lexer;

/// Lex and assemble one file's source.
pub fn parse_source(source: &str, file_name: &str) -> Result<Vec<Statement>> {
    let tokens = Lexer::new(source, file_name).tokenize()?;
    Assembler::new(source, file_name).assemble(tokens)
}
