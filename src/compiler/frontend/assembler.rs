//! Groups tokens into statements.
//!
//! Statements end at line breaks and at braces; every brace is a statement of
//! its own. An open block records how many statements sit between it and its
//! closing brace, nested ones included, so a skipped block can be stepped over
//! in one jump.

use crate::compiler::middle_end::directives::lookup_token;
use crate::compiler::middle_end::statement::{Statement, StatementKind};
use crate::core::{Token, TokenKind};
use crate::error::{CompilerError, Result};

pub struct Assembler<'a> {
    lines: Vec<&'a str>,
    filename: String,
}

impl<'a> Assembler<'a> {
    pub fn new(source: &'a str, filename: impl Into<String>) -> Self {
        Self { lines: source.lines().collect(), filename: filename.into() }
    }

    fn source_line(&self, line: usize) -> String {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    pub fn assemble(&self, tokens: Vec<Token>) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        let mut open_blocks: Vec<usize> = Vec::new();
        let mut pending: Vec<Token> = Vec::new();

        for token in tokens {
            let breaks_line = pending.last().map_or(false, |last| last.line != token.line);
            if breaks_line {
                statements.push(self.classify(std::mem::take(&mut pending)));
            }
            match token.kind {
                TokenKind::OpenBlock | TokenKind::CloseBlock => {
                    if !pending.is_empty() {
                        statements.push(self.classify(std::mem::take(&mut pending)));
                    }
                    let line = token.line;
                    if token.kind == TokenKind::OpenBlock {
                        open_blocks.push(statements.len());
                        let kind = StatementKind::OpenBlock { statements_inside: 0 };
                        statements.push(Statement::new(kind, Vec::new(), line, self.source_line(line)));
                    } else {
                        if let Some(open) = open_blocks.pop() {
                            let inside = statements.len() - open - 1;
                            statements[open].kind = StatementKind::OpenBlock { statements_inside: inside };
                        }
                        statements.push(Statement::new(StatementKind::CloseBlock, Vec::new(), line, self.source_line(line)));
                    }
                }
                _ => pending.push(token),
            }
        }
        if !pending.is_empty() {
            statements.push(self.classify(pending));
        }

        if let Some(open) = open_blocks.pop() {
            return Err(CompilerError::tokenizer(
                self.filename.clone(),
                statements[open].line,
                "Block is never closed.",
            ));
        }
        log::trace!("{}: {} statements", self.filename, statements.len());
        Ok(statements)
    }

    fn classify(&self, mut tokens: Vec<Token>) -> Statement {
        let line = tokens.first().map_or(0, |t| t.line);
        let source = self.source_line(line);

        if let Some(directive) = tokens.first().and_then(|t| lookup_token(&t.kind)) {
            tokens.remove(0);
            return Statement::new(StatementKind::Directive(directive), tokens, line, source);
        }
        let kind = match (tokens.first().map(|t| &t.kind), tokens.get(1).map(|t| &t.kind)) {
            (Some(TokenKind::Identifier(_)), Some(TokenKind::Assign(_))) => StatementKind::Operation,
            (Some(TokenKind::Identifier(_)), Some(TokenKind::OpenParen)) => StatementKind::FunctionCall,
            _ => StatementKind::Unknown,
        };
        Statement::new(kind, tokens, line, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontend::lexer::Lexer;

    fn assemble(source: &str) -> Vec<Statement> {
        let tokens = Lexer::new(source, "test").tokenize().unwrap();
        Assembler::new(source, "test").assemble(tokens).unwrap()
    }

    #[test]
    fn test_classification() {
        let statements = assemble("define int score\nscore += 2\nreset(score)\nint hp");
        match &statements[0].kind {
            StatementKind::Directive(d) => assert_eq!(d.name, "define"),
            other => panic!("Expected directive, got {:?}", other),
        }
        assert_eq!(statements[0].tokens.len(), 2);
        assert!(matches!(statements[1].kind, StatementKind::Operation));
        assert!(matches!(statements[2].kind, StatementKind::FunctionCall));
        assert!(matches!(statements[3].kind, StatementKind::Unknown));
        assert_eq!(statements[1].source, "score += 2");
    }

    #[test]
    fn test_preprocessor_keyword() {
        let statements = assemble("$var x 1 2");
        match &statements[0].kind {
            StatementKind::Directive(d) => assert_eq!(d.name, "$var"),
            other => panic!("Expected directive, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_block_sizes() {
        let statements = assemble("if a {\nsay \"x\"\nif b {\nsay \"y\"\n}\n}\nsay \"z\"");
        assert_eq!(statements[1].statements_inside(), Some(5));
        assert_eq!(statements[4].statements_inside(), Some(1));
        assert!(matches!(statements[7].kind, StatementKind::CloseBlock));
        assert_eq!(statements.len(), 9);
    }

    #[test]
    fn test_braces_split_a_line() {
        let statements = assemble("select @a {\n} else {\n}");
        assert!(matches!(statements[2].kind, StatementKind::CloseBlock));
        assert!(matches!(statements[3].kind, StatementKind::Directive(_)));
        assert!(statements[4].is_open_block());
        assert_eq!(statements[3].source, "} else {");
    }

    #[test]
    fn test_unclosed_block() {
        let tokens = Lexer::new("select @a {\nsay \"x\"", "test").tokenize().unwrap();
        let err = Assembler::new("select @a {\nsay \"x\"", "test").assemble(tokens).unwrap_err();
        assert_eq!(err.message(), "Block is never closed.");
    }
}
