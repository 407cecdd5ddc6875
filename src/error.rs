//! Error types for the MCC compiler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokenizer error in {file} at line {line}: {message}")]
    Tokenizer { file: String, line: usize, message: String },

    #[error("Error at line {line} ({code}): {message}")]
    Statement { line: usize, code: String, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn tokenizer(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Tokenizer {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn statement(line: usize, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Statement {
            line,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Tokenizer { line, .. } | Self::Statement { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The bare message without location decoration.
    pub fn message(&self) -> String {
        match self {
            Self::Tokenizer { message, .. } | Self::Statement { message, .. } => message.clone(),
            Self::InvalidFormat { message } => message.clone(),
            Self::FileNotFound { path } => format!("File not found: {}", path),
            Self::Io(e) => e.to_string(),
        }
    }

    /// `file:line: message` for the command line, or just the message when
    /// there is no line to point at.
    pub fn report(&self, file: &str) -> String {
        match self.line() {
            Some(line) => format!("{}:{}: {}", file, line, self.message()),
            None => self.message(),
        }
    }
}

/// Errors raised by compile-time value arithmetic, before a statement is known.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Invalid literal operation.")]
    InvalidOperation,

    #[error("Cannot compare {0} with {1}.")]
    Incomparable(&'static str, &'static str),

    #[error("Cannot divide by zero.")]
    DivideByZero,

    #[error("Index {index} is out of range (length {length}).")]
    IndexOutOfRange { index: i64, length: usize },
}

/// Errors raised by the counter model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreboardError {
    #[error("Name '{name}' is too long ({length} characters, max {max}).")]
    NameTooLong { name: String, length: usize, max: usize },

    #[error("No value named '{0}' exists.")]
    Unknown(String),

    #[error("Struct '{0}' has no field named '{1}'.")]
    NoField(String, String),

    #[error("Cannot create a temporary value for a {0} literal.")]
    NoTemporary(&'static str),

    #[error("Cannot operate on {0} and {1}.")]
    Incompatible(String, String),

    #[error("Cannot use a {0} literal with a value of type {1}.")]
    IncompatibleLiteral(&'static str, String),
}

/// Errors raised while manipulating preprocessor variables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessorError {
    #[error("Preprocessor variable '{0}' does not exist.")]
    Missing(String),

    #[error("Preprocessor variable '{name}': {source}")]
    Operation { name: String, source: ValueError },

    #[error("Preprocessor variable lengths didn't match.")]
    LengthMismatch,

    #[error("Can only exponentiate to an integer value.")]
    NonIntegerExponent,

    #[error("Couldn't {verb} preprocessor variable '{name}'.")]
    Aggregate { verb: &'static str, name: String },

    #[error("Index {index} is too large for preprocessor variable '{name}'. Max: {max}")]
    IndexTooLarge { index: i64, name: String, max: i64 },

    #[error("Index cannot be less than zero (was {0}).")]
    NegativeIndex(i64),

    #[error("JSON Error: {0}")]
    Json(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_display() {
        let err = CompilerError::statement(4, "say \"hi\"", "Unreachable code detected.");
        assert_eq!(
            err.to_string(),
            "Error at line 4 (say \"hi\"): Unreachable code detected."
        );
        assert_eq!(err.line(), Some(4));
        assert_eq!(err.message(), "Unreachable code detected.");
        assert_eq!(err.report("main.mcc"), "main.mcc:4: Unreachable code detected.");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CompilerError = io.into();
        assert!(matches!(err, CompilerError::Io(_)));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_preprocessor_error_names_variable() {
        let err = PreprocessorError::Operation {
            name: "list".into(),
            source: ValueError::InvalidOperation,
        };
        assert!(err.to_string().contains("'list'"));
        assert_eq!(
            PreprocessorError::Missing("x".into()).to_string(),
            "Preprocessor variable 'x' does not exist."
        );
    }
}
