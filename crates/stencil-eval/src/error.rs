//! Error types for artifact execution.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The artifact script could not be tokenized or parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Evaluation failed (type error, unknown function, bad iteration target).
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }
}
