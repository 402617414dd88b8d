/// Error types for the Stencil compiler and engine

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Template not found: {path}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write compiled template {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template execution failed: {0}")]
    Execution(#[from] stencil_eval::Error),

    #[error("Include cycle detected: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    IncludeCycle(Vec<PathBuf>),

    #[error("Include depth limit of {limit} exceeded while including {path}")]
    IncludeDepthExceeded { path: PathBuf, limit: usize },

    #[error("Unknown block '{name}' referenced in {file}")]
    UnknownBlock { file: PathBuf, name: String },

    #[error("Unterminated directive on line {line} of {file}")]
    UnterminatedDirective { file: PathBuf, line: usize },

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn source_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::SourceNotFound {
            path: path.into(),
            source,
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}
