//! Stencil artifact interpreter.
//!
//! Compiled templates are literal text interleaved with `<% ... %>` code
//! islands. This crate parses that script and executes it against a data
//! context, capturing the output. Failures are `Error` values propagated
//! with `?`.

mod ast;
mod context;
mod error;
mod eval;
mod interpreter;
mod lexer;
mod parser;
mod runtime;
mod value;

pub use ast::{BinOp, Block, Expr, Program, Statement, UnOp};
pub use context::Context;
pub use error::Error;
pub use interpreter::{execute, Interpreter};
pub use lexer::{ISLAND_CLOSE, ISLAND_OPEN};
pub use parser::parse;
pub use runtime::Runtime;
pub use value::Value;

/// Result type for interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;
