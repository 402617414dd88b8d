//! The artifact interpreter.
//!
//! Runs a compiled template artifact against a data context and captures
//! everything it outputs.

use crate::context::Context;
use crate::error::Error;
use crate::eval;
use crate::parser;
use crate::runtime::Runtime;

/// Executes compiled artifacts.
///
/// Artifacts run with full trust: code islands are evaluated as written.
pub struct Interpreter {
    /// Runtime environment with variable bindings and the output buffer.
    runtime: Runtime,
}

impl Interpreter {
    /// Create a new interpreter with no bindings.
    pub fn new() -> Self {
        Self {
            runtime: Runtime::new(),
        }
    }

    /// Create an interpreter with the data context bound as globals.
    pub fn with_context(context: &Context) -> Self {
        let mut runtime = Runtime::new();
        runtime.bind_context(context);
        Self { runtime }
    }

    /// Get a reference to the runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Parse and execute an artifact, returning the captured output.
    ///
    /// Output produced before a failure is discarded.
    pub fn run(&mut self, artifact: &str) -> crate::Result<String> {
        let program = parser::parse(artifact)?;
        tracing::trace!(statements = program.statements.len(), "executing artifact");

        match eval::eval_program(&program, &mut self.runtime) {
            Ok(()) => Ok(self.runtime.take_output()),
            Err(e) => {
                self.runtime.take_output();
                Err(e)
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute an artifact against a data context in a fresh interpreter.
pub fn execute(artifact: &str, context: &Context) -> Result<String, Error> {
    Interpreter::with_context(context).run(artifact)
}
