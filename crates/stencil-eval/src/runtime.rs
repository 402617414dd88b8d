//! Runtime environment for executing artifacts.

use std::collections::HashMap;

use crate::context::Context;
use crate::value::Value;

/// Variable scopes plus the captured output of one execution.
#[derive(Debug)]
pub struct Runtime {
    /// Variable bindings, organized as a stack of scopes.
    /// The outermost scope holds the data context.
    scopes: Vec<HashMap<String, Value>>,
    /// Everything echoed so far.
    output: String,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            output: String::new(),
        }
    }

    /// Bind every entry of the data context into the outermost scope.
    ///
    /// Names that are not valid identifiers cannot be referenced from a
    /// template and are skipped, as are names already bound.
    pub fn bind_context(&mut self, context: &Context) {
        let globals = &mut self.scopes[0];
        for (name, value) in context.iter() {
            if !is_identifier(name) {
                tracing::debug!(name = %name, "skipping context entry that is not an identifier");
                continue;
            }
            globals.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Append text to the captured output.
    pub fn emit(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// The output captured so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the captured output, leaving the buffer empty.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Push a new scope onto the scope stack (entering a loop body).
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the current scope from the stack.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Define a variable in the current scope, shadowing outer bindings.
    pub fn define_var(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    /// Get the value of a variable, searching from innermost to outermost scope.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Assign to a variable.
    ///
    /// Updates the nearest scope that already binds `name`; otherwise the
    /// variable is defined in the current scope.
    pub fn set_var(&mut self, name: &str, value: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.define_var(name, value);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get_var() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(42.0));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(42.0)));
    }

    #[test]
    fn test_undefined_var() {
        let rt = Runtime::default();
        assert_eq!(rt.get_var("x"), None);
    }

    #[test]
    fn test_set_var_updates_outer_binding() {
        let mut rt = Runtime::default();
        rt.define_var("total", Value::Number(1.0));
        rt.push_scope();
        rt.set_var("total", Value::Number(2.0));
        rt.pop_scope();
        assert_eq!(rt.get_var("total"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_scope_shadowing() {
        let mut rt = Runtime::default();
        rt.define_var("x", Value::Number(1.0));

        rt.push_scope();
        rt.define_var("x", Value::Number(2.0));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(2.0)));

        rt.pop_scope();
        assert_eq!(rt.get_var("x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_bind_context_skips_non_identifiers() {
        let mut context = Context::new();
        context.insert("title", "Home");
        context.insert("not-valid", "x");
        context.insert("9lives", "x");

        let mut rt = Runtime::default();
        rt.bind_context(&context);
        assert_eq!(rt.get_var("title"), Some(&Value::from("Home")));
        assert_eq!(rt.get_var("not-valid"), None);
        assert_eq!(rt.get_var("9lives"), None);
    }

    #[test]
    fn test_output_capture() {
        let mut rt = Runtime::default();
        rt.emit("a");
        rt.emit("b");
        assert_eq!(rt.output(), "ab");
        assert_eq!(rt.take_output(), "ab");
        assert_eq!(rt.output(), "");
    }
}
