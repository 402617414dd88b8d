/// Engine configuration
///
/// Every field has a default, so a config file only needs the keys it
/// changes. Command-line flags are applied on top with the builder methods.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::driver::CompileOptions;
use crate::error::{CompileError, Result};

pub const DEFAULT_CACHE_DIR: &str = ".stencil-cache";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding compiled artifacts
    pub cache_dir: PathBuf,
    /// Reuse fresh artifacts instead of recompiling on every render
    pub cache_enabled: bool,
    /// Reject unknown block references and unterminated directives
    pub strict: bool,
    /// Maximum include nesting below the entry template
    pub max_include_depth: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_enabled: true,
            strict: false,
            max_include_depth: CompileOptions::DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| CompileError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Compiler options derived from this config
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new()
            .strict(self.strict)
            .max_include_depth(self.max_include_depth)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
