/// Compiler driver that orchestrates the directive pipeline

use std::path::PathBuf;

use crate::blocks::BlockRegistry;
use crate::directive;
use crate::error::{CompileError, Result};
use crate::include::IncludeResolver;

/// Compilation output structure
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Source file that was compiled (entry point)
    pub source_file: PathBuf,
    /// Generated artifact script
    pub code: String,
    /// Blocks declared while compiling, with their final content
    pub blocks: BlockRegistry,
    /// Every template read, entry point first
    pub includes: Vec<PathBuf>,
}

/// Options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Fail on unknown block references and unterminated directives
    /// instead of dropping them
    pub strict: bool,
    /// Maximum include nesting below the entry template
    pub max_include_depth: usize,
}

impl CompileOptions {
    pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

    pub fn new() -> Self {
        Self {
            strict: false,
            max_include_depth: Self::DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The Stencil directive compiler
///
/// Every call to [`Compiler::compile`] starts from an empty block registry,
/// so blocks never leak between unrelated templates.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with the given options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Run the full pipeline over one template
    pub fn compile(&self, source: impl Into<PathBuf>) -> Result<CompileOutput> {
        let source_file = source.into();
        tracing::debug!(file = %source_file.display(), "compiling template");

        // Pass 1: includes and extends
        let mut resolver = IncludeResolver::new(self.options.max_include_depth);
        let code = resolver.resolve(&source_file)?;

        // Pass 2: block declarations
        let mut blocks = BlockRegistry::new();
        let code = directive::extract_block_declarations(&code, &mut blocks);

        // Pass 3: block references
        let (code, unknown) = directive::substitute_block_references(&code, &blocks);
        if let Some(name) = unknown.first() {
            if self.options.strict {
                return Err(CompileError::UnknownBlock {
                    file: source_file,
                    name: name.clone(),
                });
            }
            tracing::debug!(file = %source_file.display(), blocks = ?unknown, "unknown block references dropped");
        }

        // Pass 4: raw code
        let code = directive::translate_raw_code(&code);

        // Pass 5: interpolation
        let code = directive::translate_interpolations(&code);

        if self.options.strict {
            if let Some(line) = directive::find_unterminated(&code) {
                return Err(CompileError::UnterminatedDirective {
                    file: source_file,
                    line,
                });
            }
        }

        tracing::debug!(
            file = %source_file.display(),
            bytes = code.len(),
            blocks = blocks.len(),
            templates = resolver.visited().len(),
            "compiled template"
        );

        Ok(CompileOutput {
            source_file,
            code,
            blocks,
            includes: resolver.visited().to_vec(),
        })
    }
}
