/// Template engine: compile on demand, cache artifacts, execute them
///
/// The engine owns no per-template state between calls. Each render checks
/// the artifact against its template, recompiles with a fresh block
/// registry when stale, and runs the artifact in a fresh interpreter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use stencil_eval::Context;

use crate::cache::{self, CacheStore};
use crate::config::EngineConfig;
use crate::driver::Compiler;
use crate::error::Result;

pub struct Engine {
    config: EngineConfig,
    cache: CacheStore,
    compiler: Compiler,
    compiles: AtomicUsize,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cache: CacheStore::new(config.cache_dir.clone()),
            compiler: Compiler::new(config.compile_options()),
            compiles: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Render a template against a data context
    ///
    /// A freshly compiled artifact is executed from memory; a cached one is
    /// read back from disk.
    pub fn render(&self, path: impl AsRef<Path>, context: &Context) -> Result<String> {
        let (artifact, compiled) = self.refresh(path.as_ref())?;
        let code = match compiled {
            Some(code) => code,
            None => self.cache.read(&artifact)?,
        };
        let output = stencil_eval::execute(&code, context)?;
        Ok(output)
    }

    /// Make sure a fresh artifact exists for the template and return its path
    pub fn compile(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let (artifact, _) = self.refresh(path.as_ref())?;
        Ok(artifact)
    }

    /// Recompile the template if its artifact is stale, returning the
    /// artifact path and, when compiled just now, the artifact code
    fn refresh(&self, source: &Path) -> Result<(PathBuf, Option<String>)> {
        self.cache.ensure_directory()?;
        let artifact = self.cache.artifact_path_for(source);

        if !cache::is_stale(source, &artifact, self.config.cache_enabled) {
            tracing::debug!(template = %source.display(), "artifact fresh");
            return Ok((artifact, None));
        }

        tracing::debug!(template = %source.display(), "artifact stale, compiling");
        let output = self.compiler.compile(source)?;
        self.compiles.fetch_add(1, Ordering::Relaxed);
        self.cache.write(&artifact, &output.code)?;
        tracing::info!(
            template = %source.display(),
            artifact = %artifact.display(),
            "compiled template"
        );

        Ok((artifact, Some(output.code)))
    }

    /// Remove every cached artifact, returning how many were deleted
    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.clear()
    }

    /// Number of times the compiler actually ran
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }
}
