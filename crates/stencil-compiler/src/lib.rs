/// Stencil template compiler
///
/// Compiles `{{ }}` directive templates with includes and block inheritance
/// into artifacts cached on disk, then executes them with `stencil-eval`.

pub mod blocks;
pub mod cache;
pub mod config;
pub mod directive;
pub mod driver;
pub mod engine;
pub mod error;
pub mod include;

pub use blocks::BlockRegistry;
pub use cache::{is_stale, CacheStore, ARTIFACT_SUFFIX};
pub use config::EngineConfig;
pub use driver::{Compiler, CompileOptions, CompileOutput};
pub use engine::Engine;
pub use error::{CompileError, Result};
pub use include::IncludeResolver;
pub use stencil_eval::{Context, Value};
