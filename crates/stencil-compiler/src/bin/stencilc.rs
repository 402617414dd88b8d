/// Stencil command-line interface

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use stencil_compiler::{Context, Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stencilc")]
#[command(about = "Stencil - compile and render templates with block inheritance")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Directory for compiled artifacts
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Recompile on every run
    #[arg(long, global = true)]
    no_cache: bool,

    /// Fail on unknown blocks and unterminated directives
    #[arg(long, global = true)]
    strict: bool,

    /// JSON config file; flags override its values
    #[arg(long, value_name = "JSON_FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a template to stdout
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// JSON object whose fields become template variables
        #[arg(long, value_name = "JSON_FILE")]
        data: Option<PathBuf>,
    },

    /// Compile a template and print its artifact path
    Compile {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the artifact code instead of its path
        #[arg(long)]
        print: bool,
    },

    /// Delete every cached artifact
    ClearCache,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let engine = Engine::new(load_config(&args)?);

    match args.command {
        Command::Render { file, data } => {
            let context = match data {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read data file {}", path.display()))?;
                    Context::from_json(&text)
                        .with_context(|| format!("Invalid data file {}", path.display()))?
                }
                None => Context::new(),
            };
            let output = engine
                .render(&file, &context)
                .with_context(|| format!("Failed to render {}", file.display()))?;
            print!("{}", output);
        }
        Command::Compile { file, print } => {
            let artifact = engine
                .compile(&file)
                .with_context(|| format!("Failed to compile {}", file.display()))?;
            if print {
                let code = engine.cache().read(&artifact)?;
                print!("{}", code);
            } else {
                println!("{}", artifact.display());
            }
        }
        Command::ClearCache => {
            let removed = engine.clear_cache().context("Failed to clear cache")?;
            println!("{}", removed);
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(dir) = &args.cache_dir {
        config = config.cache_dir(dir);
    }
    if args.no_cache {
        config = config.cache_enabled(false);
    }
    if args.strict {
        config = config.strict(true);
    }

    Ok(config)
}
