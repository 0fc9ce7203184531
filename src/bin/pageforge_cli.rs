//! PageForge CLI - Build-Step Interface
//!
//! Commands: compile, check, manifest
//! Outputs JSON to stdout, diagnostics to stderr
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pageforge_core::{
    pipeline::{CompilationPipeline, CompileOptions},
    registry::RegistryPublisher,
};

#[derive(Parser)]
#[command(name = "pageforge-cli")]
#[command(about = "PageForge CLI - Page Metadata Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every authoring document and publish the artifact store
    Compile {
        /// Root directory of authoring documents
        #[arg(short, long, default_value = "pages")]
        source: PathBuf,

        /// Output root for compiled artifacts, pointers and the manifest
        #[arg(short, long, default_value = "dist")]
        out: PathBuf,
    },

    /// Validate and lower a single document without publishing it
    Check {
        /// Path to one authoring document
        file: PathBuf,
    },

    /// Print the persisted manifest
    Manifest {
        /// Output root the manifest was published to
        #[arg(short, long, default_value = "dist")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { source, out } => {
            let pipeline = CompilationPipeline::new(CompileOptions {
                authoring_root: source,
                output_root: out,
            });

            match pipeline.run() {
                Ok(report) => {
                    let output = serde_json::json!({
                        "success": true,
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::from(2) // Compilation failure
                }
            }
        }

        Commands::Check { file } => {
            let pipeline = CompilationPipeline::new(CompileOptions {
                authoring_root: PathBuf::new(),
                output_root: PathBuf::new(),
            });

            match pipeline.compile_file(&file) {
                Ok(definition) => {
                    let output = serde_json::json!({
                        "valid": true,
                        "definition": definition,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "valid": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::from(2) // Validation failure
                }
            }
        }

        Commands::Manifest { out } => {
            let publisher = RegistryPublisher::new(&out);
            match publisher.load_manifest() {
                Ok(manifest) => {
                    println!("{}", serde_json::to_string_pretty(&manifest).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!(r#"{{"error": "Failed to load manifest: {}"}}"#, e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
