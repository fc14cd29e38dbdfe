//! stackform CLI
//!
//! Synthesizes the items-service deployment template.
//!
//! # Usage
//!
//! ```bash
//! # Write the template to the output directory
//! stackform synth
//!
//! # Write it somewhere else, under a different stack name
//! stackform synth --out build/templates --stack-name orders-service
//!
//! # Render the template to stdout without touching disk
//! stackform print
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stackform::config::SynthConfig;
use stackform::synth;

#[derive(Parser)]
#[command(name = "stackform")]
#[command(version = "0.1.0")]
#[command(about = "Compose and emit a deployment template for the provisioning platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file (falls back to STACKFORM_CONFIG, then
    /// ./stackform.yaml, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the stack name
    #[arg(long, global = true)]
    stack_name: Option<String>,

    /// Override the target environment
    #[arg(long, global = true)]
    environment: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the template and write it to the output directory
    Synth {
        /// Override the output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Emit the template to stdout
    Print,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = SynthConfig::load(cli.config.as_deref())?;
    if let Some(stack_name) = cli.stack_name {
        config.stack_name = stack_name;
    }
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }

    let template = synth::build_template(&config)?;

    match cli.command {
        Commands::Synth { out } => {
            let out_dir = out.unwrap_or_else(|| config.out_dir.clone());
            let path = synth::write_template(&template, &out_dir)?;
            println!("{}", path.display());
        }
        Commands::Print => {
            print!("{}", synth::render(&template)?);
        }
    }
    Ok(())
}
