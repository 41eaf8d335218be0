//! Clarissa release pipeline CLI.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod compose;
mod units;

#[derive(Parser)]
#[command(name = "clarissa")]
#[command(about = "Clarissa release pipeline definition", long_about = None)]
struct Cli {
    /// Release configuration file
    #[arg(long, global = true, env = "CLARISSA_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the function and pipeline stack templates
    Synth {
        /// Output directory
        #[arg(short, long, default_value = "cdk.out")]
        output: String,
    },
    /// Check that the release composes into a valid pipeline
    Validate,
    /// Print the pipeline's stages and artifact flow
    Graph,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Some(Commands::Synth { output }) => {
            commands::synth::run(config, &output)?;
        }
        Some(Commands::Validate) => {
            commands::validate(config)?;
        }
        Some(Commands::Graph) => {
            commands::graph(config)?;
        }
        None => {
            commands::synth::run(config, "cdk.out")?;
        }
    }

    Ok(())
}
