//! `slicekit` command line: inspect the effective config or run a demo
//! page against an in-memory catalog.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use slicekit::logging::init_tracing;
use slicekit::Config;

mod demo;

#[derive(Parser)]
#[command(name = "slicekit")]
#[command(about = "State-model runtime with cached page machines")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Drive one page machine against an in-memory catalog and print the state
    Demo {
        #[arg(value_enum)]
        page: DemoPage,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DemoPage {
    List,
    Detail,
    Normal,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    init_tracing(&config.logging);

    match cli.command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
            print!("{}", rendered);
            Ok(())
        }
        Commands::Demo { page } => {
            let state = demo::run(config, page).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
    }
}
