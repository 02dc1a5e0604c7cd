//! CLI entry point for bnd-cxx.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// bnd-cxx — generate an object-oriented C++ wrapper from a C declaration
/// catalogue.
#[derive(Parser, Debug)]
#[command(name = "bnd-cxx", version, about)]
struct Cli {
    /// Path to the bnd-cxx.toml configuration file.
    #[arg(default_value = "bnd-cxx.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_cxx=info")),
        )
        .init();

    let cli = Cli::parse();
    bnd_cxx::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
