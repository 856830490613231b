//! ptree - inspect reconciliation prefix trees

use clap::{Parser, Subcommand};
use recon_cli::{commands, CliConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ptree")]
#[command(about = "Build and inspect reconciliation prefix trees")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "RECON_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert elements from a file and print the root node
    Build {
        /// File with one hex element per line
        elements: PathBuf,
    },
    /// Insert elements from a file and print the node at KEY
    Show {
        /// File with one hex element per line
        elements: PathBuf,
        /// Node key as a bit string; empty for the root
        #[arg(default_value = "")]
        key: String,
    },
    /// List the sample points of the configured field
    Points,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("recon_cli={log_level},recon_ptree={log_level},recon_store={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig::load(args.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let output = match args.command {
        Command::Build { elements } => commands::build(&config, &elements).await?,
        Command::Show { elements, key } => commands::show(&config, &elements, &key).await?,
        Command::Points => commands::points(&config),
    };
    print!("{output}");
    Ok(())
}
