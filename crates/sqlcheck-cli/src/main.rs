use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "sqlcheck",
    version,
    about = "Validate SQL embedded in source files against a live database"
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every fragment in the given files and print diagnostics.
    Check {
        /// Configuration file (defaults to ./sqlcheck.yaml when present)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Directory file identities are relative to (defaults to the current directory)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Print diagnostics as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the fragments found in the given files with their identities.
    Fragments {
        #[arg(long, short)]
        config: Option<PathBuf>,

        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Also print each fragment's text
        #[arg(long, default_value_t = false)]
        text: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the identity of a fragment's text.
    Hash {
        /// Seed for the hash (identities always use 0)
        #[arg(long, default_value_t = 0)]
        seed: u32,

        /// Hash the text as given instead of normalizing it first
        #[arg(long, default_value_t = false)]
        raw: bool,

        text: String,
    },

    /// Connect to the configured database and run a health check.
    Ping {
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Database URL, overriding the configuration file
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Check {
            config,
            workspace,
            json,
            files,
        } => commands::check::run(config, workspace, json, files).await,
        Command::Fragments {
            config,
            workspace,
            text,
            files,
        } => commands::fragments::run(config, workspace, text, files),
        Command::Hash { seed, raw, text } => {
            commands::hash::run(seed, raw, &text);
            Ok(ExitCode::SUCCESS)
        }
        Command::Ping {
            config,
            database_url,
        } => commands::ping::run(config, database_url).await,
    }
}
