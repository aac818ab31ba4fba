use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_ndn_engine::face::DEFAULT_NFD_SOCKET;

mod commands;

/// NDN schema producer/consumer demo
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Path to the forwarder's Unix socket
    #[clap(long, global = true, default_value = DEFAULT_NFD_SOCKET)]
    socket: String,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve versioned content under a prefix
    Produce {
        /// Prefix to attach at (NDN URI format)
        prefix: String,

        /// Content to serve (string)
        content: String,

        /// Freshness period in milliseconds
        #[clap(short, long, default_value = "1000")]
        freshness: u64,
    },

    /// Fetch one versioned Data packet under a prefix
    Consume {
        /// Prefix to fetch from (NDN URI format)
        prefix: String,

        /// Version to request; defaults to the current timestamp
        #[clap(long)]
        version: Option<u64>,

        /// Timeout in milliseconds
        #[clap(short, long, default_value = "4000")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Commands::Produce {
            prefix,
            content,
            freshness,
        } => {
            commands::produce::run(cli.socket, prefix, content, freshness).await?;
        }
        Commands::Consume {
            prefix,
            version,
            timeout,
        } => {
            commands::consume::run(cli.socket, prefix, version, timeout).await?;
        }
    }

    Ok(())
}
