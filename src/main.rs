mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use companion_memory::config::CompanionConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "companion-memory",
    version,
    about = "Persistent companion memory MCP server"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio, or HTTP when configured)
    Serve,
    /// Print the context block
    Context {
        /// Maximum block length in characters
        #[arg(long)]
        max_length: Option<usize>,
        /// Recent activity window in hours
        #[arg(long)]
        hours: Option<u32>,
        /// Restrict to these namespaces (repeatable)
        #[arg(long = "namespace")]
        namespaces: Vec<String>,
    },
    /// Search entity names and observations
    Search {
        query: String,
        /// Restrict to these namespaces (repeatable)
        #[arg(long = "namespace")]
        namespaces: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Full-text search over the journal
    Journal {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show record and journal statistics
    Stats {
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Check both databases and print a health report
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CompanionConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Context {
            max_length,
            hours,
            namespaces,
        } => cli::context::context(&config, max_length, hours, &namespaces)?,
        Command::Search {
            query,
            namespaces,
            limit,
        } => cli::search::search(&config, &query, &namespaces, limit)?,
        Command::Journal { query, limit } => cli::search::journal(&config, &query, limit)?,
        Command::Stats { namespace } => cli::stats::stats(&config, namespace.as_deref())?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
