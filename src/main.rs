use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slack_mcp::config::Config;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Slack MCP server with natural-language search", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/slack-mcp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio (default)
    Serve,

    /// Run one smart search and print the report
    Search {
        /// Natural-language query
        query: String,

        /// Only search this channel id
        #[arg(long)]
        channel: Option<String>,

        /// Maximum matching messages
        #[arg(long, default_value_t = 10)]
        max_results: usize,

        /// Skip the summary paragraph
        #[arg(long)]
        no_summary: bool,
    },

    /// List channels the bot can access
    Channels,

    /// Show the effective configuration (secrets redacted)
    Config,
}

/// Logs go to stderr: stdout carries the MCP protocol
fn setup_logging(verbose: bool) {
    let default = if verbose { "slack_mcp=debug" } else { "slack_mcp=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            commands::serve::execute(&config)?;
        }
        Commands::Search {
            query,
            channel,
            max_results,
            no_summary,
        } => {
            commands::search::execute(&config, query, channel, max_results, !no_summary)?;
        }
        Commands::Channels => {
            commands::channels::execute(&config)?;
        }
        Commands::Config => {
            commands::show_config::execute(&config)?;
        }
    }

    Ok(())
}
