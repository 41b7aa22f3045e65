//! chat-history-repair - restore chat sessions missing from the editor's session list
//!
#![doc = "Main entry point for the chat-history-repair CLI."]

use anyhow::Result;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_history_repair::cli::{Cli, Commands};
use chat_history_repair::commands::{self, TerminalConfirmer};
use chat_history_repair::config::Config;

fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config = Config::load(cli.config.as_deref(), &cli)?;

    // Validate configuration
    config.validate()?;

    let storage_root = config.storage_root()?;
    tracing::debug!("Using storage root: {}", storage_root.display());

    let status = match &cli.command {
        Commands::List { json } => {
            tracing::info!("Listing workspaces");
            commands::list::run_list(&storage_root, *json)?
        }
        Commands::Repair(args) => {
            tracing::info!("Starting repair");
            if args.dry_run {
                tracing::debug!("Dry run enabled");
            }
            commands::repair::run_repair(
                &storage_root,
                args,
                &config.repair,
                &mut TerminalConfirmer,
            )?
        }
    };

    Ok(ExitCode::from(status))
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "chat_history_repair=debug"
    } else {
        "chat_history_repair=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
