//! Workshop command line
//!
//! Runs the Workshop command from a terminal. `fetch` handles one link with
//! the same `-d`, `-i` and `-n` flags the chat command takes; `listen` reads
//! messages from stdin and reacts to any that start with a Workshop link.
//!
//! # Usage
//!
//! ```bash
//! workshop-cli fetch "https://steamcommunity.com/sharedfiles/filedetails/?id=2503216290" -d
//! workshop-cli --config workshop.json --out downloads listen
//! ```

mod console;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use console::ConsoleSession;
use std::path::PathBuf;
use tracing::{info, warn};
use workshop::{CommandOptions, CommandOutcome, UploadCapability, WorkshopCommand, WorkshopConfig};

#[derive(Parser)]
#[command(name = "workshop-cli")]
#[command(about = "Resolve and download Steam Workshop files", version, long_about = None)]
struct Cli {
    /// JSON configuration file; WORKSHOP_* variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory downloaded files are saved in
    #[arg(long, global = true, default_value = ".")]
    out: PathBuf,

    /// Print file links instead of downloading them
    #[arg(long, global = true)]
    link_only: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one link
    Fetch {
        url: String,
        /// Deliver without asking
        #[arg(short, long)]
        download: bool,
        /// Only show information
        #[arg(short, long)]
        info: bool,
        /// File name for a single-file delivery
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Read messages from stdin and handle Workshop links in them
    Listen,
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WorkshopConfig> {
    let config = match path {
        Some(path) => WorkshopConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => WorkshopConfig::from_env()
            .context("Invalid WORKSHOP_* environment configuration")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep stdout for chat output
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;
    let command = WorkshopCommand::new(config).context("Failed to set up HTTP clients")?;

    let capability = if cli.link_only {
        UploadCapability::Direct
    } else {
        UploadCapability::DownloadThenUpload
    };
    let session = ConsoleSession::stdin(cli.out.clone(), capability);

    match cli.command {
        Commands::Fetch { url, download, info, name } => {
            let options = CommandOptions { download, info, name };
            let message = session.with_message_id(1);
            let outcome = command.execute(&message, &url, &options).await?;
            info!("Finished: {}", outcome);
            if let CommandOutcome::Queued(watch) = outcome {
                let settled = watch.run(&message).await?;
                info!("aria2 jobs settled: {:?}", settled);
            }
        }
        Commands::Listen => {
            info!("Listening for Workshop links on stdin");
            let mut watches = Vec::new();
            let mut next_id = 1;
            while let Some(line) = session.read_line().await? {
                let id = next_id;
                next_id += 1;
                let message = session.with_message_id(id);
                match command.on_message(&message, &line).await {
                    Ok(Some(CommandOutcome::Queued(watch))) => {
                        info!("Message #{}: queued {} job(s)", id, watch.jobs().len());
                        let task = tokio::spawn(async move { watch.run(&message).await });
                        watches.push((id, task));
                    }
                    Ok(Some(outcome)) => info!("Message #{}: {}", id, outcome),
                    Ok(None) => {}
                    Err(e) => warn!("Message #{} could not be answered: {}", id, e),
                }
            }

            if !watches.is_empty() {
                info!("Waiting for {} aria2 watch(es) to finish", watches.len());
            }
            // Jobs queued before end of input still get their notice
            for (id, task) in watches {
                match task.await {
                    Ok(Ok(settled)) => info!("Message #{}: {:?}", id, settled),
                    Ok(Err(e)) => warn!("Message #{} could not be answered: {}", id, e),
                    Err(e) => warn!("aria2 watch for message #{} failed: {}", id, e),
                }
            }
        }
    }

    Ok(())
}
