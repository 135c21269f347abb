//! Nexo CLI
//!
//! Command-line interface for Nexo - media reviews and a personal library.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nexo_core::{open_store, Category, Config, Session, Status, SyncController};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "nexo")]
#[command(about = "Nexo - Reviews and a personal library for games, anime, films and series")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Act as this user (reviews are signed with the name)
    #[arg(long = "as", value_name = "NAME", global = true)]
    as_user: Option<String>,

    /// Use this config file instead of the default
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage reviews
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Manage your library
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },
    /// Talk to the REST API directly
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (store, session, counts)
    Status,
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Write a review
    #[command(alias = "create")]
    Add {
        /// Title being reviewed
        subject: String,
        /// games, anime, films or series
        #[arg(short, long)]
        category: Option<Category>,
        /// Score from 1 to 5
        #[arg(short, long, allow_negative_numbers = true)]
        score: Option<i64>,
        /// Review text
        #[arg(short, long)]
        body: String,
        /// Section tag (defaults to the category)
        #[arg(long)]
        section: Option<String>,
        /// Cover image URL
        #[arg(long, value_name = "URL")]
        image: Option<String>,
    },
    /// List reviews
    #[command(alias = "ls")]
    List {
        /// Only reviews for this title
        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Delete a review
    #[command(alias = "delete")]
    Rm {
        /// Review ID (full or trailing digits)
        id: String,
    },
}

#[derive(Subcommand)]
enum LibraryCommands {
    /// Add a title to your library
    Add {
        /// games, anime, films or series
        category: Category,
        /// Title name
        name: String,
        /// completed, in-progress, pending or abandoned
        #[arg(short, long, default_value = "pending")]
        status: Status,
        /// Hours played (games only)
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Show your library
    #[command(alias = "ls")]
    Show {
        /// Only this category
        category: Option<Category>,
    },
    /// Count entries per category
    Stats,
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// List reviews on the server
    Reviews,
    /// Delete a review on the server
    DeleteReview {
        /// Review ID
        id: String,
    },
    /// Append an entry to your library on the server
    Append {
        /// games, anime, films or series
        category: Category,
        /// Title name
        name: String,
        /// completed, in-progress, pending or abandoned
        #[arg(short, long, default_value = "pending")]
        status: Status,
        /// Hours played (games only)
        #[arg(long)]
        hours: Option<u32>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, store, api_url, user_id, store_timeout_ms, date_format, log_level, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let mut config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    let session = cli.as_user.as_deref().map(Session::login);
    if let Some(ref session) = session {
        // The private namespace follows whoever is acting
        config.user_id = session.user_id.clone();
    }

    if let Commands::Remote { command } = cli.command {
        let client = commands::remote::client(&config)?;
        return handle_remote_command(command, &client, &config, &output).await;
    }

    let store = open_store(&config).context("Failed to open record store")?;
    let mut sync = SyncController::new(store)
        .with_timeout(config.store_timeout())
        .with_date_format(&config.date_format);
    sync.load_all().await;

    match cli.command {
        Commands::Review { command } => {
            handle_review_command(command, &mut sync, session.as_ref(), &output).await
        }
        Commands::Library { command } => {
            handle_library_command(command, &mut sync, session.as_ref(), &output).await
        }
        Commands::Status => commands::status::show(&sync, &config, session.as_ref(), &output).await,
        Commands::Remote { .. } | Commands::Config { .. } => Ok(()), // Handled above
    }
}

async fn handle_review_command(
    command: ReviewCommands,
    sync: &mut SyncController,
    session: Option<&Session>,
    output: &Output,
) -> Result<()> {
    match command {
        ReviewCommands::Add {
            subject,
            category,
            score,
            body,
            section,
            image,
        } => {
            let form = commands::review::ReviewForm {
                subject,
                category,
                score,
                body,
                section,
                image,
            };
            commands::review::add(sync, session, form, output).await
        }
        ReviewCommands::List { subject } => commands::review::list(sync, subject, output),
        ReviewCommands::Rm { id } => commands::review::delete(sync, id, output).await,
    }
}

async fn handle_library_command(
    command: LibraryCommands,
    sync: &mut SyncController,
    session: Option<&Session>,
    output: &Output,
) -> Result<()> {
    match command {
        LibraryCommands::Add {
            category,
            name,
            status,
            hours,
        } => commands::library::add(sync, session, category, name, status, hours, output).await,
        LibraryCommands::Show { category } => commands::library::show(sync, category, output),
        LibraryCommands::Stats => commands::library::stats(sync, output),
    }
}

async fn handle_remote_command(
    command: RemoteCommands,
    client: &nexo_core::api::ApiClient,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        RemoteCommands::Reviews => commands::remote::reviews(client, output).await,
        RemoteCommands::DeleteReview { id } => {
            commands::remote::delete_review(client, id, output).await
        }
        RemoteCommands::Append {
            category,
            name,
            status,
            hours,
        } => {
            commands::remote::append(client, &config.user_id, category, name, status, hours, output)
                .await
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Level comes from config.log_level (or NEXO_LOG_LEVEL). Logs go to
/// config.log_file when set, stderr otherwise.
fn init_logging(config: &Config) {
    let level = &config.log_level;
    let env_filter = EnvFilter::new(format!("nexo_core={},nexo_cli={}", level, level));

    match config.log_file {
        Some(ref log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .try_init();

            info!("Logging to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
