use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::eagle::{EagleApi, HttpEagleClient};

pub mod commands;

use self::commands::{GalleryArgs, NoteArgs, OpenArgs};

const LOG_FILE_NAME: &str = "eagle-sync.log";

#[derive(Parser, Debug)]
#[command(
    name = "eagle-sync",
    version,
    about = "Show Eagle folders next to your notes and push note tags back to Eagle"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over EAGLE_SYNC_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Eagle API base URL for this run
    #[arg(long)]
    pub api_url: Option<String>,

    /// Eagle API token for this run
    #[arg(long)]
    pub token: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the gallery panel for a note or a vault directory (default)
    Gallery(GalleryArgs),
    /// Print the gallery tiles of a note without the TUI
    Items(NoteArgs),
    /// Push the note's tags and the folder's tags to the Eagle folder
    SyncTags(NoteArgs),
    /// Check whether the Eagle API is reachable
    Status,
    /// Open an item in Eagle through its deep link
    Open(OpenArgs),
    /// Print the effective settings
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("EAGLE_SYNC_CONFIG", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli.command.unwrap_or(Commands::Gallery(GalleryArgs { path: None }));
    let log_file = matches!(command, Commands::Gallery(_)).then(|| paths.log_dir.join(LOG_FILE_NAME));
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(token) = cli.token {
        config.api_token = token;
    }
    let config = Arc::new(config);
    let api: Arc<dyn EagleApi> =
        Arc::new(HttpEagleClient::from_config(&config).context("creating Eagle API client")?);
    tracing::debug!(base_url = %config.api_base_url, "eagle client ready");

    match command {
        Commands::Gallery(args) => commands::run_gallery(config, api, args),
        Commands::Items(args) => commands::list_items(&config, api.as_ref(), args),
        Commands::SyncTags(args) => commands::sync_tags(&config, api.as_ref(), args),
        Commands::Status => commands::server_status(&config, api.as_ref()),
        Commands::Open(args) => commands::open_item(api.as_ref(), args),
        Commands::Config => commands::show_config(&config, &paths),
    }
}

/// Installs the global subscriber once. The TUI logs to a file so the
/// alternate screen is not overwritten; other commands log to stderr.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
