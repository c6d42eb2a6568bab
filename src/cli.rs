// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface options for chip-sync.
#[derive(Parser, Debug)]
#[command(
    name = "chip-sync",
    version = env!("GIT_DESCRIBE"),
    about = "Chip certificate request and mail archival pipeline",
    long_about = None
)]
pub struct Cli {
    /// Path to config file (default: ./chip-sync.yml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Spreadsheet id, overriding the config file
    #[arg(short = 'S', long, env = "CHIP_SYNC_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Local download directory, overriding the config file
    #[arg(short = 'O', long, env = "CHIP_SYNC_DOWNLOAD_PATH")]
    pub download_path: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, help = "turn on debug logging")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Submit chat requests for chips without a status
    Request,
    /// Label today's response mails by month
    Label,
    /// Label, then download attachments of unprocessed mails
    Ingest,
    /// Upload the download directory to remote storage
    Upload,
    /// Mark chips whose file is in the download directory
    Reconcile,
    /// label → ingest → upload → reconcile
    Mail,
}
