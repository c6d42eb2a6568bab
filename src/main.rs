// src/main.rs

use clap::Parser;
use env_logger::{Builder, Target};
use eyre::{eyre, Result};
use log::{debug, error, info, LevelFilter};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chip_sync::api::{DriveClient, GmailClient, GoogleHttp, SheetsClient};
use chip_sync::cfg::config::{default_config_path, load_config_with_overrides, Config, ConfigOverrides};
use chip_sync::cli::{Cli, Command};
use chip_sync::client_ops::{RealClock, ThreadSleeper};
use chip_sync::ingest::{AttachmentIngestor, IngestOptions};
use chip_sync::labeler::MailLabeler;
use chip_sync::oauth2::AccessTokenProvider;
use chip_sync::reconcile::Reconciler;
use chip_sync::request::RequestService;
use chip_sync::uploader::ArchiveUploader;
use chip_sync::webdriver::WebDriverForm;

/// Writes every log line to stderr and to a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info).parse_default_env();
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.target(),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }

    builder.try_init().ok();
    Ok(())
}

/// Remote clients, built once per run.
struct Services<'a> {
    config: &'a Config,
    sheets: SheetsClient<'a>,
    gmail: GmailClient<'a>,
    drive: DriveClient<'a>,
    clock: RealClock,
    sleeper: ThreadSleeper,
}

impl Services<'_> {
    fn request(&self) -> Result<()> {
        let identity = self.config.form_identity()?;
        let mut form = WebDriverForm::new(&self.config.webdriver_url, self.config.prefs.clone(), &self.sleeper);
        let mut service = RequestService::new(
            &self.sheets,
            &mut form,
            identity,
            &self.config.spreadsheet_id,
            &self.config.range_name,
            self.config.max_group_size,
            &self.config.requested_status,
        );
        let report = service.run_from_sheet();
        stage_result("request", report.success, report.error)
    }

    fn label(&self) -> Result<()> {
        let labeler = MailLabeler::new(&self.gmail, &self.clock, self.config.max_results_email);
        let report = labeler.label_all_by_month(&self.config.label_email, &self.config.subject_filters());
        stage_result("label", report.success, report.error)
    }

    fn ingest(&self) -> Result<()> {
        let ingestor = AttachmentIngestor::new(&self.gmail, &self.clock, IngestOptions::from_config(self.config));
        let summary = ingestor.process_all();
        stage_result("ingest", summary.success, summary.error)
    }

    fn upload(&self) -> Result<()> {
        let uploader = ArchiveUploader::new(
            &self.drive,
            &self.clock,
            &self.sleeper,
            &self.config.drive_folder_id,
            &self.config.download_path,
            self.config.max_upload_retries,
        );
        let report = uploader.upload_all();
        stage_result("upload", report.success, report.error)
    }

    fn reconcile(&self) -> Result<()> {
        let reconciler = Reconciler::new(
            &self.sheets,
            &self.config.spreadsheet_id,
            &self.config.range_name,
            &self.config.download_path,
            &self.config.downloaded_status,
        );
        let outcome = reconciler
            .run()
            .map_err(|e| eyre!("reconcile failed: cannot list {}: {}", self.config.download_path.display(), e))?;
        let error = outcome.is_failure().then(|| outcome.to_string());
        stage_result("reconcile", !outcome.is_failure(), error)
    }

    fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Request => self.request(),
            Command::Label => self.label(),
            Command::Ingest => {
                self.label()?;
                self.ingest()
            }
            Command::Upload => self.upload(),
            Command::Reconcile => self.reconcile(),
            Command::Mail => {
                self.label()?;
                self.ingest()?;
                self.upload()?;
                self.reconcile()
            }
        }
    }
}

fn stage_result(stage: &str, success: bool, error: Option<String>) -> Result<()> {
    if success {
        info!("✅ {} finished", stage);
        Ok(())
    } else {
        let reason = error.unwrap_or_else(|| "unknown error".to_string());
        error!("❌ {} aborted: {}", stage, reason);
        Err(eyre!("{} aborted: {}", stage, reason))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug, cli.log_file.as_deref())?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let overrides = ConfigOverrides {
        spreadsheet_id: cli.spreadsheet_id.clone(),
        download_path: cli.download_path.clone(),
    };
    let config = load_config_with_overrides(&config_path, &overrides)?;
    debug!("Running {:?} with config {}", cli.command, config_path.display());

    let tokens = AccessTokenProvider::from_config(&config)?;
    let http = GoogleHttp::new(&tokens);
    let services = Services {
        config: &config,
        sheets: SheetsClient::new(&http),
        gmail: GmailClient::new(&http),
        drive: DriveClient::new(&http),
        clock: RealClock,
        sleeper: ThreadSleeper,
    };

    services.run(cli.command)
}
