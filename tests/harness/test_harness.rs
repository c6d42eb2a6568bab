// tests/harness/test_harness.rs
//
// High-level test harness combining all components.
// Wires the in-memory mailbox, drive, sheet and clock into the pipeline
// stages so a test reads like one run of the tool.

use chip_sync::ingest::{AttachmentIngestor, IngestOptions};
use chip_sync::labeler::MailLabeler;
use chip_sync::reconcile::Reconciler;
use chip_sync::uploader::ArchiveUploader;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::harness::virtual_clock::{RecordingSleeper, VirtualClock};
use crate::harness::virtual_drive::VirtualDrive;
use crate::harness::virtual_mailbox::{MailboxMessage, VirtualMailbox};
use crate::harness::virtual_sheet::VirtualSheet;

pub const CATEGORY: &str = "IDU";
pub const SUBJECT: &str = "Paz y salvo";
pub const DOWNLOADED: &str = "DESCARGADO";
pub const ROOT_FOLDER: &str = "root-folder";
pub const SPREADSHEET: &str = "sheet-1";
pub const RANGE: &str = "Hoja 1!A1:B";

pub struct TestHarness {
    pub mailbox: VirtualMailbox,
    pub drive: VirtualDrive,
    pub sheet: VirtualSheet,
    pub clock: VirtualClock,
    pub sleeper: RecordingSleeper,
    pub max_retries: u32,
    pub clear_download_dir: bool,
    pub archive_after_download: bool,
    workdir: TempDir,
}

impl TestHarness {
    /// Harness pinned to 2025-02-14 with an empty sheet.
    pub fn new() -> Self {
        Self::on(2025, 2, 14)
    }

    pub fn on(year: i32, month: u32, day: u32) -> Self {
        Self {
            mailbox: VirtualMailbox::new(),
            drive: VirtualDrive::new(),
            sheet: VirtualSheet::new(&[&["CHIPS", "ESTADO"]]),
            clock: VirtualClock::on(year, month, day),
            sleeper: RecordingSleeper::new(),
            max_retries: 5,
            clear_download_dir: true,
            archive_after_download: false,
            workdir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn with_sheet(mut self, rows: &[&[&str]]) -> Self {
        self.sheet = VirtualSheet::new(rows);
        self
    }

    // ===== Mailbox =====

    pub fn today(&self) -> NaiveDate {
        use chip_sync::Clock;
        self.clock.today()
    }

    /// Add a mail received today, already carrying the category label.
    pub fn add_category_mail(&self, id: &str, attachments: &[(&str, &[u8])]) {
        let category = self
            .mailbox
            .label_id(CATEGORY)
            .unwrap_or_else(|| self.mailbox.add_label(CATEGORY));
        let mut msg = MailboxMessage::new(id, SUBJECT, self.today())
            .with_date("Fri, 14 Feb 2025 09:15:00 -0500")
            .with_labels(&[category.as_str()]);
        for (name, content) in attachments {
            msg = msg.with_attachment(name, content);
        }
        self.mailbox.add_message(msg);
    }

    // ===== Local files =====

    pub fn download_dir(&self) -> PathBuf {
        self.workdir.path().join("downloads")
    }

    pub fn write_local(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.download_dir();
        std::fs::create_dir_all(&dir).expect("create download dir");
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write local file");
        path
    }

    /// Sorted file names in the download directory.
    pub fn local_files(&self) -> Vec<String> {
        local_names(&self.download_dir())
    }

    // ===== Stages =====

    pub fn labeler(&self) -> MailLabeler<'_> {
        MailLabeler::new(&self.mailbox, &self.clock, 500)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            download_dir: self.download_dir(),
            category_label: CATEGORY.to_string(),
            downloaded_label: DOWNLOADED.to_string(),
            max_results: 500,
            clear_download_dir: self.clear_download_dir,
            archive_after_download: self.archive_after_download,
        }
    }

    pub fn ingestor(&self) -> AttachmentIngestor<'_> {
        AttachmentIngestor::new(&self.mailbox, &self.clock, self.ingest_options())
    }

    pub fn uploader(&self) -> ArchiveUploader<'_> {
        ArchiveUploader::new(
            &self.drive,
            &self.clock,
            &self.sleeper,
            ROOT_FOLDER,
            &self.download_dir(),
            self.max_retries,
        )
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.sheet, SPREADSHEET, RANGE, &self.download_dir(), DOWNLOADED)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn local_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
