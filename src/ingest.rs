// src/ingest.rs
//
// Downloads the attachments of today's category mails exactly once: a mail
// is marked with the downloaded label only after all of its attachments
// are safely on disk, and discovery excludes that label.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::cfg::config::Config;
use crate::cfg::label::MailLabel;
use crate::client_ops::{Clock, MailOps, MailQuery, MessageFormat};
use crate::error::{ApiError, ApiResult};
use crate::files;
use crate::labeler::MailLabeler;
use crate::message::AttachmentRef;
use crate::utils::{label_search_token, search_date};

/// base64url with or without padding, as mail providers are inconsistent about it.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_attachment(data: &str) -> ApiResult<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_URL_SAFE
        .decode(compact.as_bytes())
        .map_err(|e| ApiError::Decode(format!("attachment is not base64url: {}", e)))
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub download_dir: PathBuf,
    /// Category label the response mails carry.
    pub category_label: String,
    pub downloaded_label: String,
    pub max_results: usize,
    pub clear_download_dir: bool,
    pub archive_after_download: bool,
}

impl IngestOptions {
    pub fn from_config(cfg: &Config) -> Self {
        IngestOptions {
            download_dir: cfg.download_path.clone(),
            category_label: cfg.label_email.clone(),
            downloaded_label: cfg.downloaded_label.clone(),
            max_results: cfg.max_results_email,
            clear_download_dir: cfg.clear_download_dir,
            archive_after_download: cfg.archive_after_download,
        }
    }
}

/// One attachment's fate in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub filename: String,
    pub message_id: String,
    pub size: u64,
    /// Where it landed; `None` when the download failed.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub success: bool,
    pub error: Option<String>,
    pub total_messages: usize,
    pub total_attachments: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub labeled_downloaded: usize,
    pub archived: usize,
    pub files: Vec<FileRecord>,
}

impl IngestSummary {
    fn failure(error: String) -> Self {
        IngestSummary {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }
}

pub struct AttachmentIngestor<'a> {
    mail: &'a dyn MailOps,
    clock: &'a dyn Clock,
    opts: IngestOptions,
}

impl<'a> AttachmentIngestor<'a> {
    pub fn new(mail: &'a dyn MailOps, clock: &'a dyn Clock, opts: IngestOptions) -> Self {
        AttachmentIngestor { mail, clock, opts }
    }

    pub fn download_dir(&self) -> &Path {
        &self.opts.download_dir
    }

    /// Today's category mails that do not yet carry the downloaded label.
    pub fn discover_unprocessed(&self) -> ApiResult<Vec<String>> {
        let today = search_date(self.clock.today());
        let query = MailQuery {
            q: format!(
                "label:{} after:{} -label:{}",
                label_search_token(&self.opts.category_label),
                today,
                label_search_token(&self.opts.downloaded_label)
            ),
            label_ids: Vec::new(),
            max_results: self.opts.max_results,
        };
        let ids = self.mail.search(&query)?;
        if ids.is_empty() {
            warn!(
                "No new mails labeled '{}' for {}",
                self.opts.category_label, today
            );
        } else {
            info!("📥 {} new mail(s) labeled '{}'", ids.len(), self.opts.category_label);
        }
        Ok(ids)
    }

    pub fn extract_attachments(&self, message_id: &str) -> ApiResult<Vec<AttachmentRef>> {
        let message = self.mail.get_message(message_id, MessageFormat::Full)?;
        let attachments = message.attachments();
        debug!("Message {} has {} attachment(s)", message_id, attachments.len());
        Ok(attachments)
    }

    /// Fetch, decode and durably write one attachment. Never overwrites:
    /// a taken name gets a numeric suffix.
    pub fn download_one(&self, message_id: &str, attachment_id: &str, filename: &str) -> ApiResult<PathBuf> {
        let data = self.mail.get_attachment_data(message_id, attachment_id)?;
        let bytes = decode_attachment(&data)?;
        let dest = files::unique_destination(&self.opts.download_dir, &files::sanitize_filename(filename));
        files::write_durably(&dest, &bytes)?;
        info!("Downloaded {} ({} bytes)", dest.display(), bytes.len());
        Ok(dest)
    }

    fn prepare_dir(&self) -> std::io::Result<()> {
        files::ensure_dir(&self.opts.download_dir)?;
        if self.opts.clear_download_dir {
            files::clear_files(&self.opts.download_dir)?;
        }
        Ok(())
    }

    pub fn process_all(&self) -> IngestSummary {
        info!("📎 Downloading attachments into {}", self.opts.download_dir.display());

        if let Err(e) = self.prepare_dir() {
            error!("Cannot prepare {}: {}", self.opts.download_dir.display(), e);
            return IngestSummary::failure(format!("download directory unavailable: {}", e));
        }

        let labeler = MailLabeler::new(self.mail, self.clock, self.opts.max_results);
        let downloaded_label = MailLabel::Downloaded(self.opts.downloaded_label.clone());
        let downloaded_id = match labeler.get_or_create_label(&downloaded_label.name()) {
            Ok(id) => id,
            Err(e) => {
                error!("Cannot resolve label '{}': {}", downloaded_label, e);
                return IngestSummary::failure(format!("label '{}' unavailable: {}", downloaded_label, e));
            }
        };

        let ids = match self.discover_unprocessed() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Mail search failed: {}", e);
                return IngestSummary::failure(format!("mail search failed: {}", e));
            }
        };

        let mut summary = IngestSummary {
            success: true,
            total_messages: ids.len(),
            ..Default::default()
        };
        let mut completed = Vec::new();

        for message_id in &ids {
            if self.process_message(message_id, &downloaded_id, &mut summary) {
                completed.push(message_id.clone());
            }
        }

        if self.opts.archive_after_download && !completed.is_empty() {
            let inbox = [MailLabel::Inbox.name()];
            match self.mail.batch_modify(&completed, &[], &inbox) {
                Ok(()) => {
                    info!("🗄️ Archived {} mail(s)", completed.len());
                    summary.archived = completed.len();
                }
                Err(e) => error!("Failed to archive {} mail(s): {}", completed.len(), e),
            }
        }

        info!(
            "Summary: {} mail(s), {} attachment(s), {} downloaded, {} failed, {} labeled",
            summary.total_messages,
            summary.total_attachments,
            summary.downloaded,
            summary.failed,
            summary.labeled_downloaded
        );
        summary
    }

    /// Download every attachment of one mail; true when the mail was labeled.
    fn process_message(&self, message_id: &str, downloaded_id: &str, summary: &mut IngestSummary) -> bool {
        debug!("Processing message {}", message_id);
        let attachments = match self.extract_attachments(message_id) {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to read message {}: {}", message_id, e);
                return false;
            }
        };
        summary.total_attachments += attachments.len();

        let mut all_ok = true;
        for att in &attachments {
            let path = match self.download_one(message_id, &att.attachment_id, &att.filename) {
                Ok(path) => {
                    summary.downloaded += 1;
                    Some(path)
                }
                Err(e) => {
                    error!("Failed to download {} from {}: {}", att.filename, message_id, e);
                    summary.failed += 1;
                    all_ok = false;
                    None
                }
            };
            summary.files.push(FileRecord {
                filename: att.filename.clone(),
                message_id: message_id.to_string(),
                size: att.size,
                path,
            });
        }

        if attachments.is_empty() {
            debug!("Message {} has no attachments; left unlabeled", message_id);
            return false;
        }
        if !all_ok {
            warn!("Message {} left unlabeled for retry", message_id);
            return false;
        }

        match self.mail.modify(message_id, &[downloaded_id.to_string()], &[]) {
            Ok(()) => {
                debug!("Labeled {} as downloaded", message_id);
                summary.labeled_downloaded += 1;
                true
            }
            Err(e) => {
                error!("Failed to label message {}: {}", message_id, e);
                false
            }
        }
    }
}
