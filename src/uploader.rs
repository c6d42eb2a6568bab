// src/uploader.rs
//
// Files the local download directory into Root/YYYY/MM MonthName.

use chrono::Datelike;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::client_ops::{Clock, DriveOps, NameMatch, Sleeper};
use crate::error::ApiResult;
use crate::files;
use crate::utils::{backoff_delay, month_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub success: bool,
    pub error: Option<String>,
    pub uploaded: Vec<UploadedFile>,
    /// Names of files that exhausted their retries.
    pub failed: Vec<String>,
    pub month_folder_id: Option<String>,
}

impl UploadReport {
    fn failure(error: String) -> Self {
        UploadReport {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Name of a freshly created month folder (`"02 Febrero"`).
pub fn month_folder_name(month: u32) -> String {
    format!("{:02} {}", month, month_name(month))
}

pub struct ArchiveUploader<'a> {
    drive: &'a dyn DriveOps,
    clock: &'a dyn Clock,
    sleeper: &'a dyn Sleeper,
    root_folder_id: String,
    local_dir: PathBuf,
    /// Retries after the first attempt.
    max_retries: u32,
}

impl<'a> ArchiveUploader<'a> {
    pub fn new(
        drive: &'a dyn DriveOps,
        clock: &'a dyn Clock,
        sleeper: &'a dyn Sleeper,
        root_folder_id: &str,
        local_dir: &Path,
        max_retries: u32,
    ) -> Self {
        ArchiveUploader {
            drive,
            clock,
            sleeper,
            root_folder_id: root_folder_id.to_string(),
            local_dir: local_dir.to_path_buf(),
            max_retries,
        }
    }

    /// Folder named exactly the current year under the root, created if absent.
    pub fn resolve_year_folder(&self) -> ApiResult<String> {
        let year = self.clock.today().year().to_string();
        let found = self
            .drive
            .find_folders(&self.root_folder_id, &NameMatch::Exact(year.clone()))?;
        if let Some(folder) = found.into_iter().next() {
            debug!("Year folder {} is {}", year, folder.id);
            return Ok(folder.id);
        }
        let id = self.drive.create_folder(&self.root_folder_id, &year)?;
        info!("📁 Created year folder {}", year);
        Ok(id)
    }

    /// First folder under the year whose name starts with the month code,
    /// created as `"MM MonthName"` if there is none.
    pub fn resolve_month_folder(&self, year_folder_id: &str) -> ApiResult<String> {
        let month = self.clock.today().month();
        let code = format!("{:02}", month);
        let candidates = self
            .drive
            .find_folders(year_folder_id, &NameMatch::Contains(code.clone()))?;
        if candidates.len() > 1 {
            debug!("{} folders mention month {}; taking the first prefix match", candidates.len(), code);
        }
        if let Some(folder) = candidates.into_iter().find(|f| f.name.starts_with(&code)) {
            debug!("Month folder '{}' is {}", folder.name, folder.id);
            return Ok(folder.id);
        }
        let name = month_folder_name(month);
        let id = self.drive.create_folder(year_folder_id, &name)?;
        info!("📁 Created month folder '{}'", name);
        Ok(id)
    }

    /// Upload with back-off: one attempt plus `max_retries` retries,
    /// sleeping 1s, 2s, 4s, ... in between.
    pub fn upload_one(&self, path: &Path, filename: &str, folder_id: &str) -> Option<String> {
        let attempts = self.max_retries + 1;
        for attempt in 0..attempts {
            match self.drive.upload_file(path, filename, folder_id) {
                Ok(id) => {
                    info!("⬆️ Uploaded {} ({})", filename, id);
                    return Some(id);
                }
                Err(e) if attempt + 1 < attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Upload of {} failed ({}); retrying in {}s",
                        filename,
                        e,
                        delay.as_secs()
                    );
                    self.sleeper.sleep(delay);
                }
                Err(e) => {
                    error!("Giving up on {} after {} attempt(s): {}", filename, attempts, e);
                }
            }
        }
        None
    }

    pub fn upload_all(&self) -> UploadReport {
        info!("☁️ Uploading {} to remote storage", self.local_dir.display());

        let month_folder_id = match self
            .resolve_year_folder()
            .and_then(|year_id| self.resolve_month_folder(&year_id))
        {
            Ok(id) => id,
            Err(e) => {
                error!("Cannot resolve destination folder: {}", e);
                return UploadReport::failure(format!("destination folder unavailable: {}", e));
            }
        };

        if !self.local_dir.is_dir() {
            error!("Local directory {} does not exist", self.local_dir.display());
            return UploadReport::failure(format!("{} does not exist", self.local_dir.display()));
        }
        let paths = match files::list_files(&self.local_dir) {
            Ok(paths) => paths,
            Err(e) => {
                error!("Cannot list {}: {}", self.local_dir.display(), e);
                return UploadReport::failure(format!("cannot list {}: {}", self.local_dir.display(), e));
            }
        };

        let mut report = UploadReport {
            success: true,
            month_folder_id: Some(month_folder_id.clone()),
            ..Default::default()
        };
        for path in paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.upload_one(&path, &filename, &month_folder_id) {
                Some(id) => report.uploaded.push(UploadedFile { filename, id }),
                None => report.failed.push(filename),
            }
        }

        info!("Uploaded {}, failed {}", report.uploaded.len(), report.failed.len());
        report
    }
}
