// src/reconcile.rs
//
// Marks every chip that has a downloaded file in the local directory.

use log::{error, info, warn};
use std::io;
use std::path::{Path, PathBuf};

use crate::client_ops::SheetsOps;
use crate::files;
use crate::state_writer::{StateWriter, WriteOutcome};

/// Local file names without extension, in directory-listing order.
pub fn list_local_as_records(dir: &Path) -> io::Result<Vec<String>> {
    Ok(files::list_files(dir)?
        .iter()
        .filter_map(|p| files::file_stem(p))
        .collect())
}

pub struct Reconciler<'a> {
    writer: StateWriter<'a>,
    spreadsheet_id: String,
    local_dir: PathBuf,
    status: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(sheets: &'a dyn SheetsOps, spreadsheet_id: &str, range_name: &str, local_dir: &Path, status: &str) -> Self {
        Reconciler {
            writer: StateWriter::new(sheets, range_name),
            spreadsheet_id: spreadsheet_id.to_string(),
            local_dir: local_dir.to_path_buf(),
            status: status.to_string(),
        }
    }

    /// Write the downloaded status for each record name that matches a chip.
    pub fn reconcile(&self, records: &[String]) -> WriteOutcome {
        let outcome = self.writer.write_fresh(&self.spreadsheet_id, records, &self.status);
        match &outcome {
            WriteOutcome::Updated(n) => info!("🔁 Reconciled {} of {} local file(s)", n, records.len()),
            WriteOutcome::EmptyInput => warn!("Reconcile: no local files"),
            WriteOutcome::NoData => warn!("Reconcile: sheet has no data"),
            WriteOutcome::ColumnNotFound(col) => error!("Reconcile: column '{}' missing", col),
            WriteOutcome::NoMatches => warn!("Reconcile: no local file matches a chip"),
            WriteOutcome::BatchFailed(reason) => error!("Reconcile: write failed: {}", reason),
        }
        outcome
    }

    pub fn run(&self) -> io::Result<WriteOutcome> {
        let records = list_local_as_records(&self.local_dir)?;
        info!("{} local file(s) in {}", records.len(), self.local_dir.display());
        Ok(self.reconcile(&records))
    }
}
