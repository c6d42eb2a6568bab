// src/state_writer.rs
//
// The only path by which the pipeline mutates the sheet: locate rows by
// chip id on a fresh read and write all status cells in one batch call.

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fmt;

use crate::client_ops::{CellUpdate, SheetsOps};
use crate::error::SchemaError;
use crate::records::{Columns, SheetRange};

/// Result of a batched status write. Every variant but `Updated` writes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Updated(usize),
    EmptyInput,
    NoData,
    ColumnNotFound(String),
    NoMatches,
    BatchFailed(String),
}

impl WriteOutcome {
    /// Number of rows written.
    pub fn count(&self) -> usize {
        match self {
            WriteOutcome::Updated(n) => *n,
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::ColumnNotFound(_) | WriteOutcome::BatchFailed(_))
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Updated(n) => write!(f, "updated {} row(s)", n),
            WriteOutcome::EmptyInput => write!(f, "nothing to write"),
            WriteOutcome::NoData => write!(f, "sheet returned no data"),
            WriteOutcome::ColumnNotFound(col) => write!(f, "column '{}' not found", col),
            WriteOutcome::NoMatches => write!(f, "no matching rows"),
            WriteOutcome::BatchFailed(reason) => write!(f, "batch write failed: {}", reason),
        }
    }
}

impl From<SchemaError> for WriteOutcome {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::MissingColumn(col) | SchemaError::ColumnOutOfRange(col) => WriteOutcome::ColumnNotFound(col),
        }
    }
}

/// Stage one update per id against the first row carrying it.
///
/// Rows already claimed by an earlier id are not written twice, and ids
/// with no row are skipped silently.
pub fn stage_updates(
    rows: &[Vec<String>],
    cols: Columns,
    range: &SheetRange,
    ids: &[String],
    status: &str,
) -> Result<Vec<CellUpdate>, SchemaError> {
    let mut claimed = HashSet::new();
    let mut updates = Vec::new();

    for id in ids {
        let found = rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.get(cols.id).is_some_and(|cell| cell == id));

        match found {
            Some((index, _)) if claimed.insert(index) => {
                let address = range.cell(cols.status, index)?;
                debug!("Staging {} = '{}' for chip {}", address, status, id);
                updates.push(CellUpdate {
                    range: address,
                    value: status.to_string(),
                });
            }
            Some(_) => debug!("Chip {} already staged", id),
            None => debug!("Chip {} not found in sheet", id),
        }
    }

    Ok(updates)
}

pub struct StateWriter<'a> {
    sheets: &'a dyn SheetsOps,
    range_name: String,
    range: SheetRange,
}

impl<'a> StateWriter<'a> {
    pub fn new(sheets: &'a dyn SheetsOps, range_name: &str) -> Self {
        StateWriter {
            sheets,
            range_name: range_name.to_string(),
            range: SheetRange::parse(range_name),
        }
    }

    /// Set `status` on the rows of `ids`, resolving columns from a header the
    /// caller already holds. Rows are always matched on a fresh read.
    pub fn write(&self, spreadsheet_id: &str, header: &[String], ids: &[String], status: &str) -> WriteOutcome {
        let cols = match Columns::resolve(header) {
            Ok(cols) => cols,
            Err(e) => {
                error!("Cannot update states: {}", e);
                return e.into();
            }
        };
        if ids.is_empty() {
            info!("No chips to update");
            return WriteOutcome::EmptyInput;
        }
        let rows = match self.fresh_rows(spreadsheet_id) {
            Ok(rows) => rows,
            Err(outcome) => return outcome,
        };
        self.commit(spreadsheet_id, &rows, cols, ids, status)
    }

    /// Like [`write`](Self::write), but takes the header from the fresh read itself.
    pub fn write_fresh(&self, spreadsheet_id: &str, ids: &[String], status: &str) -> WriteOutcome {
        if ids.is_empty() {
            info!("No records to update");
            return WriteOutcome::EmptyInput;
        }
        let rows = match self.fresh_rows(spreadsheet_id) {
            Ok(rows) => rows,
            Err(outcome) => return outcome,
        };
        let cols = match Columns::resolve(&rows[0]) {
            Ok(cols) => cols,
            Err(e) => {
                error!("Cannot update states: {}", e);
                return e.into();
            }
        };
        self.commit(spreadsheet_id, &rows, cols, ids, status)
    }

    fn fresh_rows(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, WriteOutcome> {
        match self.sheets.read_range(spreadsheet_id, &self.range_name) {
            Ok(rows) if rows.is_empty() => {
                warn!("Sheet range {} returned no data", self.range_name);
                Err(WriteOutcome::NoData)
            }
            Ok(rows) => Ok(rows),
            Err(e) => {
                error!("Failed to read sheet before update: {}", e);
                Err(WriteOutcome::NoData)
            }
        }
    }

    fn commit(&self, spreadsheet_id: &str, rows: &[Vec<String>], cols: Columns, ids: &[String], status: &str) -> WriteOutcome {
        let updates = match stage_updates(rows, cols, &self.range, ids, status) {
            Ok(updates) => updates,
            Err(e) => {
                error!("Cannot address status column: {}", e);
                return e.into();
            }
        };
        if updates.is_empty() {
            warn!("None of the {} chip(s) matched a row; nothing written", ids.len());
            return WriteOutcome::NoMatches;
        }

        info!("Writing '{}' to {} row(s)", status, updates.len());
        match self.sheets.batch_update(spreadsheet_id, &updates) {
            Ok(()) => {
                info!("✅ Updated {} row(s)", updates.len());
                WriteOutcome::Updated(updates.len())
            }
            Err(e) => {
                error!("Batch update of {} cell(s) failed: {}", updates.len(), e);
                WriteOutcome::BatchFailed(e.to_string())
            }
        }
    }
}
