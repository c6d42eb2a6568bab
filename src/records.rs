// src/records.rs
//
// Record classification over raw sheet rows: which chips still need a
// request, and how they are bundled into work units.

use log::{debug, info};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::SchemaError;

pub const ID_COLUMN: &str = "CHIPS";
pub const STATUS_COLUMN: &str = "ESTADO";

/// A data row whose status cell is absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    /// Sheet row number, 1-based with the header on row 1.
    pub row: usize,
    pub id: String,
    pub status: String,
}

/// Output of [`scan`]. `Scan::default()` is the empty result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub pending: Vec<PendingRecord>,
    pub total_data_rows: usize,
}

impl Scan {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.pending.iter().map(|r| r.id.clone()).collect()
    }
}

/// A bounded group of chip ids submitted together in one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub number: usize,
    pub ids: Vec<String>,
}

/// Zero-based indices of the identifier and status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub id: usize,
    pub status: usize,
}

impl Columns {
    pub fn resolve(header: &[String]) -> Result<Self, SchemaError> {
        Ok(Columns {
            id: column_index(header, ID_COLUMN)?,
            status: column_index(header, STATUS_COLUMN)?,
        })
    }
}

pub fn column_index(header: &[String], name: &str) -> Result<usize, SchemaError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
}

/// Single-letter column name for a zero-based index (A..=Z only).
pub fn column_letter(index: usize) -> Option<char> {
    if index < 26 {
        Some((b'A' + index as u8) as char)
    } else {
        None
    }
}

fn cell(row: &[String], index: usize) -> Option<&str> {
    row.get(index).map(String::as_str)
}

fn status_is_blank(row: &[String], status_index: usize) -> bool {
    cell(row, status_index).map_or(true, |s| s.trim().is_empty())
}

/// Partition data rows into pending and already-processed.
///
/// Row 0 is the header. Returns `SchemaError::MissingColumn` when either
/// required header is absent; an empty sheet yields the empty result.
pub fn scan(rows: &[Vec<String>]) -> Result<Scan, SchemaError> {
    let Some((header, data)) = rows.split_first() else {
        debug!("scan: sheet is empty");
        return Ok(Scan::default());
    };
    let cols = Columns::resolve(header)?;
    debug!("scan: {} at {}, {} at {}", ID_COLUMN, cols.id, STATUS_COLUMN, cols.status);

    let pending: Vec<PendingRecord> = data
        .iter()
        .enumerate()
        .filter(|(_, row)| status_is_blank(row, cols.status))
        .map(|(i, row)| PendingRecord {
            row: i + 2,
            id: cell(row, cols.id).unwrap_or_default().to_string(),
            status: String::new(),
        })
        .collect();

    info!("{} of {} records have no {}", pending.len(), data.len(), STATUS_COLUMN);
    Ok(Scan {
        pending,
        total_data_rows: data.len(),
    })
}

/// Split pending records into contiguous work units of at most `max_group_size`.
pub fn group(records: &[PendingRecord], max_group_size: usize) -> Vec<WorkUnit> {
    records
        .chunks(max_group_size.max(1))
        .enumerate()
        .map(|(i, chunk)| WorkUnit {
            number: i + 1,
            ids: chunk.iter().map(|r| r.id.clone()).collect(),
        })
        .collect()
}

/// Where the configured range sits in the workbook (`Sheet!C3:F` → sheet,
/// first column index 2, first row 3). Cell addresses for writes are
/// computed relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: Option<String>,
    pub first_column: usize,
    pub first_row: usize,
}

fn a1_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$?(?P<col>[A-Za-z]{1,3})?\$?(?P<row>\d+)?(?::.*)?$").expect("valid A1 regex")
    })
}

/// A bare range is read as cells only when it carries a row or a span;
/// `IDU` or `Hoja` alone name a sheet.
fn looks_like_cells(text: &str) -> bool {
    (text.contains(':') || text.bytes().any(|b| b.is_ascii_digit())) && a1_regex().is_match(text)
}

impl SheetRange {
    pub fn parse(range_name: &str) -> Self {
        let trimmed = range_name.trim();
        let (sheet, cells) = match trimmed.rsplit_once('!') {
            Some((sheet, cells)) => (Some(sheet.to_string()), cells),
            None if looks_like_cells(trimmed) => (None, trimmed),
            // a bare sheet name covers the whole sheet from A1
            None if !trimmed.is_empty() => (Some(trimmed.to_string()), ""),
            None => (None, ""),
        };

        let mut out = SheetRange {
            sheet,
            first_column: 0,
            first_row: 1,
        };
        if let Some(caps) = a1_regex().captures(cells) {
            if let Some(col) = caps.name("col") {
                out.first_column = col
                    .as_str()
                    .to_ascii_uppercase()
                    .bytes()
                    .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
                    - 1;
            }
            if let Some(row) = caps.name("row") {
                out.first_row = row.as_str().parse().unwrap_or(1).max(1);
            }
        }
        out
    }

    /// A1 address of the cell at `column_index` (relative to the range) and
    /// `row_index` (0 = header row of the range).
    pub fn cell(&self, column_index: usize, row_index: usize) -> Result<String, SchemaError> {
        let absolute = self.first_column + column_index;
        let letter = column_letter(absolute)
            .ok_or_else(|| SchemaError::ColumnOutOfRange(format!("#{}", absolute + 1)))?;
        let row = self.first_row + row_index;
        Ok(match &self.sheet {
            Some(sheet) => format!("{}!{}{}", sheet, letter, row),
            None => format!("{}{}", letter, row),
        })
    }
}
