// src/api/sheets.rs

use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::http::{encode_path_segment, GoogleHttp};
use crate::client_ops::{CellUpdate, SheetsOps};
use crate::error::ApiResult;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Request body for `values:batchUpdate`; every cell is written as entered.
pub fn batch_update_body(updates: &[CellUpdate]) -> Value {
    let data: Vec<Value> = updates
        .iter()
        .map(|u| json!({ "range": u.range, "values": [[u.value]] }))
        .collect();
    json!({ "valueInputOption": "RAW", "data": data })
}

pub struct SheetsClient<'a> {
    http: &'a GoogleHttp<'a>,
}

impl<'a> SheetsClient<'a> {
    pub fn new(http: &'a GoogleHttp<'a>) -> Self {
        SheetsClient { http }
    }
}

impl SheetsOps for SheetsClient<'_> {
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> ApiResult<Vec<Vec<String>>> {
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_BASE,
            encode_path_segment(spreadsheet_id),
            encode_path_segment(range)
        );
        let value_range: ValueRange = self.http.get_json(&url, &[])?;
        debug!("Read {} row(s) from {}", value_range.values.len(), range);
        Ok(value_range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    fn batch_update(&self, spreadsheet_id: &str, updates: &[CellUpdate]) -> ApiResult<()> {
        let url = format!(
            "{}/{}/values:batchUpdate",
            SHEETS_BASE,
            encode_path_segment(spreadsheet_id)
        );
        self.http.post_json_discard(&url, &[], &batch_update_body(updates))
    }
}
