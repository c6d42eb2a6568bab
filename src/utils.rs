// src/utils.rs

use chrono::NaiveDate;
use std::time::Duration;

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Spanish month name for a 1-based month; out-of-range months fall back to the number.
pub fn month_name(month: u32) -> String {
    match month {
        1..=12 => MONTH_NAMES[(month - 1) as usize].to_string(),
        other => other.to_string(),
    }
}

/// Date in the form the mail search syntax expects (`2025/02/14`).
pub fn search_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Search-syntax token for a label name: spaces and slashes become dashes.
pub fn label_search_token(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '-' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Quote a term for the mail search syntax.
pub fn quote_search_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

/// Back-off before retry number `attempt` (0-based): 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Escape a literal for the remote storage query language.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
