// src/cfg/label.rs

use std::fmt;

use crate::utils::month_name;

/// Name of the nested bucket for messages whose Date header cannot be read.
pub const UNDATED_BUCKET: &str = "Sin fecha";

/// The mail labels the pipeline reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MailLabel {
    /// The provider's inbox system label.
    Inbox,
    /// Top-level category label (e.g. "IDU").
    Category(String),
    /// `Parent/MonthName Year`.
    Month { parent: String, year: i32, month: u32 },
    /// `Parent/Sin fecha`.
    Undated { parent: String },
    /// Marks ingestion completion; independent of the category tree.
    Downloaded(String),
}

impl MailLabel {
    /// Construct from a raw provider label name.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("INBOX") {
            return MailLabel::Inbox;
        }
        if let Some((parent, child)) = trimmed.rsplit_once('/') {
            if child == UNDATED_BUCKET {
                return MailLabel::Undated {
                    parent: parent.to_string(),
                };
            }
            if let Some((name, year)) = child.rsplit_once(' ') {
                let month = (1..=12).find(|m| month_name(*m) == name);
                if let (Some(month), Ok(year)) = (month, year.parse::<i32>()) {
                    return MailLabel::Month {
                        parent: parent.to_string(),
                        year,
                        month,
                    };
                }
            }
        }
        MailLabel::Category(trimmed.to_string())
    }

    pub fn month(parent: &str, year: i32, month: u32) -> Self {
        MailLabel::Month {
            parent: parent.to_string(),
            year,
            month,
        }
    }

    /// The child part of a nested label (`"Febrero 2025"`), used as a report key.
    pub fn bucket(&self) -> Option<String> {
        match self {
            MailLabel::Month { year, month, .. } => Some(format!("{} {}", month_name(*month), year)),
            MailLabel::Undated { .. } => Some(UNDATED_BUCKET.to_string()),
            _ => None,
        }
    }

    /// Full provider-side label name.
    pub fn name(&self) -> String {
        match self {
            MailLabel::Inbox => "INBOX".to_string(),
            MailLabel::Category(name) | MailLabel::Downloaded(name) => name.clone(),
            MailLabel::Month { parent, .. } | MailLabel::Undated { parent } => {
                format!("{}/{}", parent, self.bucket().unwrap_or_default())
            }
        }
    }
}

impl fmt::Display for MailLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
