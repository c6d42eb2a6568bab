// src/message.rs

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use serde::Deserialize;
use std::borrow::Cow;

/// A mail message as returned by the provider, in any of the fetch formats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// One node of the MIME tree. Containers carry `parts`; leaves carry a body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A downloadable attachment discovered in a message's MIME tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRef {
    pub message_id: String,
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

impl Message {
    /// Case-insensitive lookup of a top-level header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.header(name))
    }

    /// True if the message already carries every label in `label_ids`.
    pub fn has_all_labels(&self, label_ids: &[String]) -> bool {
        label_ids.iter().all(|l| self.label_ids.contains(l))
    }

    /// Year and month of the `Date` header, if it parses.
    pub fn year_month(&self) -> Option<(i32, u32)> {
        let dt = parse_date(self.header("Date")?)?;
        Some((dt.year(), dt.month()))
    }

    /// Flattened list of attachments, in document order.
    pub fn attachments(&self) -> Vec<AttachmentRef> {
        match &self.payload {
            Some(payload) => payload.attachments(&self.id),
            None => Vec::new(),
        }
    }
}

impl MessagePart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// A leaf is an attachment iff it has both a filename and an attachment id.
    pub fn is_attachment(&self) -> bool {
        self.parts.is_empty() && !self.filename.is_empty() && self.body.attachment_id.is_some()
    }

    /// Depth-first walk of the part tree; containers are expanded, never reported.
    pub fn attachments(&self, message_id: &str) -> Vec<AttachmentRef> {
        let mut out = Vec::new();
        let mut stack = vec![self];

        while let Some(part) = stack.pop() {
            if !part.parts.is_empty() {
                // reversed so the first child is visited first
                stack.extend(part.parts.iter().rev());
                continue;
            }
            if let (true, Some(attachment_id)) = (part.is_attachment(), &part.body.attachment_id) {
                out.push(AttachmentRef {
                    message_id: message_id.to_string(),
                    attachment_id: attachment_id.clone(),
                    filename: part.filename.clone(),
                    mime_type: part.mime_type.clone(),
                    size: part.body.size,
                });
            }
        }

        out
    }
}

fn normalize_date(raw: &str) -> Cow<'_, str> {
    let mut dt = raw.trim();
    // trailing "(UTC)" style comments are not part of RFC 2822 proper
    if dt.ends_with(')') {
        if let Some(pos) = dt.rfind('(') {
            dt = dt[..pos].trim_end();
        }
    }
    if let Some(stripped) = dt.strip_suffix("-0000") {
        Cow::Owned(format!("{}+0000", stripped))
    } else {
        Cow::Borrowed(dt)
    }
}

/// Parse an RFC 2822 `Date` header, keeping the sender's offset.
/// Falls back to a lenient parser for headers chrono rejects. That parser
/// yields the epoch for text it cannot read, so a zero timestamp is no date.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.trim().is_empty() {
        return None;
    }
    let normalized = normalize_date(raw);
    if let Ok(dt) = DateTime::parse_from_rfc2822(&normalized) {
        return Some(dt);
    }
    let ts = mailparse::dateparse(&normalized).ok().filter(|ts| *ts > 0)?;
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.fixed_offset())
}
