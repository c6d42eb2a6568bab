// tests/harness/virtual_mailbox.rs
//
// In-memory mailbox for testing.
// Simulates the provider's labels, search syntax and MIME trees without
// network access, and records every mutating call for verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chip_sync::client_ops::{LabelInfo, MailOps, MailQuery, MessageFormat};
use chip_sync::error::{ApiError, ApiResult};
use chip_sync::message::{Header, Message, MessagePart, PartBody};
use chip_sync::utils::label_search_token;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

/// An attachment stored in the virtual mailbox.
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub attachment_id: String,
    pub filename: String,
    pub content: Vec<u8>,
    /// Nest this part one multipart level deeper.
    pub nested: bool,
}

/// Represents the state of a message in the virtual mailbox.
#[derive(Debug, Clone)]
pub struct MailboxMessage {
    pub id: String,
    pub subject: String,
    pub date_header: Option<String>,
    /// Day the provider received it; drives `after:` searches.
    pub received: NaiveDate,
    pub label_ids: BTreeSet<String>,
    pub attachments: Vec<StoredAttachment>,
}

impl MailboxMessage {
    pub fn new(id: &str, subject: &str, received: NaiveDate) -> Self {
        Self {
            id: id.to_string(),
            subject: subject.to_string(),
            date_header: None,
            received,
            label_ids: ["INBOX".to_string()].into_iter().collect(),
            attachments: Vec::new(),
        }
    }

    /// Builder method to set the raw Date header.
    pub fn with_date(mut self, date: &str) -> Self {
        self.date_header = Some(date.to_string());
        self
    }

    /// Builder method to add label ids.
    pub fn with_labels(mut self, label_ids: &[&str]) -> Self {
        for label in label_ids {
            self.label_ids.insert(label.to_string());
        }
        self
    }

    /// Builder method to attach a file.
    pub fn with_attachment(mut self, filename: &str, content: &[u8]) -> Self {
        let attachment_id = format!("{}-att{}", self.id, self.attachments.len() + 1);
        self.attachments.push(StoredAttachment {
            attachment_id,
            filename: filename.to_string(),
            content: content.to_vec(),
            nested: false,
        });
        self
    }

    /// Builder method to attach a file inside a nested multipart container.
    pub fn with_nested_attachment(mut self, filename: &str, content: &[u8]) -> Self {
        self = self.with_attachment(filename, content);
        if let Some(last) = self.attachments.last_mut() {
            last.nested = true;
        }
        self
    }

    fn headers(&self) -> Vec<Header> {
        let mut headers = vec![Header {
            name: "Subject".into(),
            value: self.subject.clone(),
        }];
        if let Some(date) = &self.date_header {
            headers.push(Header {
                name: "Date".into(),
                value: date.clone(),
            });
        }
        headers
    }

    fn attachment_part(att: &StoredAttachment, index: usize) -> MessagePart {
        MessagePart {
            part_id: index.to_string(),
            mime_type: "application/pdf".into(),
            filename: att.filename.clone(),
            body: PartBody {
                attachment_id: Some(att.attachment_id.clone()),
                size: att.content.len() as u64,
                data: None,
            },
            ..Default::default()
        }
    }

    /// Render the message the way the provider would for `format`.
    pub fn render(&self, format: MessageFormat) -> Message {
        let label_ids = self.label_ids.iter().cloned().collect();
        let payload = match format {
            MessageFormat::Minimal => None,
            MessageFormat::DateHeader => Some(MessagePart {
                headers: self.headers().into_iter().filter(|h| h.name == "Date").collect(),
                ..Default::default()
            }),
            MessageFormat::Full => {
                let text = MessagePart {
                    part_id: "0".into(),
                    mime_type: "text/plain".into(),
                    body: PartBody {
                        attachment_id: None,
                        size: 5,
                        data: Some("SG9sYQ".into()),
                    },
                    ..Default::default()
                };
                let mut parts = vec![text];
                let mut nested = Vec::new();
                for (i, att) in self.attachments.iter().enumerate() {
                    let part = Self::attachment_part(att, i + 1);
                    if att.nested {
                        nested.push(part);
                    } else {
                        parts.push(part);
                    }
                }
                if !nested.is_empty() {
                    parts.push(MessagePart {
                        part_id: "9".into(),
                        mime_type: "multipart/mixed".into(),
                        parts: nested,
                        ..Default::default()
                    });
                }
                Some(MessagePart {
                    mime_type: "multipart/mixed".into(),
                    headers: self.headers(),
                    parts,
                    ..Default::default()
                })
            }
        };
        Message {
            id: self.id.clone(),
            thread_id: Some(self.id.clone()),
            label_ids,
            payload,
        }
    }
}

/// Recorded mutating calls for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum MailAction {
    CreateLabel(String),
    BatchModify {
        ids: Vec<String>,
        add: Vec<String>,
        remove: Vec<String>,
    },
    Modify {
        id: String,
        add: Vec<String>,
        remove: Vec<String>,
    },
}

#[derive(Default)]
struct MailboxState {
    messages: Vec<MailboxMessage>,
    /// label id → name
    labels: Vec<(String, String)>,
    next_label: usize,
    actions: Vec<MailAction>,
    queries: Vec<MailQuery>,
    race_on_create: HashSet<String>,
    failing_attachments: HashSet<String>,
    failing_messages: HashSet<String>,
    fail_batch_modify: bool,
}

impl MailboxState {
    fn label_name(&self, id: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(lid, _)| lid == id)
            .map(|(_, name)| name.as_str())
    }

    fn insert_label(&mut self, name: &str) -> String {
        self.next_label += 1;
        let id = format!("Label_{}", self.next_label);
        self.labels.push((id.clone(), name.to_string()));
        id
    }

    fn carries_label_token(&self, msg: &MailboxMessage, token: &str) -> bool {
        msg.label_ids.iter().any(|id| {
            self.label_name(id)
                .map(|name| label_search_token(name) == token)
                .unwrap_or(false)
        })
    }

    fn matches(&self, msg: &MailboxMessage, query: &MailQuery) -> bool {
        if !query.label_ids.iter().all(|l| msg.label_ids.contains(l)) {
            return false;
        }
        for term in tokenize(&query.q) {
            let ok = if let Some(subject) = term.strip_prefix("subject:") {
                msg.subject.to_lowercase().contains(&subject.to_lowercase())
            } else if let Some(date) = term.strip_prefix("after:") {
                let after = NaiveDate::parse_from_str(date, "%Y/%m/%d").expect("after: date");
                msg.received >= after
            } else if let Some(token) = term.strip_prefix("-label:") {
                !self.carries_label_token(msg, token)
            } else if let Some(token) = term.strip_prefix("label:") {
                self.carries_label_token(msg, token)
            } else {
                panic!("unsupported search term '{}'", term);
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Split a search string on spaces, keeping quoted phrases together and
/// dropping the quotes.
pub fn tokenize(q: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in q.chars() {
        match c {
            '"' => quoted = !quoted,
            ' ' if !quoted => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

/// The virtual mailbox.
pub struct VirtualMailbox {
    state: RwLock<MailboxState>,
}

impl Default for VirtualMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualMailbox {
    /// Create a mailbox with only the INBOX system label.
    pub fn new() -> Self {
        let state = MailboxState {
            labels: vec![("INBOX".into(), "INBOX".into())],
            ..Default::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn add_message(&self, msg: MailboxMessage) {
        self.state.write().unwrap().messages.push(msg);
    }

    /// Create a user label directly; returns its id.
    pub fn add_label(&self, name: &str) -> String {
        self.state.write().unwrap().insert_label(name)
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        let state = self.state.read().unwrap();
        state
            .labels
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id.clone())
    }

    pub fn label_count(&self) -> usize {
        self.state.read().unwrap().labels.len()
    }

    /// Names of the labels a message carries.
    pub fn labels_of(&self, message_id: &str) -> Vec<String> {
        let state = self.state.read().unwrap();
        let Some(msg) = state.messages.iter().find(|m| m.id == message_id) else {
            return Vec::new();
        };
        msg.label_ids
            .iter()
            .filter_map(|id| state.label_name(id).map(String::from))
            .collect()
    }

    pub fn has_label(&self, message_id: &str, name: &str) -> bool {
        self.labels_of(message_id).iter().any(|l| l == name)
    }

    pub fn actions(&self) -> Vec<MailAction> {
        self.state.read().unwrap().actions.clone()
    }

    pub fn queries(&self) -> Vec<MailQuery> {
        self.state.read().unwrap().queries.clone()
    }

    pub fn clear_actions(&self) {
        self.state.write().unwrap().actions.clear();
    }

    /// The next create of `name` inserts it and then reports "already exists",
    /// as when another run creates the same label concurrently.
    pub fn race_on_create(&self, name: &str) {
        self.state.write().unwrap().race_on_create.insert(name.to_string());
    }

    pub fn fail_attachment(&self, attachment_id: &str) {
        self.state
            .write()
            .unwrap()
            .failing_attachments
            .insert(attachment_id.to_string());
    }

    pub fn heal_attachment(&self, attachment_id: &str) {
        self.state.write().unwrap().failing_attachments.remove(attachment_id);
    }

    pub fn fail_message(&self, message_id: &str) {
        self.state
            .write()
            .unwrap()
            .failing_messages
            .insert(message_id.to_string());
    }

    pub fn fail_batch_modify(&self) {
        self.state.write().unwrap().fail_batch_modify = true;
    }

    fn apply(state: &mut MailboxState, id: &str, add: &[String], remove: &[String]) -> ApiResult<()> {
        let msg = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: format!("message {} not found", id),
            })?;
        for label in add {
            msg.label_ids.insert(label.clone());
        }
        for label in remove {
            msg.label_ids.remove(label);
        }
        Ok(())
    }
}

impl MailOps for VirtualMailbox {
    fn list_labels(&self) -> ApiResult<Vec<LabelInfo>> {
        let state = self.state.read().unwrap();
        Ok(state
            .labels
            .iter()
            .map(|(id, name)| LabelInfo {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    fn create_label(&self, name: &str) -> ApiResult<String> {
        let mut state = self.state.write().unwrap();
        state.actions.push(MailAction::CreateLabel(name.to_string()));
        if state.race_on_create.remove(name) {
            state.insert_label(name);
            return Err(ApiError::AlreadyExists("Label name exists or conflicts".into()));
        }
        if state.labels.iter().any(|(_, n)| n == name) {
            return Err(ApiError::AlreadyExists("Label name exists or conflicts".into()));
        }
        Ok(state.insert_label(name))
    }

    fn search(&self, query: &MailQuery) -> ApiResult<Vec<String>> {
        let mut state = self.state.write().unwrap();
        state.queries.push(query.clone());
        let ids: Vec<String> = state
            .messages
            .iter()
            .filter(|m| state.matches(m, query))
            .map(|m| m.id.clone())
            .take(query.max_results)
            .collect();
        Ok(ids)
    }

    fn get_message(&self, id: &str, format: MessageFormat) -> ApiResult<Message> {
        let state = self.state.read().unwrap();
        if state.failing_messages.contains(id) {
            return Err(ApiError::Http {
                status: 500,
                message: "Backend Error".into(),
            });
        }
        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.render(format))
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: format!("message {} not found", id),
            })
    }

    fn get_attachment_data(&self, message_id: &str, attachment_id: &str) -> ApiResult<String> {
        let state = self.state.read().unwrap();
        if state.failing_attachments.contains(attachment_id) {
            return Err(ApiError::Transport("connection reset by peer".into()));
        }
        state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .and_then(|m| m.attachments.iter().find(|a| a.attachment_id == attachment_id))
            .map(|a| URL_SAFE_NO_PAD.encode(&a.content))
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: format!("attachment {} not found", attachment_id),
            })
    }

    fn batch_modify(&self, ids: &[String], add: &[String], remove: &[String]) -> ApiResult<()> {
        let mut state = self.state.write().unwrap();
        state.actions.push(MailAction::BatchModify {
            ids: ids.to_vec(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        if state.fail_batch_modify {
            return Err(ApiError::Http {
                status: 500,
                message: "Backend Error".into(),
            });
        }
        for id in ids {
            Self::apply(&mut state, id, add, remove)?;
        }
        Ok(())
    }

    fn modify(&self, id: &str, add: &[String], remove: &[String]) -> ApiResult<()> {
        let mut state = self.state.write().unwrap();
        state.actions.push(MailAction::Modify {
            id: id.to_string(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        Self::apply(&mut state, id, add, remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    #[test]
    fn test_tokenize_keeps_quoted_phrases() {
        assert_eq!(
            tokenize(r#"subject:"Paz y salvo" after:2025/02/14 -label:descargado"#),
            vec!["subject:Paz y salvo", "after:2025/02/14", "-label:descargado"]
        );
    }

    #[test]
    fn test_search_after_and_label_terms() {
        let mailbox = VirtualMailbox::new();
        let idu = mailbox.add_label("IDU");
        mailbox.add_message(MailboxMessage::new("m1", "Paz y salvo", day(14)).with_labels(&[idu.as_str()]));
        mailbox.add_message(MailboxMessage::new("m2", "Paz y salvo", day(13)).with_labels(&[idu.as_str()]));
        mailbox.add_message(MailboxMessage::new("m3", "Otro", day(14)));

        let query = MailQuery {
            q: "label:idu after:2025/02/14".into(),
            label_ids: vec![],
            max_results: 10,
        };
        assert_eq!(mailbox.search(&query).unwrap(), vec!["m1"]);
    }

    #[test]
    fn test_full_render_nests_attachments() {
        let msg = MailboxMessage::new("m1", "s", day(1))
            .with_attachment("a.pdf", b"a")
            .with_nested_attachment("b.pdf", b"b");
        let names: Vec<String> = msg
            .render(MessageFormat::Full)
            .attachments()
            .into_iter()
            .map(|a| a.filename)
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }
}
