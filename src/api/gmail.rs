// src/api/gmail.rs

use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::api::http::{encode_path_segment, GoogleHttp};
use crate::client_ops::{LabelInfo, MailOps, MailQuery, MessageFormat};
use crate::error::{ApiError, ApiResult};
use crate::message::Message;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Largest page the list endpoint serves.
const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<LabelEntry>,
}

#[derive(Debug, Deserialize)]
struct LabelEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    #[serde(default)]
    data: Option<String>,
}

/// Query parameters selecting how much of a message to fetch.
pub fn format_params(format: MessageFormat) -> Vec<(&'static str, String)> {
    match format {
        MessageFormat::Minimal => vec![("format", "minimal".into())],
        MessageFormat::DateHeader => vec![("format", "metadata".into()), ("metadataHeaders", "Date".into())],
        MessageFormat::Full => vec![("format", "full".into())],
    }
}

/// Query parameters for one page of a message search.
pub fn search_params(query: &MailQuery, page_size: usize, page_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("maxResults", page_size.to_string())];
    if !query.q.is_empty() {
        params.push(("q", query.q.clone()));
    }
    for label_id in &query.label_ids {
        params.push(("labelIds", label_id.clone()));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

pub struct GmailClient<'a> {
    http: &'a GoogleHttp<'a>,
}

impl<'a> GmailClient<'a> {
    pub fn new(http: &'a GoogleHttp<'a>) -> Self {
        GmailClient { http }
    }
}

impl MailOps for GmailClient<'_> {
    fn list_labels(&self) -> ApiResult<Vec<LabelInfo>> {
        let list: LabelList = self.http.get_json(&format!("{}/labels", GMAIL_BASE), &[])?;
        Ok(list
            .labels
            .into_iter()
            .map(|l| LabelInfo { id: l.id, name: l.name })
            .collect())
    }

    fn create_label(&self, name: &str) -> ApiResult<String> {
        let body = json!({
            "name": name,
            "labelListVisibility": "labelShow",
            "messageListVisibility": "show",
        });
        let created: LabelEntry = self.http.post_json(&format!("{}/labels", GMAIL_BASE), &[], &body)?;
        debug!("Created label {} ({})", created.name, created.id);
        Ok(created.id)
    }

    fn search(&self, query: &MailQuery) -> ApiResult<Vec<String>> {
        let url = format!("{}/messages", GMAIL_BASE);
        let limit = query.max_results.max(1);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = (limit - ids.len()).min(MAX_PAGE_SIZE);
            let params = search_params(query, page_size, page_token.as_deref());
            let page: MessageList = self.http.get_json(&url, &params)?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(token) if ids.len() < limit => page_token = Some(token),
                _ => break,
            }
        }

        ids.truncate(limit);
        debug!("Query '{}' matched {} message(s)", query.q, ids.len());
        Ok(ids)
    }

    fn get_message(&self, id: &str, format: MessageFormat) -> ApiResult<Message> {
        let url = format!("{}/messages/{}", GMAIL_BASE, encode_path_segment(id));
        self.http.get_json(&url, &format_params(format))
    }

    fn get_attachment_data(&self, message_id: &str, attachment_id: &str) -> ApiResult<String> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            GMAIL_BASE,
            encode_path_segment(message_id),
            encode_path_segment(attachment_id)
        );
        let body: AttachmentBody = self.http.get_json(&url, &[])?;
        body.data
            .ok_or_else(|| ApiError::Decode(format!("attachment {} has no data", attachment_id)))
    }

    fn batch_modify(&self, ids: &[String], add: &[String], remove: &[String]) -> ApiResult<()> {
        let body = json!({
            "ids": ids,
            "addLabelIds": add,
            "removeLabelIds": remove,
        });
        self.http
            .post_json_discard(&format!("{}/messages/batchModify", GMAIL_BASE), &[], &body)
    }

    fn modify(&self, id: &str, add: &[String], remove: &[String]) -> ApiResult<()> {
        let url = format!("{}/messages/{}/modify", GMAIL_BASE, encode_path_segment(id));
        let body = json!({
            "addLabelIds": add,
            "removeLabelIds": remove,
        });
        self.http.post_json_discard(&url, &[], &body)
    }
}
