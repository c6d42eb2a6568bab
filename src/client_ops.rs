// src/client_ops.rs
//
// Capability traits for every external collaborator. Core components take
// these by reference, so production code runs against the REST clients in
// `api` and the tests run against the in-memory harness.

use chrono::{DateTime, Local, NaiveDate};
use std::path::Path;
use std::time::Duration;

use crate::error::{ApiResult, FormError};
use crate::message::Message;
use crate::records::WorkUnit;

/// One scattered cell write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    /// A1 address, optionally sheet-qualified (`Hoja!B7`).
    pub range: String,
    pub value: String,
}

/// Spreadsheet gateway.
pub trait SheetsOps {
    /// Read a full range as rows of string cells. Trailing empty cells may be absent.
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> ApiResult<Vec<Vec<String>>>;

    /// Write all updates in a single remote call.
    fn batch_update(&self, spreadsheet_id: &str, updates: &[CellUpdate]) -> ApiResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// A provider-side message search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailQuery {
    pub q: String,
    /// Every listed label must be present.
    pub label_ids: Vec<String>,
    pub max_results: usize,
}

/// How much of a message to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Id and label ids only.
    Minimal,
    /// Label ids plus the `Date` header.
    DateHeader,
    /// The full MIME tree.
    Full,
}

/// Mailbox gateway.
pub trait MailOps {
    fn list_labels(&self) -> ApiResult<Vec<LabelInfo>>;

    fn create_label(&self, name: &str) -> ApiResult<String>;

    fn search(&self, query: &MailQuery) -> ApiResult<Vec<String>>;

    fn get_message(&self, id: &str, format: MessageFormat) -> ApiResult<Message>;

    /// Raw base64url attachment content, exactly as the provider returns it.
    fn get_attachment_data(&self, message_id: &str, attachment_id: &str) -> ApiResult<String>;

    fn batch_modify(&self, ids: &[String], add: &[String], remove: &[String]) -> ApiResult<()>;

    fn modify(&self, id: &str, add: &[String], remove: &[String]) -> ApiResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// How a folder name is matched in a remote query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Exact(String),
    Contains(String),
}

/// Remote file storage gateway.
pub trait DriveOps {
    /// Non-trashed folders directly under `parent_id` matching `name`.
    fn find_folders(&self, parent_id: &str, name: &NameMatch) -> ApiResult<Vec<RemoteFile>>;

    fn create_folder(&self, parent_id: &str, name: &str) -> ApiResult<String>;

    /// Upload one local file; returns the new remote id.
    fn upload_file(&self, path: &Path, name: &str, parent_id: &str) -> ApiResult<String>;
}

/// Opaque reference to the located chat form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormHandle(pub String);

/// Form submission driver for the external chat page.
pub trait FormDriver {
    fn navigate(&mut self, url: &str) -> Result<(), FormError>;

    fn prepare_form(&mut self) -> Result<FormHandle, FormError>;

    fn fill_user(&mut self, form: &FormHandle, name: &str, email: &str) -> Result<(), FormError>;

    fn fill_message(&mut self, form: &FormHandle, unit: &WorkUnit) -> Result<(), FormError>;

    fn submit(&mut self, form: &FormHandle) -> Result<(), FormError>;

    /// Throw away the browser session and start over on `url`.
    fn reset_session(&mut self, url: &str) -> Result<(), FormError>;
}

/// Trait for time providers.
/// Allows production code to use real time or virtual time for testing.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real clock implementation using system time.
#[derive(Clone, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Blocking pause between retries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
