// src/api/drive.rs

use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::api::http::GoogleHttp;
use crate::client_ops::{DriveOps, NameMatch, RemoteFile};
use crate::error::ApiResult;
use crate::utils::escape_query_literal;

const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD: &str = "https://www.googleapis.com/upload/drive/v3/files";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const BOUNDARY: &str = "chip_sync_upload_boundary";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    #[serde(default)]
    name: String,
}

/// Drive search expression for non-trashed folders under `parent_id`.
pub fn folder_query(parent_id: &str, name: &NameMatch) -> String {
    let name_clause = match name {
        NameMatch::Exact(n) => format!("name = '{}'", escape_query_literal(n)),
        NameMatch::Contains(n) => format!("name contains '{}'", escape_query_literal(n)),
    };
    format!(
        "'{}' in parents and mimeType = '{}' and trashed = false and {}",
        escape_query_literal(parent_id),
        FOLDER_MIME,
        name_clause
    )
}

/// MIME type from the file extension; unknown types upload as octet-stream.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// `multipart/related` body: JSON metadata part followed by the file content.
pub fn multipart_body(metadata: &serde_json::Value, mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn shared_drive_params() -> Vec<(&'static str, String)> {
    vec![("supportsAllDrives", "true".into())]
}

pub struct DriveClient<'a> {
    http: &'a GoogleHttp<'a>,
}

impl<'a> DriveClient<'a> {
    pub fn new(http: &'a GoogleHttp<'a>) -> Self {
        DriveClient { http }
    }
}

impl DriveOps for DriveClient<'_> {
    fn find_folders(&self, parent_id: &str, name: &NameMatch) -> ApiResult<Vec<RemoteFile>> {
        let mut params = shared_drive_params();
        params.push(("q", folder_query(parent_id, name)));
        params.push(("fields", "files(id, name)".into()));
        params.push(("includeItemsFromAllDrives", "true".into()));
        let list: FileList = self.http.get_json(DRIVE_FILES, &params)?;
        debug!("Folder query under {} returned {} result(s)", parent_id, list.files.len());
        Ok(list
            .files
            .into_iter()
            .map(|f| RemoteFile { id: f.id, name: f.name })
            .collect())
    }

    fn create_folder(&self, parent_id: &str, name: &str) -> ApiResult<String> {
        let mut params = shared_drive_params();
        params.push(("fields", "id".into()));
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id],
        });
        let created: FileEntry = self.http.post_json(DRIVE_FILES, &params, &body)?;
        Ok(created.id)
    }

    fn upload_file(&self, path: &Path, name: &str, parent_id: &str) -> ApiResult<String> {
        let content = fs::read(path)?;
        let metadata = json!({ "name": name, "parents": [parent_id] });
        let body = multipart_body(&metadata, guess_mime(path), &content);

        let mut params = shared_drive_params();
        params.push(("uploadType", "multipart".into()));
        params.push(("fields", "id".into()));
        let content_type = format!("multipart/related; boundary={}", BOUNDARY);
        let uploaded: FileEntry = self.http.post_bytes(DRIVE_UPLOAD, &params, &content_type, &body)?;
        Ok(uploaded.id)
    }
}
