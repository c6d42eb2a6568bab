// src/cfg/config.rs

use eyre::{eyre, Result};
use log::{debug, error, warn};
use secure_string::SecureString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cfg::secure;

pub const SCOPE_SHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SCOPE_GMAIL_MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const SCOPE_DRIVE: &str = "https://www.googleapis.com/auth/drive";

fn default_scopes() -> Vec<String> {
    vec![SCOPE_SHEETS.into(), SCOPE_GMAIL_MODIFY.into(), SCOPE_DRIVE.into()]
}
fn default_max_results_email() -> usize {
    500
}
fn default_max_group_size() -> usize {
    5
}
fn default_max_upload_retries() -> u32 {
    5
}
fn default_downloaded_label() -> String {
    "DESCARGADO".into()
}
fn default_requested_status() -> String {
    "Solicitado chat IDU".into()
}
fn default_downloaded_status() -> String {
    "DESCARGADO".into()
}
fn default_true() -> bool {
    true
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_credentials_dir() -> PathBuf {
    PathBuf::from("config")
}
fn default_prefs() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Immutable run configuration. Unknown keys are ignored; required keys
/// are checked by [`Config::validate`].
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(alias = "spreadsheet-id", default)]
    pub spreadsheet_id: String,

    /// A1 range read from the sheet, e.g. `SIN_IDENTIFICAR!A1:B`.
    #[serde(alias = "range-name", default)]
    pub range_name: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(alias = "download-path", default)]
    pub download_path: PathBuf,

    /// Remote root folder under which `YYYY/MM Month` folders live.
    #[serde(alias = "drive-folder-id", default)]
    pub drive_folder_id: String,

    /// Category label for the response mails (e.g. "IDU").
    #[serde(alias = "label-email", default)]
    pub label_email: String,

    #[serde(alias = "mailer-idu", default)]
    pub mailer_idu: Option<String>,

    #[serde(alias = "email-subject", default)]
    pub email_subject: Option<String>,

    #[serde(alias = "max-results-email", default = "default_max_results_email")]
    pub max_results_email: usize,

    #[serde(alias = "url-chat", default)]
    pub url_chat: Option<String>,

    #[serde(alias = "name-user", default)]
    pub name_user: Option<String>,

    #[serde(alias = "mail-requests", default)]
    pub mail_requests: Option<String>,

    /// Browser profile preferences, passed through untouched.
    #[serde(default = "default_prefs")]
    pub prefs: serde_json::Value,

    #[serde(alias = "max-group-size", default = "default_max_group_size")]
    pub max_group_size: usize,

    #[serde(alias = "max-upload-retries", default = "default_max_upload_retries")]
    pub max_upload_retries: u32,

    #[serde(alias = "downloaded-label", default = "default_downloaded_label")]
    pub downloaded_label: String,

    #[serde(alias = "requested-status", default = "default_requested_status")]
    pub requested_status: String,

    #[serde(alias = "downloaded-status", default = "default_downloaded_status")]
    pub downloaded_status: String,

    #[serde(alias = "archive-after-download", default)]
    pub archive_after_download: bool,

    #[serde(alias = "clear-download-dir", default = "default_true")]
    pub clear_download_dir: bool,

    #[serde(alias = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Directory holding `token.json`.
    #[serde(alias = "credentials-dir", default = "default_credentials_dir")]
    pub credentials_dir: PathBuf,

    #[serde(alias = "oauth2-client-id", default, deserialize_with = "secure::deserialize_opt")]
    pub oauth2_client_id: Option<SecureString>,

    #[serde(
        alias = "oauth2-client-secret",
        default,
        deserialize_with = "secure::deserialize_opt"
    )]
    pub oauth2_client_secret: Option<SecureString>,

    #[serde(
        alias = "oauth2-refresh-token",
        default,
        deserialize_with = "secure::deserialize_opt"
    )]
    pub oauth2_refresh_token: Option<SecureString>,
}

/// Identity and target of the chat form, present only when requests are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIdentity {
    pub url: String,
    pub user_name: String,
    pub user_email: String,
}

fn non_blank(opt: &Option<String>) -> Option<String> {
    opt.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Fail fast on blank required keys and nonsensical limits.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("spreadsheet_id", self.spreadsheet_id.as_str()),
            ("range_name", self.range_name.as_str()),
            ("drive_folder_id", self.drive_folder_id.as_str()),
            ("label_email", self.label_email.as_str()),
            ("downloaded_label", self.downloaded_label.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(eyre!("Missing required configuration key '{}'", key));
            }
        }
        if self.download_path.as_os_str().is_empty() {
            return Err(eyre!("Missing required configuration key 'download_path'"));
        }
        if self.max_group_size == 0 {
            return Err(eyre!("'max_group_size' must be at least 1"));
        }
        if self.max_results_email == 0 {
            return Err(eyre!("'max_results_email' must be at least 1"));
        }
        if self.subject_filters().is_empty() {
            warn!("Neither 'mailer_idu' nor 'email_subject' is set; mail discovery will find nothing");
        }
        Ok(())
    }

    /// Subject filters for mail discovery, blanks removed.
    pub fn subject_filters(&self) -> Vec<String> {
        [non_blank(&self.mailer_idu), non_blank(&self.email_subject)]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Form target and identity; errors if any of the three keys is missing.
    pub fn form_identity(&self) -> Result<FormIdentity> {
        let url = non_blank(&self.url_chat).ok_or_else(|| eyre!("Missing configuration key 'url_chat'"))?;
        let user_name = non_blank(&self.name_user).ok_or_else(|| eyre!("Missing configuration key 'name_user'"))?;
        let user_email =
            non_blank(&self.mail_requests).ok_or_else(|| eyre!("Missing configuration key 'mail_requests'"))?;
        Ok(FormIdentity {
            url,
            user_name,
            user_email,
        })
    }

    pub fn token_path(&self) -> PathBuf {
        self.credentials_dir.join("token.json")
    }
}

/// Values given on the command line or in the environment; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub spreadsheet_id: Option<String>,
    pub download_path: Option<PathBuf>,
}

impl ConfigOverrides {
    fn apply(&self, cfg: &mut Config) {
        if let Some(id) = &self.spreadsheet_id {
            debug!("spreadsheet_id overridden");
            cfg.spreadsheet_id = id.clone();
        }
        if let Some(path) = &self.download_path {
            debug!("download_path overridden: {}", path.display());
            cfg.download_path = path.clone();
        }
    }
}

fn parse_with(content: &str, overrides: &ConfigOverrides) -> Result<Config> {
    let mut cfg: Config = serde_yaml::from_str(content).map_err(|e| {
        error!("Failed to parse YAML: {}", e);
        eyre!("Failed to parse YAML: {}", e)
    })?;
    overrides.apply(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

pub fn parse_config(content: &str) -> Result<Config> {
    parse_with(content, &ConfigOverrides::default())
}

pub fn load_config_with_overrides(config_path: &Path, overrides: &ConfigOverrides) -> Result<Config> {
    debug!("Loading configuration from {:?}", config_path);

    let content = fs::read_to_string(config_path).map_err(|e| {
        error!("Failed to read config file {}: {}", config_path.display(), e);
        eyre!("Failed to read config file {}: {}", config_path.display(), e)
    })?;

    let cfg = parse_with(&content, overrides)?;
    debug!("Successfully loaded configuration");
    Ok(cfg)
}

pub fn load_config(config_path: &Path) -> Result<Config> {
    load_config_with_overrides(config_path, &ConfigOverrides::default())
}

/// The config file to use when none is given: `./chip-sync.yml` if present,
/// otherwise the per-user config directory.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from("chip-sync.yml");
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("chip-sync").join("chip-sync.yml"))
        .unwrap_or(local)
}
