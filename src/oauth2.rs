// src/oauth2.rs

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use eyre::{eyre, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::cfg::config::Config;
use crate::cfg::secure::reveal;
use crate::files::write_durably;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the provider-reported expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth2 credentials for the Google REST APIs.
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: String,
}

/// Response from Google's token refresh endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    token_type: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
    /// Granted scopes, when the token endpoint reports them.
    pub scopes: Vec<String>,
}

impl AccessToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expiry
    }
}

impl OAuth2Credentials {
    /// Refresh the access token using the refresh token.
    pub fn refresh_access_token(&self) -> Result<AccessToken> {
        info!("Refreshing OAuth2 access token");

        let response = ureq::post(&self.token_uri)
            .send_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| eyre!("Failed to refresh OAuth2 token: {}", e))?;

        let token_response: TokenResponse = response
            .into_json()
            .map_err(|e| eyre!("Failed to parse token response: {}", e))?;

        debug!(
            "Got new {} access token (expires in {} seconds)",
            token_response.token_type, token_response.expires_in
        );

        Ok(AccessToken {
            token: token_response.access_token,
            expiry: Utc::now() + Duration::seconds(token_response.expires_in),
            scopes: token_response
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
        })
    }
}

/// The authorized-user token file (`token.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl StoredToken {
    pub fn credentials(&self) -> OAuth2Credentials {
        OAuth2Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            token_uri: self.token_uri.clone(),
        }
    }

    /// The cached access token, if the file carries one with a readable expiry.
    pub fn access_token(&self) -> Option<AccessToken> {
        let token = self.token.clone()?;
        let expiry = parse_expiry(self.expiry.as_deref()?)?;
        Some(AccessToken {
            token,
            expiry,
            scopes: self.scopes.clone(),
        })
    }
}

/// Accepts RFC 3339 as well as the zone-less ISO form some tools write.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: &Path) -> Self {
        TokenStore {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<StoredToken> {
        debug!("Loading token file {}", self.path.display());
        let content = fs::read_to_string(&self.path)
            .map_err(|e| eyre!("Failed to read token file {}: {}", self.path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| eyre!("Failed to parse token file {}: {}", self.path.display(), e))
    }

    pub fn save(&self, stored: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(stored)?;
        write_durably(&self.path, json.as_bytes())
            .map_err(|e| eyre!("Failed to write token file {}: {}", self.path.display(), e))?;
        debug!("Persisted refreshed token to {}", self.path.display());
        Ok(())
    }
}

/// Hands out a valid bearer token, refreshing and persisting as needed.
pub struct AccessTokenProvider {
    credentials: OAuth2Credentials,
    store: Option<TokenStore>,
    required_scopes: Vec<String>,
    cached: Mutex<Option<AccessToken>>,
}

impl AccessTokenProvider {
    pub fn new(credentials: OAuth2Credentials, required_scopes: Vec<String>) -> Self {
        AccessTokenProvider {
            credentials,
            store: None,
            required_scopes,
            cached: Mutex::new(None),
        }
    }

    /// Build from a token file; a cached access token in it is reused while fresh.
    pub fn from_store(store: TokenStore, required_scopes: Vec<String>) -> Result<Self> {
        let stored = store.load()?;
        let cached = stored.access_token();
        Ok(AccessTokenProvider {
            credentials: stored.credentials(),
            store: Some(store),
            required_scopes,
            cached: Mutex::new(cached),
        })
    }

    /// Secrets from the config take precedence over `token.json`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if let (Some(id), Some(secret), Some(refresh)) = (
            cfg.oauth2_client_id.as_ref(),
            cfg.oauth2_client_secret.as_ref(),
            cfg.oauth2_refresh_token.as_ref(),
        ) {
            debug!("Using OAuth2 credentials from configuration");
            let credentials = OAuth2Credentials {
                client_id: reveal(id),
                client_secret: reveal(secret),
                refresh_token: reveal(refresh),
                token_uri: default_token_uri(),
            };
            return Ok(Self::new(credentials, cfg.scopes.clone()));
        }

        let path = cfg.token_path();
        if !path.exists() {
            return Err(eyre!(
                "No OAuth2 credentials configured and no token file at {}",
                path.display()
            ));
        }
        Self::from_store(TokenStore::new(&path), cfg.scopes.clone())
    }

    pub fn access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| eyre!("Token cache lock poisoned"))?;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
            debug!("Access token expires at {}; refreshing", token.expiry);
        }

        let fresh = self.credentials.refresh_access_token()?;
        let missing = missing_scopes(&self.required_scopes, &fresh.scopes);
        if !missing.is_empty() {
            warn!("Access token does not cover scopes: {}", missing.join(", "));
        }
        self.persist(&fresh);

        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn persist(&self, fresh: &AccessToken) {
        let Some(store) = &self.store else {
            return;
        };
        let stored = StoredToken {
            client_id: self.credentials.client_id.clone(),
            client_secret: self.credentials.client_secret.clone(),
            refresh_token: self.credentials.refresh_token.clone(),
            token: Some(fresh.token.clone()),
            expiry: Some(fresh.expiry.to_rfc3339()),
            token_uri: self.credentials.token_uri.clone(),
            scopes: fresh.scopes.clone(),
        };
        if let Err(e) = store.save(&stored) {
            warn!("{}", e);
        }
    }
}

/// Required scopes absent from `granted`. An empty grant list means unknown.
pub fn missing_scopes(required: &[String], granted: &[String]) -> Vec<String> {
    if granted.is_empty() {
        return Vec::new();
    }
    required
        .iter()
        .filter(|scope| !granted.contains(scope))
        .cloned()
        .collect()
}
