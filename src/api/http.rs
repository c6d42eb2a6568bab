// src/api/http.rs

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};
use crate::oauth2::AccessTokenProvider;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Authenticated JSON transport shared by the sheets, mail and drive clients.
pub struct GoogleHttp<'a> {
    agent: ureq::Agent,
    tokens: &'a AccessTokenProvider,
}

impl<'a> GoogleHttp<'a> {
    pub fn new(tokens: &'a AccessTokenProvider) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        GoogleHttp { agent, tokens }
    }

    fn bearer(&self) -> ApiResult<String> {
        self.tokens
            .access_token()
            .map(|token| format!("Bearer {}", token))
            .map_err(|e| ApiError::Auth(e.to_string()))
    }

    fn request(&self, method: &str, url: &str, query: &[(&str, String)]) -> ApiResult<ureq::Request> {
        let mut request = self
            .agent
            .request(method, url)
            .set("Authorization", &self.bearer()?);
        for (key, value) in query {
            request = request.query(key, value);
        }
        Ok(request)
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> ApiResult<T> {
        debug!("GET {}", url);
        let response = self.request("GET", url, query)?.call().map_err(map_error)?;
        decode(response)
    }

    pub fn post_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)], body: &Value) -> ApiResult<T> {
        debug!("POST {}", url);
        let response = self
            .request("POST", url, query)?
            .send_json(body.clone())
            .map_err(map_error)?;
        decode(response)
    }

    /// POST whose response body carries nothing the caller needs.
    pub fn post_json_discard(&self, url: &str, query: &[(&str, String)], body: &Value) -> ApiResult<()> {
        debug!("POST {}", url);
        self.request("POST", url, query)?
            .send_json(body.clone())
            .map_err(map_error)?;
        Ok(())
    }

    pub fn post_bytes<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        content_type: &str,
        body: &[u8],
    ) -> ApiResult<T> {
        debug!("POST {} ({} bytes, {})", url, body.len(), content_type);
        let response = self
            .request("POST", url, query)?
            .set("Content-Type", content_type)
            .send_bytes(body)
            .map_err(map_error)?;
        decode(response)
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> ApiResult<T> {
    response.into_json().map_err(|e| ApiError::Decode(e.to_string()))
}

/// Map a ureq failure onto the API error taxonomy. HTTP 409 means the
/// resource already exists.
pub fn map_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = error_message(&body);
            if status == 409 {
                ApiError::AlreadyExists(message)
            } else {
                ApiError::Http { status, message }
            }
        }
        ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
    }
}

/// The `error.message` of a Google error body, else the trimmed body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Percent-encode a single URL path segment (sheet ranges, ids).
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'!' | b':' | b'$' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
