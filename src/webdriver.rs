// src/webdriver.rs
//
// Minimal W3C WebDriver client that fills and submits the chat form.

use log::{debug, error, info, warn};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::client_ops::{FormDriver, FormHandle, Sleeper};
use crate::error::FormError;
use crate::records::WorkUnit;

/// Key under which W3C drivers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const ELEMENT_TIMEOUT_SECS: u64 = 15;
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const END_BUTTON_CLICKS: usize = 4;
const RESET_ATTEMPTS: usize = 3;
const CHAT_FRAME_MARKER: &str = "chat_valorizacion/chat";

const SEL_END_BUTTON: &str = "#end";
const SEL_FORM: &str = "table.form";
const SEL_NAME: &str = r#"input.username[name="name"]"#;
const SEL_EMAIL: &str = r#"input.username[name="email"]"#;
const SEL_MESSAGE: &str = r#"textarea[name="message"]"#;
const SEL_SUBMIT: &str = "a#submit-survey";

/// Text typed into the message box for a work unit.
pub fn request_message(unit: &WorkUnit) -> String {
    format!("Solicitud de paz y salvo de estos chips: {}", unit.ids.join(", "))
}

/// New-session payload for a Chrome driver.
pub fn session_capabilities(prefs: &Value) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": ["--window-size=1200,800"],
                    "prefs": prefs,
                }
            }
        }
    })
}

fn element_ref(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(String::from)
}

fn map_error(err: ureq::Error) -> FormError {
    match err {
        ureq::Error::Status(status, response) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            let kind = body["value"]["error"].as_str().unwrap_or_default().to_string();
            let message = body["value"]["message"].as_str().unwrap_or_default().to_string();
            match kind.as_str() {
                "no such element" => FormError::ElementNotFound(message),
                "invalid session id" => FormError::NoSession,
                _ => FormError::WebDriver(format!("HTTP {} {}: {}", status, kind, message)),
            }
        }
        ureq::Error::Transport(t) => FormError::WebDriver(t.to_string()),
    }
}

pub struct WebDriverForm<'a> {
    agent: ureq::Agent,
    base_url: String,
    prefs: Value,
    session_id: Option<String>,
    sleeper: &'a dyn Sleeper,
}

impl<'a> WebDriverForm<'a> {
    pub fn new(base_url: &str, prefs: Value, sleeper: &'a dyn Sleeper) -> Self {
        WebDriverForm {
            agent: ureq::AgentBuilder::new().timeout(Duration::from_secs(60)).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            prefs,
            session_id: None,
            sleeper,
        }
    }

    fn send(&self, method: &str, url: &str, body: Option<Value>) -> Result<Value, FormError> {
        debug!("webdriver {} {}", method, url);
        let request = self.agent.request(method, url);
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
        .map_err(map_error)?;
        let reply: Value = response
            .into_json()
            .map_err(|e| FormError::WebDriver(format!("bad webdriver reply: {}", e)))?;
        Ok(reply["value"].clone())
    }

    fn command(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value, FormError> {
        let session = self.session_id.as_ref().ok_or(FormError::NoSession)?;
        let url = format!("{}/session/{}/{}", self.base_url, session, path);
        self.send(method, &url, body)
    }

    fn start_session(&mut self) -> Result<(), FormError> {
        let url = format!("{}/session", self.base_url);
        let value = self.send("POST", &url, Some(session_capabilities(&self.prefs)))?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| FormError::WebDriver("new session reply has no sessionId".into()))?;
        info!("🌐 Browser session {} started", id);
        self.session_id = Some(id.to_string());
        Ok(())
    }

    fn end_session(&mut self) {
        if let Some(id) = self.session_id.take() {
            let url = format!("{}/session/{}", self.base_url, id);
            match self.send("DELETE", &url, None) {
                Ok(_) => debug!("Closed browser session {}", id),
                Err(e) => warn!("Failed to close browser session {}: {}", id, e),
            }
        }
    }

    fn find(&self, scope: Option<&str>, css: &str) -> Result<String, FormError> {
        let path = match scope {
            Some(parent) => format!("element/{}/element", parent),
            None => "element".to_string(),
        };
        let value = self.command("POST", &path, Some(json!({ "using": "css selector", "value": css })))?;
        element_ref(&value).ok_or_else(|| FormError::ElementNotFound(css.to_string()))
    }

    fn find_all(&self, css: &str) -> Result<Vec<String>, FormError> {
        let value = self.command("POST", "elements", Some(json!({ "using": "css selector", "value": css })))?;
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_ref).collect())
            .unwrap_or_default())
    }

    /// Poll for an element until it appears or the timeout elapses.
    fn wait_for(&self, scope: Option<&str>, css: &str) -> Result<String, FormError> {
        let deadline = Instant::now() + Duration::from_secs(ELEMENT_TIMEOUT_SECS);
        loop {
            match self.find(scope, css) {
                Ok(element) => return Ok(element),
                Err(FormError::ElementNotFound(_)) if Instant::now() < deadline => {
                    self.sleeper.sleep(POLL_INTERVAL);
                }
                Err(FormError::ElementNotFound(_)) => {
                    return Err(FormError::Timeout {
                        what: css.to_string(),
                        secs: ELEMENT_TIMEOUT_SECS,
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn click(&self, element: &str) -> Result<(), FormError> {
        self.command("POST", &format!("element/{}/click", element), Some(json!({})))?;
        Ok(())
    }

    fn type_into(&self, element: &str, text: &str) -> Result<(), FormError> {
        self.command("POST", &format!("element/{}/clear", element), Some(json!({})))?;
        self.command("POST", &format!("element/{}/value", element), Some(json!({ "text": text })))?;
        Ok(())
    }

    fn attribute(&self, element: &str, name: &str) -> Result<Option<String>, FormError> {
        let value = self.command("GET", &format!("element/{}/attribute/{}", element, name), None)?;
        Ok(value.as_str().map(String::from))
    }

    fn switch_to_frame(&self, element: Option<&str>) -> Result<(), FormError> {
        let id = match element {
            Some(e) => json!({ ELEMENT_KEY: e }),
            None => Value::Null,
        };
        self.command("POST", "frame", Some(json!({ "id": id })))?;
        Ok(())
    }

    /// Enter the chat iframe if the page has one; stay in the top document otherwise.
    fn enter_chat_frame(&self) -> Result<bool, FormError> {
        for frame in self.find_all("iframe")? {
            let src = self.attribute(&frame, "src")?.unwrap_or_default();
            if src.contains(CHAT_FRAME_MARKER) {
                debug!("Switching into chat iframe {}", src);
                self.switch_to_frame(Some(&frame))?;
                return Ok(true);
            }
        }
        warn!("Chat iframe not found; continuing in the main document");
        Ok(false)
    }

    fn fill_field(&self, form: &FormHandle, css: &str, text: &str) -> Result<(), FormError> {
        let field = self.wait_for(Some(&form.0), css)?;
        self.type_into(&field, text)
    }
}

impl FormDriver for WebDriverForm<'_> {
    fn navigate(&mut self, url: &str) -> Result<(), FormError> {
        if self.session_id.is_none() {
            self.start_session()?;
        }
        self.command("POST", "url", Some(json!({ "url": url })))?;
        self.wait_for(None, "body")?;
        info!("Page loaded: {}", url);
        Ok(())
    }

    fn prepare_form(&mut self) -> Result<FormHandle, FormError> {
        for click in 1..=END_BUTTON_CLICKS {
            let button = self.wait_for(None, SEL_END_BUTTON)?;
            self.click(&button)?;
            debug!("Clicked {} ({}/{})", SEL_END_BUTTON, click, END_BUTTON_CLICKS);
            self.sleeper.sleep(Duration::from_secs(1));
        }
        self.enter_chat_frame()?;
        let form = self.wait_for(None, SEL_FORM)?;
        debug!("Found {}", SEL_FORM);
        Ok(FormHandle(form))
    }

    fn fill_user(&mut self, form: &FormHandle, name: &str, email: &str) -> Result<(), FormError> {
        self.fill_field(form, SEL_NAME, name)?;
        self.fill_field(form, SEL_EMAIL, email)
    }

    fn fill_message(&mut self, form: &FormHandle, unit: &WorkUnit) -> Result<(), FormError> {
        self.fill_field(form, SEL_MESSAGE, &request_message(unit))
    }

    fn submit(&mut self, _form: &FormHandle) -> Result<(), FormError> {
        let clicked = self.wait_for(None, SEL_SUBMIT).and_then(|button| self.click(&button));
        if let Err(e) = self.switch_to_frame(None) {
            warn!("Failed to return to the main document: {}", e);
        }
        clicked?;
        self.sleeper.sleep(Duration::from_secs(2));
        Ok(())
    }

    fn reset_session(&mut self, url: &str) -> Result<(), FormError> {
        info!("🔄 Restarting browser session");
        self.end_session();

        let mut last_err = FormError::NoSession;
        for attempt in 1..=RESET_ATTEMPTS {
            match self.navigate(url) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Browser restart attempt {}/{} failed: {}", attempt, RESET_ATTEMPTS, e);
                    self.end_session();
                    last_err = e;
                    if attempt < RESET_ATTEMPTS {
                        self.sleeper.sleep(Duration::from_secs(3));
                    }
                }
            }
        }
        error!("Could not restart the browser after {} attempts", RESET_ATTEMPTS);
        Err(last_err)
    }
}

impl Drop for WebDriverForm<'_> {
    fn drop(&mut self) {
        self.end_session();
    }
}
