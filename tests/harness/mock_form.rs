// tests/harness/mock_form.rs
//
// Scripted form driver for testing the request flow without a browser.

use chip_sync::client_ops::{FormDriver, FormHandle};
use chip_sync::error::FormError;
use chip_sync::records::WorkUnit;
use std::collections::HashSet;

/// Recorded driver calls, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum FormCall {
    Navigate(String),
    Prepare,
    FillUser { name: String, email: String },
    FillMessage(Vec<String>),
    Submit(usize),
    Reset(String),
}

#[derive(Default)]
pub struct MockFormDriver {
    calls: Vec<FormCall>,
    current_unit: usize,
    fail_submit: HashSet<usize>,
    fail_reset: bool,
    fail_navigate: bool,
}

impl MockFormDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the submit of work unit `number` fail.
    pub fn fail_submit_of(mut self, number: usize) -> Self {
        self.fail_submit.insert(number);
        self
    }

    pub fn fail_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    pub fn fail_navigate(mut self) -> Self {
        self.fail_navigate = true;
        self
    }

    pub fn calls(&self) -> &[FormCall] {
        &self.calls
    }

    pub fn count(&self, pred: impl Fn(&FormCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl FormDriver for MockFormDriver {
    fn navigate(&mut self, url: &str) -> Result<(), FormError> {
        self.calls.push(FormCall::Navigate(url.to_string()));
        if self.fail_navigate {
            return Err(FormError::WebDriver("session not created".into()));
        }
        Ok(())
    }

    fn prepare_form(&mut self) -> Result<FormHandle, FormError> {
        self.calls.push(FormCall::Prepare);
        Ok(FormHandle("form-1".into()))
    }

    fn fill_user(&mut self, _form: &FormHandle, name: &str, email: &str) -> Result<(), FormError> {
        self.calls.push(FormCall::FillUser {
            name: name.to_string(),
            email: email.to_string(),
        });
        Ok(())
    }

    fn fill_message(&mut self, _form: &FormHandle, unit: &WorkUnit) -> Result<(), FormError> {
        self.current_unit = unit.number;
        self.calls.push(FormCall::FillMessage(unit.ids.clone()));
        Ok(())
    }

    fn submit(&mut self, _form: &FormHandle) -> Result<(), FormError> {
        self.calls.push(FormCall::Submit(self.current_unit));
        if self.fail_submit.contains(&self.current_unit) {
            return Err(FormError::ElementNotFound("a#submit-survey".into()));
        }
        Ok(())
    }

    fn reset_session(&mut self, url: &str) -> Result<(), FormError> {
        self.calls.push(FormCall::Reset(url.to_string()));
        if self.fail_reset {
            return Err(FormError::NoSession);
        }
        Ok(())
    }
}
