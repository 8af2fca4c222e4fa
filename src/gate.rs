//! Password prompt in front of the write and delete forms.
//!
//! This is a UI gate, not access control: the password is one shared literal
//! compared in plain text and anyone who can read the configuration can pass it.

use tracing::warn;

use crate::error::BlogError;

pub const DEFAULT_PASSWORD: &str = "123";

#[derive(Debug, Clone)]
pub struct AccessGate {
    password: String,
}

impl AccessGate {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Runs `on_success` only when `attempt` equals the password exactly.
    /// No trimming, no case folding.
    pub fn admit<T>(&self, attempt: &str, on_success: impl FnOnce() -> T) -> Result<T, BlogError> {
        if attempt == self.password {
            Ok(on_success())
        } else {
            warn!("Rejected access gate attempt");
            Err(BlogError::Gate)
        }
    }

    pub fn check(&self, attempt: &str) -> Result<(), BlogError> {
        self.admit(attempt, || ())
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD)
    }
}
