// src/system/mfa.rs

use dialoguer::{Error as DialoguerError, Input, theme::ColorfulTheme};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt;
use thiserror::Error;

lazy_static! {
    static ref MFA_CODE_REGEX: Regex = Regex::new(r"^\d{6}$").expect("mfa code regex is valid");
}

#[derive(Error, Debug)]
pub enum MfaError {
    #[error("User Interface Error: {0}")]
    Dialoguer(#[from] DialoguerError),
    #[error("'{0}' is not a six-digit MFA code.")]
    InvalidCode(String),
    #[error("No MFA backend produced a code for '{serial}': {}", .failures.join("; "))]
    Exhausted {
        serial: String,
        failures: Vec<String>,
    },
}

/// Produces a current one-time code for an MFA device.
pub trait MfaPrompt: Send + Sync + fmt::Debug {
    fn code(&self, serial: &str) -> Result<String, MfaError>;
}

/// Validates that `code` looks like a TOTP code.
pub fn validate_code(code: &str) -> Result<String, MfaError> {
    let trimmed = code.trim();
    if MFA_CODE_REGEX.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(MfaError::InvalidCode(trimmed.to_string()))
    }
}

/// Asks for the code on the terminal, one question at a time.
#[derive(Debug, Default)]
pub struct DefaultMfaPrompt {
    terminal: Mutex<()>,
}

impl MfaPrompt for DefaultMfaPrompt {
    fn code(&self, serial: &str) -> Result<String, MfaError> {
        let _guard = self.terminal.lock();
        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("MFA code for {}", serial))
            .validate_with(|s: &String| validate_code(s).map(|_| ()).map_err(|e| e.to_string()))
            .interact_text()?;
        validate_code(&input)
    }
}

/// Tries each backend in order and returns the first code obtained.
#[derive(Debug, Default)]
pub struct MultiMfaPrompt {
    backends: Vec<Box<dyn MfaPrompt>>,
}

impl MultiMfaPrompt {
    pub fn new(backends: Vec<Box<dyn MfaPrompt>>) -> Self {
        Self { backends }
    }
}

impl MfaPrompt for MultiMfaPrompt {
    fn code(&self, serial: &str) -> Result<String, MfaError> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            match backend.code(serial) {
                Ok(code) => return Ok(code),
                Err(e) => {
                    log::debug!("MFA backend {:?} failed: {}", backend, e);
                    failures.push(e.to_string());
                }
            }
        }
        Err(MfaError::Exhausted {
            serial: serial.to_string(),
            failures,
        })
    }
}
