// src/system/prompt.rs

use dialoguer::{Error as DialoguerError, FuzzySelect, Select, theme::ColorfulTheme};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("User Interface Error: {0}")]
    Dialoguer(#[from] DialoguerError),
    #[error("Selection cancelled by user.")]
    Cancelled,
    #[error("Nothing to choose from for '{message}'.")]
    NoOptions { message: String },
    #[error("Prompt returned out-of-range choice {index} ({count} options).")]
    OutOfRange { index: usize, count: usize },
    #[error("Prompt type not found: '{0}'.")]
    UnknownType(String),
    #[error("Interactive selection is not available: {0}")]
    Unavailable(String),
}

/// An interactive selection capability.
///
/// `options` holds one row per choice; each row is a list of columns
/// (e.g. an account id followed by its tags). Returns the chosen row index.
pub trait Prompt: Send + Sync + fmt::Debug {
    fn select(&self, message: &str, options: &[Vec<String>]) -> Result<usize, PromptError>;
}

fn render_rows(options: &[Vec<String>]) -> Vec<String> {
    options.iter().map(|row| row.join("  ")).collect()
}

/// Arrow-key list selection on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectPrompt;

impl Prompt for SelectPrompt {
    fn select(&self, message: &str, options: &[Vec<String>]) -> Result<usize, PromptError> {
        let items = render_rows(options);
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .items(&items)
            .default(0)
            .interact_opt()?
            .ok_or(PromptError::Cancelled)
    }
}

/// Type-to-filter fuzzy selection on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct FuzzyPrompt;

impl Prompt for FuzzyPrompt {
    fn select(&self, message: &str, options: &[Vec<String>]) -> Result<usize, PromptError> {
        let items = render_rows(options);
        FuzzySelect::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .items(&items)
            .default(0)
            .interact_opt()?
            .ok_or(PromptError::Cancelled)
    }
}

/// Builds a prompt from its configured name.
///
/// # Errors
/// Returns `PromptError::UnknownType` for names outside `""`, `select`, `fuzzy`.
pub fn prompt_by_name(name: &str) -> Result<Arc<dyn Prompt>, PromptError> {
    match name {
        "" | "select" => Ok(Arc::new(SelectPrompt)),
        "fuzzy" => Ok(Arc::new(FuzzyPrompt)),
        other => Err(PromptError::UnknownType(other.to_string())),
    }
}

/// Picks one value from `candidates`, consulting `hints` first.
///
/// 1. If exactly one hint is a real candidate, it is selected.
/// 2. Else, if there is exactly one candidate, it is selected.
/// 3. Else the prompt is shown: restricted to the matching hints when several
///    match, otherwise over every candidate (sorted).
///
/// The prompt is never invoked in cases 1 and 2.
///
/// # Errors
/// `PromptError::NoOptions` when there are no candidates, or any error from the prompt.
pub fn select_with_hints(
    prompt: &dyn Prompt,
    message: &str,
    candidates: &[String],
    hints: &[String],
) -> Result<String, PromptError> {
    let sorted: Vec<String> = candidates
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let matching: Vec<String> = sorted
        .iter()
        .filter(|c| hints.contains(c))
        .cloned()
        .collect();

    if sorted.is_empty() {
        return Err(PromptError::NoOptions {
            message: message.to_string(),
        });
    }
    if let [only] = matching.as_slice() {
        return Ok(only.clone());
    }
    if let [only] = sorted.as_slice() {
        return Ok(only.clone());
    }
    let pool = if matching.is_empty() { sorted } else { matching };

    if !hints.is_empty() {
        log::debug!(
            "Hints {:?} did not settle '{}'; prompting over {:?}",
            hints,
            message,
            pool
        );
    }

    let rows: Vec<Vec<String>> = pool.iter().map(|c| vec![c.clone()]).collect();
    let index = prompt.select(message, &rows)?;
    pool.into_iter()
        .nth(index)
        .ok_or(PromptError::OutOfRange {
            index,
            count: rows.len(),
        })
}
