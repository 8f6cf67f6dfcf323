/*!
 * Clients for the generation API.
 *
 * This module contains:
 * - `TranslationCaller`, the seam the orchestrator calls for one batch
 * - `gemini`: the Gemini `generateContent` client
 * - `mock`: a scripted caller for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::jobs::models::Line;

/// Everything needed to translate one batch, apart from the credential
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Model name
    pub model: &'a str,
    /// Instruction text placed before the lines
    pub prompt: &'a str,
    /// Sent in the separate system-instruction field
    pub system_instruction: &'a str,
    /// Lines of the batch
    pub lines: &'a [Line],
    /// Extended reasoning budget, if requested
    pub thinking_budget: Option<i32>,
}

impl BatchRequest<'_> {
    /// The user prompt: instruction text, a blank line, then one
    /// `index|text` line per subtitle line
    pub fn render_prompt(&self) -> String {
        format!("{}\n\n{}", self.prompt, render_lines(self.lines))
    }
}

/// Render lines as `index|text`, one per line
pub fn render_lines(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| format!("{}|{}", line.index, line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Common trait for generation API clients
///
/// Implementations classify failures through [`ProviderError`]: retryable
/// variants make the orchestrator rotate to another credential, the others
/// spend a retry round directly.
#[async_trait]
pub trait TranslationCaller: Send + Sync + Debug {
    /// Translate one batch with one credential, returning the raw generated text
    async fn translate(&self, credential: &str, request: &BatchRequest<'_>) -> Result<String, ProviderError>;
}

pub mod gemini;
pub mod mock;

pub use gemini::{Gemini, model_supports_thinking};
pub use mock::MockCaller;
