use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::Prompt;

/// Ways a generation request can fail. The display text is short enough to
/// hand back to browsers; the fields carry the detail operators need.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("the generation service timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("could not reach the generation service")]
    Transport(#[source] reqwest::Error),

    #[error("the generation service returned status {status}")]
    Status { status: u16, body: String },

    #[error("the request was blocked by the generation service ({reason})")]
    Blocked { reason: String },

    #[error("the generation service returned an empty response")]
    Empty,

    #[error("the generation service returned an unreadable response")]
    Malformed(#[source] serde_json::Error),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            return GenerationError::Timeout(err);
        }

        return GenerationError::Transport(err);
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model the generator submits prompts to.
    fn model(&self) -> String;

    /// Used at startup to verify the model is reachable with the configured
    /// credentials before any traffic is served.
    async fn health_check(&self) -> Result<()>;

    /// Submits a prompt and returns the generated text unmodified. A single
    /// attempt is made, bounded by the configured generation timeout.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

pub type GeneratorBox = Arc<dyn Generator>;
