#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod gemini;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::domain::models::Generator;
use crate::domain::models::GeneratorBox;

pub struct BackendManager {}

impl BackendManager {
    /// Connects to the configured model, falling back to the fallback model
    /// when the primary one cannot be reached. Fails when neither can.
    pub async fn connect(config: &Config) -> Result<GeneratorBox> {
        let primary = gemini::Gemini::new(config, &config.model)?;
        match primary.health_check().await {
            Ok(()) => {
                tracing::info!(model = primary.model(), "Gemini configured");
                return Ok(Arc::new(primary));
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    model = config.model,
                    fallback = config.fallback_model,
                    "Primary model unavailable, trying fallback"
                );
            }
        }

        let fallback = gemini::Gemini::new(config, &config.fallback_model)?;
        if let Err(err) = fallback.health_check().await {
            tracing::error!(error = %err, model = config.fallback_model, "Fallback model unavailable");
            bail!(format!(
                "Unable to configure Gemini with model {} or fallback model {}",
                config.model, config.fallback_model
            ));
        }

        tracing::info!(model = fallback.model(), "Gemini configured with fallback model");
        return Ok(Arc::new(fallback));
    }
}
