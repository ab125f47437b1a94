#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::configuration::Config;
use crate::domain::models::GenerationError;
use crate::domain::models::Generator;
use crate::domain::models::Prompt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ContentParts {
    Text(String),
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<ContentParts>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    contents: Vec<Content>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, GenerationError> {
        if let Some(reason) = self.prompt_feedback.and_then(|e| return e.block_reason) {
            return Err(GenerationError::Blocked { reason });
        }

        let candidate = match self.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => return Err(GenerationError::Empty),
        };

        let text = candidate
            .content
            .map(|content| {
                return content
                    .parts
                    .into_iter()
                    .filter_map(|part| return part.text)
                    .collect::<String>();
            })
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = candidate.finish_reason {
                if reason != "STOP" {
                    return Err(GenerationError::Blocked { reason });
                }
            }
            return Err(GenerationError::Empty);
        }

        return Ok(text);
    }
}

/// Accepts model names with or without the `models/` prefix the API uses.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        return model.to_string();
    }

    return format!("models/{model}");
}

pub struct Gemini {
    url: String,
    token: String,
    model: String,
    health_check_timeout: Duration,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(config: &Config, model: &str) -> Result<Gemini> {
        let client = reqwest::Client::builder()
            .timeout(config.generation_timeout)
            .build()?;

        return Ok(Gemini {
            url: config.gemini_url.trim_end_matches('/').to_string(),
            token: config.gemini_token.to_string(),
            model: model.to_string(),
            health_check_timeout: config.backend_health_check_timeout,
            client,
        });
    }
}

#[async_trait]
impl Generator for Gemini {
    fn model(&self) -> String {
        return self.model.to_string();
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Gemini URL is not defined");
        }
        if self.token.is_empty() {
            bail!("Gemini token is not defined");
        }
        if self.model.is_empty() {
            bail!("Gemini model is not defined");
        }

        let res = self
            .client
            .get(format!(
                "{url}/v1beta/{model}",
                url = self.url,
                model = model_path(&self.model)
            ))
            .header("x-goog-api-key", &self.token)
            .timeout(self.health_check_timeout)
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, model = self.model, "Gemini is not reachable");
                bail!("Gemini is not reachable");
            }
        };

        let status = res.status().as_u16();
        if status >= 400 {
            tracing::error!(status = status, model = self.model, "Gemini health check failed");
            bail!(format!("Gemini health check failed for model {}, {status}", self.model));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let req = CompletionRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![ContentParts::Text(prompt.text.to_string())],
            }],
        };

        let res = self
            .client
            .post(format!(
                "{url}/v1beta/{model}:generateContent",
                url = self.url,
                model = model_path(&self.model),
            ))
            .header("x-goog-api-key", &self.token)
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = serde_json::from_str::<GenerateContentResponse>(&body)
            .map_err(GenerationError::Malformed)?;

        return parsed.into_text();
    }
}
