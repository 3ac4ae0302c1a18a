use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::null_as_empty;
use crate::config::GeminiConfig;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GenerateResponse {
    #[serde(deserialize_with = "null_as_empty")]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Content {
    #[serde(deserialize_with = "null_as_empty")]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let text: Vec<&str> = self
            .candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join(""))
        }
    }
}

/// Client for the generative-language `generateContent` endpoint.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Send a single-turn prompt and return the generated text.
    pub async fn generate(&self, prompt: &str) -> Option<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        info!(model = %self.config.model, prompt_chars = prompt.len(), "Requesting AI analysis");

        let response = match self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(model = %self.config.model, error = %e, "AI request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(
                model = %self.config.model,
                status = status.as_u16(),
                body = %text.chars().take(500).collect::<String>(),
                "AI request returned an error status"
            );
            return None;
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => {
                let text = parsed.text();
                if text.is_none() {
                    error!(model = %self.config.model, "AI response contained no text");
                }
                text
            }
            Err(e) => {
                error!(model = %self.config.model, error = %e, "AI response could not be decoded");
                None
            }
        }
    }
}
