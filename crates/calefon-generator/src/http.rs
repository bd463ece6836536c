//! HTTP text generation against a Gemini-style `generateContent` endpoint.

use std::time::Duration;

use calefon_core::config::GenerationConfig;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::narrative::{GenerationError, NarrativeRequest, TextGenerator};

#[derive(Debug, Serialize)]
struct Payload<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl Response {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
    }
}

/// Blocking client for the external text service.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpGenerator {
    /// Create a generator with a per-request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a generator from configuration, reading the key from the environment.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            config.endpoint.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

fn payload(prompt: &str) -> Payload<'_> {
    Payload {
        contents: [Content {
            parts: [Part { text: prompt }],
        }],
        generation_config: GenerationSettings::default(),
    }
}

impl TextGenerator for HttpGenerator {
    fn generate(&self, request: &NarrativeRequest) -> Result<String, GenerationError> {
        let prompt = request.prompt();
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload(&prompt))
            .send()?;

        let status = response.status();
        debug!(status = status.as_u16(), key = %request.cache_key(), "generation response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Response>()?
            .into_text()
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let value = serde_json::to_value(payload("hola")).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "hola");
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 2048);
        assert!(value["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_response_text() {
        let response: Response = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "<p>x</p>"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_response_without_candidates() {
        let response: Response = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert!(response.into_text().is_none());

        let blank: Response = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}}]}"#,
        )
        .unwrap();
        assert!(blank.into_text().is_none());
    }

    #[test]
    fn test_from_config_missing_key() {
        let config = GenerationConfig {
            api_key_env: "CALEFON_TEST_UNSET_KEY_VARIABLE".to_string(),
            ..GenerationConfig::default()
        };

        assert!(matches!(
            HttpGenerator::from_config(&config),
            Err(GenerationError::MissingApiKey(_))
        ));
    }
}
