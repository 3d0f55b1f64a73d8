//! Text generation provider (Gemini)
//!
//! Roles use this to turn structured data into natural-language fragments.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Settings;
use crate::error::GenerationError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Black-box text generation capability
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce free-form text for a structured prompt
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model_url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: settings.gemini_api_key.clone(),
            model_url: format!("{}/{}:generateContent", GEMINI_BASE_URL, settings.llm_model),
            temperature: settings.llm_temperature,
            max_output_tokens: settings.llm_max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::Unavailable(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: self.max_output_tokens,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&self.model_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                GenerationError::Unavailable(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);
            return Err(GenerationError::Unavailable(format!(
                "Gemini API returned {}",
                status
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            GenerationError::Unavailable(format!("Gemini parse error: {}", e))
        })?;

        let answer = extract_text(&gemini_response)?;

        info!(
            finish_reason = ?gemini_response.candidates.first().and_then(|c| c.finish_reason.as_deref()),
            chars = answer.len(),
            "Gemini response received"
        );

        Ok(answer)
    }
}

fn extract_text(response: &GeminiResponse) -> Result<String, GenerationError> {
    let text: String = response
        .candidates
        .first()
        .ok_or_else(|| GenerationError::Unavailable("No response from Gemini API".to_string()))?
        .content
        .parts
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(GenerationError::Unavailable(
            "Empty response from Gemini".to_string(),
        ));
    }

    Ok(text.trim().to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

/// Mock generator for development & testing
///
/// Answers with a short deterministic paraphrase of the prompt, or fails
/// every attempt when built with [`MockGenerator::failing`].
pub struct MockGenerator {
    fail: bool,
    delay: Option<Duration>,
    attempts: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Sleep before answering, to exercise generation timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of generate calls received, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock_generator"
    }

    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, GenerationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(GenerationError::Unavailable("mock generator offline".to_string()));
        }

        let headline = prompt.lines().next().unwrap_or_default().trim();
        Ok(format!("[mock] {}", headline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Plan 4 days in Paris".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are a travel planner".to_string(),
                }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are a travel planner");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Plan 4 days in Paris");
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":" Bonjour "},{"text":"Paris"}]},"finishReason":"STOP"}]}"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(extract_text(&response).unwrap(), "Bonjour Paris");

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(&empty).is_err());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let client = GeminiClient::new(&settings).unwrap();
        let result = client.generate("system", "prompt").await;
        assert!(matches!(result, Err(GenerationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_mock_generator_counts_attempts() {
        let ok = MockGenerator::new();
        assert_eq!(ok.generate("s", "Summarize Paris\nmore").await.unwrap(), "[mock] Summarize Paris");

        let failing = MockGenerator::failing();
        assert!(failing.generate("s", "p").await.is_err());
        assert!(failing.generate("s", "p").await.is_err());
        assert_eq!(failing.attempts(), 2);
    }
}
