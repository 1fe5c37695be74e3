use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::{QuizError, QuizResult};

/// Seam between the quiz workflow and the hosted model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single prompt in, plain text out.
    async fn generate_text(&self, prompt: &str) -> QuizResult<String>;

    /// Single prompt in, JSON text constrained by `schema` out.
    async fn generate_json(&self, prompt: &str, schema: &serde_json::Value) -> QuizResult<String>;

    fn is_configured(&self) -> bool;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiClient {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn api_key(&self) -> QuizResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            QuizError::configuration(
                "API_KEY is not configured. Please set the API_KEY environment variable.",
            )
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(
        &self,
        prompt: &str,
        generation_config: Option<GenerationConfig<'_>>,
    ) -> QuizResult<String> {
        // Checked before building the request so a missing key never reaches the network.
        let api_key = self.api_key()?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
        };

        tracing::debug!(
            "Calling Gemini model={} prompt_chars={}",
            self.model,
            prompt.chars().count()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuizError::transport(format!("Failed to call Gemini API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QuizError::transport(format!(
                "Gemini API returned error {}: {}",
                status, error_text
            )));
        }

        let envelope: GenerateContentResponse = response.json().await.map_err(|e| {
            QuizError::transport(format!("Failed to read Gemini API response: {}", e))
        })?;

        let text: String = envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .ok_or_else(|| QuizError::transport("Gemini API returned no candidates"))?;

        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> QuizResult<String> {
        self.generate(prompt, None).await
    }

    async fn generate_json(&self, prompt: &str, schema: &serde_json::Value) -> QuizResult<String> {
        self.generate(
            prompt,
            Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        )
        .await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
