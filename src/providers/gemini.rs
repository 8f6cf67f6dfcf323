use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::app_config::Config;
use crate::errors::ProviderError;

use super::{BatchRequest, TranslationCaller};

/// Models known to accept a thinking budget
const THINKING_SUPPORTED_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash-preview-05-20",
    "gemini-2.5-pro-preview-05-06",
];

/// Model-name pattern of the thinking-capable families
static THINKING_MODEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gemini-2\.5|2\.5-(?:flash|pro)").expect("Invalid thinking model regex")
});

/// Whether `model` accepts the thinking budget parameter
pub fn model_supports_thinking(model: &str) -> bool {
    let model = model.to_lowercase();
    THINKING_SUPPORTED_MODELS.iter().any(|m| model.contains(m)) || THINKING_MODEL_PATTERN.is_match(&model)
}

/// Gemini client for the `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API base URL
    endpoint: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

/// One content block of a request or response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a content block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on reasoning parts, which are never part of the translation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: Some(text.into()), thought: None }],
        }
    }
}

/// Thinking configuration
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

/// Generation parameters
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

/// `generateContent` response body
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            temperature: 0.3,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }

    /// Create a client from the relay configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
            ..Self::new(config.api_endpoint.clone(), config.request_timeout())
        }
    }

    /// URL of the `generateContent` method for `model`
    pub fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            model
        )
    }

    /// Build the request body for one batch
    pub fn build_request(&self, request: &BatchRequest<'_>) -> GenerateContentRequest {
        let thinking_config = match request.thinking_budget {
            Some(budget) if model_supports_thinking(request.model) => {
                debug!("Thinking enabled with budget: {}", budget);
                Some(ThinkingConfig { thinking_budget: budget })
            }
            Some(_) => {
                debug!("Model {} does not support thinking, ignoring budget", request.model);
                None
            }
            None => None,
        };

        GenerateContentRequest {
            contents: vec![Content::text(request.render_prompt())],
            system_instruction: Content::text(request.system_instruction),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: self.top_p,
                max_output_tokens: self.max_output_tokens,
                thinking_config,
            },
        }
    }

    /// Concatenate the plain text parts of the first candidate, dropping
    /// reasoning parts
    pub fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let content = response.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    /// Map a non-success HTTP status and body to a classified error
    pub fn classify_status(status_code: u16, body: &str) -> ProviderError {
        match status_code {
            429 => ProviderError::RateLimitExceeded("Rate limited".to_string()),
            400 => {
                let message = serde_json::from_str::<ApiErrorBody>(body)
                    .ok()
                    .and_then(|b| b.error.message)
                    .unwrap_or_else(|| "Bad request".to_string());
                let upper = message.to_uppercase();
                if upper.contains("API_KEY") || upper.contains("INVALID") {
                    ProviderError::AuthenticationError("Invalid API key".to_string())
                } else {
                    ProviderError::InvalidRequest(message)
                }
            }
            401 | 403 => ProviderError::AuthenticationError("API key forbidden".to_string()),
            _ => ProviderError::ApiError {
                status_code,
                message: body.chars().take(200).collect(),
            },
        }
    }

    fn transport_error(error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::ConnectionError(error.to_string())
        }
    }
}

#[async_trait]
impl TranslationCaller for Gemini {
    async fn translate(&self, credential: &str, request: &BatchRequest<'_>) -> Result<String, ProviderError> {
        let body = self.build_request(request);

        // The key travels in a header so it never appears in URLs or error messages
        let response = self
            .client
            .post(self.generate_url(request.model))
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", credential)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::transport_error)?;

        if !status.is_success() {
            let error = Self::classify_status(status.as_u16(), &text);
            warn!("Gemini API error ({}): {}", status, error);
            return Err(error);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        match Self::extract_text(&parsed) {
            Some(text) => Ok(text),
            None => {
                info!("Gemini returned no text for model {}", request.model);
                Err(ProviderError::EmptyResponse)
            }
        }
    }
}
