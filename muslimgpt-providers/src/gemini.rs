//! Gemini `generateContent` HTTP client

use async_trait::async_trait;
use muslimgpt_core::config::Config;
use reqwest::header::HeaderName;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::base::{ApiRole, CompletionClient, ConversationTurn, ProviderError, ProviderResult};

/// Public Gemini endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// generateContent request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: ApiRole,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// generateContent response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
    #[serde(default)]
    total_token_count: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Gemini completion client
pub struct GeminiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    extra_headers: HashMap<String, String>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// Without an API key the client is built anyway and the first request
    /// fails with the API's authentication error.
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        model: String,
        extra_headers: Option<HashMap<String, String>>,
    ) -> Self {
        let api_base = api_base
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::builder()
                .user_agent(concat!("muslimgpt/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    /// Build a client from the loaded configuration
    pub fn from_config(config: &Config) -> ProviderResult<Self> {
        let provider = &config.providers.gemini;
        let extra_headers = provider.extra_headers.clone().unwrap_or_default();
        for name in extra_headers.keys() {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ProviderError::ConfigError(format!("invalid extra header name: {}", name))
            })?;
        }

        Ok(Self::new(
            provider.api_key(),
            provider.api_base(),
            config.agent.model.clone(),
            Some(extra_headers),
        ))
    }

    /// Whether an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    fn build_request(
        history: Vec<ConversationTurn>,
        system_instruction: &str,
    ) -> GenerateContentRequest {
        let contents = history
            .into_iter()
            .map(|turn| Content {
                role: turn.role,
                parts: vec![Part { text: turn.text }],
            })
            .collect();

        let system_instruction = if system_instruction.trim().is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            })
        };

        GenerateContentRequest {
            contents,
            system_instruction,
        }
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header(API_KEY_HEADER, api_key);
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    /// Concatenate the text parts of the first candidate
    fn parse_response(response: GenerateContentResponse) -> ProviderResult<String> {
        if let Some(usage) = &response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "Completion usage"
            );
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason);
            return Err(ProviderError::InvalidResponse(match reason {
                Some(reason) => format!("Prompt blocked: {}", reason),
                None => "No candidates in response".to_string(),
            }));
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "Empty response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
    }

    /// Prefer the API's own error message over the raw body
    fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => match envelope.error.status {
                Some(code) => format!("HTTP {} ({}): {}", status, code, envelope.error.message),
                None => format!("HTTP {}: {}", status, envelope.error.message),
            },
            Err(_) => format!("HTTP {}: {}", status, body),
        }
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(
        &self,
        history: Vec<ConversationTurn>,
        system_instruction: &str,
    ) -> ProviderResult<String> {
        let turns = history.len();
        let request = Self::build_request(history, system_instruction);

        let url = self.endpoint();
        debug!(
            "Sending generateContent request to {} with {} turns",
            url, turns
        );

        let req_builder = self.apply_headers(self.client.post(&url).json(&request));
        let response = req_builder.send().await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            return Err(ProviderError::ApiError(Self::describe_error(status, &body)));
        }

        let response_data: GenerateContentResponse = serde_json::from_str(&body)?;
        Self::parse_response(response_data)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
