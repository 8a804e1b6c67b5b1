//! Text transform client (summarize / spellcheck).
//!
//! # Responsibility
//! - Send reminder notes to an OpenAI-compatible chat endpoint.
//! - Optionally try an alternate `POST /ai` endpoint once before the provider.
//!
//! # Invariants
//! - Blank input is rejected before any request is made.
//! - Missing provider credentials surface as `AiError::Configuration`.
//! - No retries beyond the single alternate-endpoint attempt.

use crate::config::{non_blank, AiConfig};
use crate::logging::sanitize_message;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

const PROVIDER_OPENAI: &str = "openai";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAction {
    Summarize,
    Spellcheck,
}

impl TextAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Spellcheck => "spellcheck",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Self::Summarize => "You summarize short personal notes concisely.",
            Self::Spellcheck => {
                "You fix spelling and grammar. Reply with the corrected text only."
            }
        }
    }

    fn user_prompt(self, text: &str) -> String {
        match self {
            Self::Summarize => format!("Summarize this note in 2-3 sentences:\n\n{text}"),
            Self::Spellcheck => format!(
                "Correct the spelling and grammar of this note and return only the corrected note:\n\n{text}"
            ),
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            Self::Summarize => 200,
            Self::Spellcheck => 800,
        }
    }
}

impl FromStr for TextAction {
    type Err = AiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "summarize" => Ok(Self::Summarize),
            "spellcheck" => Ok(Self::Spellcheck),
            other => Err(AiError::UnknownAction(other.to_string())),
        }
    }
}

impl Display for TextAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// No credential/endpoint, or an unsupported provider.
    Configuration(String),
    EmptyText,
    UnknownAction(String),
    /// Upstream request failed or returned an unusable answer.
    Provider(String),
}

impl Display for AiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "text transform not configured: {message}"),
            Self::EmptyText => write!(f, "text is required"),
            Self::UnknownAction(action) => write!(f, "unknown text action `{action}`"),
            Self::Provider(message) => write!(f, "text transform failed: {message}"),
        }
    }
}

impl Error for AiError {}

/// Transforms note text.
#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn transform(&self, action: TextAction, text: &str) -> Result<String, AiError>;
}

/// HTTP implementation of `TextTransformer`.
pub struct AiClient {
    config: AiConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AlternateResponse {
    result: Option<String>,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| AiError::Configuration(format!("failed to build http client: {err}")))?;
        Ok(Self { config, http })
    }

    async fn call_alternate(
        &self,
        base_url: &str,
        action: TextAction,
        text: &str,
    ) -> Result<String, AiError> {
        let url = format!("{}/ai", base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .json(&json!({ "action": action, "text": text }))
            .send()
            .await
            .map_err(|err| AiError::Provider(err.to_string()))?;
        let response = ensure_success(response).await?;
        let body: AlternateResponse = response
            .json()
            .await
            .map_err(|err| AiError::Provider(format!("invalid alternate response: {err}")))?;
        body.result
            .ok_or_else(|| AiError::Provider("alternate response has no result".to_string()))
    }

    async fn call_provider(&self, action: TextAction, text: &str) -> Result<String, AiError> {
        let Some(api_key) = non_blank(self.config.api_key.as_deref()) else {
            warn!("event=ai_call module=ai status=error error_code=missing_api_key");
            return Err(AiError::Configuration("AI api key not set".to_string()));
        };
        if self.config.provider != PROVIDER_OPENAI {
            return Err(AiError::Configuration(format!(
                "AI provider `{}` is not supported",
                self.config.provider
            )));
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": action.system_prompt() },
                { "role": "user", "content": action.user_prompt(text) },
            ],
            "max_tokens": action.max_tokens(),
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| AiError::Provider(err.to_string()))?;
        let response = ensure_success(response).await?;
        let payload: Value = response
            .json()
            .await
            .map_err(|err| AiError::Provider(format!("invalid provider response: {err}")))?;
        Ok(completion_text(&payload).trim().to_string())
    }
}

#[async_trait]
impl TextTransformer for AiClient {
    async fn transform(&self, action: TextAction, text: &str) -> Result<String, AiError> {
        if text.trim().is_empty() {
            return Err(AiError::EmptyText);
        }

        if let Some(alt_url) = non_blank(self.config.alt_url.as_deref()) {
            match self.call_alternate(alt_url, action, text).await {
                Ok(result) => {
                    debug!("event=ai_call module=ai status=ok action={action} endpoint=alternate");
                    return Ok(result);
                }
                Err(err) => warn!(
                    "event=ai_call module=ai status=fallback action={action} endpoint=alternate error={err}"
                ),
            }
        }

        let result = self.call_provider(action, text).await?;
        debug!("event=ai_call module=ai status=ok action={action} endpoint=provider");
        Ok(result)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::Provider(format!(
        "http {status}: {}",
        sanitize_message(&body, MAX_ERROR_BODY_CHARS)
    )))
}

/// Extracts the first choice's text from a chat or legacy completion body.
fn completion_text(payload: &Value) -> &str {
    let choice = &payload["choices"][0];
    choice["message"]["content"]
        .as_str()
        .or_else(|| choice["text"].as_str())
        .unwrap_or("")
}
