use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ServiceError;

pub const SYSTEM_INSTRUCTION: &str = "Eres un experto legal que resume documentos de manera \
     precisa y clara, siempre en español.";
pub const TEMPERATURE: f32 = 0.2;

/// Result of exactly one model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCallOutcome {
    Success(String),
    /// Overload, timeout, 5xx: the same call may succeed later.
    TransientError(String),
    /// Generation stopped at the output token limit.
    BudgetExceeded(String),
    /// Auth, invalid request, exhausted quota.
    PermanentError(String),
    /// The call succeeded but produced no usable text (often a safety block).
    EmptyOutput(String),
}

impl ModelCallOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelCallOutcome::Success(_) => "success",
            ModelCallOutcome::TransientError(_) => "transient_error",
            ModelCallOutcome::BudgetExceeded(_) => "budget_exceeded",
            ModelCallOutcome::PermanentError(_) => "permanent_error",
            ModelCallOutcome::EmptyOutput(_) => "empty_output",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ModelCallOutcome::Success(s)
            | ModelCallOutcome::TransientError(s)
            | ModelCallOutcome::BudgetExceeded(s)
            | ModelCallOutcome::PermanentError(s)
            | ModelCallOutcome::EmptyOutput(s) => s,
        }
    }
}

impl fmt::Display for ModelCallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}

/// One bounded call to a text-generation endpoint. Implementations never retry.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn call(&self, prompt: &str, model_id: &str, max_output_tokens: u32)
        -> ModelCallOutcome;
}

/// REST client for the Gemini `generateContent` API.
pub struct GeminiCaller {
    client: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl GeminiCaller {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        // Url::join drops the last segment unless the base ends with '/'
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.trim().to_string(),
            base_url: Url::parse(&base)?,
        })
    }

    fn endpoint(&self, model_id: &str) -> Result<Url, url::ParseError> {
        let model = model_id.strip_prefix("models/").unwrap_or(model_id);
        self.base_url
            .join(&format!("models/{model}:generateContent"))
    }

    fn build_request_body(prompt: &str, max_output_tokens: u32) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "systemInstruction": {
                "role": "system",
                "parts": [{ "text": SYSTEM_INSTRUCTION }]
            },
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": max_output_tokens,
                "responseMimeType": "text/plain"
            }
        })
    }
}

#[async_trait]
impl ModelCaller for GeminiCaller {
    async fn call(
        &self,
        prompt: &str,
        model_id: &str,
        max_output_tokens: u32,
    ) -> ModelCallOutcome {
        let url = match self.endpoint(model_id) {
            Ok(url) => url,
            Err(e) => return ModelCallOutcome::PermanentError(format!("invalid endpoint: {e}")),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&self.api_key) {
            Ok(key) => {
                headers.insert("x-goog-api-key", key);
            }
            Err(_) => {
                return ModelCallOutcome::PermanentError("API key is not a valid header".into())
            }
        }

        debug!(model = model_id, max_output_tokens, "gemini request");

        let response = match self
            .client
            .post(url)
            .headers(headers)
            .json(&Self::build_request_body(prompt, max_output_tokens))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return ModelCallOutcome::TransientError(format!("transport error: {e} (model={model_id})"))
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return ModelCallOutcome::TransientError(format!("failed to read body: {e} (model={model_id})"))
            }
        };

        let outcome = classify_response(status, &body);
        debug!(model = model_id, status, outcome = outcome.kind(), "gemini response");
        outcome
    }
}

const TRANSIENT_STATUSES: &[&str] = &[
    "INTERNAL",
    "UNAVAILABLE",
    "DEADLINE_EXCEEDED",
    "ABORTED",
];

/// Maps an HTTP status and raw body onto the outcome taxonomy.
pub fn classify_response(status: u16, body: &str) -> ModelCallOutcome {
    let data: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let detail = format!("non-JSON response (HTTP {status})");
            return if (400..500).contains(&status) && status != 408 && status != 429 {
                ModelCallOutcome::PermanentError(detail)
            } else {
                ModelCallOutcome::TransientError(detail)
            };
        }
    };

    if status >= 400 || data.get("error").is_some() {
        return classify_error(status, &data["error"]);
    }

    let finish = finish_info(&data);
    let truncated = data["candidates"]
        .as_array()
        .into_iter()
        .flatten()
        .any(|c| finish_reason(c) == Some("MAX_TOKENS"));

    if truncated {
        return ModelCallOutcome::BudgetExceeded(
            finish.unwrap_or_else(|| "finish_reason=MAX_TOKENS".into()),
        );
    }

    match extract_text(&data) {
        Some(text) => ModelCallOutcome::Success(text),
        None => ModelCallOutcome::EmptyOutput(finish.unwrap_or_else(|| "no text in response".into())),
    }
}

fn classify_error(status: u16, error: &Value) -> ModelCallOutcome {
    let code = error["status"].as_str().unwrap_or_default();
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));
    let detail = if code.is_empty() {
        message
    } else {
        format!("{code}: {message}")
    };

    let transient = status >= 500
        || status == 408
        || TRANSIENT_STATUSES.contains(&code)
        || (status == 429 && !detail.to_lowercase().contains("quota"));

    if transient {
        ModelCallOutcome::TransientError(detail)
    } else {
        ModelCallOutcome::PermanentError(detail)
    }
}

fn finish_reason(candidate: &Value) -> Option<&str> {
    candidate["finishReason"]
        .as_str()
        .or_else(|| candidate["finish_reason"].as_str())
}

/// Text parts of the first candidate that has any, newline-joined.
fn extract_text(data: &Value) -> Option<String> {
    data["candidates"]
        .as_array()?
        .iter()
        .map(|c| {
            c["content"]["parts"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|p| p["text"].as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|texts| !texts.is_empty())
        .map(|texts| texts.join("\n"))
}

/// Block reasons, finish reasons and safety ratings, kept for diagnostics.
fn finish_info(data: &Value) -> Option<String> {
    let mut bits = Vec::new();
    let feedback = data
        .get("promptFeedback")
        .or_else(|| data.get("prompt_feedback"));
    if let Some(reason) = feedback.and_then(|f| {
        f["blockReason"]
            .as_str()
            .or_else(|| f["block_reason"].as_str())
    }) {
        bits.push(format!("prompt_block_reason={reason}"));
    }
    for candidate in data["candidates"].as_array().into_iter().flatten() {
        if let Some(reason) = finish_reason(candidate) {
            bits.push(format!("finish_reason={reason}"));
        }
        let ratings = candidate
            .get("safetyRatings")
            .or_else(|| candidate.get("safety_ratings"))
            .and_then(Value::as_array)
            .filter(|r| !r.is_empty());
        if let Some(ratings) = ratings {
            bits.push(format!("safety_ratings={}", Value::from(ratings.clone())));
        }
    }
    (!bits.is_empty()).then(|| bits.join(" | "))
}
