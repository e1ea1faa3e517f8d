//! OpenAI-compatible chat completions backend.

use async_trait::async_trait;
use log::{debug, warn};
use parley_rs_config::{ModelEntry, ProviderKind};
use parley_rs_protocol::{BackendError, ChatBackend, ChatRequest, PromptMessage};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

/// Upper bound on provider body text carried in error details.
const MAX_DETAIL_BODY: usize = 2048;

/// Backend speaking the `/chat/completions` wire format.
///
/// The `spark` flavor also enables the provider's web search tool and treats
/// a non-zero `code` in a successful response as a failure.
pub struct OpenAiCompatibleBackend {
    name: String,
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    flavor: ProviderKind,
}

impl OpenAiCompatibleBackend {
    /// Build a backend from a config entry, resolving its credential.
    pub fn from_entry(name: impl Into<String>, entry: &ModelEntry) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(entry.timeout_secs))
            .build()
            .map_err(|err| BackendError::unknown(format!("failed to build http client: {err}")))?;
        Ok(Self {
            name: name.into(),
            client,
            endpoint: format!("{}/chat/completions", entry.base_url.trim_end_matches('/')),
            model: entry.model.clone(),
            api_key: entry.resolve_api_key(),
            flavor: entry.provider,
        })
    }

    /// Request URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(&self, request: &ChatRequest) -> CompletionRequest {
        let tools = match self.flavor {
            ProviderKind::Spark => Some(vec![json!({
                "type": "web_search",
                "web_search": { "enable": true },
            })]),
            ProviderKind::Openai => None,
        };
        CompletionRequest {
            model: self.model.clone(),
            messages: request.messages(),
            tools,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(BackendError::auth(format!(
                "no api key configured for model {}",
                self.name
            )));
        };
        let body = self.build_body(request);
        debug!(
            "sending chat request (model={}, messages={})",
            self.name,
            body.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            warn!("chat request rejected (model={}, status={})", self.name, status);
            return Err(map_http_error(status, &text));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|err| {
            BackendError::malformed(format!("failed to parse response: {err}"))
                .with_details(json!({ "body": truncate(&text) }))
        })?;

        if self.flavor == ProviderKind::Spark
            && let Some(code) = parsed.code.filter(|code| *code != 0)
        {
            let message = parsed
                .message
                .clone()
                .unwrap_or_else(|| "provider reported an error".to_string());
            return Err(BackendError::unknown(message).with_details(json!({ "code": code })));
        }

        extract_text_response(parsed)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<PromptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: CompletionResponse) -> Result<String, BackendError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| BackendError::malformed("response contained no message content"))
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::timeout(format!("request timed out: {err}"))
    } else if err.is_connect() {
        BackendError::network(format!("connection failed: {err}"))
    } else if err.is_decode() || err.is_body() {
        BackendError::malformed(format!("failed to read response: {err}"))
    } else {
        BackendError::network(format!("request failed: {err}"))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| format!("http status {status}"));
    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::auth(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::rate_limit(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::timeout(message),
        _ => BackendError::unknown(message),
    };
    error.with_details(json!({ "status": status.as_u16(), "body": truncate(body) }))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_DETAIL_BODY) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
