//! Reasoning over an Ollama-compatible `/api/generate` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hive_core::api::{ReasoningCall, ReasoningError, ReasoningErrorKind, ReasoningRequest};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Clone)]
pub struct HttpReasoning {
    http: reqwest::Client,
    model: String,
    url_generate: String,
}

impl HttpReasoning {
    pub fn new(endpoint: &str, model: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let normalized = endpoint.trim_end_matches('/');
        Ok(Self {
            http,
            model: model.into(),
            url_generate: format!("{normalized}/api/generate"),
        })
    }
}

#[async_trait]
impl ReasoningCall for HttpReasoning {
    fn name(&self) -> &str {
        "http-generate"
    }

    async fn reason(&self, request: ReasoningRequest) -> Result<String, ReasoningError> {
        let model = request.backend.as_deref().unwrap_or(&self.model);
        tracing::debug!(
            target: "hive.reasoning",
            stage = "reasoning.http.in",
            url = %self.url_generate,
            model = model,
            prompt_len = request.prompt.len()
        );

        let body = GenerateRequest {
            model,
            prompt: &request.prompt,
            stream: false,
        };
        let resp = self
            .http
            .post(&self.url_generate)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(ReasoningError::new(
                ReasoningErrorKind::Status,
                format!("status={} body={}", status.as_u16(), preview_body(&text)),
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|err| {
            ReasoningError::new(
                ReasoningErrorKind::Decode,
                format!("failed to decode response body: {err} | body={}", preview_body(&text)),
            )
        })?;

        tracing::debug!(
            target: "hive.reasoning",
            stage = "reasoning.http.out",
            status = %status,
            response_len = parsed.response.len()
        );
        Ok(parsed.response)
    }
}

fn from_reqwest(err: reqwest::Error) -> ReasoningError {
    let kind = if err.is_timeout() {
        ReasoningErrorKind::Timeout
    } else if err.is_connect() {
        ReasoningErrorKind::Connection
    } else if err.is_decode() {
        ReasoningErrorKind::Decode
    } else if err.is_status() {
        ReasoningErrorKind::Status
    } else {
        ReasoningErrorKind::Other
    };
    ReasoningError::new(kind, err.to_string())
}

pub(crate) fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}
