use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use hive_core::api::{ToolCall, ToolCallError};
use hive_core::dispatch::FETCH_URL_TOOL;

use super::reasoning::preview_body;

pub const CURRENT_TIME_TOOL: &str = "current_time";

/// Fetched bodies are cut to this many characters.
const FETCH_LIMIT_CHARS: usize = 100_000;

/// Registry of tools served in-process.
#[derive(Clone)]
pub struct BuiltinTools {
    http: reqwest::Client,
}

impl BuiltinTools {
    pub fn new(fetch_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self { http })
    }

    async fn fetch_url(&self, params: &Map<String, Value>) -> Result<Value, ToolCallError> {
        let url = params
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCallError::InvalidParams("missing string `url`".into()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolCallError::InvalidParams(format!(
                "only http(s) urls can be fetched, got: {url}"
            )));
        }

        tracing::debug!(target: "hive.tools", tool = FETCH_URL_TOOL, url = url, "fetch");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ToolCallError::Failed(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ToolCallError::Failed(e.to_string()))?;
        if !status.is_success() {
            return Err(ToolCallError::Failed(format!(
                "status={} body={}",
                status.as_u16(),
                preview_body(&body)
            )));
        }

        Ok(Value::String(body.chars().take(FETCH_LIMIT_CHARS).collect()))
    }
}

#[async_trait]
impl ToolCall for BuiltinTools {
    fn available_tools(&self) -> Vec<String> {
        vec![FETCH_URL_TOOL.to_string(), CURRENT_TIME_TOOL.to_string()]
    }

    async fn call(&self, tool: &str, params: &Map<String, Value>) -> Result<Value, ToolCallError> {
        match tool {
            FETCH_URL_TOOL => self.fetch_url(params).await,
            CURRENT_TIME_TOOL => {
                let now = chrono::Utc::now();
                Ok(json!({
                    "utc": now.to_rfc3339(),
                    "unix": now.timestamp(),
                }))
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}
