//! Backend abstraction and the Ollama-compatible HTTP implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{parse_tool_calls, ChatMessage, CompletionRequest, ToolDefinition};
use crate::error::{LlmError, LlmResult};

/// One model endpoint the pool can fail over across
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Stable label used in logs and cycle results
    fn label(&self) -> &str;

    /// Single-shot text completion. Empty output is an error.
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String>;

    /// Tool-enabled chat turn; returns the assistant message
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> LlmResult<ChatMessage>;

    /// Load the model so the first real request is not slow
    async fn warm_up(&self) -> LlmResult<()>;
}

/// Ollama server speaking both `/v1/chat/completions` and `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    label: String,
    base_url: String,
    model: String,
    http: Client,
    tool_temperature: f64,
    tool_num_predict: u32,
}

impl OllamaBackend {
    pub fn new(
        label: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        http: Client,
        tool_temperature: f64,
        tool_num_predict: u32,
    ) -> Self {
        Self {
            label: label.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            http,
            tool_temperature,
            tool_num_predict,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, path: &str, body: &Value) -> LlmResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Transport {
                backend: self.label.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                backend: self.label.clone(),
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        response.json::<Value>().await.map_err(|e| LlmError::Decode {
            backend: self.label.clone(),
            message: e.to_string(),
        })
    }

    fn decode_error(&self, message: &str) -> LlmError {
        LlmError::Decode {
            backend: self.label.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn label(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        });
        let response = self.post("/v1/chat/completions", &body).await?;
        let text = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(self.decode_error("empty completion"));
        }
        debug!(backend = %self.label, chars = text.len(), "Completion received");
        Ok(text.to_string())
    }

    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> LlmResult<ChatMessage> {
        let body = json!({
            "model": self.model,
            "messages": messages.iter().map(ChatMessage::to_wire).collect::<Vec<_>>(),
            "tools": tools.iter().map(ToolDefinition::to_wire).collect::<Vec<_>>(),
            "stream": false,
            "options": {
                "temperature": self.tool_temperature,
                "num_predict": self.tool_num_predict,
            },
        });
        let response = self.post("/api/chat", &body).await?;
        let message = response
            .get("message")
            .ok_or_else(|| self.decode_error("response has no message"))?;
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(ChatMessage::assistant(content, parse_tool_calls(message)))
    }

    async fn warm_up(&self) -> LlmResult<()> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": false,
            "options": { "num_predict": 1 },
        });
        self.post("/api/chat", &body).await.map(|_| ())
    }
}
