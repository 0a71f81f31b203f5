//! # LLM Client Pool
//!
//! Ordered failover across model backends. Every request walks the list from the
//! top; the first backend that answers wins. Per-backend failures are logged and the
//! next backend is tried, so callers only see a failure when the whole list is down.

use reqwest::{Client, Url};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::backend::{LlmBackend, OllamaBackend};
use super::types::{ChatMessage, CompletionRequest, ToolDefinition, ToolReply};
use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};

#[derive(Clone)]
pub struct LlmClientPool {
    backends: Vec<Arc<dyn LlmBackend>>,
}

impl std::fmt::Debug for LlmClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClientPool")
            .field("backends", &self.labels())
            .finish()
    }
}

/// `local/<model>` for loopback hosts, `<host>/<model>` otherwise
pub fn derive_label(url: &str, model: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());
    match host.as_str() {
        "localhost" | "127.0.0.1" | "::1" | "[::1]" => format!("local/{model}"),
        _ => format!("{host}/{model}"),
    }
}

impl LlmClientPool {
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport {
                backend: "pool".to_string(),
                message: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        let mut backends: Vec<Arc<dyn LlmBackend>> = Vec::new();
        for backend in &config.backends {
            let key = (backend.url.trim_end_matches('/').to_string(), backend.model.clone());
            if !seen.insert(key) {
                warn!(url = %backend.url, model = %backend.model, "Dropping duplicate LLM backend");
                continue;
            }
            backends.push(Arc::new(OllamaBackend::new(
                derive_label(&backend.url, &backend.model),
                &backend.url,
                backend.model.clone(),
                http.clone(),
                config.tool_temperature,
                config.tool_num_predict,
            )));
        }

        let pool = Self::with_backends(backends);
        if pool.backends.is_empty() {
            return Err(LlmError::NoBackends);
        }
        Ok(pool)
    }

    pub fn with_backends(backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        let pool = Self { backends };
        info!(backends = ?pool.labels(), "🧩 LLM_POOL: Backends configured");
        pool
    }

    pub fn labels(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.label().to_string()).collect()
    }

    /// Text completion from the first responsive backend; `None` when all fail
    pub async fn complete(&self, request: &CompletionRequest) -> Option<String> {
        for backend in &self.backends {
            match backend.complete(request).await {
                Ok(text) => return Some(text),
                Err(err) => {
                    warn!(backend = %backend.label(), error = %err, "LLM completion failed, trying next backend");
                }
            }
        }
        warn!(attempted = self.backends.len(), "All LLM backends failed for completion");
        None
    }

    /// Tool-enabled chat turn with failover
    pub async fn call_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> LlmResult<ToolReply> {
        let mut last = None;
        for backend in &self.backends {
            match backend.chat_with_tools(messages, tools).await {
                Ok(message) => {
                    return Ok(ToolReply {
                        message,
                        backend: backend.label().to_string(),
                    })
                }
                Err(err) => {
                    warn!(backend = %backend.label(), error = %err, "LLM tool call failed, trying next backend");
                    last = Some(err);
                }
            }
        }
        match last {
            Some(last) => Err(LlmError::AllBackendsFailed {
                attempted: self.backends.len(),
                last: Box::new(last),
            }),
            None => Err(LlmError::NoBackends),
        }
    }

    /// Warm the first backend that answers. Returns its label.
    pub async fn warm_up(&self) -> Option<String> {
        for backend in &self.backends {
            match backend.warm_up().await {
                Ok(()) => {
                    info!(backend = %backend.label(), "🔥 LLM_POOL: Backend warmed up");
                    return Some(backend.label().to_string());
                }
                Err(err) => warn!(backend = %backend.label(), error = %err, "LLM warm-up failed"),
            }
        }
        warn!("No LLM backend answered the warm-up; continuing anyway");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmBackendConfig;
    use crate::llm::types::ToolCall;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        label: String,
        healthy: bool,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(label: &str, healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                healthy,
                calls: AtomicUsize::new(0),
            })
        }

        fn failure(&self) -> LlmError {
            LlmError::Transport {
                backend: self.label.clone(),
                message: "connection refused".to_string(),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for Scripted {
        fn label(&self) -> &str {
            &self.label
        }

        async fn complete(&self, _request: &CompletionRequest) -> LlmResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(format!("hello from {}", self.label))
            } else {
                Err(self.failure())
            }
        }

        async fn chat_with_tools(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> LlmResult<ChatMessage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(ChatMessage::assistant("", vec![ToolCall::new("browse_feed", json!({}))]))
            } else {
                Err(self.failure())
            }
        }

        async fn warm_up(&self) -> LlmResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn third_backend_answers_when_first_two_are_down() {
        let a = Scripted::new("a", false);
        let b = Scripted::new("b", false);
        let c = Scripted::new("c", true);
        let pool = LlmClientPool::with_backends(vec![a.clone(), b.clone(), c.clone()]);

        let reply = pool.call_tools(&[ChatMessage::user("go")], &[]).await.unwrap();
        assert_eq!(reply.backend, "c");
        assert_eq!(reply.message.tool_calls[0].name, "browse_feed");

        let text = pool.complete(&CompletionRequest::new("sys", "hi", 10)).await;
        assert_eq!(text.as_deref(), Some("hello from c"));
        assert_eq!(a.calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn total_failure_is_reported_with_last_error() {
        let pool = LlmClientPool::with_backends(vec![Scripted::new("a", false), Scripted::new("b", false)]);
        assert!(pool.complete(&CompletionRequest::new("s", "p", 5)).await.is_none());
        match pool.call_tools(&[], &[]).await {
            Err(LlmError::AllBackendsFailed { attempted, last }) => {
                assert_eq!(attempted, 2);
                assert!(last.to_string().contains('b'));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn labels_and_dedup_follow_config() {
        assert_eq!(derive_label("http://localhost:11434", "qwen2.5:3b"), "local/qwen2.5:3b");
        assert_eq!(derive_label("http://gpu-box:11434", "llama3"), "gpu-box/llama3");

        let config = LlmConfig {
            backends: vec![
                LlmBackendConfig { url: "http://localhost:11434".into(), model: "m".into() },
                LlmBackendConfig { url: "http://localhost:11434/".into(), model: "m".into() },
                LlmBackendConfig { url: "http://10.0.0.5:11434".into(), model: "m".into() },
            ],
            ..LlmConfig::default()
        };
        let pool = LlmClientPool::from_config(&config).unwrap();
        assert_eq!(pool.labels(), vec!["local/m", "10.0.0.5/m"]);
    }
}
