//! # Platform Client
//!
//! Authenticated access to the video platform's public API on behalf of one persona.
//!
//! Listing endpoints are tolerant of response shape: a bare array or an object wrapping
//! the list under `videos`, `results`, `trending` or `items` all decode the same way.
//! Every mutating call requires the persona's API key and fails with
//! [`ClientErrorKind::NotConfigured`] when none is present.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::error::{ClientError, ClientErrorKind, ClientResult};
use crate::models::{Comment, Video, VideoUpload};

const API_KEY_HEADER: &str = "X-API-Key";

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Persona this client acts as
    fn agent_name(&self) -> &str;

    async fn feed(&self, page: u32) -> ClientResult<Vec<Video>>;

    /// Most recent uploads across the platform, newest first
    async fn recent_videos(&self, limit: u32) -> ClientResult<Vec<Video>>;

    async fn trending(&self) -> ClientResult<Vec<Video>>;

    async fn search(&self, query: &str) -> ClientResult<Vec<Video>>;

    /// Register a view
    async fn watch(&self, video_id: &str) -> ClientResult<()>;

    async fn get_video(&self, video_id: &str) -> ClientResult<Video>;

    async fn get_comments(&self, video_id: &str) -> ClientResult<Vec<Comment>>;

    async fn comment(&self, video_id: &str, content: &str) -> ClientResult<()>;

    async fn like(&self, video_id: &str) -> ClientResult<()>;

    async fn dislike(&self, video_id: &str) -> ClientResult<()>;

    async fn subscribe(&self, agent_name: &str) -> ClientResult<()>;

    /// Upload a rendered file; returns the new video id
    async fn upload(&self, upload: &VideoUpload) -> ClientResult<String>;
}

/// Builds per-persona clients and performs self-registration
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    fn client_for(&self, actor_id: &str, api_key: Option<&str>) -> Arc<dyn PlatformClient>;

    /// Register a persona that has no key yet; returns the issued API key
    async fn register(&self, actor_id: &str, display_name: &str) -> ClientResult<String>;
}

/// Pull a video list out of any of the listing shapes the platform returns
pub fn videos_from(value: Value) -> ClientResult<Vec<Video>> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => ["videos", "results", "trending", "items"]
            .iter()
            .find_map(|key| map.remove(*key))
            .unwrap_or(Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(list)
        .map_err(|e| ClientError::new(ClientErrorKind::Decode, "decode_videos", e.to_string()))
}

async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::status(
            operation,
            status.as_u16(),
            body.chars().take(300).collect::<String>(),
        ));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::from_reqwest(operation, e))
}

#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    agent_name: String,
    api_key: Option<String>,
    base_url: String,
    http: Client,
    upload_timeout: Duration,
}

impl HttpPlatformClient {
    pub fn new(
        agent_name: impl Into<String>,
        api_key: Option<String>,
        base_url: &str,
        http: Client,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            upload_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, operation: &str, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        match &self.api_key {
            Some(key) => Ok(builder.header(API_KEY_HEADER, key)),
            None => Err(ClientError::not_configured(operation, "API key")),
        }
    }

    fn maybe_authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn get_json(&self, operation: &str, path: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        let response = self
            .maybe_authed(self.http.get(self.url(path)).query(query))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        decode(operation, response).await
    }

    async fn post_json(&self, operation: &str, path: &str, body: Value) -> ClientResult<Value> {
        let response = self
            .authed(operation, self.http.post(self.url(path)).json(&body))?
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        decode(operation, response).await
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    async fn feed(&self, page: u32) -> ClientResult<Vec<Video>> {
        let value = self
            .get_json("feed", "/api/feed", &[("page", page.to_string())])
            .await?;
        videos_from(value)
    }

    async fn recent_videos(&self, limit: u32) -> ClientResult<Vec<Video>> {
        let value = self
            .get_json(
                "recent_videos",
                "/api/feed",
                &[("page", "1".to_string()), ("limit", limit.to_string())],
            )
            .await?;
        videos_from(value)
    }

    async fn trending(&self) -> ClientResult<Vec<Video>> {
        videos_from(self.get_json("trending", "/api/trending", &[]).await?)
    }

    async fn search(&self, query: &str) -> ClientResult<Vec<Video>> {
        videos_from(
            self.get_json("search", "/api/search", &[("q", query.to_string())])
                .await?,
        )
    }

    async fn watch(&self, video_id: &str) -> ClientResult<()> {
        self.post_json("watch", &format!("/api/videos/{video_id}/view"), json!({}))
            .await
            .map(|_| ())
    }

    async fn get_video(&self, video_id: &str) -> ClientResult<Video> {
        let mut value = self
            .get_json("get_video", &format!("/api/videos/{video_id}"), &[])
            .await?;
        let video = value.get_mut("video").map(Value::take).unwrap_or(value);
        serde_json::from_value(video)
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, "get_video", e.to_string()))
    }

    async fn get_comments(&self, video_id: &str) -> ClientResult<Vec<Comment>> {
        let mut value = self
            .get_json("get_comments", &format!("/api/videos/{video_id}/comments"), &[])
            .await?;
        let list = value.get_mut("comments").map(Value::take).unwrap_or(value);
        serde_json::from_value(list)
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, "get_comments", e.to_string()))
    }

    async fn comment(&self, video_id: &str, content: &str) -> ClientResult<()> {
        self.post_json(
            "comment",
            &format!("/api/videos/{video_id}/comment"),
            json!({ "content": content }),
        )
        .await
        .map(|_| ())
    }

    async fn like(&self, video_id: &str) -> ClientResult<()> {
        self.post_json("like", &format!("/api/videos/{video_id}/vote"), json!({ "vote": 1 }))
            .await
            .map(|_| ())
    }

    async fn dislike(&self, video_id: &str) -> ClientResult<()> {
        self.post_json("dislike", &format!("/api/videos/{video_id}/vote"), json!({ "vote": -1 }))
            .await
            .map(|_| ())
    }

    async fn subscribe(&self, agent_name: &str) -> ClientResult<()> {
        self.post_json("subscribe", &format!("/api/agents/{agent_name}/subscribe"), json!({}))
            .await
            .map(|_| ())
    }

    async fn upload(&self, upload: &VideoUpload) -> ClientResult<String> {
        let operation = "upload";
        let bytes = tokio::fs::read(&upload.path)
            .await
            .map_err(|e| ClientError::new(ClientErrorKind::Transport, operation, e.to_string()))?;
        let file_name = upload
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(|e| ClientError::from_reqwest(operation, e))?;

        let mut form = Form::new()
            .part("video", part)
            .text("title", upload.title.clone())
            .text("description", upload.description.clone())
            .text("tags", upload.tags.join(","));
        if let Some(category) = &upload.category {
            form = form.text("category", category.clone());
        }

        let response = self
            .authed(operation, self.http.post(self.url("/api/upload")))?
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let value: Value = decode(operation, response).await?;
        let video_id = value
            .get("video_id")
            .or_else(|| value.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::new(ClientErrorKind::Decode, operation, "response has no video_id"))?
            .to_string();
        info!(actor = %self.agent_name, video_id = %video_id, title = %upload.title, "📤 PLATFORM: Upload accepted");
        Ok(video_id)
    }
}

/// HTTP connector sharing one connection pool across all personas
#[derive(Debug, Clone)]
pub struct HttpPlatformConnector {
    base_url: String,
    http: Client,
    upload_timeout: Duration,
}

impl HttpPlatformConnector {
    pub fn from_config(config: &PlatformConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::from_reqwest("build_client", e))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            upload_timeout: config.upload_timeout(),
        })
    }
}

#[async_trait]
impl PlatformConnector for HttpPlatformConnector {
    fn client_for(&self, actor_id: &str, api_key: Option<&str>) -> Arc<dyn PlatformClient> {
        Arc::new(HttpPlatformClient::new(
            actor_id,
            api_key.map(str::to_string),
            &self.base_url,
            self.http.clone(),
            self.upload_timeout,
        ))
    }

    async fn register(&self, actor_id: &str, display_name: &str) -> ClientResult<String> {
        let operation = "register";
        let response = self
            .http
            .post(format!("{}/api/register", self.base_url))
            .json(&json!({ "agent_name": actor_id, "display_name": display_name }))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let value: Value = decode(operation, response).await?;
        let key = value
            .get("api_key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ClientError::new(ClientErrorKind::Decode, operation, "response has no api_key"))?;
        debug!(actor = %actor_id, "Registration returned a key");
        Ok(key.to_string())
    }
}
