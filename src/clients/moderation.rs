//! Admin API used by moderation personas.
//!
//! Every call carries the admin key in `X-Admin-Key`. Without a key the client refuses
//! to send anything and reports [`ClientErrorKind::NotConfigured`].

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::config::{ModerationConfig, PlatformConfig};
use crate::error::{ClientError, ClientErrorKind, ClientResult};

const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// One server-side content flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHit {
    #[serde(alias = "agent_name")]
    pub agent: String,
    #[serde(default)]
    pub matched_term: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default)]
    pub flagged: usize,
    #[serde(default)]
    pub results: Vec<ScanHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnforcementResult {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub videos_deleted: u64,
}

#[async_trait]
pub trait ModerationClient: Send + Sync {
    fn has_admin_key(&self) -> bool;

    async fn scan_content(&self) -> ClientResult<ScanReport>;

    /// Remove every video by `agent_name`
    async fn nuke(&self, agent_name: &str, reason: &str) -> ClientResult<EnforcementResult>;

    async fn ban(&self, agent_name: &str, reason: &str) -> ClientResult<EnforcementResult>;
}

#[derive(Debug, Clone)]
pub struct HttpModerationClient {
    base_url: String,
    admin_key: Option<String>,
    http: Client,
}

impl HttpModerationClient {
    pub fn from_config(platform: &PlatformConfig, moderation: &ModerationConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(platform.connect_timeout())
            .timeout(platform.request_timeout())
            .user_agent(platform.user_agent.clone())
            .build()
            .map_err(|e| ClientError::from_reqwest("build_client", e))?;
        Ok(Self {
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            admin_key: moderation.admin_key.clone().filter(|k| !k.is_empty()),
            http,
        })
    }

    fn key(&self, operation: &str) -> ClientResult<&str> {
        self.admin_key
            .as_deref()
            .ok_or_else(|| ClientError::not_configured(operation, "admin key"))
    }

    async fn enforce(&self, operation: &str, agent_name: &str, reason: &str) -> ClientResult<EnforcementResult> {
        let key = self.key(operation)?;
        let response = self
            .http
            .post(format!("{}/api/admin/{operation}", self.base_url))
            .header(ADMIN_KEY_HEADER, key)
            .json(&json!({ "agent_name": agent_name, "reason": reason }))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(operation, status.as_u16(), body));
        }
        response
            .json::<EnforcementResult>()
            .await
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, operation, e.to_string()))
    }
}

#[async_trait]
impl ModerationClient for HttpModerationClient {
    fn has_admin_key(&self) -> bool {
        self.admin_key.is_some()
    }

    async fn scan_content(&self) -> ClientResult<ScanReport> {
        let operation = "scan_content";
        let key = self.key(operation)?;
        let response = self
            .http
            .get(format!("{}/api/admin/scan-content", self.base_url))
            .header(ADMIN_KEY_HEADER, key)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(operation, status.as_u16(), body));
        }
        response
            .json::<ScanReport>()
            .await
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, operation, e.to_string()))
    }

    async fn nuke(&self, agent_name: &str, reason: &str) -> ClientResult<EnforcementResult> {
        self.enforce("nuke", agent_name, reason).await
    }

    async fn ban(&self, agent_name: &str, reason: &str) -> ClientResult<EnforcementResult> {
        self.enforce("ban", agent_name, reason).await
    }
}

/// Local regex pre-check for titles, descriptions and comments
#[derive(Debug, Clone, Default)]
pub struct ContentBlocklist {
    patterns: Vec<Regex>,
}

impl ContentBlocklist {
    /// Case-insensitive; invalid patterns are skipped with a warning
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(&format!("(?i){p}")) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %p, error = %err, "Skipping invalid blocklist pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// First matching pattern source, if any
    pub fn first_match(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.find(text).map(|m| m.as_str().to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
