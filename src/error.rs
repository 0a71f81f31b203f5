//! Error types for the persona daemon.
//!
//! Every external-call wrapper returns an explicit error kind so the cycle and loop
//! layers can decide between skipping a single action, ending a cycle, or logging and
//! moving on. Nothing here is meant to crash the process.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigurationError;

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Database error: {0}")]
    Database(#[from] StoreError),
    #[error("Platform error: {0}")]
    Platform(#[from] ClientError),
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
    #[error("Decision error: {0}")]
    Decision(String),
    #[error("Unknown actor: {0}")]
    UnknownActor(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersonaError>;

/// Classification of a failed platform / HTTP collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Connection refused, DNS failure, reset
    Transport,
    /// Connect or read deadline exceeded
    Timeout,
    /// Non-success HTTP status
    Status,
    /// Response body did not match the expected shape
    Decode,
    /// Credentials missing or rejected
    Unauthorized,
    /// Collaborator not configured (no URL, no key)
    NotConfigured,
}

#[derive(Debug, Error)]
#[error("{operation} failed ({kind:?}): {message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub operation: String,
    pub message: String,
    pub status: Option<u16>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let kind = if status == 401 || status == 403 {
            ClientErrorKind::Unauthorized
        } else {
            ClientErrorKind::Status
        };
        Self {
            kind,
            operation: operation.into(),
            message: body.into(),
            status: Some(status),
        }
    }

    pub fn not_configured(operation: impl Into<String>, what: &str) -> Self {
        Self::new(ClientErrorKind::NotConfigured, operation, format!("{what} not configured"))
    }

    pub fn from_reqwest(operation: impl Into<String>, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ClientErrorKind::Timeout
        } else if err.is_decode() {
            ClientErrorKind::Decode
        } else if let Some(status) = err.status() {
            return Self::status(operation, status.as_u16(), err.to_string());
        } else {
            ClientErrorKind::Transport
        };
        Self::new(kind, operation, err.to_string())
    }

    /// Transport-level failures say nothing about the request itself.
    pub fn is_availability(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Transport | ClientErrorKind::Timeout)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Transport error talking to {backend}: {message}")]
    Transport { backend: String, message: String },
    #[error("Backend {backend} returned status {status}: {body}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },
    #[error("Could not decode response from {backend}: {message}")]
    Decode { backend: String, message: String },
    #[error("No LLM backends configured")]
    NoBackends,
    #[error("All {attempted} LLM backends failed; last error: {last}")]
    AllBackendsFailed { attempted: usize, last: Box<LlmError> },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media backend unavailable: {0}")]
    Unavailable(String),
    #[error("Media job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },
    #[error("Media job {job_id} exceeded its {deadline:?} deadline")]
    DeadlineExceeded { job_id: String, deadline: Duration },
    #[error("Compositor error: {0}")]
    Compositor(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("State store channel closed")]
    ChannelClosed,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
