//! # Structured Logging Module
//!
//! Environment-aware structured logging that writes a human console stream and a JSON
//! file stream, so long-running daemon sessions can be replayed after the fact.
//!
//! Untrusted text (model output, generated comments, platform titles) must go through
//! [`sanitize_for_log`] before it reaches a log line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const MAX_LOGGED_TEXT: usize = 200;

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .or_else(|| config.level.clone())
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(config.ansi)
            .with_filter(EnvFilter::new(log_level.clone()));

        let file_layer = if config.file_output {
            match prepare_log_dir(&config.directory) {
                Ok(dir) => {
                    let filename = format!(
                        "{}.{}.{}.log",
                        environment,
                        process::id(),
                        Utc::now().format("%Y%m%d_%H%M%S")
                    );
                    let appender = tracing_appender::rolling::never(&dir, &filename);
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let _ = FILE_GUARD.set(guard);
                    Some(
                        fmt::layer()
                            .with_writer(writer)
                            .with_target(true)
                            .with_level(true)
                            .with_ansi(false)
                            .json()
                            .with_filter(EnvFilter::new(log_level.clone())),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "WARN: could not create log directory {}: {e}",
                        config.directory.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        // A global subscriber may already be installed (tests, embedding hosts)
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_dir = %config.directory.display(),
            file_output = config.file_output,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn prepare_log_dir(dir: &Path) -> std::io::Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PERSONA_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Strip control characters and cap length so model output cannot forge log lines.
pub fn sanitize_for_log(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_LOGGED_TEXT)
        .collect();
    if text.chars().count() > MAX_LOGGED_TEXT {
        cleaned.push('…');
    }
    cleaned
}

/// Log structured data for a single actor operation
pub fn log_actor_operation(
    operation: &str,
    actor: &str,
    video_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    let details = details.map(sanitize_for_log);
    tracing::info!(
        operation = %operation,
        actor = %actor,
        video_id = video_id,
        status = %status,
        details = details.as_deref(),
        "🤖 ACTOR_OPERATION"
    );
}

/// Log the terminal state of one decision cycle
pub fn log_cycle_outcome(cycle: &str, actor: &str, cycle_id: &str, outcome: &str, actions: usize) {
    tracing::info!(
        cycle = %cycle,
        actor = %actor,
        cycle_id = %cycle_id,
        outcome = %outcome,
        actions = actions,
        "🔁 CYCLE_OUTCOME"
    );
}

/// Log a governor allow/deny decision
pub fn log_governor_decision(allowed: bool, reason: &str, actions_last_hour: usize) {
    if allowed {
        tracing::debug!(
            allowed = allowed,
            reason = %reason,
            actions_last_hour = actions_last_hour,
            "🚦 GOVERNOR"
        );
    } else {
        tracing::info!(
            allowed = allowed,
            reason = %reason,
            actions_last_hour = actions_last_hour,
            "🚦 GOVERNOR: Holding back"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_control_characters() {
        let out = sanitize_for_log("line one\nFAKE LOG LINE\r\x1b[31m");
        assert!(!out.contains('\n'));
        assert!(!out.contains('\r'));
        assert!(!out.contains('\x1b'));
        assert!(out.starts_with("line one FAKE LOG LINE"));
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        let out = sanitize_for_log(&long);
        assert_eq!(out.chars().count(), MAX_LOGGED_TEXT + 1);
        assert!(out.ends_with('…'));
        assert_eq!(sanitize_for_log("short"), "short");
    }

    #[test]
    fn log_level_follows_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "debug");
    }
}
