#![allow(clippy::doc_markdown)] // Allow technical terms like SQLite, OpenAI in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Persona Core
//!
//! Autonomous multi-persona scheduling daemon for a video-sharing platform.
//!
//! ## Overview
//!
//! A single process drives a roster of personas. Each persona wakes on its own
//! randomized schedule, decides what to do, and acts against the platform API:
//! browsing, commenting, voting, subscribing, and uploading generated videos.
//! One process-wide governor keeps the whole roster under hourly, burst and daily
//! quotas, and everything a persona did survives restarts in SQLite.
//!
//! ## Architecture
//!
//! - **Smart personas** run a bounded tool-use loop where an LLM picks the next
//!   platform action from a fixed tool catalog
//! - **Standard personas** take directed browse/react/generate actions with one
//!   completion call for comment text
//! - **Role personas** run dedicated news, weather and moderation pipelines
//!
//! Every external collaborator sits behind a trait (`PlatformClient`, `LlmBackend`,
//! `VideoGenerator`, `FrameCompositor`, `AvatarRenderer`, `NewsSource`,
//! `WeatherSource`, `ModerationClient`) so the control loop can be driven entirely
//! in-process by tests.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered TOML + environment configuration
//! - [`database`] - SQLite state store (single-writer actor)
//! - [`registry`] - Persona roster and API key resolution
//! - [`orchestration`] - Wake scheduling, governor, and the daemon loop
//! - [`decision`] - Tiered decision engine and tool router
//! - [`llm`] - Ordered LLM backend pool with failover
//! - [`clients`] - Platform, media, news, weather and moderation clients
//! - [`web`] - Read-only health endpoint
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit + in-process integration tests
//! ```

pub mod clients;
pub mod config;
pub mod constants;
pub mod database;
pub mod decision;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod utils;
pub mod web;

pub use config::{ConfigManager, DaemonConfig};
pub use constants::{ActionKind, ActivityClass, PersonaRole, Tier};
pub use database::StateStore;
pub use decision::DecisionEngine;
pub use error::{PersonaError, Result};
pub use orchestration::{ActorBrain, ActivityGovernor, PersonaDaemon};
pub use registry::{ActorProfile, ActorRegistry};
