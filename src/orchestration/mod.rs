//! # Orchestration
//!
//! Scheduling and pacing for the persona roster.
//!
//! ## Core Components
//!
//! - **ActorBrain**: per-persona wake schedule and persisted action ledger
//! - **ActivityGovernor**: process-wide hourly, burst and daily video quotas
//! - **KnownVideoCache**: every video id the daemon has seen, restored at startup
//! - **PlannedAction**: the unit of work the loop executes, with its priority order
//! - **PersonaDaemon**: the poll/plan/execute loop and the single-pass run mode

pub mod actions;
pub mod brain;
pub mod daemon;
pub mod governor;
pub mod known_videos;

pub use actions::{prioritize, PlannedAction};
pub use brain::{ActorBrain, BrainSettings};
pub use daemon::{BotStatus, DaemonServices, HealthSnapshot, PersonaDaemon};
pub use governor::{ActivityGovernor, GovernorVerdict};
pub use known_videos::KnownVideoCache;
