//! # Tiered Decision Engine
//!
//! What a persona does once it is awake.
//!
//! ## Tiers
//!
//! - **Smart (Tier-1)**: a bounded tool-use loop where the model drives browsing and
//!   engagement through the [`ToolRouter`] catalog
//! - **Standard (Tier-2)**: directed browse/react/generate actions with one completion
//!   call for comment text
//! - **Role cycles**: news, weather and moderation personas run their own pipelines
//!
//! All cycles share one [`DecisionEngine`] holding the LLM pool, the known-video
//! cache, the governor, media backends and content sources.

pub mod comments;
pub mod engine;
pub mod moderation;
pub mod news_cycle;
pub mod screening;
pub mod session;
pub mod smart_cycle;
pub mod standard_cycle;
pub mod tool_router;
pub mod tools;
pub mod weather_cycle;

pub use comments::CommentWriter;
pub use engine::{ContentSources, DecisionEngine, EngineDeps, EngineSettings, MediaBackends};
pub use moderation::SweepReport;
pub use screening::{looks_fabricated, screen_video_id, IdRejection, IdScreen};
pub use session::{SessionAction, SessionActionSet};
pub use smart_cycle::{CycleOutcome, CycleReport};
pub use tool_router::{ToolContext, ToolHandler, ToolKind, ToolRouter};
pub use tools::default_tool_router;
pub use weather_cycle::city_key;
