//! # Data Models
//!
//! Durable rows (`actor_state`, `actor_actions`, `known_videos`) with their SQL access
//! functions, plus the platform and content payload types the cycles pass around.
//!
//! The SQL functions take a `&SqlitePool` and are only ever called from the
//! single-writer [`StateStore`](crate::database::StateStore) worker.

pub mod action_record;
pub mod content;
pub mod known_video;
pub mod schedule;
pub mod video;

pub use action_record::{ActionRecord, NewActionRecord};
pub use content::{Story, WeatherReport};
pub use known_video::KnownVideo;
pub use schedule::ActorScheduleState;
pub use video::{Comment, Video, VideoUpload};
