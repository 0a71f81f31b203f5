//! # External Collaborators
//!
//! Trait seams and HTTP implementations for everything outside the process: the
//! content platform, its admin API, media renderers, and the news and weather feeds.
//! Each wrapper returns an explicit error kind; none of them retries on its own.

pub mod media;
pub mod moderation;
pub mod news;
pub mod platform;
pub mod weather;

pub use media::{
    AvatarRenderer, ComfyJobGenerator, FfmpegCompositor, FrameCompositor, HttpAvatarRenderer, TextCard,
    VideoGenerator,
};
pub use moderation::{ContentBlocklist, EnforcementResult, HttpModerationClient, ModerationClient, ScanHit, ScanReport};
pub use news::{JsonFeedNewsSource, NewsSource};
pub use platform::{HttpPlatformClient, HttpPlatformConnector, PlatformClient, PlatformConnector};
pub use weather::{OpenMeteoWeatherSource, WeatherSource};
