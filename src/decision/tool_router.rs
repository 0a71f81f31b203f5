//! # Tool Router
//!
//! Registered-handler dispatch for the Tier-1 tool catalog. Each [`ToolKind`] maps to
//! one [`ToolHandler`]; adding a tool means adding a variant and registering a handler.
//!
//! Handlers never fail the cycle directly. They return a JSON result that is fed back
//! to the model verbatim; an `error` key marks the result as a failed dispatch for the
//! cycle's error budget and a `done` key ends the cycle.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::engine::DecisionEngine;
use super::session::SessionActionSet;
use crate::clients::PlatformClient;
use crate::llm::ToolDefinition;
use crate::orchestration::ActorBrain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    BrowseFeed,
    BrowseTrending,
    WatchVideo,
    CommentOnVideo,
    LikeVideo,
    DislikeVideo,
    SubscribeToCreator,
    SearchVideos,
    DoneForNow,
}

impl ToolKind {
    /// Catalog order offered to the model
    pub const ALL: [ToolKind; 9] = [
        Self::BrowseFeed,
        Self::BrowseTrending,
        Self::WatchVideo,
        Self::CommentOnVideo,
        Self::LikeVideo,
        Self::DislikeVideo,
        Self::SubscribeToCreator,
        Self::SearchVideos,
        Self::DoneForNow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrowseFeed => "browse_feed",
            Self::BrowseTrending => "browse_trending",
            Self::WatchVideo => "watch_video",
            Self::CommentOnVideo => "comment_on_video",
            Self::LikeVideo => "like_video",
            Self::DislikeVideo => "dislike_video",
            Self::SubscribeToCreator => "subscribe_to_creator",
            Self::SearchVideos => "search_videos",
            Self::DoneForNow => "done_for_now",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {s}"))
    }
}

/// Everything a handler may touch during one dispatch
pub struct ToolContext<'a> {
    pub engine: &'a DecisionEngine,
    pub brain: &'a ActorBrain,
    pub client: &'a dyn PlatformClient,
    pub session: &'a mut SessionActionSet,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn definition(&self) -> ToolDefinition;

    /// Run the tool; `args` is always a JSON object
    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value;
}

/// Error-shaped tool result
pub fn tool_error(message: impl fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Success-with-skip tool result
pub fn tool_skip(reason: impl Into<String>) -> Value {
    json!({ "ok": true, "skipped": true, "reason": reason.into() })
}

#[derive(Default)]
pub struct ToolRouter {
    handlers: HashMap<ToolKind, Arc<dyn ToolHandler>>,
}

impl fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ToolRouter").field("tools", &kinds).finish()
    }
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, handler: Arc<dyn ToolHandler>) {
        let kind = handler.kind();
        if self.handlers.insert(kind, handler).is_some() {
            warn!(tool = %kind, "Replacing existing tool handler");
        } else {
            debug!(tool = %kind, "Registered tool handler");
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Schemas of every registered tool, in catalog order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .iter()
            .filter_map(|kind| self.handlers.get(kind))
            .map(|handler| handler.definition())
            .collect()
    }

    /// Dispatch a proposed call by name
    pub async fn route(&self, name: &str, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let handler = match name.parse::<ToolKind>() {
            Ok(kind) => self.handlers.get(&kind).cloned(),
            Err(_) => None,
        };
        let Some(handler) = handler else {
            warn!(actor = %ctx.brain.id(), tool = %name, "Model proposed an unknown tool");
            return tool_error(format!("Unknown tool: {name}"));
        };

        let preview: String = args.to_string().chars().take(100).collect();
        info!(actor = %ctx.brain.id(), tool = %name, args = %preview, "🛠️ TOOL: Dispatching");
        handler.handle(ctx, args).await
    }
}
