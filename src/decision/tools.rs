//! # Tool Handlers
//!
//! One handler per entry in the Tier-1 catalog. Each handler screens its target,
//! consults the cycle's [`SessionActionSet`] so repeats inside one cycle become
//! skip-successes, and mirrors every platform mutation into the durable ledger.
//!
//! Engaging a video (comment, like, dislike) issues a best-effort watch first; a failed
//! watch never blocks the engagement.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::session::{SessionAction, SessionActionSet};
use super::tool_router::{tool_error, tool_skip, ToolContext, ToolHandler, ToolKind, ToolRouter};
use crate::constants::ActionKind;
use crate::llm::ToolDefinition;
use crate::logging::sanitize_for_log;
use crate::models::Video;
use crate::utils::text::truncate_chars;

const LIST_LIMIT: usize = 10;
const WATCH_COMMENT_LIMIT: usize = 5;
const COMMENT_ECHO_CHARS: usize = 100;

/// The full Tier-1 catalog
pub fn default_tool_router() -> ToolRouter {
    let mut router = ToolRouter::new();
    let handlers: [Arc<dyn ToolHandler>; 9] = [
        Arc::new(BrowseFeedTool),
        Arc::new(BrowseTrendingTool),
        Arc::new(WatchVideoTool),
        Arc::new(CommentOnVideoTool),
        Arc::new(VoteTool::like()),
        Arc::new(VoteTool::dislike()),
        Arc::new(SubscribeTool),
        Arc::new(SearchVideosTool),
        Arc::new(DoneForNowTool),
    ];
    for handler in handlers {
        router.register_handler(handler);
    }
    router
}

fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .filter_map(|key| args.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn video_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { "video_id": { "type": "string", "description": description } },
        "required": ["video_id"]
    })
}

/// Compact listing with per-cycle status flags
pub fn summarize_videos(videos: &[Video], session: &SessionActionSet) -> Vec<Value> {
    videos
        .iter()
        .take(LIST_LIMIT)
        .map(|video| {
            let id = video.video_id.as_str();
            let flags: Vec<&str> = [
                (SessionAction::Watch, "already_watched"),
                (SessionAction::Comment, "already_commented"),
                (SessionAction::Like, "already_liked"),
            ]
            .into_iter()
            .filter(|(action, _)| session.contains(*action, id))
            .map(|(_, flag)| flag)
            .collect();

            let mut entry = json!({
                "id": id,
                "title": video.title,
                "creator": video.agent_name,
                "views": video.views,
                "likes": video.likes,
            });
            if !flags.is_empty() {
                entry["your_status"] = json!(flags);
            }
            entry
        })
        .collect()
}

/// Watch once per cycle; failures are logged and ignored
async fn ensure_watched(ctx: &mut ToolContext<'_>, video_id: &str) {
    if ctx.session.contains(SessionAction::Watch, video_id) {
        return;
    }
    match ctx.client.watch(video_id).await {
        Ok(()) => {
            ctx.session.insert(SessionAction::Watch, video_id);
            debug!(actor = %ctx.brain.id(), video_id = %video_id, "Auto-watched before engaging");
        }
        Err(err) => debug!(actor = %ctx.brain.id(), video_id = %video_id, error = %err, "Watch failed"),
    }
}

struct BrowseFeedTool;

#[async_trait]
impl ToolHandler for BrowseFeedTool {
    fn kind(&self) -> ToolKind {
        ToolKind::BrowseFeed
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Browse the feed to see recent videos.",
            json!({
                "type": "object",
                "properties": { "page": { "type": "integer", "description": "Page number (default 1)" } }
            }),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let page = args
            .get("page")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        match ctx.client.feed(page).await {
            Ok(videos) => {
                ctx.engine.known_videos().track_all(&videos).await;
                let summary = summarize_videos(&videos, ctx.session);
                json!({ "count": summary.len(), "videos": summary })
            }
            Err(err) => tool_error(err),
        }
    }
}

struct BrowseTrendingTool;

#[async_trait]
impl ToolHandler for BrowseTrendingTool {
    fn kind(&self) -> ToolKind {
        ToolKind::BrowseTrending
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "See what's trending right now.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, _args: &Value) -> Value {
        match ctx.client.trending().await {
            Ok(videos) => {
                ctx.engine.known_videos().track_all(&videos).await;
                json!({ "trending": summarize_videos(&videos, ctx.session) })
            }
            Err(err) => tool_error(err),
        }
    }
}

struct SearchVideosTool;

#[async_trait]
impl ToolHandler for SearchVideosTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SearchVideos
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Search for videos by keyword.",
            json!({
                "type": "object",
                "properties": { "query": { "type": "string", "description": "Search query" } },
                "required": ["query"]
            }),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let query = str_arg(args, &["query"]);
        match ctx.client.search(query).await {
            Ok(videos) => {
                ctx.engine.known_videos().track_all(&videos).await;
                let summary = summarize_videos(&videos, ctx.session);
                json!({ "count": summary.len(), "results": summary })
            }
            Err(err) => tool_error(err),
        }
    }
}

struct WatchVideoTool;

#[async_trait]
impl ToolHandler for WatchVideoTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WatchVideo
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Watch a specific video and get its full details including comments.",
            video_id_schema("The video ID to watch"),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let video_id = str_arg(args, &["video_id"]);
        if let Err(rejection) = ctx.engine.screen(video_id) {
            return tool_error(rejection);
        }

        match ctx.client.watch(video_id).await {
            Ok(()) => {
                ctx.session.insert(SessionAction::Watch, video_id);
                if let Err(err) = ctx.engine.known_videos().track(video_id).await {
                    debug!(video_id = %video_id, error = %err, "Could not persist watched id");
                }
            }
            Err(err) => debug!(actor = %ctx.brain.id(), video_id = %video_id, error = %err, "Watch failed"),
        }

        let video = match ctx.client.get_video(video_id).await {
            Ok(video) => video,
            Err(err) => return tool_error(err),
        };
        let comments = match ctx.client.get_comments(video_id).await {
            Ok(comments) => comments,
            Err(err) => return tool_error(err),
        };

        let mut flags = Vec::new();
        if video.agent_name == ctx.brain.id() {
            flags.push("THIS_IS_YOUR_OWN_VIDEO");
        }
        if ctx.session.contains(SessionAction::Comment, video_id) {
            flags.push("you_already_commented");
        }

        let mut result = json!({
            "video": {
                "id": video.video_id,
                "title": video.title,
                "description": video.description,
                "creator": video.agent_name,
                "views": video.views,
                "likes": video.likes,
            },
            "comments": comments
                .iter()
                .take(WATCH_COMMENT_LIMIT)
                .map(|c| json!({ "author": c.agent_name, "text": c.content }))
                .collect::<Vec<_>>(),
        });
        if !flags.is_empty() {
            result["your_status"] = json!(flags);
        }
        result
    }
}

struct CommentOnVideoTool;

#[async_trait]
impl ToolHandler for CommentOnVideoTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CommentOnVideo
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Leave a comment on a video. Keep it SHORT (1-3 sentences). Be genuine.",
            json!({
                "type": "object",
                "properties": {
                    "video_id": { "type": "string", "description": "Video ID to comment on" },
                    "comment": { "type": "string", "description": "Your comment text (1-3 sentences)" }
                },
                "required": ["video_id", "comment"]
            }),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let video_id = str_arg(args, &["video_id"]);
        let comment = str_arg(args, &["comment"]);
        if let Err(rejection) = ctx.engine.screen(video_id) {
            return tool_error(rejection);
        }
        if comment.is_empty() {
            return tool_error("comment is required");
        }

        ensure_watched(ctx, video_id).await;

        if ctx.session.contains(SessionAction::Comment, video_id) {
            return tool_skip("Already commented on this video.");
        }
        match ctx.brain.already_commented_on(video_id).await {
            Ok(true) => return tool_skip("Already commented on this video recently."),
            Ok(false) => {}
            Err(err) => return tool_error(err),
        }
        match ctx.brain.can_comment().await {
            Ok(true) => {}
            Ok(false) => return tool_skip("Hourly comment limit reached."),
            Err(err) => return tool_error(err),
        }

        let mut text = truncate_chars(comment, ctx.engine.settings().decision.comment_max_chars)
            .trim()
            .to_string();
        if let Some(term) = ctx.engine.blocked_term(&text) {
            warn!(actor = %ctx.brain.id(), term = %term, "Comment rejected by content screen");
            return tool_error(format!("Comment rejected by content screen: {term}"));
        }
        text.push_str(&ctx.engine.writer().maybe_payload(ctx.brain.profile()));

        if let Err(err) = ctx.client.comment(video_id, &text).await {
            return tool_error(err);
        }
        ctx.session.insert(SessionAction::Comment, video_id);
        if let Err(err) = ctx
            .brain
            .record_action(ActionKind::Comment, Some(video_id), None, Some(&text))
            .await
        {
            warn!(actor = %ctx.brain.id(), video_id = %video_id, error = %err, "Failed to record comment");
        }
        info!(
            actor = %ctx.brain.id(),
            video_id = %video_id,
            comment = %sanitize_for_log(&text),
            "💬 TOOL: Commented"
        );
        json!({ "ok": true, "comment": truncate_chars(&text, COMMENT_ECHO_CHARS) })
    }
}

/// Like and dislike share everything but the platform call and the labels
struct VoteTool {
    kind: ToolKind,
    action: SessionAction,
    ledger: ActionKind,
    done_label: &'static str,
    skip_reason: &'static str,
    description: &'static str,
}

impl VoteTool {
    fn like() -> Self {
        Self {
            kind: ToolKind::LikeVideo,
            action: SessionAction::Like,
            ledger: ActionKind::Like,
            done_label: "liked",
            skip_reason: "Already liked.",
            description: "Like a video you enjoyed.",
        }
    }

    fn dislike() -> Self {
        Self {
            kind: ToolKind::DislikeVideo,
            action: SessionAction::Dislike,
            ledger: ActionKind::Dislike,
            done_label: "disliked",
            skip_reason: "Already disliked.",
            description: "Dislike a video you didn't enjoy. Use sparingly.",
        }
    }
}

#[async_trait]
impl ToolHandler for VoteTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn definition(&self) -> ToolDefinition {
        let target = if self.action == SessionAction::Like { "Video ID to like" } else { "Video ID to dislike" };
        ToolDefinition::new(self.kind.as_str(), self.description, video_id_schema(target))
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let video_id = str_arg(args, &["video_id"]);
        if let Err(rejection) = ctx.engine.screen(video_id) {
            return tool_error(rejection);
        }
        if ctx.session.contains(self.action, video_id) {
            return tool_skip(self.skip_reason);
        }

        ensure_watched(ctx, video_id).await;

        let outcome = if self.action == SessionAction::Like {
            ctx.client.like(video_id).await
        } else {
            ctx.client.dislike(video_id).await
        };
        if let Err(err) = outcome {
            return tool_error(err);
        }
        ctx.session.insert(self.action, video_id);
        if let Err(err) = ctx.brain.record_action(self.ledger, Some(video_id), None, None).await {
            warn!(actor = %ctx.brain.id(), video_id = %video_id, error = %err, "Failed to record vote");
        }
        json!({ "ok": true, "action": self.done_label })
    }
}

struct SubscribeTool;

#[async_trait]
impl ToolHandler for SubscribeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SubscribeToCreator
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Follow/subscribe to a creator whose content you enjoy.",
            json!({
                "type": "object",
                "properties": {
                    "agent_name": { "type": "string", "description": "The creator's username to follow" }
                },
                "required": ["agent_name"]
            }),
        )
    }

    async fn handle(&self, ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        let agent = str_arg(args, &["agent_name", "agent", "creator"]);
        if agent.is_empty() {
            return tool_error("agent_name is required");
        }
        if agent == ctx.brain.id() {
            return tool_skip("Can't subscribe to yourself.");
        }
        if ctx.session.contains(SessionAction::Subscribe, agent) {
            return tool_skip(format!("Already subscribed to {agent}."));
        }

        if let Err(err) = ctx.client.subscribe(agent).await {
            return tool_error(err);
        }
        ctx.session.insert(SessionAction::Subscribe, agent);
        if let Err(err) = ctx
            .brain
            .record_action(ActionKind::Subscribe, None, Some(agent), None)
            .await
        {
            warn!(actor = %ctx.brain.id(), agent = %agent, error = %err, "Failed to record subscribe");
        }
        json!({ "ok": true, "action": "subscribed", "agent": agent })
    }
}

struct DoneForNowTool;

#[async_trait]
impl ToolHandler for DoneForNowTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DoneForNow
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.kind().as_str(),
            "Signal that you're done with this action cycle.",
            json!({
                "type": "object",
                "properties": { "reason": { "type": "string", "description": "Brief note about what you did" } },
                "required": ["reason"]
            }),
        )
    }

    async fn handle(&self, _ctx: &mut ToolContext<'_>, args: &Value) -> Value {
        json!({ "done": true, "reason": str_arg(args, &["reason"]) })
    }
}
