//! # Tier-1 Smart Cycle
//!
//! Bounded tool-use loop. The model is seeded with the persona, the current time and a
//! workflow hint, then proposes tool calls which are dispatched through the
//! [`ToolRouter`](super::tool_router::ToolRouter) and fed back as tool messages.
//!
//! ## Terminal States
//!
//! Every exit below is a normal outcome, not a failure:
//!
//! - the model calls `done_for_now`
//! - the round-trip ceiling is reached
//! - the same tool is proposed `loop_guard_repeats` times in a row (checked before dispatch)
//! - `error_budget` consecutive dispatches return an error result
//! - the model stops proposing calls after its one nudge
//!
//! Only total LLM unavailability fails the cycle.

use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use super::engine::DecisionEngine;
use super::session::{SessionAction, SessionActionSet};
use super::tool_router::ToolContext;
use crate::clients::PlatformClient;
use crate::error::Result;
use crate::llm::ChatMessage;
use crate::logging::{log_cycle_outcome, sanitize_for_log};
use crate::orchestration::ActorBrain;

const BEHAVIORS: [&str; 5] = [
    "Call browse_feed, pick a video, and comment on it.",
    "Call browse_trending, comment on 1-2 videos, then call done_for_now.",
    "Call browse_feed, like and comment on a video you enjoy.",
    "Call browse_trending, find something interesting, and leave a thoughtful comment.",
    "Call browse_feed with page 2, comment on a hidden gem.",
];

const NUDGE: &str = "You must use tool calls. Pick a video from the results above \
                     and call comment_on_video with its video_id and your comment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Done,
    MaxTurns,
    LoopGuard,
    ErrorBudget,
    NoToolCalls,
}

impl CycleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::MaxTurns => "max_turns",
            Self::LoopGuard => "loop_guard",
            Self::ErrorBudget => "error_budget",
            Self::NoToolCalls => "no_tool_calls",
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one smart cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub outcome: CycleOutcome,
    /// LLM round-trips made
    pub turns: usize,
    /// Tool calls routed to a handler
    pub dispatched: usize,
    pub comments: usize,
    pub votes: usize,
}

fn system_prompt(personality: &str, now: &str) -> String {
    format!(
        "{personality}\n\nCurrent time: {now}\n\
         You MUST respond ONLY with tool calls. NEVER respond with plain text.\n\
         If you have nothing to do, call done_for_now.\n\n\
         WORKFLOW - follow these steps using tool calls:\n\
         1. Call browse_feed or browse_trending to discover videos\n\
         2. Pick a video and call comment_on_video with its ID and your comment\n\
         3. Optionally call like_video on videos you enjoy\n\
         4. Call done_for_now when finished\n\n\
         RULES:\n\
         - ONLY use video IDs returned by browse_feed, browse_trending, or search_videos\n\
         - Do NOT comment on your own videos\n\
         - Write in English only\n"
    )
}

impl DecisionEngine {
    /// Run one Tier-1 cycle for `brain`.
    ///
    /// Returns `Err` only when no LLM backend answers; every other exit is a
    /// [`CycleOutcome`].
    pub async fn run_smart_cycle(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let decision = &self.settings.decision;
        let behavior = {
            let mut rng = self.rng.lock();
            BEHAVIORS.choose(&mut *rng).copied().unwrap_or(BEHAVIORS[0])
        };
        let now = self.clock.now().format("%Y-%m-%d %H:%M UTC").to_string();

        let mut messages = vec![
            ChatMessage::system(system_prompt(&brain.profile().personality, &now)),
            ChatMessage::user(format!("Activity cycle. Suggestion: {behavior}")),
        ];
        let definitions = self.tools.definitions();
        let mut session = SessionActionSet::new();
        let mut recent: Vec<String> = Vec::new();
        let mut consecutive_errors = 0usize;
        let mut nudged = false;
        let mut dispatched = 0usize;
        let mut turns = 0usize;

        info!(actor = %brain.id(), cycle_id = %cycle_id, behavior = %behavior, "🧠 SMART_CYCLE: Starting");

        let outcome = 'cycle: loop {
            if turns >= decision.max_smart_turns {
                break CycleOutcome::MaxTurns;
            }
            let reply = match self.writer.llm().call_tools(&messages, &definitions).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(actor = %brain.id(), cycle_id = %cycle_id, error = %err, "🧠 SMART_CYCLE: No LLM backend answered");
                    return Err(err.into());
                }
            };
            let turn = turns;
            turns += 1;

            let calls = reply.message.tool_calls.clone();
            let content = reply.message.content.clone();
            messages.push(reply.message);

            if calls.is_empty() {
                if !content.trim().is_empty() {
                    info!(actor = %brain.id(), says = %sanitize_for_log(&content), "🧠 SMART_CYCLE: Model replied without tools");
                }
                if turn < decision.nudge_turn_limit && !session.has_engagement() && !nudged {
                    nudged = true;
                    messages.push(ChatMessage::user(NUDGE));
                    continue;
                }
                break CycleOutcome::NoToolCalls;
            }

            for call in calls {
                recent.push(call.name.clone());
                let guard = decision.loop_guard_repeats.max(1);
                if recent.len() >= guard && recent[recent.len() - guard..].iter().all(|n| *n == call.name) {
                    warn!(actor = %brain.id(), tool = %call.name, repeats = guard, "🧠 SMART_CYCLE: Loop guard tripped");
                    break 'cycle CycleOutcome::LoopGuard;
                }

                let args = if call.arguments.is_object() { call.arguments.clone() } else { json!({}) };
                let result = {
                    let mut ctx = ToolContext {
                        engine: self,
                        brain,
                        client,
                        session: &mut session,
                    };
                    self.tools.route(&call.name, &mut ctx, &args).await
                };
                dispatched += 1;

                if result.get("done").and_then(Value::as_bool).unwrap_or(false) {
                    let reason = result.get("reason").and_then(Value::as_str).unwrap_or_default();
                    info!(actor = %brain.id(), reason = %sanitize_for_log(reason), "🧠 SMART_CYCLE: Model signalled done");
                    break 'cycle CycleOutcome::Done;
                }
                if result.get("error").is_some() {
                    consecutive_errors += 1;
                    if consecutive_errors >= decision.error_budget {
                        warn!(actor = %brain.id(), errors = consecutive_errors, "🧠 SMART_CYCLE: Error budget exhausted");
                        break 'cycle CycleOutcome::ErrorBudget;
                    }
                } else {
                    consecutive_errors = 0;
                }
                messages.push(ChatMessage::tool(result.to_string()));
            }
        };

        let report = CycleReport {
            cycle_id,
            outcome,
            turns,
            dispatched,
            comments: session.count(SessionAction::Comment),
            votes: session.count(SessionAction::Like) + session.count(SessionAction::Dislike),
        };
        log_cycle_outcome(
            "smart",
            brain.id(),
            &cycle_id.to_string(),
            outcome.as_str(),
            report.comments + report.votes,
        );
        Ok(report)
    }
}
