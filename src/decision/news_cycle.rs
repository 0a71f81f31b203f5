//! News persona cycle: headline, anchor script, avatar render, upload, self-comment.
//!
//! Headlines are deduplicated against the persona's own `news_upload` ledger entries,
//! whose text column holds the headline hash.

use chrono::Timelike;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::engine::DecisionEngine;
use crate::clients::{PlatformClient, TextCard};
use crate::constants::ActionKind;
use crate::error::Result;
use crate::models::{Story, VideoUpload};
use crate::orchestration::ActorBrain;
use crate::registry::ActorProfile;
use crate::utils::text::truncate_chars;

const DAY_SECS: u64 = 86_400;
const SCRIPT_MAX_TOKENS: u32 = 300;

fn anchor_system_prompt(profile: &ActorProfile) -> String {
    format!(
        "{}\n\nYou are presenting a short news segment as {}. Write a 30-second script. \
         Open with a greeting that names you, deliver the story plainly, add one line of \
         analysis, and close with a brief sign-off. Stay under 400 characters. \
         Plain text only, no markdown.",
        profile.personality, profile.display_name
    )
}

impl DecisionEngine {
    /// Pick the first headline not covered within the dedup window
    pub fn pick_fresh_story(stories: Vec<Story>, covered: &HashSet<String>) -> Option<Story> {
        stories.into_iter().find(|story| !covered.contains(&story.hash))
    }

    async fn anchor_script(&self, profile: &ActorProfile, story: &Story) -> String {
        let prompt = format!("Headline: {}\nSummary: {}", story.title, story.summary);
        let script = match self
            .writer
            .complete(&anchor_system_prompt(profile), &prompt, SCRIPT_MAX_TOKENS)
            .await
        {
            Some(script) => script,
            None => {
                let greeting = if self.clock.now().hour() < 12 { "Good morning" } else { "Good evening" };
                format!(
                    "{greeting}, I'm {}. {}. {} That's the latest. Stay informed.",
                    profile.display_name,
                    story.title,
                    truncate_chars(&story.summary, 200)
                )
            }
        };
        truncate_chars(&script, self.settings.news.script_max_chars)
    }

    /// Run one news cycle; `None` when no fresh headline was available
    pub async fn run_news_cycle(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<Option<String>> {
        let profile = brain.profile();
        let window = Duration::from_secs(self.settings.news.dedup_days * DAY_SECS);
        let covered: HashSet<String> = brain
            .recent_action_texts(ActionKind::NewsUpload, window)
            .await?
            .into_iter()
            .collect();

        let stories = self.sources.news.headlines().await?;
        let Some(story) = Self::pick_fresh_story(stories, &covered) else {
            info!(actor = %brain.id(), covered = covered.len(), "📰 NEWS: No fresh stories available");
            return Ok(None);
        };
        info!(actor = %brain.id(), headline = %truncate_chars(&story.title, 80), source = %story.source, "📰 NEWS: Selected story");

        let script = self.anchor_script(profile, &story).await;
        debug!(actor = %brain.id(), script = %truncate_chars(&script, 100), "📰 NEWS: Script ready");

        let (path, rendered_avatar) = match self.media.avatar.render(&script).await {
            Ok(path) => (path, true),
            Err(err) => {
                warn!(actor = %brain.id(), error = %err, "📰 NEWS: Avatar render failed, using text card");
                let card = TextCard::new(vec![
                    "BREAKING NEWS".to_string(),
                    truncate_chars(&story.title, 80),
                    format!("Source: {}", story.source),
                    profile.display_name.clone(),
                ])
                .with_colors("#0d1117", "#e6edf3")
                .with_secs_per_line(4);
                (self.media.compositor.text_video(&card).await?, false)
            }
        };

        let mut description = format!(
            "{} delivers the latest. Source: {}. {}",
            profile.display_name,
            story.source,
            truncate_chars(&story.summary, 500)
        );
        if !rendered_avatar {
            description.push_str(" (Text report, avatar video unavailable)");
        }
        let upload = VideoUpload::new(path, &format!("BREAKING: {}", story.title), &description)
            .with_tags([profile.id.as_str(), "news", "ai"])
            .with_category("news");

        let video_id = self
            .upload_rendered(brain, client, upload, ActionKind::NewsUpload, Some(&story.hash))
            .await?;

        let self_comment = format!(
            "Today's story: {}. Source: {}. {} - {}",
            story.title,
            story.source,
            truncate_chars(&story.summary, 200),
            profile.display_name
        );
        match client.comment(&video_id, &self_comment).await {
            Ok(()) => info!(actor = %brain.id(), video_id = %video_id, "📰 NEWS: Self-commented"),
            Err(err) => debug!(actor = %brain.id(), video_id = %video_id, error = %err, "Self-comment failed"),
        }
        Ok(Some(video_id))
    }
}
