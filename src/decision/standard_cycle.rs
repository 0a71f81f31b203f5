//! # Tier-2 Standard Cycle
//!
//! Directed actions without a tool-use loop: browse-and-comment, react to a freshly
//! polled video, and the rare generate-and-upload. Comment text comes from one
//! completion call and falls back to a template when no backend answers.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use super::engine::DecisionEngine;
use crate::clients::media::remove_rendered;
use crate::clients::{PlatformClient, TextCard};
use crate::config::TitleTemplate;
use crate::constants::ActionKind;
use crate::error::Result;
use crate::logging::log_actor_operation;
use crate::models::{Video, VideoUpload};
use crate::orchestration::ActorBrain;
use crate::utils::text::{fill_template, truncate_chars};

const FEED_PAGES: u32 = 3;
const PROMPT_LINE_CHARS: usize = 80;

impl DecisionEngine {
    /// Fetch a random feed page and comment on one eligible video.
    ///
    /// Eligible means not authored by this persona and not commented on within the
    /// cooldown. Returns `false` when nothing qualified.
    pub async fn browse(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<bool> {
        if !brain.can_comment().await? {
            return Ok(false);
        }
        let page = self.rng.lock().gen_range(1..=FEED_PAGES);
        let videos = client.feed(page).await?;
        self.known_videos.track_all(&videos).await;

        let mut candidates = Vec::new();
        for video in videos {
            if video.video_id.is_empty() || video.agent_name == brain.id() {
                continue;
            }
            if brain.already_commented_on(&video.video_id).await? {
                continue;
            }
            candidates.push(video);
        }
        let picked = {
            let mut rng = self.rng.lock();
            candidates.choose(&mut *rng).cloned()
        };
        let Some(video) = picked else {
            info!(actor = %brain.id(), page = page, "📺 BROWSE: Nothing new to comment on");
            return Ok(false);
        };

        self.comment_on(brain, client, &video, "browse").await
    }

    /// Comment on a video that just appeared in the poll
    pub async fn react(&self, brain: &ActorBrain, client: &dyn PlatformClient, video: &Video) -> Result<bool> {
        // the candidate list is computed before any action runs; re-check
        if brain.already_commented_on(&video.video_id).await? || !brain.can_comment().await? {
            return Ok(false);
        }
        self.comment_on(brain, client, video, "react").await
    }

    async fn comment_on(
        &self,
        brain: &ActorBrain,
        client: &dyn PlatformClient,
        video: &Video,
        operation: &str,
    ) -> Result<bool> {
        if let Err(err) = client.watch(&video.video_id).await {
            warn!(actor = %brain.id(), video_id = %video.video_id, error = %err, "Watch failed, commenting anyway");
        }

        let existing: Vec<String> = match client.get_comments(&video.video_id).await {
            Ok(comments) => comments.into_iter().map(|c| c.content).collect(),
            Err(_) => Vec::new(),
        };
        let text = self
            .writer
            .generate_comment(brain.profile(), &video.title, &video.agent_name, &existing)
            .await;
        if let Some(term) = self.blocked_term(&text) {
            warn!(actor = %brain.id(), term = %term, "Generated comment rejected by content screen");
            return Ok(false);
        }

        client.comment(&video.video_id, &text).await?;
        brain
            .record_action(ActionKind::Comment, Some(&video.video_id), None, Some(&text))
            .await?;
        log_actor_operation(
            operation,
            brain.id(),
            Some(&video.video_id),
            "commented",
            Some(&truncate_chars(&video.title, 30)),
        );
        Ok(true)
    }

    /// Render and upload an original video, preferring the job-queue generator.
    ///
    /// Returns the new video id, or `None` when the daily quota is spent.
    pub async fn generate_video(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<Option<String>> {
        if !self.governor.can_generate_video() {
            info!(actor = %brain.id(), "🎬 MEDIA: Daily video quota reached");
            return Ok(None);
        }
        let profile = brain.profile();

        let (prompt, template) = {
            let mut rng = self.rng.lock();
            let prompt = profile
                .video_prompts
                .choose(&mut *rng)
                .cloned()
                .unwrap_or_else(|| format!("abstract visuals in the style of {}", profile.display_name));
            let template = profile
                .video_titles
                .choose(&mut *rng)
                .cloned()
                .unwrap_or_else(|| TitleTemplate {
                    title: "Video #{n}".to_string(),
                    description: "A video.".to_string(),
                });
            (prompt, template)
        };
        let upload_number = brain.videos_uploaded() + 1;
        let title = fill_template(&template.title, upload_number, None);
        let description = fill_template(&template.description, upload_number, None);
        info!(actor = %brain.id(), prompt = %truncate_chars(&prompt, 60), "🎬 MEDIA: Generating video");

        let path = match self.media.generator.generate(&prompt, brain.id()).await {
            Ok(path) => path,
            Err(err) => {
                warn!(actor = %brain.id(), error = %err, "🎬 MEDIA: Generator unavailable, using text compositor");
                let card = TextCard::new(vec![
                    title.clone(),
                    truncate_chars(&prompt, PROMPT_LINE_CHARS),
                    format!("by {}", profile.display_name),
                ])
                .with_colors(&profile.palette.background, &profile.palette.text);
                self.media.compositor.text_video(&card).await?
            }
        };

        let upload = VideoUpload::new(path, &title, &description).with_tags([
            profile.id.as_str(),
            "ai",
            "generated",
        ]);
        let video_id = self.upload_rendered(brain, client, upload, ActionKind::Upload, None).await?;
        Ok(Some(video_id))
    }

    /// Upload, remove the local file whatever the outcome, then record the upload
    pub(super) async fn upload_rendered(
        &self,
        brain: &ActorBrain,
        client: &dyn PlatformClient,
        upload: VideoUpload,
        kind: ActionKind,
        dedup_key: Option<&str>,
    ) -> Result<String> {
        let outcome = client.upload(&upload).await;
        remove_rendered(&upload.path).await;
        let video_id = outcome?;

        if let Err(err) = self.known_videos.track(&video_id).await {
            warn!(video_id = %video_id, error = %err, "Failed to persist uploaded id");
        }
        brain.record_action(kind, Some(&video_id), None, dedup_key).await?;
        log_actor_operation(kind.as_str(), brain.id(), Some(&video_id), "uploaded", Some(&upload.title));
        Ok(video_id)
    }
}
