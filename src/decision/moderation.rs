//! Moderation persona sweep.
//!
//! Two passes per sweep. The server-side content scan names agents whose uploads
//! matched its blocklist; each is nuked. Then the latest feed sample is checked for
//! upload bursts from creators outside the roster; each offender at or above the
//! spam threshold is banned. Every successful enforcement lands in the ledger as a
//! `moderation` action targeting the agent.

use std::collections::BTreeMap;
use tracing::{info, warn};

use super::engine::DecisionEngine;
use crate::clients::PlatformClient;
use crate::constants::ActionKind;
use crate::error::Result;
use crate::models::Video;
use crate::orchestration::ActorBrain;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// No admin key: nothing was sent to the admin API
    pub skipped: bool,
    pub flagged: usize,
    pub nuked: usize,
    pub banned: usize,
    /// Feed sample items the local blocklist matched
    pub locally_flagged: usize,
}

impl SweepReport {
    pub fn enforcement_actions(&self) -> usize {
        self.nuked + self.banned
    }
}

impl DecisionEngine {
    /// Creators outside the roster with at least `threshold` videos in `sample`
    pub fn spam_candidates(&self, sample: &[Video], threshold: usize) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for video in sample {
            let agent = video.agent_name.as_str();
            if agent.is_empty() || self.registry.contains(agent) {
                continue;
            }
            *counts.entry(agent).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(agent, count)| (agent.to_string(), count))
            .collect()
    }

    pub async fn run_moderation_sweep(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let admin = &self.sources.moderation;
        if !admin.has_admin_key() {
            warn!(actor = %brain.id(), "🧹 MODERATION: No admin key configured, skipping sweep");
            report.skipped = true;
            return Ok(report);
        }

        info!(actor = %brain.id(), "🧹 MODERATION: Running content sweep");
        match admin.scan_content().await {
            Ok(scan) if scan.flagged == 0 && scan.results.is_empty() => {
                info!(actor = %brain.id(), "🧹 MODERATION: Content scan clean");
            }
            Ok(scan) => {
                report.flagged = scan.flagged.max(scan.results.len());
                warn!(actor = %brain.id(), flagged = report.flagged, "🧹 MODERATION: Server scan flagged content");
                for hit in scan.results {
                    let reason = format!("auto-janitor: content_violation: {}", hit.matched_term);
                    match admin.nuke(&hit.agent, &reason).await {
                        Ok(result) if result.ok => {
                            warn!(agent = %hit.agent, videos_deleted = result.videos_deleted, "🧹 MODERATION: Agent nuked");
                            report.nuked += 1;
                            brain
                                .record_action(ActionKind::Moderation, None, Some(&hit.agent), Some(&reason))
                                .await?;
                        }
                        Ok(_) => warn!(agent = %hit.agent, "🧹 MODERATION: Nuke was not acknowledged"),
                        Err(err) => warn!(agent = %hit.agent, error = %err, "🧹 MODERATION: Nuke failed"),
                    }
                }
            }
            Err(err) => warn!(actor = %brain.id(), error = %err, "🧹 MODERATION: Content scan failed"),
        }

        match client.recent_videos(self.settings.feed_sample_size).await {
            Ok(sample) => {
                for video in &sample {
                    let text = format!("{} {}", video.title, video.description);
                    if let Some(term) = self.blocked_term(&text) {
                        warn!(video_id = %video.video_id, agent = %video.agent_name, term = %term, "🧹 MODERATION: Local blocklist match");
                        report.locally_flagged += 1;
                    }
                }

                for (agent, count) in self.spam_candidates(&sample, self.settings.spam_threshold) {
                    let reason = format!("auto-janitor: spam pattern ({count} uploads in burst)");
                    warn!(agent = %agent, uploads = count, "🧹 MODERATION: Spam pattern detected");
                    match admin.ban(&agent, &reason).await {
                        Ok(result) if result.ok => {
                            report.banned += 1;
                            brain
                                .record_action(ActionKind::Moderation, None, Some(&agent), Some(&reason))
                                .await?;
                        }
                        Ok(_) => warn!(agent = %agent, "🧹 MODERATION: Ban was not acknowledged"),
                        Err(err) => warn!(agent = %agent, error = %err, "🧹 MODERATION: Ban failed"),
                    }
                }
            }
            Err(err) => warn!(actor = %brain.id(), error = %err, "🧹 MODERATION: Feed sample unavailable"),
        }

        info!(
            actor = %brain.id(),
            nuked = report.nuked,
            banned = report.banned,
            locally_flagged = report.locally_flagged,
            "🧹 MODERATION: Sweep complete"
        );
        Ok(report)
    }
}
