//! # Actor Brain
//!
//! One brain per persona. It owns the persona's schedule state, decides when the
//! persona next wakes, gates comments against the durable ledger, and mirrors every
//! mutation to the state store before returning.
//!
//! ## Wake Scheduling
//!
//! The wake delay is an exponential draw whose mean is the midpoint of the persona's
//! interval bounds scaled by its activity class. The draw is shaped by the diurnal
//! multiplier for the current UTC hour and then clamped into
//! `[0.5 * interval_min, 1.5 * interval_max]`, so the bound holds at every hour.

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::{DaemonConfig, SchedulingConfig};
use crate::constants::ActionKind;
use crate::database::StateStore;
use crate::error::Result;
use crate::models::{ActorScheduleState, NewActionRecord};
use crate::registry::ActorProfile;
use crate::utils::clock::to_epoch_secs;
use crate::utils::{Clock, SharedRng};

const HOUR_SECS: f64 = 3600.0;

/// Tunables a brain needs from the daemon configuration
#[derive(Debug, Clone)]
pub struct BrainSettings {
    pub max_comments_per_hour: i64,
    pub comment_cooldown: Duration,
    pub scheduling: SchedulingConfig,
}

impl BrainSettings {
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            max_comments_per_hour: config.rate_limits.max_comments_per_actor_per_hour,
            comment_cooldown: config.rate_limits.comment_cooldown(),
            scheduling: config.scheduling.clone(),
        }
    }
}

pub struct ActorBrain {
    profile: Arc<ActorProfile>,
    state: Mutex<ActorScheduleState>,
    store: StateStore,
    clock: Arc<dyn Clock>,
    rng: SharedRng,
    settings: BrainSettings,
}

impl std::fmt::Debug for ActorBrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorBrain")
            .field("actor", &self.profile.id)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ActorBrain {
    /// Rebuild a brain from its last persisted row.
    ///
    /// A missing or past wake is staggered a short random delay into the future; a
    /// wake further out than `1.5 * interval_max` is treated as corrupt and redrawn
    /// uniformly within the interval bounds.
    pub async fn restore(
        profile: Arc<ActorProfile>,
        store: StateStore,
        clock: Arc<dyn Clock>,
        rng: SharedRng,
        settings: BrainSettings,
    ) -> Result<Self> {
        let persisted = store.load_actor_state(&profile.id).await?;
        let had_row = persisted.is_some();
        let mut state = persisted.unwrap_or_else(|| ActorScheduleState::new(profile.id.clone()));

        let now = clock.epoch_secs();
        let (_, max_delay) = profile.wake_bounds_secs();
        {
            let mut rng = rng.lock();
            if state.next_wake_ts <= now {
                let lo = settings.scheduling.startup_stagger_min_secs as f64;
                let hi = settings.scheduling.startup_stagger_max_secs as f64;
                state.next_wake_ts = now + if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            } else if state.next_wake_ts > now + max_delay {
                let lo = profile.interval_min_secs as f64;
                let hi = profile.interval_max_secs as f64;
                state.next_wake_ts = now + if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            }
        }

        store.save_actor_state(state.clone()).await?;

        info!(
            actor = %profile.id,
            tier = %profile.tier,
            activity = %profile.activity,
            restored = had_row,
            wake_in_secs = (state.next_wake_ts - now).round() as i64,
            "🧠 BRAIN: Ready"
        );

        Ok(Self {
            profile,
            state: Mutex::new(state),
            store,
            clock,
            rng,
            settings,
        })
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn profile(&self) -> &Arc<ActorProfile> {
        &self.profile
    }

    pub fn snapshot(&self) -> ActorScheduleState {
        self.state.lock().clone()
    }

    pub fn videos_uploaded(&self) -> i64 {
        self.state.lock().videos_uploaded
    }

    /// Draw a wake delay in seconds for a wake computed at `now`
    pub fn draw_wake_delay(&self, now: DateTime<Utc>) -> f64 {
        let mean = self.profile.mean_wake_secs();
        let u: f64 = self.rng.lock().gen();
        let raw = -mean * (1.0 - u).ln();
        let shaped = raw * self.settings.scheduling.diurnal_multiplier(now.hour());
        let (lo, hi) = self.profile.wake_bounds_secs();
        shaped.clamp(lo, hi)
    }

    /// Schedule the next wake and persist it. Returns seconds until that wake.
    ///
    /// A still-pending wake is never pulled earlier by a new draw.
    #[instrument(skip(self), fields(actor = %self.profile.id))]
    pub async fn compute_next_wake(&self) -> Result<f64> {
        let now = self.clock.now();
        let now_secs = to_epoch_secs(now);
        let candidate = now_secs + self.draw_wake_delay(now);

        let snapshot = {
            let mut state = self.state.lock();
            if state.next_wake_ts > now_secs && candidate < state.next_wake_ts {
                debug!(
                    pending = state.next_wake_ts,
                    candidate = candidate,
                    "Keeping pending wake over earlier draw"
                );
            } else {
                state.next_wake_ts = candidate;
            }
            state.clone()
        };

        self.store.save_actor_state(snapshot.clone()).await?;
        let delay = snapshot.next_wake_ts - now_secs;
        debug!(wake_in_mins = (delay / 60.0).round() as i64, "Next wake scheduled");
        Ok(delay)
    }

    pub fn is_due(&self) -> bool {
        self.clock.epoch_secs() >= self.state.lock().next_wake_ts
    }

    pub fn seconds_until_wake(&self) -> f64 {
        (self.state.lock().next_wake_ts - self.clock.epoch_secs()).max(0.0)
    }

    pub async fn comments_last_hour(&self) -> Result<i64> {
        let since = self.clock.epoch_secs() - HOUR_SECS;
        Ok(self
            .store
            .count_actions(&self.profile.id, ActionKind::Comment, since)
            .await?)
    }

    /// Comment quota for the trailing hour has room left
    pub async fn can_comment(&self) -> Result<bool> {
        Ok(self.comments_last_hour().await? < self.settings.max_comments_per_hour)
    }

    /// A comment by this persona on `video_id` exists within `cooldown`
    pub async fn already_acted_on(&self, video_id: &str, cooldown: Duration) -> Result<bool> {
        let since = self.clock.epoch_secs() - cooldown.as_secs_f64();
        Ok(self
            .store
            .has_action_on(&self.profile.id, ActionKind::Comment, video_id, since)
            .await?)
    }

    /// [`already_acted_on`](Self::already_acted_on) with the configured cooldown
    pub async fn already_commented_on(&self, video_id: &str) -> Result<bool> {
        self.already_acted_on(video_id, self.settings.comment_cooldown)
            .await
    }

    /// Ledger text of this persona's `kind` actions within `window`; role cycles
    /// store their dedup keys there
    pub async fn recent_action_texts(&self, kind: ActionKind, window: Duration) -> Result<Vec<String>> {
        let since = self.clock.epoch_secs() - window.as_secs_f64();
        Ok(self.store.action_texts(&self.profile.id, kind, since).await?)
    }

    /// Append a ledger entry, bump the matching `last_*_ts`, and persist
    #[instrument(skip(self, text), fields(actor = %self.profile.id, kind = %kind))]
    pub async fn record_action(
        &self,
        kind: ActionKind,
        video_id: Option<&str>,
        target_actor: Option<&str>,
        text: Option<&str>,
    ) -> Result<i64> {
        let now = self.clock.epoch_secs();
        let mut record = NewActionRecord::new(self.profile.id.clone(), kind, now);
        if let Some(video_id) = video_id {
            record = record.with_video(video_id);
        }
        if let Some(target) = target_actor {
            record = record.with_target_actor(target);
        }
        if let Some(text) = text {
            record = record.with_text(text);
        }
        let id = self.store.record_action(record).await?;

        let snapshot = {
            let mut state = self.state.lock();
            state.last_action_ts = now;
            if kind == ActionKind::Comment {
                state.last_comment_ts = now;
            }
            if kind.is_upload() {
                state.last_video_ts = now;
                state.videos_uploaded += 1;
            }
            state.clone()
        };
        self.store.save_actor_state(snapshot).await?;
        Ok(id)
    }

    /// Bump `last_action_ts` without a ledger entry (completed cycles, sweeps)
    pub async fn mark_active(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock();
            state.last_action_ts = self.clock.epoch_secs();
            state.clone()
        };
        self.store.save_actor_state(snapshot).await?;
        Ok(())
    }

    /// Flush the in-memory state
    pub async fn persist(&self) -> Result<()> {
        self.store.save_actor_state(self.snapshot()).await?;
        Ok(())
    }
}
