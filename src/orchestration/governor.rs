//! # Global Activity Governor
//!
//! Process-wide rate limiting across all personas. The governor keeps a sliding
//! window of action timestamps and a per-UTC-day video counter, both in memory only.
//!
//! A permission check is read-only; the caller reports completed work through
//! [`ActivityGovernor::record_action`] and [`ActivityGovernor::record_video`].

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::logging::log_governor_decision;
use crate::utils::Clock;

const WINDOW_SECS: f64 = 3600.0;

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorVerdict {
    Allowed,
    /// Minimum gap since the last action has not elapsed
    TooSoon,
    /// Trailing-hour ceiling reached
    HourlyCeiling,
    /// Too many actions inside the burst window
    Burst,
}

impl GovernorVerdict {
    pub fn is_allowed(self) -> bool {
        self == Self::Allowed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::TooSoon => "min_gap",
            Self::HourlyCeiling => "hourly_ceiling",
            Self::Burst => "burst",
        }
    }
}

impl fmt::Display for GovernorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct GovernorState {
    recent: VecDeque<f64>,
    last_action_ts: Option<f64>,
    videos_today: u32,
    day: NaiveDate,
}

impl GovernorState {
    fn prune(&mut self, now: f64) {
        while self.recent.front().is_some_and(|ts| *ts <= now - WINDOW_SECS) {
            self.recent.pop_front();
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.day {
            self.day = today;
            self.videos_today = 0;
        }
    }
}

pub struct ActivityGovernor {
    limits: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<GovernorState>,
}

impl fmt::Debug for ActivityGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityGovernor")
            .field("limits", &self.limits)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ActivityGovernor {
    pub fn new(limits: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let day = clock.now().date_naive();
        Self {
            limits,
            clock,
            state: Mutex::new(GovernorState {
                recent: VecDeque::new(),
                last_action_ts: None,
                videos_today: 0,
                day,
            }),
        }
    }

    /// Evaluate the gates in order: min gap, hourly ceiling, burst window
    pub fn check(&self) -> GovernorVerdict {
        let now_at = self.clock.now();
        let now = crate::utils::clock::to_epoch_secs(now_at);
        let mut state = self.state.lock();
        state.roll_day(now_at.date_naive());

        if let Some(last) = state.last_action_ts {
            if now - last < self.limits.min_action_gap_secs as f64 {
                return GovernorVerdict::TooSoon;
            }
        }

        state.prune(now);
        if state.recent.len() >= self.limits.max_actions_per_hour {
            return GovernorVerdict::HourlyCeiling;
        }

        let burst_start = now - self.limits.burst_window_secs as f64;
        let in_burst = state.recent.iter().filter(|ts| **ts > burst_start).count();
        if in_burst >= self.limits.burst_threshold {
            return GovernorVerdict::Burst;
        }

        GovernorVerdict::Allowed
    }

    pub fn can_act(&self) -> bool {
        let verdict = self.check();
        log_governor_decision(verdict.is_allowed(), verdict.as_str(), self.actions_last_hour());
        verdict.is_allowed()
    }

    pub fn record_action(&self) {
        let now = self.clock.epoch_secs();
        let mut state = self.state.lock();
        state.recent.push_back(now);
        state.last_action_ts = Some(now);
    }

    pub fn can_generate_video(&self) -> bool {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock();
        state.roll_day(today);
        state.videos_today < self.limits.max_videos_per_day
    }

    pub fn record_video(&self) {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock();
        state.roll_day(today);
        state.videos_today += 1;
    }

    pub fn actions_last_hour(&self) -> usize {
        let now = self.clock.epoch_secs();
        let mut state = self.state.lock();
        state.prune(now);
        state.recent.len()
    }

    pub fn videos_today(&self) -> u32 {
        let today = self.clock.now().date_naive();
        let mut state = self.state.lock();
        state.roll_day(today);
        state.videos_today
    }

    pub fn min_action_gap_secs(&self) -> u64 {
        self.limits.min_action_gap_secs
    }
}
