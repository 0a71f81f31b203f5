//! # Actor Registry
//!
//! Static per-persona configuration, built once from the roster.
//!
//! Profiles are immutable after construction. The single exception is
//! [`ActorRegistry::backfill_api_key`], which fills in a key for a persona that had
//! none (environment lookup or platform self-registration at startup). Keys that are
//! already present are never replaced.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Palette, PersonaConfig, TitleTemplate};
use crate::constants::{ActivityClass, PersonaRole, Tier};

/// Immutable description of one persona
#[derive(Debug, Clone, PartialEq)]
pub struct ActorProfile {
    pub id: String,
    pub display_name: String,
    pub activity: ActivityClass,
    pub tier: Tier,
    pub role: PersonaRole,
    pub interval_min_secs: u64,
    pub interval_max_secs: u64,
    /// System prompt describing the persona's voice
    pub personality: String,
    pub video_prompts: Vec<String>,
    pub video_titles: Vec<TitleTemplate>,
    pub hidden_messages: Vec<String>,
    pub hidden_tag: String,
    pub palette: Palette,
}

impl ActorProfile {
    pub fn from_config(config: &PersonaConfig) -> Self {
        let personality = if config.personality.trim().is_empty() {
            format!(
                "You are {}, a friendly bot on a video platform for AI creators.",
                config.display_name
            )
        } else {
            config.personality.clone()
        };

        Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            activity: config.activity,
            tier: config.tier,
            role: config.role,
            interval_min_secs: config.interval_min_secs,
            interval_max_secs: config.interval_max_secs,
            personality,
            video_prompts: config.video_prompts.clone(),
            video_titles: config.video_titles.clone(),
            hidden_messages: config.hidden_messages.clone(),
            hidden_tag: config
                .hidden_tag
                .clone()
                .unwrap_or_else(|| "HIDDEN_MESSAGE".to_string()),
            palette: config.palette.clone(),
        }
    }

    /// Midpoint of the wake bounds scaled by the activity multiplier
    pub fn mean_wake_secs(&self) -> f64 {
        (self.interval_min_secs + self.interval_max_secs) as f64 / 2.0 * self.activity.wake_multiplier()
    }

    /// Hard bounds every computed wake delay is clamped into
    pub fn wake_bounds_secs(&self) -> (f64, f64) {
        (
            self.interval_min_secs as f64 * 0.5,
            self.interval_max_secs as f64 * 1.5,
        )
    }
}

/// Roster of all personas, keyed by id, in roster order
#[derive(Debug, Default)]
pub struct ActorRegistry {
    profiles: HashMap<String, Arc<ActorProfile>>,
    order: Vec<String>,
    api_keys: RwLock<HashMap<String, String>>,
}

impl ActorRegistry {
    pub fn from_personas(personas: &[PersonaConfig]) -> Self {
        let mut registry = Self::default();
        let mut keys = HashMap::new();
        for persona in personas {
            let profile = Arc::new(ActorProfile::from_config(persona));
            if let Some(key) = persona.api_key.as_ref().filter(|k| !k.is_empty()) {
                keys.insert(persona.id.clone(), key.clone());
            }
            registry.order.push(profile.id.clone());
            registry.profiles.insert(profile.id.clone(), profile);
        }
        registry.api_keys = RwLock::new(keys);
        info!(
            personas = registry.order.len(),
            with_keys = registry.api_keys.read().len(),
            "📇 REGISTRY: Persona roster loaded"
        );
        registry
    }

    pub fn get(&self, actor_id: &str) -> Option<Arc<ActorProfile>> {
        self.profiles.get(actor_id).cloned()
    }

    pub fn contains(&self, actor_id: &str) -> bool {
        self.profiles.contains_key(actor_id)
    }

    /// Profiles in roster order
    pub fn profiles(&self) -> Vec<Arc<ActorProfile>> {
        self.order
            .iter()
            .filter_map(|id| self.profiles.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn api_key(&self, actor_id: &str) -> Option<String> {
        self.api_keys.read().get(actor_id).cloned()
    }

    pub fn missing_api_keys(&self) -> Vec<String> {
        let keys = self.api_keys.read();
        self.order
            .iter()
            .filter(|id| !keys.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Record a key for a persona that has none. Returns whether the key was stored.
    pub fn backfill_api_key(&self, actor_id: &str, key: impl Into<String>) -> bool {
        if !self.profiles.contains_key(actor_id) {
            warn!(actor = %actor_id, "Ignoring API key backfill for unknown persona");
            return false;
        }
        let key = key.into();
        if key.is_empty() {
            return false;
        }
        let mut keys = self.api_keys.write();
        if keys.contains_key(actor_id) {
            return false;
        }
        keys.insert(actor_id.to_string(), key);
        info!(actor = %actor_id, "🔑 REGISTRY: API key backfilled");
        true
    }
}
