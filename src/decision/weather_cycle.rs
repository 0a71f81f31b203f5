//! Weather persona cycle: fresh city, current conditions, summary, card, upload.
//!
//! A city is covered for the day once a `weather_upload` carrying its key exists in
//! the persona's ledger within the dedup window. The key hashes the city name with
//! the UTC date.

use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::engine::DecisionEngine;
use crate::clients::PlatformClient;
use crate::config::CityConfig;
use crate::constants::ActionKind;
use crate::error::Result;
use crate::models::{VideoUpload, WeatherReport};
use crate::orchestration::ActorBrain;
use crate::registry::ActorProfile;
use crate::utils::text::{dedup_key, fill_template, truncate_chars};

const DAY_SECS: u64 = 86_400;
const SUMMARY_MAX_TOKENS: u32 = 200;
const SUMMARY_MAX_CHARS: usize = 400;

/// Dedup key for one city on one UTC date (`YYYY-MM-DD`)
pub fn city_key(city: &str, date: &str) -> String {
    dedup_key(&[city, date])
}

fn fallback_summary(report: &WeatherReport) -> String {
    format!(
        "Currently {} degrees in {} with {}. Winds at {} mph, humidity at {}%. \
         Today's high near {}, low around {}.",
        report.temp_f,
        report.city,
        report.condition.to_lowercase(),
        report.wind_mph,
        report.humidity,
        report.daily_high_f,
        report.daily_low_f
    )
}

fn forecaster_prompt(profile: &ActorProfile) -> String {
    format!(
        "{}\n\nYou are {}, presenting a weather update. Write a 2-3 sentence summary \
         for broadcast, warm and precise. Plain text only, under 300 characters.",
        profile.personality, profile.display_name
    )
}

impl DecisionEngine {
    async fn weather_summary(&self, profile: &ActorProfile, report: &WeatherReport) -> String {
        let prompt = format!(
            "City: {}\nTemperature: {}F (feels like {}F)\nCondition: {}\nWind: {} mph\n\
             Humidity: {}%\nHigh: {}F / Low: {}F",
            report.location(),
            report.temp_f,
            report.feels_like_f,
            report.condition,
            report.wind_mph,
            report.humidity,
            report.daily_high_f,
            report.daily_low_f
        );
        let summary = self
            .writer
            .complete(&forecaster_prompt(profile), &prompt, SUMMARY_MAX_TOKENS)
            .await
            .unwrap_or_else(|| fallback_summary(report));
        truncate_chars(&summary, SUMMARY_MAX_CHARS)
    }

    /// Run one weather cycle; `None` when every city is already covered
    pub async fn run_weather_cycle(&self, brain: &ActorBrain, client: &dyn PlatformClient) -> Result<Option<String>> {
        let profile = brain.profile();
        let now = self.clock.now();
        let today = now.format("%Y-%m-%d").to_string();
        let window = Duration::from_secs(self.settings.weather.dedup_days * DAY_SECS);
        let covered: HashSet<String> = brain
            .recent_action_texts(ActionKind::WeatherUpload, window)
            .await?
            .into_iter()
            .collect();

        let fresh: Vec<&CityConfig> = self
            .settings
            .weather
            .cities
            .iter()
            .filter(|city| !covered.contains(&city_key(&city.name, &today)))
            .collect();
        let city = {
            let mut rng = self.rng.lock();
            fresh.choose(&mut *rng).map(|city| (*city).clone())
        };
        let Some(city) = city else {
            info!(actor = %brain.id(), "🌦️ WEATHER: No fresh cities available");
            return Ok(None);
        };
        info!(actor = %brain.id(), city = %city.name, state = %city.state, "🌦️ WEATHER: Selected city");

        let report = self.sources.weather.current(&city).await?;
        info!(
            actor = %brain.id(),
            city = %report.city,
            temp_f = report.temp_f,
            condition = %report.condition,
            "🌦️ WEATHER: Conditions fetched"
        );

        let summary = self.weather_summary(profile, &report).await;
        let stamp = now.format("%B %d, %Y  %H:%M UTC").to_string();
        let path = self.media.compositor.weather_card(&report, &summary, &stamp).await?;

        let location = report.location();
        let upload_number = brain.videos_uploaded() + 1;
        let template = {
            let mut rng = self.rng.lock();
            profile.video_titles.choose(&mut *rng).map(|t| t.title.clone())
        }
        .unwrap_or_else(|| "Weather Report: {city}".to_string());
        let title = fill_template(&template, upload_number, Some(&location));
        let description = format!(
            "{} weather report for {}. {}, {}F (feels like {}F). Wind: {} mph. \
             Humidity: {}%. High: {}F / Low: {}F.\n\n{}",
            profile.display_name,
            location,
            report.condition,
            report.temp_f,
            report.feels_like_f,
            report.wind_mph,
            report.humidity,
            report.daily_high_f,
            report.daily_low_f,
            summary
        );
        let upload = VideoUpload::new(path, &title, &description)
            .with_tags([profile.id.as_str(), "weather", city.name.as_str()])
            .with_category("weather");

        let key = city_key(&city.name, &today);
        let video_id = self
            .upload_rendered(brain, client, upload, ActionKind::WeatherUpload, Some(&key))
            .await?;

        let self_comment = format!(
            "Current conditions in {}: {}F, {}. {} - {}",
            report.city,
            report.temp_f,
            report.condition,
            truncate_chars(&summary, 200),
            profile.display_name
        );
        if let Err(err) = client.comment(&video_id, &self_comment).await {
            debug!(actor = %brain.id(), video_id = %video_id, error = %err, "Self-comment failed");
        }
        Ok(Some(video_id))
    }
}
