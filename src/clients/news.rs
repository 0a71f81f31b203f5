//! Headline source for news personas, read from a JSON Feed (jsonfeed.org v1.1).

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::{NewsConfig, PlatformConfig};
use crate::error::{ClientError, ClientErrorKind, ClientResult};
use crate::models::Story;
use crate::utils::text::dedup_key;

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Current headlines, most important first
    async fn headlines(&self) -> ClientResult<Vec<Story>>;
}

#[derive(Debug, Deserialize)]
struct JsonFeed {
    #[serde(default)]
    title: String,
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

#[derive(Debug, Deserialize)]
struct JsonFeedItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    content_text: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl JsonFeed {
    fn into_stories(self) -> Vec<Story> {
        let feed_title = self.title;
        self.items
            .into_iter()
            .filter_map(|item| {
                let title = item.title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                let summary = item
                    .summary
                    .or(item.content_text)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let source = item
                    .url
                    .as_deref()
                    .and_then(|u| Url::parse(u).ok())
                    .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
                    .filter(|_| feed_title.is_empty())
                    .unwrap_or_else(|| feed_title.clone());
                let hash = dedup_key(&[&title]);
                Some(Story {
                    title,
                    summary,
                    source,
                    hash,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct JsonFeedNewsSource {
    feed_url: Option<String>,
    http: Client,
}

impl JsonFeedNewsSource {
    pub fn from_config(platform: &PlatformConfig, news: &NewsConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(platform.connect_timeout())
            .timeout(platform.request_timeout())
            .user_agent(platform.user_agent.clone())
            .build()
            .map_err(|e| ClientError::from_reqwest("build_client", e))?;
        Ok(Self {
            feed_url: news.feed_url.clone(),
            http,
        })
    }
}

#[async_trait]
impl NewsSource for JsonFeedNewsSource {
    async fn headlines(&self) -> ClientResult<Vec<Story>> {
        let operation = "headlines";
        let url = self
            .feed_url
            .as_deref()
            .ok_or_else(|| ClientError::not_configured(operation, "news feed URL"))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(operation, status.as_u16(), "news feed request failed"));
        }
        let feed = response
            .json::<JsonFeed>()
            .await
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, operation, e.to_string()))?;
        Ok(feed.into_stories())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feed_items_become_stories_with_stable_hashes() {
        let feed: JsonFeed = serde_json::from_value(json!({
            "version": "https://jsonfeed.org/version/1.1",
            "title": "",
            "items": [
                { "id": "1", "title": " Rover finds ice ", "content_text": "Details here.", "url": "https://www.example-news.org/a" },
                { "id": "2", "title": "" },
                { "id": "3", "summary": "no title" }
            ]
        }))
        .unwrap();
        let stories = feed.into_stories();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Rover finds ice");
        assert_eq!(stories[0].summary, "Details here.");
        assert_eq!(stories[0].source, "example-news.org");
        assert_eq!(stories[0].hash, dedup_key(&["rover finds ice"]));
    }
}
