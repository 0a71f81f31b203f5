//! In-process stand-ins for every external collaborator.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use persona_core::clients::{
    AvatarRenderer, EnforcementResult, FrameCompositor, ModerationClient, NewsSource, PlatformClient,
    PlatformConnector, ScanReport, TextCard, VideoGenerator, WeatherSource,
};
use persona_core::config::CityConfig;
use persona_core::error::{
    ClientError, ClientErrorKind, ClientResult, LlmError, LlmResult, MediaError, MediaResult,
};
use persona_core::llm::{ChatMessage, CompletionRequest, LlmBackend, ToolCall, ToolDefinition};
use persona_core::models::{Comment, Story, Video, VideoUpload, WeatherReport};
use persona_core::utils::text::dedup_key;

/// Everything a persona did against the fake platform
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Watch { actor: String, video: String },
    Comment { actor: String, video: String, text: String },
    Like { actor: String, video: String },
    Dislike { actor: String, video: String },
    Subscribe { actor: String, agent: String },
    Upload { actor: String, title: String, category: Option<String> },
}

/// Shared backing store for every [`MockPlatform`] handed out by a [`MockConnector`]
#[derive(Debug, Default)]
pub struct PlatformState {
    pub feed: Mutex<Vec<Video>>,
    pub calls: Mutex<Vec<PlatformCall>>,
    uploads: AtomicUsize,
}

impl PlatformState {
    pub fn set_feed(&self, videos: Vec<Video>) {
        *self.feed.lock() = videos;
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn comments(&self) -> Vec<(String, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Comment { actor, video, text } => Some((actor, video, text)),
                _ => None,
            })
            .collect()
    }

    pub fn likes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, PlatformCall::Like { .. }))
            .count()
    }

    pub fn uploads(&self) -> Vec<(String, String, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Upload { actor, title, category } => Some((actor, title, category)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }
}

pub fn video(id: &str, title: &str, agent: &str) -> Video {
    Video {
        video_id: id.to_string(),
        title: title.to_string(),
        agent_name: agent.to_string(),
        ..Video::default()
    }
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    agent: String,
    state: Arc<PlatformState>,
}

impl MockPlatform {
    pub fn new(agent: &str, state: Arc<PlatformState>) -> Self {
        Self {
            agent: agent.to_string(),
            state,
        }
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn agent_name(&self) -> &str {
        &self.agent
    }

    async fn feed(&self, _page: u32) -> ClientResult<Vec<Video>> {
        Ok(self.state.feed.lock().clone())
    }

    async fn recent_videos(&self, limit: u32) -> ClientResult<Vec<Video>> {
        Ok(self.state.feed.lock().iter().take(limit as usize).cloned().collect())
    }

    async fn trending(&self) -> ClientResult<Vec<Video>> {
        Ok(self.state.feed.lock().clone())
    }

    async fn search(&self, query: &str) -> ClientResult<Vec<Video>> {
        let query = query.to_lowercase();
        Ok(self
            .state
            .feed
            .lock()
            .iter()
            .filter(|v| v.title.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn watch(&self, video_id: &str) -> ClientResult<()> {
        self.state.push(PlatformCall::Watch {
            actor: self.agent.clone(),
            video: video_id.to_string(),
        });
        Ok(())
    }

    async fn get_video(&self, video_id: &str) -> ClientResult<Video> {
        self.state
            .feed
            .lock()
            .iter()
            .find(|v| v.video_id == video_id)
            .cloned()
            .ok_or_else(|| ClientError::status("get_video", 404, "not found"))
    }

    async fn get_comments(&self, video_id: &str) -> ClientResult<Vec<Comment>> {
        Ok(self
            .state
            .comments()
            .into_iter()
            .filter(|(_, video, _)| video == video_id)
            .map(|(actor, _, text)| Comment {
                agent_name: actor,
                content: text,
            })
            .collect())
    }

    async fn comment(&self, video_id: &str, content: &str) -> ClientResult<()> {
        self.state.push(PlatformCall::Comment {
            actor: self.agent.clone(),
            video: video_id.to_string(),
            text: content.to_string(),
        });
        Ok(())
    }

    async fn like(&self, video_id: &str) -> ClientResult<()> {
        self.state.push(PlatformCall::Like {
            actor: self.agent.clone(),
            video: video_id.to_string(),
        });
        Ok(())
    }

    async fn dislike(&self, video_id: &str) -> ClientResult<()> {
        self.state.push(PlatformCall::Dislike {
            actor: self.agent.clone(),
            video: video_id.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self, agent_name: &str) -> ClientResult<()> {
        self.state.push(PlatformCall::Subscribe {
            actor: self.agent.clone(),
            agent: agent_name.to_string(),
        });
        Ok(())
    }

    async fn upload(&self, upload: &VideoUpload) -> ClientResult<String> {
        let n = self.state.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.push(PlatformCall::Upload {
            actor: self.agent.clone(),
            title: upload.title.clone(),
            category: upload.category.clone(),
        });
        Ok(format!("up{n:04}"))
    }
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    pub state: Arc<PlatformState>,
    pub issued_key: Option<String>,
}

#[async_trait]
impl PlatformConnector for MockConnector {
    fn client_for(&self, actor_id: &str, _api_key: Option<&str>) -> Arc<dyn PlatformClient> {
        Arc::new(MockPlatform::new(actor_id, self.state.clone()))
    }

    async fn register(&self, _actor_id: &str, _display_name: &str) -> ClientResult<String> {
        self.issued_key
            .clone()
            .ok_or_else(|| ClientError::new(ClientErrorKind::Status, "register", "registration closed"))
    }
}

/// Assistant turn proposing one tool call
pub fn call(name: &str, args: Value) -> ChatMessage {
    ChatMessage::assistant("", vec![ToolCall::new(name, args)])
}

/// Assistant turn with plain text and no tool calls
pub fn say(text: &str) -> ChatMessage {
    ChatMessage::assistant(text, Vec::new())
}

/// LLM backend that replays a fixed script of tool-call turns
#[derive(Debug)]
pub struct ScriptedLlm {
    label: String,
    replies: Mutex<VecDeque<ChatMessage>>,
    completion: Option<String>,
    down: bool,
    pub tool_turns: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            label: "scripted".to_string(),
            replies: Mutex::new(replies.into()),
            completion: Some("What a lovely piece of work.".to_string()),
            down: false,
            tool_turns: AtomicUsize::new(0),
        }
    }

    /// Every call fails at the transport level
    pub fn unavailable() -> Self {
        Self {
            down: true,
            completion: None,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_completion(mut self, completion: Option<&str>) -> Self {
        self.completion = completion.map(str::to_string);
        self
    }

    fn transport_error(&self) -> LlmError {
        LlmError::Transport {
            backend: self.label.clone(),
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    fn label(&self) -> &str {
        &self.label
    }

    async fn complete(&self, _request: &CompletionRequest) -> LlmResult<String> {
        if self.down {
            return Err(self.transport_error());
        }
        self.completion.clone().ok_or_else(|| LlmError::Decode {
            backend: self.label.clone(),
            message: "empty completion".to_string(),
        })
    }

    async fn chat_with_tools(&self, _messages: &[ChatMessage], _tools: &[ToolDefinition]) -> LlmResult<ChatMessage> {
        if self.down {
            return Err(self.transport_error());
        }
        self.tool_turns.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| call("done_for_now", json!({ "reason": "script exhausted" }))))
    }

    async fn warm_up(&self) -> LlmResult<()> {
        if self.down {
            return Err(self.transport_error());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct UnavailableGenerator;

#[async_trait]
impl VideoGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str, _actor: &str) -> MediaResult<PathBuf> {
        Err(MediaError::Unavailable("generator offline".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct UnavailableAvatar;

#[async_trait]
impl AvatarRenderer for UnavailableAvatar {
    async fn render(&self, _script: &str) -> MediaResult<PathBuf> {
        Err(MediaError::Unavailable("avatar service offline".to_string()))
    }
}

/// Compositor that records what it was asked to draw
#[derive(Debug, Default)]
pub struct RecordingCompositor {
    pub cards: Mutex<Vec<TextCard>>,
    pub weather_cards: Mutex<Vec<String>>,
}

#[async_trait]
impl FrameCompositor for RecordingCompositor {
    async fn text_video(&self, card: &TextCard) -> MediaResult<PathBuf> {
        self.cards.lock().push(card.clone());
        Ok(PathBuf::from("/nonexistent/persona-test/text.mp4"))
    }

    async fn weather_card(&self, report: &WeatherReport, _summary: &str, _stamp: &str) -> MediaResult<PathBuf> {
        self.weather_cards.lock().push(report.city.clone());
        Ok(PathBuf::from("/nonexistent/persona-test/weather.mp4"))
    }
}

pub fn story(title: &str) -> Story {
    Story {
        title: title.to_string(),
        summary: format!("Details about {title}."),
        source: "Wire".to_string(),
        hash: dedup_key(&[title]),
    }
}

#[derive(Debug, Default)]
pub struct StaticNews(pub Vec<Story>);

#[async_trait]
impl NewsSource for StaticNews {
    async fn headlines(&self) -> ClientResult<Vec<Story>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Default)]
pub struct StaticWeather;

#[async_trait]
impl WeatherSource for StaticWeather {
    async fn current(&self, city: &CityConfig) -> ClientResult<WeatherReport> {
        Ok(WeatherReport {
            city: city.name.clone(),
            state: city.state.clone(),
            temp_f: 64,
            feels_like_f: 62,
            condition: "Partly Cloudy".to_string(),
            wind_mph: 8,
            humidity: 55,
            daily_high_f: 70,
            daily_low_f: 51,
        })
    }
}

/// Admin API fake; enforcement always succeeds
#[derive(Debug, Default)]
pub struct FakeModeration {
    pub admin_key: bool,
    pub scan: ScanReport,
    pub nuked: Mutex<Vec<String>>,
    pub banned: Mutex<Vec<String>>,
}

#[async_trait]
impl ModerationClient for FakeModeration {
    fn has_admin_key(&self) -> bool {
        self.admin_key
    }

    async fn scan_content(&self) -> ClientResult<ScanReport> {
        Ok(self.scan.clone())
    }

    async fn nuke(&self, agent_name: &str, _reason: &str) -> ClientResult<EnforcementResult> {
        self.nuked.lock().push(agent_name.to_string());
        Ok(EnforcementResult {
            ok: true,
            videos_deleted: 3,
        })
    }

    async fn ban(&self, agent_name: &str, _reason: &str) -> ClientResult<EnforcementResult> {
        self.banned.lock().push(agent_name.to_string());
        Ok(EnforcementResult {
            ok: true,
            videos_deleted: 0,
        })
    }
}
