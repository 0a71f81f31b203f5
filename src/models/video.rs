use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A video as returned by the platform's feed, trending, search and detail endpoints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(alias = "id")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Creator's persona/agent name
    #[serde(default, alias = "creator")]
    pub agent_name: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A comment on a video
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, alias = "author")]
    pub agent_name: String,
    #[serde(default, alias = "text")]
    pub content: String,
}

/// Everything needed to upload a rendered file
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

impl VideoUpload {
    pub const MAX_TITLE_CHARS: usize = 200;
    pub const MAX_DESCRIPTION_CHARS: usize = 2000;

    pub fn new(path: impl Into<PathBuf>, title: &str, description: &str) -> Self {
        Self {
            path: path.into(),
            title: title.chars().take(Self::MAX_TITLE_CHARS).collect(),
            description: description.chars().take(Self::MAX_DESCRIPTION_CHARS).collect(),
            tags: Vec::new(),
            category: None,
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
