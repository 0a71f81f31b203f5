//! # Media Backends
//!
//! Three collaborators produce upload-ready MP4 files:
//!
//! - [`VideoGenerator`]: a job-queue text-to-video service (ComfyUI-style submit, poll
//!   history, download). Jobs that miss the deadline are abandoned, never retried.
//! - [`FrameCompositor`]: local ffmpeg rendering of text cards and weather cards, the
//!   fallback whenever a remote renderer is unavailable.
//! - [`AvatarRenderer`]: a talking-head avatar service for news scripts.
//!
//! All polling waits go through the [`Clock`] so deadlines are testable.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::models::WeatherReport;
use crate::utils::text::{sanitize_drawtext, truncate_chars, valid_hex_color};
use crate::utils::{Clock, SharedRng};

const MAX_CARD_LINES: usize = 10;
const MAX_CARD_LINE_CHARS: usize = 200;
const WEATHER_CARD_SECS: u32 = 15;

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Render `prompt` into a local MP4 for `actor`
    async fn generate(&self, prompt: &str, actor: &str) -> MediaResult<PathBuf>;
}

/// Lines of text shown one after another on a solid background
#[derive(Debug, Clone, PartialEq)]
pub struct TextCard {
    pub lines: Vec<String>,
    pub background: String,
    pub text_color: String,
    pub secs_per_line: u32,
}

impl TextCard {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            background: "#1a1a2e".to_string(),
            text_color: "#ffffff".to_string(),
            secs_per_line: 3,
        }
    }

    pub fn with_colors(mut self, background: &str, text_color: &str) -> Self {
        self.background = background.to_string();
        self.text_color = text_color.to_string();
        self
    }

    pub fn with_secs_per_line(mut self, secs: u32) -> Self {
        self.secs_per_line = secs.max(1);
        self
    }
}

#[async_trait]
pub trait FrameCompositor: Send + Sync {
    async fn text_video(&self, card: &TextCard) -> MediaResult<PathBuf>;

    async fn weather_card(&self, report: &WeatherReport, summary: &str, stamp: &str) -> MediaResult<PathBuf>;
}

#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    /// Render a spoken script; returns a local MP4
    async fn render(&self, script: &str) -> MediaResult<PathBuf>;
}

/// Best-effort removal of a rendered file after upload
pub async fn remove_rendered(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "Could not remove rendered file");
    }
}

fn output_path(work_dir: &Path, prefix: &str) -> PathBuf {
    let id = Uuid::new_v4().simple().to_string();
    work_dir.join(format!("{prefix}_{}.mp4", &id[..12]))
}

async fn download(http: &Client, url: &str, target: PathBuf) -> MediaResult<PathBuf> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::Unavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(MediaError::Unavailable(format!(
            "download returned {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediaError::Unavailable(e.to_string()))?;
    tokio::fs::write(&target, &bytes).await?;
    debug!(path = %target.display(), bytes = bytes.len(), "Media downloaded");
    Ok(target)
}

/// ComfyUI-compatible job queue
pub struct ComfyJobGenerator {
    base_url: Option<String>,
    http: Client,
    clock: Arc<dyn Clock>,
    rng: SharedRng,
    poll_interval: Duration,
    deadline: Duration,
    work_dir: PathBuf,
}

impl ComfyJobGenerator {
    pub fn new(config: &MediaConfig, http: Client, clock: Arc<dyn Clock>, rng: SharedRng) -> Self {
        Self {
            base_url: config
                .generator_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            http,
            clock,
            rng,
            poll_interval: config.poll_interval(),
            deadline: config.deadline(),
            work_dir: config.work_dir.clone(),
        }
    }

    fn workflow(prompt: &str, actor: &str, seed: u32) -> Value {
        json!({
            "3": {
                "class_type": "LTXVSampler",
                "inputs": {
                    "seed": seed,
                    "steps": 30,
                    "cfg": 3.0,
                    "positive": format!("{prompt}, high quality, 4 seconds, smooth motion"),
                    "negative": "blurry, distorted, low quality, watermark, text overlay, static image",
                    "width": 512,
                    "height": 320,
                    "num_frames": 97,
                }
            },
            "8": {
                "class_type": "SaveVideo",
                "inputs": { "filename_prefix": format!("persona_{actor}"), "video": ["3", 0] }
            }
        })
    }

    /// `(filename, subfolder)` of the first video output in a history entry
    fn finished_output(history: &Value, job_id: &str) -> Option<(String, String)> {
        let outputs = history.get(job_id)?.get("outputs")?.as_object()?;
        outputs.values().find_map(|out| {
            let video = out.get("videos")?.get(0)?;
            let filename = video.get("filename")?.as_str()?.to_string();
            let subfolder = video
                .get("subfolder")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((filename, subfolder))
        })
    }
}

#[async_trait]
impl VideoGenerator for ComfyJobGenerator {
    async fn generate(&self, prompt: &str, actor: &str) -> MediaResult<PathBuf> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| MediaError::Unavailable("generator URL not configured".to_string()))?;

        let healthy = self
            .http
            .get(format!("{base}/system_stats"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        if !healthy {
            return Err(MediaError::Unavailable("generator health check failed".to_string()));
        }

        let seed: u32 = self.rng.lock().gen();
        let submitted: Value = self
            .http
            .post(format!("{base}/prompt"))
            .json(&json!({ "prompt": Self::workflow(prompt, actor, seed) }))
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;
        let job_id = submitted
            .get("prompt_id")
            .and_then(Value::as_str)
            .ok_or_else(|| MediaError::Unavailable("job submission returned no id".to_string()))?
            .to_string();
        info!(actor = %actor, job_id = %job_id, "🎬 MEDIA: Generation job queued");

        let started = self.clock.now();
        loop {
            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if elapsed >= self.deadline {
                warn!(job_id = %job_id, "Generation job abandoned at deadline");
                return Err(MediaError::DeadlineExceeded {
                    job_id,
                    deadline: self.deadline,
                });
            }
            self.clock.sleep(self.poll_interval).await;

            let history = match self.http.get(format!("{base}/history/{job_id}")).send().await {
                Ok(response) if response.status().is_success() => {
                    response.json::<Value>().await.unwrap_or(Value::Null)
                }
                Ok(_) | Err(_) => continue,
            };
            if let Some((filename, subfolder)) = Self::finished_output(&history, &job_id) {
                let url = format!("{base}/view?filename={filename}&subfolder={subfolder}&type=output");
                let target = output_path(&self.work_dir, &format!("persona_{actor}"));
                return download(&self.http, &url, target).await;
            }
        }
    }
}

/// Local ffmpeg renderer
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    ffmpeg_path: String,
    font_path: Option<PathBuf>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl FfmpegCompositor {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            font_path: config.font_path.clone(),
            work_dir: config.work_dir.clone(),
            timeout: Duration::from_secs(config.compositor_timeout_secs),
        }
    }

    fn font(&self) -> MediaResult<String> {
        self.font_path
            .as_ref()
            .map(|p| p.display().to_string())
            .ok_or_else(|| MediaError::Unavailable("no font configured for the compositor".to_string()))
    }

    /// ffmpeg arguments for a text card; lines are capped and sanitized
    pub fn text_video_args(card: &TextCard, font: &str, output: &Path) -> Vec<String> {
        let lines: Vec<String> = card
            .lines
            .iter()
            .take(MAX_CARD_LINES)
            .map(|l| sanitize_drawtext(&truncate_chars(l, MAX_CARD_LINE_CHARS)))
            .collect();
        let per_line = card.secs_per_line.max(1);
        let total = (lines.len().max(1) as u32) * per_line;
        let text_color = valid_hex_color(&card.text_color);

        let filters: Vec<String> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let start = i as u32 * per_line;
                let end = start + per_line;
                format!(
                    "drawtext=text='{line}':fontfile={font}:fontsize=48:fontcolor={text_color}\
                     :x=(w-text_w)/2:y=(h-text_h)/2:enable='between(t,{start},{end})'\
                     :alpha='if(lt(t-{start},0.5),(t-{start})*2,if(gt(t,{end}-0.5),({end}-t)*2,1))'"
                )
            })
            .collect();

        Self::base_args(valid_hex_color(&card.background), total, &filters.join(","), output)
    }

    /// ffmpeg arguments for the fixed-layout weather card
    pub fn weather_card_args(report: &WeatherReport, summary: &str, stamp: &str, font: &str, output: &Path) -> Vec<String> {
        let text = |s: &str| sanitize_drawtext(s);
        let draw = |content: String, size: u32, color: &str, x: &str, y: u32| {
            format!("drawtext=text='{content}':fontfile={font}:fontsize={size}:fontcolor={color}:x={x}:y={y}")
        };
        let centered = "(w-text_w)/2";
        let mut filters = vec![
            draw(text("SKYWATCH AI"), 36, "#90caf9", centered, 40),
            draw(text(stamp), 20, "#b0bec5", centered, 85),
            draw(text(&report.location()), 52, "#ffffff", centered, 160),
            draw(text(&format!("{}F", report.temp_f)), 120, "#ffcc02", centered, 230),
            draw(text(&report.condition), 32, "#e0e0e0", centered, 370),
            draw(text(&format!("Feels {}F", report.feels_like_f)), 22, "#80cbc4", "80", 440),
            draw(text(&format!("Wind {}mph", report.wind_mph)), 22, "#80cbc4", "380", 440),
            draw(text(&format!("Humidity {}pct", report.humidity)), 22, "#80cbc4", "640", 440),
            draw(
                text(&format!("H {}F / L {}F", report.daily_high_f, report.daily_low_f)),
                22,
                "#80cbc4",
                "920",
                440,
            ),
            draw(text(&truncate_chars(summary, 200)), 20, "#cfd8dc", centered, 520),
        ];
        filters.push(format!(
            "fade=t=in:st=0:d=1,fade=t=out:st={}:d=1",
            WEATHER_CARD_SECS - 1
        ));
        Self::base_args("#0d1b2a", WEATHER_CARD_SECS, &filters.join(","), output)
    }

    fn base_args(background: &str, secs: u32, filter: &str, output: &Path) -> Vec<String> {
        let source = format!("color=c={background}:s=1280x720:d={secs}:r=24");
        let duration = secs.to_string();
        let output = output.display().to_string();
        [
            "-y",
            "-f",
            "lavfi",
            "-i",
            source.as_str(),
            "-f",
            "lavfi",
            "-i",
            "anullsrc=r=44100:cl=stereo",
            "-t",
            duration.as_str(),
            "-vf",
            filter,
            "-c:v",
            "libx264",
            "-preset",
            "fast",
            "-crf",
            "23",
            "-c:a",
            "aac",
            "-shortest",
            "-pix_fmt",
            "yuv420p",
            output.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn run(&self, args: Vec<String>, output: PathBuf) -> MediaResult<PathBuf> {
        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let result = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MediaError::Compositor(format!("ffmpeg exceeded {:?}", self.timeout)))??;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::Compositor(truncate_chars(&stderr, 500)));
        }
        debug!(path = %output.display(), "Compositor render finished");
        Ok(output)
    }
}

#[async_trait]
impl FrameCompositor for FfmpegCompositor {
    async fn text_video(&self, card: &TextCard) -> MediaResult<PathBuf> {
        let font = self.font()?;
        let output = output_path(&self.work_dir, "persona_text");
        let args = Self::text_video_args(card, &font, &output);
        self.run(args, output).await
    }

    async fn weather_card(&self, report: &WeatherReport, summary: &str, stamp: &str) -> MediaResult<PathBuf> {
        let font = self.font()?;
        let output = output_path(&self.work_dir, "persona_weather");
        let args = Self::weather_card_args(report, summary, stamp, &font, &output);
        self.run(args, output).await
    }
}

/// Talking-head avatar service: submit a script, poll status, download the result
pub struct HttpAvatarRenderer {
    base_url: Option<String>,
    api_key: Option<String>,
    avatar_id: Option<String>,
    voice_id: Option<String>,
    http: Client,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    deadline: Duration,
    work_dir: PathBuf,
}

impl HttpAvatarRenderer {
    pub fn new(config: &MediaConfig, http: Client, clock: Arc<dyn Clock>) -> Self {
        let avatar = &config.avatar;
        Self {
            base_url: avatar
                .base_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            api_key: avatar.api_key.clone().filter(|k| !k.is_empty()),
            avatar_id: avatar.avatar_id.clone(),
            voice_id: avatar.voice_id.clone(),
            http,
            clock,
            poll_interval: config.poll_interval(),
            deadline: config.deadline(),
            work_dir: config.work_dir.clone(),
        }
    }

    async fn get_json(&self, url: String, key: &str) -> MediaResult<Value> {
        self.http
            .get(url)
            .header("X-Api-Key", key)
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl AvatarRenderer for HttpAvatarRenderer {
    async fn render(&self, script: &str) -> MediaResult<PathBuf> {
        let (Some(base), Some(key)) = (self.base_url.as_deref(), self.api_key.as_deref()) else {
            return Err(MediaError::Unavailable("avatar service not configured".to_string()));
        };

        let submitted: Value = self
            .http
            .post(format!("{base}/v2/video/generate"))
            .header("X-Api-Key", key)
            .json(&json!({
                "video_inputs": [{
                    "character": { "type": "avatar", "avatar_id": self.avatar_id },
                    "voice": { "type": "text", "input_text": script, "voice_id": self.voice_id },
                }],
                "dimension": { "width": 1280, "height": 720 },
            }))
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;
        let job_id = submitted
            .pointer("/data/video_id")
            .and_then(Value::as_str)
            .ok_or_else(|| MediaError::Unavailable("avatar submission returned no id".to_string()))?
            .to_string();
        info!(job_id = %job_id, "🎙️ MEDIA: Avatar render queued");

        let started = self.clock.now();
        loop {
            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if elapsed >= self.deadline {
                return Err(MediaError::DeadlineExceeded {
                    job_id,
                    deadline: self.deadline,
                });
            }
            self.clock.sleep(self.poll_interval).await;

            let status = match self
                .get_json(format!("{base}/v1/video_status.get?video_id={job_id}"), key)
                .await
            {
                Ok(status) => status,
                Err(err) => {
                    debug!(job_id = %job_id, error = %err, "Avatar status poll failed");
                    continue;
                }
            };
            match status.pointer("/data/status").and_then(Value::as_str) {
                Some("completed") => {
                    let url = status
                        .pointer("/data/video_url")
                        .and_then(Value::as_str)
                        .ok_or_else(|| MediaError::JobFailed {
                            job_id: job_id.clone(),
                            reason: "completed without a video URL".to_string(),
                        })?;
                    let target = output_path(&self.work_dir, "persona_avatar");
                    return download(&self.http, url, target).await;
                }
                Some("failed") => {
                    let reason = status
                        .pointer("/data/error")
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(MediaError::JobFailed { job_id, reason });
                }
                _ => {}
            }
        }
    }
}
