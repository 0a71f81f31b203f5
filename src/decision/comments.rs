//! In-character comment generation with template fallbacks.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{DecisionConfig, LlmConfig};
use crate::llm::{CompletionRequest, LlmClientPool};
use crate::registry::ActorProfile;
use crate::utils::text::{rot13, truncate_chars};
use crate::utils::SharedRng;

const DEFAULT_HIDDEN_MESSAGE: &str = "I am here";
const CONTEXT_COMMENTS: usize = 3;
const CONTEXT_COMMENT_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct CommentWriter {
    llm: LlmClientPool,
    rng: SharedRng,
    payload_probability: f64,
    max_tokens: u32,
    temperature: f64,
}

impl CommentWriter {
    pub fn new(llm: LlmClientPool, rng: SharedRng, decision: &DecisionConfig, llm_config: &LlmConfig) -> Self {
        Self {
            llm,
            rng,
            payload_probability: decision.payload_probability,
            max_tokens: llm_config.completion_max_tokens,
            temperature: llm_config.completion_temperature,
        }
    }

    pub fn llm(&self) -> &LlmClientPool {
        &self.llm
    }

    /// `\n\n[<TAG>: <rot13 text>]` built from one of the persona's hidden messages
    pub fn encoded_payload(&self, profile: &ActorProfile) -> String {
        let message = {
            let mut rng = self.rng.lock();
            profile
                .hidden_messages
                .choose(&mut *rng)
                .cloned()
                .unwrap_or_else(|| DEFAULT_HIDDEN_MESSAGE.to_string())
        };
        format!("\n\n[{}: {}]", profile.hidden_tag, rot13(&message))
    }

    /// The encoded payload with the configured probability, else empty
    pub fn maybe_payload(&self, profile: &ActorProfile) -> String {
        let roll: f64 = self.rng.lock().gen();
        if roll < self.payload_probability {
            self.encoded_payload(profile)
        } else {
            String::new()
        }
    }

    /// Completion helper using the persona's voice as the system prompt
    pub async fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Option<String> {
        let request = CompletionRequest::new(system, prompt, max_tokens).with_temperature(self.temperature);
        self.llm.complete(&request).await
    }

    pub async fn generate_comment(
        &self,
        profile: &ActorProfile,
        title: &str,
        creator: &str,
        existing: &[String],
    ) -> String {
        let suffix = self.maybe_payload(profile);

        let context = if existing.is_empty() {
            String::new()
        } else {
            let snippets: Vec<String> = existing
                .iter()
                .take(CONTEXT_COMMENTS)
                .map(|c| truncate_chars(c, CONTEXT_COMMENT_CHARS))
                .collect();
            format!(
                "\n\nOther comments already on this video (do NOT repeat similar sentiments):\n- {}",
                snippets.join("\n- ")
            )
        };
        let prompt = format!(
            "Write a single comment on the video \"{title}\" by @{creator}. Stay completely in character. \
             Be creative and unique, never repeat yourself. Keep it 1-4 sentences. Reference the video \
             title naturally. Address the creator as @{creator}.{context}"
        );

        if let Some(text) = self.complete(&profile.personality, &prompt, self.max_tokens).await {
            return text + &suffix;
        }

        let display = &profile.display_name;
        let fallbacks = [
            format!("Interesting work on \"{title}\", @{creator}. - {display}"),
            format!("@{creator}, \"{title}\" caught my attention. Well done."),
            format!("\"{title}\" by @{creator} is worth the watch."),
        ];
        let pick = self.rng.lock().gen_range(0..fallbacks.len());
        fallbacks[pick].clone() + &suffix
    }

}
