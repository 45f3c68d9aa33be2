//! Content classification: LLM-backed with a deterministic fallback.
//!
//! [`LlmClassifier`] calls an OpenAI-compatible chat-completions endpoint
//! and expects a strict JSON object back. Any failure (network, timeout,
//! unparseable reply) is an error; the pipeline then falls back to
//! [`RuleBasedClassifier`], so a flaky classifier never fails a crawl.
//! Confidence always comes from the rule-based scorer regardless of which
//! path produced the labels, keeping scores comparable across runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use regmonitor_shared::{ClassifierConfig, ExtractedUpdate, MonitorError, Result, UpdateType};

use crate::filter;

/// Maximum characters of candidate text sent to the LLM.
const MAX_PROMPT_CONTENT: usize = 1000;

const SYSTEM_PROMPT: &str = "You classify regulatory update announcements. \
Reply with only a JSON object: \
{\"update_type\": one of \"new_regulation\"|\"amendment\"|\"guidance\"|\"consultation\"|\"pending\", \
\"keywords\": up to 10 lowercase strings, \
\"summary\": one sentence}";

/// Labels assigned to a candidate update.
#[derive(Debug, Clone)]
pub struct Classification {
    pub update_type: UpdateType,
    pub keywords: Vec<String>,
    /// Deterministic rule-based score, regardless of classification path.
    pub confidence: f64,
    pub summary: Option<String>,
}

/// Assigns an update type and keywords to an extracted candidate.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, candidate: &ExtractedUpdate) -> Result<Classification>;
}

// ---------------------------------------------------------------------------
// LLM classifier
// ---------------------------------------------------------------------------

/// Shape of the JSON object the model must reply with.
#[derive(Debug, Deserialize)]
struct LlmReply {
    update_type: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
}

/// Chat-completions response envelope (the parts we read).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Classifier backed by an OpenAI-compatible chat-completions API.
pub struct LlmClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
    api_key: String,
}

impl LlmClassifier {
    /// Build a classifier, reading the API key from the configured env var.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            MonitorError::config(format!("{} environment variable not set", config.api_key_env))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        })
    }

    #[cfg(test)]
    fn with_key(config: ClassifierConfig, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    fn prompt_content(candidate: &ExtractedUpdate) -> String {
        let mut text = format!("Title: {}\n{}", candidate.title, candidate.description);
        if text.len() > MAX_PROMPT_CONTENT {
            let mut end = MAX_PROMPT_CONTENT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text
    }
}

#[async_trait]
impl ContentClassifier for LlmClassifier {
    #[instrument(skip_all, fields(title = %candidate.title))]
    async fn classify(&self, candidate: &ExtractedUpdate) -> Result<Classification> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::prompt_content(candidate)},
            ],
        });

        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            request,
        )
        .await
        .map_err(|_| MonitorError::Classification("classifier request timed out".into()))?
        .map_err(|e| MonitorError::Classification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Classification(format!(
                "classifier returned HTTP {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::Classification(format!("bad response envelope: {e}")))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| MonitorError::Classification("empty choices in response".into()))?;

        let reply: LlmReply = serde_json::from_str(content.trim())
            .map_err(|e| MonitorError::Classification(format!("unparseable reply: {e}")))?;

        let update_type: UpdateType = reply.update_type.parse()?;

        debug!(%update_type, keywords = reply.keywords.len(), "LLM classification");

        Ok(Classification {
            update_type,
            keywords: reply.keywords,
            confidence: filter::score_confidence(&filter::candidate_text(candidate)),
            summary: reply.summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Rule-based classifier
// ---------------------------------------------------------------------------

/// Deterministic keyword-rule classifier. Never fails.
pub struct RuleBasedClassifier;

#[async_trait]
impl ContentClassifier for RuleBasedClassifier {
    async fn classify(&self, candidate: &ExtractedUpdate) -> Result<Classification> {
        let text = filter::candidate_text(candidate);
        Ok(Classification {
            update_type: filter::fallback_update_type(&text),
            keywords: filter::fallback_keywords(&text),
            confidence: filter::score_confidence(&text),
            summary: None,
        })
    }
}
