//! Summarization — bounded-length synopsis of the canonical text.
//!
//! Two backends behind one trait: the deterministic heuristic (default,
//! zero dependencies) and an external model endpoint. External failures
//! trigger a mandatory, synchronous fallback to the heuristic so
//! summarization never blocks ingestion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SummarizeError;

/// Marker appended when a summary was truncated. Counts toward the bound.
const ELLIPSIS: char = '…';

// ── Truncation policy (shared with the extractor) ───────────────────

/// Truncate `text` to at most `max_len` characters, cutting at a sentence
/// boundary when a late one exists, else at a word boundary, never
/// mid-word. Appends an ellipsis when anything was cut. Input already
/// within the bound is returned unmodified.
///
/// The one exception to "never mid-word": a single token longer than the
/// whole budget is hard-cut, since no boundary exists.
pub fn truncate_at_boundary(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }
    if max_len == 0 {
        return String::new();
    }
    // Reserve one character for the ellipsis.
    let budget = max_len - 1;
    if budget == 0 {
        return ELLIPSIS.to_string();
    }
    let prefix = &chars[..budget];

    // A sentence boundary in the back half of the budget wins; an early
    // one would throw away too much of the text.
    let sentence_cut = prefix
        .iter()
        .rposition(|c| matches!(c, '.' | '!' | '?'))
        .map(|i| i + 1)
        .filter(|&cut| cut * 2 >= budget);
    let cut = sentence_cut
        .or_else(|| prefix.iter().rposition(|c| c.is_whitespace()))
        .unwrap_or(budget);

    let collected: String = prefix[..cut].iter().collect();
    let mut result = collected.trim_end().to_string();
    result.push(ELLIPSIS);
    result
}

/// The heuristic summary: leading sentences of the canonical text up to
/// the bound. Pure function of its inputs.
pub fn heuristic_summary(canonical: &str, max_len: usize) -> String {
    truncate_at_boundary(canonical, max_len)
}

// ── Backend seam ────────────────────────────────────────────────────

/// A summarizer backend capability.
///
/// Implementations must honor the length contract: the returned string is
/// at most `max_len` characters. They need not be deterministic, but the
/// heuristic default is.
#[async_trait]
pub trait SummarizerBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Summarize the canonical text within `max_len` characters.
    async fn summarize(&self, canonical: &str, max_len: usize)
    -> Result<String, SummarizeError>;
}

/// External model backend — Ollama-style chat endpoint over HTTP.
pub struct ExternalSummarizer {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl ExternalSummarizer {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SummarizerBackend for ExternalSummarizer {
    fn name(&self) -> &str {
        "external"
    }

    async fn summarize(
        &self,
        canonical: &str,
        max_len: usize,
    ) -> Result<String, SummarizeError> {
        let prompt = format!(
            "Summarize this email in one or two sentences, at most {max_len} characters. \
             Respond with the summary only.\n\n{canonical}"
        );
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        let request = async {
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| SummarizeError::Http(e.to_string()))?
                .error_for_status()
                .map_err(|e| SummarizeError::Http(e.to_string()))?;
            response
                .json::<ChatResponse>()
                .await
                .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))
        };

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SummarizeError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        let content = response.message.content.trim();
        if content.is_empty() {
            return Err(SummarizeError::InvalidResponse("empty summary".into()));
        }
        // Re-truncate so the length contract holds no matter what the
        // model returned.
        Ok(truncate_at_boundary(content, max_len))
    }
}

// ── Facade with mandatory fallback ──────────────────────────────────

/// Summarizer facade: selected backend plus the always-available
/// heuristic fallback.
pub struct Summarizer {
    backend: Option<Arc<dyn SummarizerBackend>>,
}

impl Summarizer {
    /// Heuristic-only summarizer (the default).
    pub fn heuristic() -> Self {
        Self { backend: None }
    }

    /// Summarizer that tries `backend` first and falls back to the
    /// heuristic on any failure.
    pub fn with_backend(backend: Arc<dyn SummarizerBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Produce a summary. Infallible: backend failures are logged as
    /// degraded-mode events and the heuristic result is returned instead.
    pub async fn summarize(&self, canonical: &str, max_len: usize) -> String {
        if let Some(backend) = &self.backend {
            match backend.summarize(canonical, max_len).await {
                Ok(summary) if !summary.trim().is_empty() => {
                    debug!(backend = backend.name(), "Backend summary produced");
                    return summary;
                }
                Ok(_) => {
                    warn!(
                        backend = backend.name(),
                        "Backend returned empty summary, falling back to heuristic"
                    );
                }
                Err(e) => {
                    warn!(
                        backend = backend.name(),
                        error = %e,
                        "Backend failed, falling back to heuristic"
                    );
                }
            }
        }
        heuristic_summary(canonical, max_len)
    }
}
