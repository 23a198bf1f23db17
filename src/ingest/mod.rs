//! Message sources — where raw messages come from before the pipeline
//! sees them.
//!
//! The only built-in source reads a JSON fixture file (or a small
//! built-in demo set when no file is configured). A real IMAP/Graph
//! connector would implement the same `MessageSource` trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{Error, SourceError};
use crate::pipeline::Pipeline;
use crate::pipeline::types::RawMessage;
use crate::store::MessageStore;

/// A provider of raw messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch the current batch of raw messages. Fetching is
    /// non-destructive; the same messages may be returned again and
    /// re-ingesting them is idempotent.
    async fn fetch(&self) -> Result<Vec<RawMessage>, SourceError>;
}

/// Fixture-backed source: reads a JSON array of raw messages from disk,
/// or serves the built-in demo set when no path is configured.
pub struct FixtureSource {
    path: Option<PathBuf>,
}

impl FixtureSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn load_file(path: &Path) -> Result<Vec<RawMessage>, SourceError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| SourceError::Parse(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl MessageSource for FixtureSource {
    async fn fetch(&self) -> Result<Vec<RawMessage>, SourceError> {
        match &self.path {
            Some(path) => Self::load_file(path),
            None => Ok(demo_messages()),
        }
    }
}

/// Built-in demo batch with stable external ids, so repeated polls
/// exercise the idempotent re-ingest path.
pub fn demo_messages() -> Vec<RawMessage> {
    let now = Utc::now();
    vec![
        RawMessage {
            external_id: "demo-001".into(),
            sender: "maria@client.example.com".into(),
            subject: "Q3 Report — URGENT".into(),
            body: "Please send the report by Friday. Thanks.".into(),
            received_at: now - ChronoDuration::hours(1),
        },
        RawMessage {
            external_id: "demo-002".into(),
            sender: "dev-team@example.com".into(),
            subject: "Standup notes".into(),
            body: "Here are today's notes.\n\nPlease review the open PRs.\nAlso, update the \
                   deployment checklist when you get a chance."
                .into(),
            received_at: now - ChronoDuration::hours(3),
        },
        RawMessage {
            external_id: "demo-003".into(),
            sender: "no-reply@newsletter.example.com".into(),
            subject: "Your weekly digest".into(),
            body: "Top stories you missed: https://news.example.com/weekly\n\n-- \nUnsubscribe \
                   anytime."
                .into(),
            received_at: now - ChronoDuration::hours(6),
        },
        RawMessage {
            external_id: "demo-004".into(),
            sender: "finance@example.com".into(),
            subject: "Invoice #4417".into(),
            body: "The attached invoice is due by end of day Monday. Can you confirm receipt?"
                .into(),
            received_at: now - ChronoDuration::hours(26),
        },
    ]
}

/// One poll cycle: fetch the source and run the batch through the
/// pipeline. Returns (fetched, processed).
pub async fn poll_once(
    store: &dyn MessageStore,
    pipeline: &Pipeline,
    source: &dyn MessageSource,
) -> Result<(usize, usize), Error> {
    let batch = source.fetch().await?;
    let fetched = batch.len();
    let processed = pipeline.ingest_batch(store, batch).await;
    Ok((fetched, processed))
}

/// Spawn a background task that polls `source` and runs each batch
/// through the pipeline.
///
/// Returns a `JoinHandle` and shutdown flag. The first poll runs
/// immediately; one failed poll is logged and never kills the loop.
pub fn spawn_poll_task(
    store: Arc<dyn MessageStore>,
    pipeline: Arc<Pipeline>,
    source: Arc<dyn MessageSource>,
    interval_secs: u64,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Poll task started — polling every {interval_secs}s");

        let mut tick = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Poll task shutting down");
                return;
            }

            if let Err(e) = poll_once(store.as_ref(), &pipeline, source.as_ref()).await {
                error!("Poll failed: {e}");
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_source_serves_stable_ids() {
        let source = FixtureSource::new(None);
        let first = source.fetch().await.unwrap();
        let second = source.fetch().await.unwrap();
        let ids: Vec<_> = first.iter().map(|m| m.external_id.clone()).collect();
        assert_eq!(ids, vec!["demo-001", "demo-002", "demo-003", "demo-004"]);
        assert_eq!(
            ids,
            second
                .iter()
                .map(|m| m.external_id.clone())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn fixture_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, serde_json::to_string(&demo_messages()).unwrap()).unwrap();

        let source = FixtureSource::new(Some(path));
        let batch = source.fetch().await.unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].external_id, "demo-001");
    }

    #[tokio::test]
    async fn missing_fixture_is_an_error() {
        let source = FixtureSource::new(Some(PathBuf::from("/nonexistent/messages.json")));
        assert!(source.fetch().await.is_err());
    }

    #[tokio::test]
    async fn malformed_fixture_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, "{not json").unwrap();

        let source = FixtureSource::new(Some(path));
        assert!(matches!(
            source.fetch().await,
            Err(SourceError::Parse(_))
        ));
    }
}
