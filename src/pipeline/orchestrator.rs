//! Pipeline orchestrator — sequences normalize → summarize + extract +
//! classify and governs idempotent re-processing.
//!
//! The orchestrator performs no persistence itself: it produces one
//! `ProcessingResult` per message and hands it to the store, whose
//! transactional apply determines the final status. Re-processing
//! replaces the prior action-item set, never appends to it.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{PipelineConfig, SummaryBackendKind};
use crate::error::{ConfigError, Error};
use crate::pipeline::classifier::{SenderRules, classify};
use crate::pipeline::extractor::extract;
use crate::pipeline::normalizer::normalize;
use crate::pipeline::summarizer::{ExternalSummarizer, Summarizer};
use crate::pipeline::types::{ProcessingResult, RawMessage};
use crate::store::MessageStore;

/// The ingestion-and-extraction pipeline.
///
/// Stateless across invocations: each call is a pure function of its
/// inputs plus the (static) configuration, so processing different
/// messages concurrently is safe. Concurrent re-processing of the same
/// message must be serialized by the caller.
pub struct Pipeline {
    config: PipelineConfig,
    summarizer: Summarizer,
    rules: SenderRules,
}

impl Pipeline {
    /// Build a pipeline from configuration, compiling sender patterns
    /// and selecting the summarizer backend.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        if config.max_summary_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_summary_len".into(),
                message: "must be at least 1".into(),
            });
        }
        let rules = SenderRules::from_patterns(&config.high_senders, &config.low_senders)?;
        let summarizer = match config.backend {
            SummaryBackendKind::Heuristic => Summarizer::heuristic(),
            SummaryBackendKind::External => Summarizer::with_backend(Arc::new(
                ExternalSummarizer::new(
                    &config.external_url,
                    &config.external_model,
                    config.external_timeout,
                ),
            )),
        };
        Ok(Self {
            config,
            summarizer,
            rules,
        })
    }

    /// Build a pipeline with an explicit summarizer (used in tests and
    /// by callers that construct their own backend).
    pub fn new(config: PipelineConfig, summarizer: Summarizer, rules: SenderRules) -> Self {
        Self {
            config,
            summarizer,
            rules,
        }
    }

    /// Process one raw message into a transient result bundle.
    ///
    /// Normalizes once; summarizer, extractor, and classifier all see
    /// the same canonical text, and the classifier sees the extractor's
    /// output. Infallible: every stage is total, and summarizer backend
    /// failures fall back to the heuristic inside the facade.
    pub async fn process(&self, raw: &RawMessage) -> ProcessingResult {
        let canonical = normalize(&raw.subject, &raw.body);
        let actions = extract(&canonical, self.config.max_action_items);
        let summary = self
            .summarizer
            .summarize(&canonical, self.config.max_summary_len)
            .await;
        let importance = classify(&canonical, &actions, &raw.sender, &self.rules);

        debug!(
            external_id = %raw.external_id,
            importance = importance.label(),
            actions = actions.len(),
            "Message processed"
        );

        ProcessingResult {
            summary,
            importance,
            actions,
        }
    }

    /// Ingest one raw message: upsert, process, and commit atomically.
    ///
    /// Returns the message id. A commit failure marks the message
    /// `failed` only if it was never processed before; previously
    /// derived state stays untouched.
    pub async fn process_and_commit(
        &self,
        store: &dyn MessageStore,
        raw: &RawMessage,
    ) -> Result<String, Error> {
        let id = store.upsert_message(raw).await?;
        let result = self.process(raw).await;
        match store.apply_result(&id, &result).await {
            Ok(()) => Ok(id),
            Err(e) => {
                store.mark_failed(&id).await.ok();
                Err(e.into())
            }
        }
    }

    /// Process a batch of raw messages.
    ///
    /// Messages are independent: one failure is logged and never aborts
    /// the rest of the batch. Returns the number committed.
    pub async fn ingest_batch(
        &self,
        store: &dyn MessageStore,
        messages: Vec<RawMessage>,
    ) -> usize {
        let total = messages.len();
        let mut processed = 0;
        for raw in messages {
            match self.process_and_commit(store, &raw).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    error!(
                        external_id = %raw.external_id,
                        error = %e,
                        "Failed to process message in batch"
                    );
                }
            }
        }
        info!(processed, total, "Batch ingestion complete");
        processed
    }

    /// Idempotent re-run for an already-stored message.
    ///
    /// Re-processing unchanged text yields an identical summary, tier,
    /// and action-item set; the store applies it replace-not-append.
    pub async fn reprocess(&self, store: &dyn MessageStore, id: &str) -> Result<(), Error> {
        let stored = store.get_message(id).await?.ok_or_else(|| {
            Error::Database(crate::error::DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            })
        })?;
        let raw = RawMessage {
            external_id: stored.id.clone(),
            sender: stored.sender.clone(),
            subject: stored.subject.clone().unwrap_or_default(),
            body: stored.body.clone(),
            received_at: stored.received_at,
        };
        let result = self.process(&raw).await;
        store.apply_result(id, &result).await?;
        info!(id, importance = result.importance.label(), "Message reprocessed");
        Ok(())
    }
}
