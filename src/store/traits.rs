//! Backend-agnostic `MessageStore` trait — single async interface for
//! message and action-item persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{ImportanceTier, ProcessingResult, RawMessage};

/// Lifecycle of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Ingested, derived state not yet committed.
    Pending,
    /// Pipeline output committed.
    Processed,
    /// Commit failed before the message was ever processed.
    Failed,
}

/// A persisted message with its derived state.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub sender: String,
    pub subject: Option<String>,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub importance: ImportanceTier,
    pub importance_override: Option<ImportanceTier>,
    pub status: MessageStatus,
    pub is_read: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredMessage {
    /// The tier readers see: a manual override wins over the derived one.
    pub fn effective_importance(&self) -> ImportanceTier {
        self.importance_override.unwrap_or(self.importance)
    }
}

/// A persisted action item extracted from (or manually added to) a message.
#[derive(Debug, Clone, Serialize)]
pub struct StoredActionItem {
    pub id: Uuid,
    pub message_id: String,
    /// Reading-order position within the source message. Manually
    /// created items are appended after the extracted ones.
    pub position: i64,
    pub description: String,
    pub importance: ImportanceTier,
    pub is_done: bool,
    pub done_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Sort key for message listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSort {
    #[default]
    ReceivedAt,
    Importance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters for `list_messages`.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Case-insensitive substring match over sender, subject, body, and summary.
    pub q: Option<String>,
    /// Keep only messages whose effective importance is at least this tier.
    pub min_importance: Option<ImportanceTier>,
    pub unread_only: bool,
    pub newer_than: Option<DateTime<Utc>>,
    pub sort: MessageSort,
    pub order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

/// Query parameters for `list_action_items`.
#[derive(Debug, Clone, Default)]
pub struct ActionItemFilter {
    pub message_id: Option<String>,
    pub pending_only: bool,
    pub min_importance: Option<ImportanceTier>,
    pub limit: Option<u32>,
}

/// Partial update for an action item. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ActionItemPatch {
    pub description: Option<String>,
    pub importance: Option<ImportanceTier>,
    pub is_done: Option<bool>,
}

/// Backend-agnostic store covering messages and action items.
#[async_trait]
pub trait MessageStore: Send + Sync {
    // ── Messages ────────────────────────────────────────────────────

    /// Insert a raw message, or refresh its raw fields if it already
    /// exists. Derived state (summary, importance, status) is never
    /// touched here. Returns the message id.
    async fn upsert_message(&self, raw: &RawMessage) -> Result<String, DatabaseError>;

    /// Get a message with its derived state.
    async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DatabaseError>;

    /// List messages matching `filter`, returning the page plus the
    /// total match count before limit/offset.
    async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<(Vec<StoredMessage>, u64), DatabaseError>;

    /// Atomically commit a pipeline run: set summary and importance,
    /// replace the message's action items, and mark it processed.
    /// Either the whole bundle lands or none of it does.
    async fn apply_result(
        &self,
        id: &str,
        result: &ProcessingResult,
    ) -> Result<(), DatabaseError>;

    /// Mark a message failed. No-op for messages that were already
    /// processed; their prior derived state stays intact.
    async fn mark_failed(&self, id: &str) -> Result<(), DatabaseError>;

    /// Set or clear the read flag.
    async fn set_read(&self, id: &str, is_read: bool) -> Result<(), DatabaseError>;

    /// Set (`Some`) or clear (`None`) the manual importance override.
    async fn set_importance_override(
        &self,
        id: &str,
        tier: Option<ImportanceTier>,
    ) -> Result<(), DatabaseError>;

    /// Messages awaiting processing, oldest first.
    async fn pending_messages(&self, limit: u32) -> Result<Vec<StoredMessage>, DatabaseError>;

    // ── Action items ────────────────────────────────────────────────

    /// Action items for one message in reading order.
    async fn actions_for_message(
        &self,
        message_id: &str,
    ) -> Result<Vec<StoredActionItem>, DatabaseError>;

    /// List action items across messages.
    async fn list_action_items(
        &self,
        filter: &ActionItemFilter,
    ) -> Result<Vec<StoredActionItem>, DatabaseError>;

    /// Get a single action item.
    async fn get_action_item(&self, id: Uuid)
    -> Result<Option<StoredActionItem>, DatabaseError>;

    /// Manually add an action item to a message, appended after any
    /// extracted ones.
    async fn create_action_item(
        &self,
        message_id: &str,
        description: &str,
        importance: ImportanceTier,
    ) -> Result<StoredActionItem, DatabaseError>;

    /// Apply a partial update. Returns the updated item, or `None` if
    /// it does not exist.
    async fn update_action_item(
        &self,
        id: Uuid,
        patch: &ActionItemPatch,
    ) -> Result<Option<StoredActionItem>, DatabaseError>;

    /// Delete an action item. Returns whether a row was removed.
    async fn delete_action_item(&self, id: Uuid) -> Result<bool, DatabaseError>;
}
