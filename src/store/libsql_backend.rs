//! libSQL backend — async `MessageStore` trait implementation.
//!
//! Supports local file and in-memory databases. Importance tiers are
//! stored as integers (1..=3) so the effective tier can be computed and
//! sorted in SQL via `COALESCE(importance_override, importance)`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{ImportanceTier, ProcessingResult, RawMessage};
use crate::store::migrations;
use crate::store::traits::{
    ActionItemFilter, ActionItemPatch, MessageFilter, MessageSort, MessageStatus, MessageStore,
    SortOrder, StoredActionItem, StoredMessage,
};

/// libSQL message store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path).build().await.map_err(|e| {
            DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
        })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&store.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&store.conn).await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn status_to_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Pending => "pending",
        MessageStatus::Processed => "processed",
        MessageStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> MessageStatus {
    match s {
        "processed" => MessageStatus::Processed,
        "failed" => MessageStatus::Failed,
        _ => MessageStatus::Pending,
    }
}

fn tier_to_int(tier: ImportanceTier) -> i64 {
    tier.score()
}

fn int_to_tier(v: i64) -> ImportanceTier {
    ImportanceTier::from_score(v)
}

const MESSAGE_COLUMNS: &str = "id, sender, subject, body, received_at, summary, importance, \
     importance_override, status, is_read, processed_at, created_at, updated_at";

fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, libsql::Error> {
    let received_str: String = row.get(4)?;
    let override_int: Option<i64> = row.get(7).ok();
    let processed_str: Option<String> = row.get(10).ok();
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;
    let status_str: String = row.get(8)?;

    Ok(StoredMessage {
        id: row.get(0)?,
        sender: row.get(1)?,
        subject: row.get(2).ok(),
        body: row.get(3)?,
        received_at: parse_datetime(&received_str),
        summary: row.get(5).ok(),
        importance: int_to_tier(row.get(6)?),
        importance_override: override_int.map(int_to_tier),
        status: str_to_status(&status_str),
        is_read: row.get::<i64>(9)? != 0,
        processed_at: parse_optional_datetime(&processed_str),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const ACTION_COLUMNS: &str =
    "id, message_id, position, description, importance, is_done, done_at, created_at";

fn row_to_action(row: &libsql::Row) -> Result<StoredActionItem, libsql::Error> {
    let id_str: String = row.get(0)?;
    let done_str: Option<String> = row.get(6).ok();
    let created_str: String = row.get(7)?;

    Ok(StoredActionItem {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        message_id: row.get(1)?,
        position: row.get(2)?,
        description: row.get(3)?,
        importance: int_to_tier(row.get(4)?),
        is_done: row.get::<i64>(5)? != 0,
        done_at: parse_optional_datetime(&done_str),
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl MessageStore for LibSqlStore {
    // ── Messages ────────────────────────────────────────────────────

    async fn upsert_message(&self, raw: &RawMessage) -> Result<String, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO messages (id, sender, subject, body, received_at, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     sender = excluded.sender,
                     subject = excluded.subject,
                     body = excluded.body,
                     received_at = excluded.received_at,
                     updated_at = excluded.updated_at",
                params![
                    raw.external_id.clone(),
                    raw.sender.clone(),
                    raw.subject.clone(),
                    raw.body.clone(),
                    raw.received_at.to_rfc3339(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_message: {e}")))?;

        debug!(id = %raw.external_id, "Message upserted");
        Ok(raw.external_id.clone())
    }

    async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let message = row_to_message(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_message row parse: {e}")))?;
                Ok(Some(message))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }

    async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<(Vec<StoredMessage>, u64), DatabaseError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(q) = &filter.q {
            let needle = format!("%{}%", q.to_lowercase());
            clauses.push(
                "(LOWER(sender) LIKE ? OR LOWER(COALESCE(subject, '')) LIKE ? \
                 OR LOWER(body) LIKE ? OR LOWER(COALESCE(summary, '')) LIKE ?)"
                    .into(),
            );
            for _ in 0..4 {
                values.push(Value::Text(needle.clone()));
            }
        }
        if let Some(min) = filter.min_importance {
            clauses.push("COALESCE(importance_override, importance) >= ?".into());
            values.push(Value::Integer(tier_to_int(min)));
        }
        if filter.unread_only {
            clauses.push("is_read = 0".into());
        }
        if let Some(ts) = filter.newer_than {
            clauses.push("received_at > ?".into());
            values.push(Value::Text(ts.to_rfc3339()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut count_rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM messages{where_sql}"),
                values.clone(),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages count: {e}")))?;
        let total = match count_rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("list_messages count parse: {e}")))?
                as u64,
            _ => 0,
        };

        let dir = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let order_sql = match filter.sort {
            MessageSort::ReceivedAt => format!("received_at {dir}"),
            MessageSort::Importance => {
                // Tie-break by recency so the ordering is stable.
                format!("COALESCE(importance_override, importance) {dir}, received_at DESC")
            }
        };
        // LIMIT -1 means unbounded in SQLite.
        let limit = if filter.limit == 0 {
            -1
        } else {
            filter.limit as i64
        };
        values.push(Value::Integer(limit));
        values.push(Value::Integer(filter.offset as i64));

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages{where_sql} \
                     ORDER BY {order_sql} LIMIT ? OFFSET ?"
                ),
                values,
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!("Skipping message row: {e}");
                }
            }
        }
        Ok((messages, total))
    }

    async fn apply_result(
        &self,
        id: &str,
        result: &ProcessingResult,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_result begin: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let updated = tx
            .execute(
                "UPDATE messages SET summary = ?1, importance = ?2, status = 'processed',
                     processed_at = ?3, updated_at = ?3 WHERE id = ?4",
                params![
                    result.summary.clone(),
                    tier_to_int(result.importance),
                    now.clone(),
                    id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_result update: {e}")))?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }

        // Replace, never append: a re-run owns the whole extracted set.
        tx.execute("DELETE FROM action_items WHERE message_id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_result clear actions: {e}")))?;

        for (position, action) in result.actions.iter().enumerate() {
            tx.execute(
                "INSERT INTO action_items (id, message_id, position, description, importance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    id,
                    position as i64,
                    action.description.clone(),
                    tier_to_int(action.importance),
                    now.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_result insert action: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_result commit: {e}")))?;

        debug!(id, actions = result.actions.len(), "Pipeline result committed");
        Ok(())
    }

    async fn mark_failed(&self, id: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        // Only a never-processed message may move to failed.
        self.conn()
            .execute(
                "UPDATE messages SET status = 'failed', updated_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
                params![now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_failed: {e}")))?;
        Ok(())
    }

    async fn set_read(&self, id: &str, is_read: bool) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn()
            .execute(
                "UPDATE messages SET is_read = ?1, updated_at = ?2 WHERE id = ?3",
                params![is_read as i64, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_read: {e}")))?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_importance_override(
        &self,
        id: &str,
        tier: Option<ImportanceTier>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value = match tier {
            Some(t) => Value::Integer(tier_to_int(t)),
            None => Value::Null,
        };
        let updated = self
            .conn()
            .execute(
                "UPDATE messages SET importance_override = ?1, updated_at = ?2 WHERE id = ?3",
                params![value, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_importance_override: {e}")))?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn pending_messages(&self, limit: u32) -> Result<Vec<StoredMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE status = 'pending'
                     ORDER BY received_at ASC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("pending_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!("Skipping message row: {e}");
                }
            }
        }
        Ok(messages)
    }

    // ── Action items ────────────────────────────────────────────────

    async fn actions_for_message(
        &self,
        message_id: &str,
    ) -> Result<Vec<StoredActionItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM action_items
                     WHERE message_id = ?1 ORDER BY position ASC"
                ),
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("actions_for_message: {e}")))?;

        let mut items = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_action(&row) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Skipping action item row: {e}");
                }
            }
        }
        Ok(items)
    }

    async fn list_action_items(
        &self,
        filter: &ActionItemFilter,
    ) -> Result<Vec<StoredActionItem>, DatabaseError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(message_id) = &filter.message_id {
            clauses.push("message_id = ?".into());
            values.push(Value::Text(message_id.clone()));
        }
        if filter.pending_only {
            clauses.push("is_done = 0".into());
        }
        if let Some(min) = filter.min_importance {
            clauses.push("importance >= ?".into());
            values.push(Value::Integer(tier_to_int(min)));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        values.push(Value::Integer(limit));

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM action_items{where_sql}
                     ORDER BY created_at DESC, position ASC LIMIT ?"
                ),
                values,
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_action_items: {e}")))?;

        let mut items = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_action(&row) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Skipping action item row: {e}");
                }
            }
        }
        Ok(items)
    }

    async fn get_action_item(
        &self,
        id: Uuid,
    ) -> Result<Option<StoredActionItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACTION_COLUMNS} FROM action_items WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_action_item: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let item = row_to_action(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_action_item row parse: {e}")))?;
                Ok(Some(item))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_action_item: {e}"))),
        }
    }

    async fn create_action_item(
        &self,
        message_id: &str,
        description: &str,
        importance: ImportanceTier,
    ) -> Result<StoredActionItem, DatabaseError> {
        if self.get_message(message_id).await?.is_none() {
            return Err(DatabaseError::NotFound {
                entity: "message".into(),
                id: message_id.to_string(),
            });
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM action_items WHERE message_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_action_item position: {e}")))?;
        let position = match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).unwrap_or(0),
            _ => 0,
        };

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO action_items (id, message_id, position, description, importance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    message_id,
                    position,
                    description,
                    tier_to_int(importance),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_action_item: {e}")))?;

        debug!(id = %id, message_id, "Action item created");
        Ok(StoredActionItem {
            id,
            message_id: message_id.to_string(),
            position,
            description: description.to_string(),
            importance,
            is_done: false,
            done_at: None,
            created_at: now,
        })
    }

    async fn update_action_item(
        &self,
        id: Uuid,
        patch: &ActionItemPatch,
    ) -> Result<Option<StoredActionItem>, DatabaseError> {
        let Some(current) = self.get_action_item(id).await? else {
            return Ok(None);
        };

        let description = patch
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone());
        let importance = patch.importance.unwrap_or(current.importance);
        let is_done = patch.is_done.unwrap_or(current.is_done);
        let done_at = match (current.is_done, is_done) {
            (false, true) => Some(Utc::now()),
            (_, false) => None,
            (true, true) => current.done_at,
        };

        self.conn()
            .execute(
                "UPDATE action_items SET description = ?1, importance = ?2, is_done = ?3, done_at = ?4
                 WHERE id = ?5",
                params![
                    description.clone(),
                    tier_to_int(importance),
                    is_done as i64,
                    match &done_at {
                        Some(ts) => Value::Text(ts.to_rfc3339()),
                        None => Value::Null,
                    },
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_action_item: {e}")))?;

        Ok(Some(StoredActionItem {
            description,
            importance,
            is_done,
            done_at,
            ..current
        }))
    }

    async fn delete_action_item(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM action_items WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_action_item: {e}")))?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ExtractedAction;

    fn raw(id: &str, body: &str) -> RawMessage {
        RawMessage {
            external_id: id.into(),
            sender: "alice@example.com".into(),
            subject: "Subject".into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    fn result_with(summary: &str, actions: &[(&str, ImportanceTier)]) -> ProcessingResult {
        ProcessingResult {
            summary: summary.into(),
            importance: ImportanceTier::Normal,
            actions: actions
                .iter()
                .map(|(d, t)| ExtractedAction {
                    description: d.to_string(),
                    importance: *t,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "hello")).await.unwrap();

        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.id, "m-1");
        assert_eq!(stored.body, "hello");
        assert_eq!(stored.status, MessageStatus::Pending);
        assert!(stored.summary.is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_derived_state() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "v1")).await.unwrap();
        store
            .apply_result(&id, &result_with("summary", &[]))
            .await
            .unwrap();

        store.upsert_message(&raw("m-1", "v2")).await.unwrap();
        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.body, "v2");
        assert_eq!(stored.status, MessageStatus::Processed);
        assert_eq!(stored.summary.as_deref(), Some("summary"));
    }

    #[tokio::test]
    async fn apply_result_replaces_action_items() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "body")).await.unwrap();

        store
            .apply_result(
                &id,
                &result_with(
                    "s1",
                    &[
                        ("first task", ImportanceTier::Normal),
                        ("second task", ImportanceTier::High),
                    ],
                ),
            )
            .await
            .unwrap();
        store
            .apply_result(&id, &result_with("s2", &[("only task", ImportanceTier::Normal)]))
            .await
            .unwrap();

        let items = store.actions_for_message(&id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "only task");
    }

    #[tokio::test]
    async fn action_items_keep_reading_order() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "body")).await.unwrap();
        store
            .apply_result(
                &id,
                &result_with(
                    "s",
                    &[
                        ("alpha", ImportanceTier::Normal),
                        ("beta", ImportanceTier::Normal),
                        ("gamma", ImportanceTier::Normal),
                    ],
                ),
            )
            .await
            .unwrap();

        let items = store.actions_for_message(&id).await.unwrap();
        let descriptions: Vec<_> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn mark_failed_only_touches_pending() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "body")).await.unwrap();
        store
            .apply_result(&id, &result_with("summary", &[]))
            .await
            .unwrap();

        store.mark_failed(&id).await.unwrap();
        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Processed);

        let id2 = store.upsert_message(&raw("m-2", "body")).await.unwrap();
        store.mark_failed(&id2).await.unwrap();
        let stored2 = store.get_message(&id2).await.unwrap().unwrap();
        assert_eq!(stored2.status, MessageStatus::Failed);
        assert!(stored2.summary.is_none());
    }

    #[tokio::test]
    async fn importance_override_wins() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "body")).await.unwrap();
        store
            .apply_result(&id, &result_with("s", &[]))
            .await
            .unwrap();

        store
            .set_importance_override(&id, Some(ImportanceTier::High))
            .await
            .unwrap();
        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.effective_importance(), ImportanceTier::High);

        store.set_importance_override(&id, None).await.unwrap();
        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.effective_importance(), ImportanceTier::Normal);
    }

    #[tokio::test]
    async fn list_messages_filters_by_min_importance() {
        let store = LibSqlStore::new_memory().await.unwrap();
        for (external_id, tier) in [
            ("m-low", ImportanceTier::Low),
            ("m-normal", ImportanceTier::Normal),
            ("m-high", ImportanceTier::High),
        ] {
            let id = store.upsert_message(&raw(external_id, "body")).await.unwrap();
            let mut result = result_with("s", &[]);
            result.importance = tier;
            store.apply_result(&id, &result).await.unwrap();
        }

        let filter = MessageFilter {
            min_importance: Some(ImportanceTier::Normal),
            ..MessageFilter::default()
        };
        let (messages, total) = store.list_messages(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert!(messages.iter().all(|m| m.id != "m-low"));
    }

    #[tokio::test]
    async fn list_messages_search_and_paging() {
        let store = LibSqlStore::new_memory().await.unwrap();
        for i in 0..5 {
            store
                .upsert_message(&raw(&format!("m-{i}"), &format!("report number {i}")))
                .await
                .unwrap();
        }
        store.upsert_message(&raw("m-x", "unrelated")).await.unwrap();

        let filter = MessageFilter {
            q: Some("REPORT".into()),
            limit: 2,
            offset: 2,
            ..MessageFilter::default()
        };
        let (messages, total) = store.list_messages(&filter).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn sort_by_importance_uses_override() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id_a = store.upsert_message(&raw("m-a", "body")).await.unwrap();
        let id_b = store.upsert_message(&raw("m-b", "body")).await.unwrap();
        store.apply_result(&id_a, &result_with("s", &[])).await.unwrap();
        let mut high = result_with("s", &[]);
        high.importance = ImportanceTier::High;
        store.apply_result(&id_b, &high).await.unwrap();
        store
            .set_importance_override(&id_a, Some(ImportanceTier::High))
            .await
            .unwrap();
        store
            .set_importance_override(&id_b, Some(ImportanceTier::Low))
            .await
            .unwrap();

        let filter = MessageFilter {
            sort: MessageSort::Importance,
            order: SortOrder::Desc,
            ..MessageFilter::default()
        };
        let (messages, _) = store.list_messages(&filter).await.unwrap();
        assert_eq!(messages[0].id, "m-a");
    }

    #[tokio::test]
    async fn pending_queue_is_oldest_first() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let mut older = raw("m-old", "body");
        older.received_at = Utc::now() - chrono::Duration::hours(2);
        store.upsert_message(&raw("m-new", "body")).await.unwrap();
        store.upsert_message(&older).await.unwrap();

        let pending = store.pending_messages(10).await.unwrap();
        assert_eq!(pending[0].id, "m-old");
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn action_item_crud() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let id = store.upsert_message(&raw("m-1", "body")).await.unwrap();
        store
            .apply_result(&id, &result_with("s", &[("extracted", ImportanceTier::Normal)]))
            .await
            .unwrap();

        let created = store
            .create_action_item(&id, "manual task", ImportanceTier::High)
            .await
            .unwrap();
        assert_eq!(created.position, 1);

        let done = store
            .update_action_item(
                created.id,
                &ActionItemPatch {
                    is_done: Some(true),
                    ..ActionItemPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(done.is_done);
        assert!(done.done_at.is_some());

        let reopened = store
            .update_action_item(
                created.id,
                &ActionItemPatch {
                    is_done: Some(false),
                    ..ActionItemPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!reopened.is_done);
        assert!(reopened.done_at.is_none());

        assert!(store.delete_action_item(created.id).await.unwrap());
        assert!(!store.delete_action_item(created.id).await.unwrap());
        assert!(store.get_action_item(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_action_item_rejects_unknown_message() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let err = store
            .create_action_item("missing", "task", ImportanceTier::Normal)
            .await;
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }
}
