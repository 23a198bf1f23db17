//! End-to-end pipeline tests against an in-memory store: ingestion,
//! idempotent re-processing, and triage overrides.

use chrono::Utc;
use mailminder::config::PipelineConfig;
use mailminder::ingest::demo_messages;
use mailminder::pipeline::types::{ImportanceTier, RawMessage};
use mailminder::pipeline::Pipeline;
use mailminder::store::{LibSqlStore, MessageFilter, MessageStatus, MessageStore};

fn pipeline() -> Pipeline {
    Pipeline::from_config(PipelineConfig::default()).unwrap()
}

async fn store() -> LibSqlStore {
    LibSqlStore::new_memory().await.unwrap()
}

#[tokio::test]
async fn demo_batch_lands_processed() {
    let store = store().await;
    let pipeline = pipeline();

    let batch = demo_messages();
    let total = batch.len();
    let processed = pipeline.ingest_batch(&store, batch).await;
    assert_eq!(processed, total);

    let (messages, count) = store.list_messages(&MessageFilter::default()).await.unwrap();
    assert_eq!(count as usize, total);
    for message in &messages {
        assert_eq!(message.status, MessageStatus::Processed);
        assert!(message.summary.is_some());
        assert!(message.processed_at.is_some());
    }
}

#[tokio::test]
async fn urgent_report_scenario_end_to_end() {
    let store = store().await;
    let pipeline = pipeline();

    let raw = RawMessage {
        external_id: "msg-1".into(),
        sender: "maria@client.example.com".into(),
        subject: "Q3 Report — URGENT".into(),
        body: "Please send the report by Friday. Thanks.".into(),
        received_at: Utc::now(),
    };
    let id = pipeline.process_and_commit(&store, &raw).await.unwrap();

    let stored = store.get_message(&id).await.unwrap().unwrap();
    assert_eq!(stored.effective_importance(), ImportanceTier::High);
    assert!(stored.summary.as_deref().unwrap().starts_with("Q3 Report — URGENT"));

    let items = store.actions_for_message(&id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "send the report by Friday");
    assert_eq!(items[0].importance, ImportanceTier::High);
}

#[tokio::test]
async fn reprocessing_is_idempotent() {
    let store = store().await;
    let pipeline = pipeline();

    let raw = RawMessage {
        external_id: "msg-1".into(),
        sender: "team@example.com".into(),
        subject: "Planning".into(),
        body: "Please review the roadmap.\nAlso, schedule a retro for next week.\nCan you \
               confirm the budget by Friday?"
            .into(),
        received_at: Utc::now(),
    };
    let id = pipeline.process_and_commit(&store, &raw).await.unwrap();

    let before = store.get_message(&id).await.unwrap().unwrap();
    let items_before = store.actions_for_message(&id).await.unwrap();

    pipeline.reprocess(&store, &id).await.unwrap();

    let after = store.get_message(&id).await.unwrap().unwrap();
    let items_after = store.actions_for_message(&id).await.unwrap();

    assert_eq!(before.summary, after.summary);
    assert_eq!(before.importance, after.importance);
    assert_eq!(items_before.len(), items_after.len());
    for (a, b) in items_before.iter().zip(items_after.iter()) {
        assert_eq!(a.description, b.description);
        assert_eq!(a.importance, b.importance);
        assert_eq!(a.position, b.position);
    }
}

#[tokio::test]
async fn re_ingesting_same_batch_does_not_duplicate() {
    let store = store().await;
    let pipeline = pipeline();

    pipeline.ingest_batch(&store, demo_messages()).await;
    pipeline.ingest_batch(&store, demo_messages()).await;

    let (_, total) = store.list_messages(&MessageFilter::default()).await.unwrap();
    assert_eq!(total as usize, demo_messages().len());

    // Action items were replaced, not appended.
    let items = store.actions_for_message("demo-001").await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn edited_body_changes_derived_state() {
    let store = store().await;
    let pipeline = pipeline();

    let mut raw = RawMessage {
        external_id: "msg-1".into(),
        sender: "alice@example.com".into(),
        subject: "Notes".into(),
        body: "Nothing to do here.".into(),
        received_at: Utc::now(),
    };
    let id = pipeline.process_and_commit(&store, &raw).await.unwrap();
    assert!(store.actions_for_message(&id).await.unwrap().is_empty());

    raw.body = "Please send the slides by tomorrow.".into();
    pipeline.process_and_commit(&store, &raw).await.unwrap();

    let items = store.actions_for_message(&id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].importance, ImportanceTier::High);
}

#[tokio::test]
async fn override_survives_reprocessing() {
    let store = store().await;
    let pipeline = pipeline();

    let raw = RawMessage {
        external_id: "msg-1".into(),
        sender: "alice@example.com".into(),
        subject: "FYI".into(),
        body: "Sharing the notes from today.".into(),
        received_at: Utc::now(),
    };
    let id = pipeline.process_and_commit(&store, &raw).await.unwrap();
    store
        .set_importance_override(&id, Some(ImportanceTier::Low))
        .await
        .unwrap();

    pipeline.reprocess(&store, &id).await.unwrap();

    let stored = store.get_message(&id).await.unwrap().unwrap();
    assert_eq!(stored.importance, ImportanceTier::Normal);
    assert_eq!(stored.effective_importance(), ImportanceTier::Low);
}
