//! Integration tests for the envelope repository against a scratch database.

use serde_json::json;
use siteforms_core::{Error, EnvelopeRepository};
use siteforms_db::Database;
use uuid::Uuid;

async fn scratch_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn upsert_creates_then_replaces_by_type() {
    let (_dir, db) = scratch_db().await;

    let first = db
        .envelopes
        .upsert_by_type("faq", vec![json!({"question": "Q1", "answer": "A1"})])
        .await
        .unwrap();
    assert_eq!(first.content_type, "faq");
    assert_eq!(first.values.len(), 1);

    let second = db
        .envelopes
        .upsert_by_type(
            "faq",
            vec![
                json!({"question": "Q1", "answer": "A1"}),
                json!({"question": "Q2", "answer": "A2"}),
            ],
        )
        .await
        .unwrap();

    // Same envelope, whole array replaced.
    assert_eq!(second.id, first.id);
    assert_eq!(second.values.len(), 2);

    let listed = db.envelopes.list_by_type("faq").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].values.len(), 2);
}

#[tokio::test]
async fn list_unknown_type_is_empty() {
    let (_dir, db) = scratch_db().await;
    let listed = db.envelopes.list_by_type("newsletter").await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn types_are_isolated() {
    let (_dir, db) = scratch_db().await;

    db.envelopes
        .upsert_by_type("faq", vec![json!({"question": "Q", "answer": "A"})])
        .await
        .unwrap();
    db.envelopes
        .upsert_by_type("services", vec![json!({"title": "T", "description": "D"})])
        .await
        .unwrap();

    let faqs = db.envelopes.list_by_type("faq").await.unwrap();
    let services = db.envelopes.list_by_type("services").await.unwrap();
    assert_eq!(faqs.len(), 1);
    assert_eq!(services.len(), 1);
    assert_ne!(faqs[0].id, services[0].id);
}

#[tokio::test]
async fn replace_requires_existing_envelope() {
    let (_dir, db) = scratch_db().await;

    let missing = Uuid::now_v7();
    let err = db
        .envelopes
        .replace(missing, vec![json!({"question": "Q"})])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EnvelopeNotFound(id) if id == missing));

    let saved = db
        .envelopes
        .upsert_by_type("faq", vec![json!({"question": "Q1", "answer": "A1"})])
        .await
        .unwrap();

    let replaced = db
        .envelopes
        .replace(saved.id, vec![json!({"question": "Q9", "answer": "A9"})])
        .await
        .unwrap();
    assert_eq!(replaced.id, saved.id);
    assert_eq!(replaced.values[0]["question"], "Q9");
    assert!(replaced.updated_at >= saved.updated_at);
}

#[tokio::test]
async fn delete_removes_envelope() {
    let (_dir, db) = scratch_db().await;

    let saved = db
        .envelopes
        .upsert_by_type("setors", vec![json!({"title": "T", "description": "D"})])
        .await
        .unwrap();

    db.envelopes.delete(saved.id).await.unwrap();
    assert!(db.envelopes.get(saved.id).await.unwrap().is_none());
    assert!(db.envelopes.list_by_type("setors").await.unwrap().is_empty());

    let err = db.envelopes.delete(saved.id).await.unwrap_err();
    assert!(matches!(err, Error::EnvelopeNotFound(_)));
}

#[tokio::test]
async fn round_trip_preserves_field_values() {
    let (_dir, db) = scratch_db().await;

    let values = vec![
        json!({"textLists": ["caption one", ""], "video": "https://cdn/v.mp4", "videoDuration": 12.5}),
        json!({"textLists": ["", "caption two"], "video": "https://cdn/w.mp4", "videoDuration": 0}),
    ];
    db.envelopes
        .upsert_by_type("highlights", values.clone())
        .await
        .unwrap();

    let loaded = db.envelopes.get_by_type("highlights").await.unwrap().unwrap();
    assert_eq!(loaded.values, values);
}
