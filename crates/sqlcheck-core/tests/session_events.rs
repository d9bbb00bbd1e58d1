mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{FakeDatabase, harness, override_table};
use sqlcheck_core::{
    Database, DatabaseError, Document, FragmentId, OverrideSnapshot, PassStatus, Session,
    TextDocument,
};

fn session(db: FakeDatabase) -> (Session, common::Harness) {
    let h = harness(db, OverrideSnapshot::default());
    let session = Session::new(
        Arc::clone(&h.validator),
        ["typescript".to_string()],
    );
    (session, h)
}

fn ts(identity: &str, text: &str) -> Arc<dyn Document> {
    Arc::new(TextDocument::new(identity, "typescript", text))
}

#[tokio::test]
async fn open_validates_configured_languages_only() {
    let (session, h) = session(FakeDatabase::new());

    let report = session.open(ts("a.ts", "q = sql`select 1`;")).await;
    assert_eq!(report.map(|r| r.status), Some(PassStatus::Completed));

    let markdown = Arc::new(TextDocument::new("notes.md", "markdown", "q = sql`select 1`;"));
    assert!(session.open(markdown).await.is_none());

    assert_eq!(h.db.executed().len(), 2);
    assert_eq!(
        session.open_documents(),
        vec!["a.ts".to_string(), "notes.md".to_string()]
    );
}

#[tokio::test]
async fn save_always_validates() {
    let (session, h) = session(FakeDatabase::new());
    let doc = Arc::new(TextDocument::new("notes.md", "markdown", "q = sql`select 1`;"));

    let report = session.save(doc).await;

    assert_eq!(report.status, PassStatus::Completed);
    assert_eq!(h.sink.get("notes.md"), Some(Vec::new()));
}

#[tokio::test]
async fn close_deletes_diagnostics() {
    let db = FakeDatabase::new().failing("bad", DatabaseError::statement("boom"));
    let (session, h) = session(db);

    session.open(ts("a.ts", "q = sql`select bad`;")).await;
    assert_eq!(h.sink.get("a.ts").unwrap().len(), 1);

    session.close("a.ts");

    assert_eq!(h.sink.get("a.ts"), None);
    assert!(session.open_documents().is_empty());
}

#[tokio::test]
async fn override_change_revalidates_open_documents() {
    let fragment = "select * from t where flag = $1";
    let db = FakeDatabase::new().failing(
        "EXPLAIN select * from t where flag = $1;",
        DatabaseError::statement("could not determine data type of parameter $1"),
    );
    let (session, h) = session(db);

    session
        .open(ts("a.ts", &format!("q = sql`{fragment}`;")))
        .await;
    let before = h.sink.get("a.ts").unwrap();
    assert_eq!(before.len(), 1);
    assert!(before[0].message.contains("could not determine data type"));

    let id = FragmentId::of(fragment);
    let reports = session
        .overrides_changed(OverrideSnapshot::new(
            override_table("a.ts", id, &[("1", json!("boolean"))]),
            Value::Null,
        ))
        .await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].passed(), 1);
    assert_eq!(h.sink.get("a.ts"), Some(Vec::new()));
    assert_eq!(h.validator.overrides().snapshot().version, 1);
}

#[tokio::test]
async fn reconnect_swaps_database_and_revalidates() {
    let (session, h) = session(FakeDatabase::new());
    session.open(ts("a.ts", "q = sql`select 1`;")).await;

    let replacement = Arc::new(FakeDatabase::new());
    let reports = session
        .reconnect(replacement.clone() as Arc<dyn Database>)
        .await;

    assert_eq!(reports.len(), 1);
    assert_eq!(h.db.executed().len(), 2);
    assert_eq!(replacement.executed().len(), 2);
}
