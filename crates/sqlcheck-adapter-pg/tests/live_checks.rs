//! Check statements run against a real Postgres server.
//!
//! These tests require a running Postgres instance.
//! Set DATABASE_URL environment variable to connect; without it every test
//! returns early.
//!
//! Run with: cargo test --package sqlcheck-adapter-pg --test live_checks

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use sqlcheck_adapter_pg::PostgresDatabase;
use sqlcheck_core::{
    CheckKind, CheckStrategy, ConnectionHandle, Database, DatabaseError, MemorySink,
    OverrideSnapshot, OverrideStore, Param, ParamOverrides, PassStatus, SyntaxThenExplain,
    TextDocument, Validator,
};
use sqlx::postgres::PgPoolOptions;

/// One pooled connection, so the temporary table below is visible to every check.
async fn database() -> Option<PostgresDatabase> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    sqlx::query("create temp table t (id int4, name text, created timestamptz)")
        .execute(&pool)
        .await
        .unwrap();
    Some(PostgresDatabase::from_pool(pool))
}

async fn check(
    db: &PostgresDatabase,
    fragment: &str,
    overrides: &ParamOverrides,
) -> Option<(CheckKind, DatabaseError)> {
    for statement in SyntaxThenExplain.plan(fragment, overrides) {
        if let Err(err) = db.execute(&statement.sql, &statement.params).await {
            return Some((statement.kind, err));
        }
    }
    None
}

fn types(entries: &[(u32, &str)]) -> ParamOverrides {
    ParamOverrides {
        types: entries.iter().map(|(i, t)| (*i, t.to_string())).collect(),
        defaults: BTreeMap::new(),
    }
}

fn defaults(entries: &[(u32, serde_json::Value)]) -> ParamOverrides {
    ParamOverrides {
        types: BTreeMap::new(),
        defaults: entries.iter().cloned().collect(),
    }
}

#[tokio::test]
async fn untyped_placeholder_is_inferred_from_context() {
    let Some(db) = database().await else { return };

    let failure = check(&db, "select * from t where id=$1", &ParamOverrides::default()).await;
    assert!(failure.is_none(), "{failure:?}");
}

#[tokio::test]
async fn type_override_reaches_the_planner() {
    let Some(db) = database().await else { return };
    let fragment = "select * from information_schema.tables where table_type=$2";

    let failure = check(&db, fragment, &ParamOverrides::default()).await;
    assert!(failure.is_none(), "gap at $1 should be accepted: {failure:?}");

    let (kind, err) = check(&db, fragment, &types(&[(2, "boolean")]))
        .await
        .unwrap();
    assert_eq!(kind, CheckKind::Explain);
    assert!(err.message.contains("operator does not exist"), "{}", err.message);
}

#[tokio::test]
async fn syntax_error_is_caught_by_syntax_check() {
    let Some(db) = database().await else { return };

    let (kind, err) = check(&db, "selec * from t", &ParamOverrides::default())
        .await
        .unwrap();
    assert_eq!(kind, CheckKind::Syntax);
    assert!(err.message.contains("syntax error"), "{}", err.message);
    assert!(!err.is_connection());
}

#[tokio::test]
async fn missing_relation_is_caught_by_explain() {
    let Some(db) = database().await else { return };

    let (kind, err) = check(&db, "select * from missing_table", &ParamOverrides::default())
        .await
        .unwrap();
    assert_eq!(kind, CheckKind::Explain);
    assert_eq!(err.code.as_deref(), Some("42P01"));
}

#[tokio::test]
async fn unresolvable_parameter_is_reported() {
    let Some(db) = database().await else { return };

    let (kind, err) = check(&db, "select $1", &ParamOverrides::default())
        .await
        .unwrap();
    assert_eq!(kind, CheckKind::Explain);
    assert!(
        err.message.contains("could not determine data type of parameter $1"),
        "{}",
        err.message
    );
}

#[tokio::test]
async fn defaults_take_the_type_of_their_context() {
    let Some(db) = database().await else { return };

    for (fragment, default) in [
        ("select * from t where id = $1", json!("1")),
        ("select * from t where id = $1", json!(1)),
        ("select * from t where created > $1", json!("2024-01-01")),
        ("select * from t where name = $1", json!(5)),
        ("select * from t where name = $1", json!("O'Brien")),
    ] {
        let failure = check(&db, fragment, &defaults(&[(1, default.clone())])).await;
        assert!(failure.is_none(), "{fragment} with {default}: {failure:?}");
    }
}

#[tokio::test]
async fn default_beside_placeholder() {
    let Some(db) = database().await else { return };

    let failure = check(
        &db,
        "select * from t where id = $1 and name = $2",
        &defaults(&[(1, json!(42))]),
    )
    .await;
    assert!(failure.is_none(), "{failure:?}");
}

#[tokio::test]
async fn trailing_line_comment_is_not_a_syntax_error() {
    let Some(db) = database().await else { return };

    for fragment in [
        "select id from t -- trailing",
        "select id\nfrom t\nwhere id = $1 -- by id",
        "select 1; -- done",
    ] {
        let failure = check(&db, fragment, &ParamOverrides::default()).await;
        assert!(failure.is_none(), "{fragment}: {failure:?}");
    }
}

#[tokio::test]
async fn checks_never_leave_rows_behind() {
    let Some(db) = database().await else { return };

    let failure = check(
        &db,
        "insert into t (id, name) values ($1, 'x')",
        &defaults(&[(1, json!(7))]),
    )
    .await;
    assert!(failure.is_none(), "{failure:?}");
    db.execute("insert into t (id) values (8)", &[]).await.unwrap();
    db.execute("delete from t where id = $1", &[Param::Untyped])
        .await
        .unwrap();

    let (count,): (i64,) = sqlx::query_as("select count(*) from t")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn multi_statement_fragment_is_rejected() {
    let Some(db) = database().await else { return };

    let failure = check(&db, "select 1; delete from t", &ParamOverrides::default()).await;
    let (_, err) = failure.unwrap();
    assert!(!err.is_connection());
}

#[tokio::test]
async fn validator_publishes_server_errors() {
    let Some(db) = database().await else { return };

    let sink = Arc::new(MemorySink::new());
    let validator = Validator::new(
        Arc::new(ConnectionHandle::new(Arc::new(db))),
        Arc::new(OverrideStore::new(OverrideSnapshot::default())),
        sink.clone(),
    );
    let document = TextDocument::new(
        "src/db.ts",
        "typescript",
        "a = sql`select * from t where id = $1`;\nb = sql`select * from missing_table`;",
    );

    let report = validator.validate(&document).await;

    assert_eq!(report.status, PassStatus::Completed);
    assert_eq!((report.passed(), report.total()), (1, 2));
    let diagnostics = sink.get("src/db.ts").unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert!(
        diagnostics[0]
            .message
            .contains("relation \"missing_table\" does not exist")
    );
}
