//! Post-commit search indexing tests: id construction on the wire,
//! retry behavior, and isolation of indexing failures from committed
//! writes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

mod common;

use common::{provisioned, TestEngine, SCHEMA_INT_PK, SCHEMA_STRING_PK};
use serde_json::json;

#[tokio::test]
async fn test_insert_upserts_search_document() {
    let engine = provisioned().await;
    engine
        .insert("db1", "c1", &[r#"{"K1":"vK1","K2":1,"D1":"vD1"}"#])
        .await
        .expect("insert");

    let docs = engine.search.documents("ns1-db1-c1");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["D1"], "vD1");
    // The injected id is part of the stored search document.
    assert!(docs[0]["id"].is_string());
}

#[tokio::test]
async fn test_integer_pk_id_is_quoted() {
    let engine = TestEngine::new();
    engine.create_database("db1").await.expect("db");
    engine.create_collection("db1", "ints", SCHEMA_INT_PK).await.expect("coll");

    engine.insert("db1", "ints", &[r#"{"K1":7,"D1":"x"}"#]).await.expect("insert");

    assert!(engine.search.document("ns1-db1-ints", "\"7\"").is_some());
}

#[tokio::test]
async fn test_string_pk_id_is_plain() {
    let engine = TestEngine::new();
    engine.create_database("db1").await.expect("db");
    engine.create_collection("db1", "strs", SCHEMA_STRING_PK).await.expect("coll");

    engine.insert("db1", "strs", &[r#"{"K1":"vK1","D1":"x"}"#]).await.expect("insert");

    assert!(engine.search.document("ns1-db1-strs", "vK1").is_some());
}

#[tokio::test]
async fn test_composite_pk_id_is_stable_across_operations() {
    let engine = provisioned().await;
    engine
        .insert("db1", "c1", &[r#"{"K1":"vK1","K2":1,"D1":"a"}"#])
        .await
        .expect("insert");

    let docs = engine.search.documents("ns1-db1-c1");
    let id = docs[0]["id"].as_str().expect("id").to_string();

    // The update must address the same search document.
    engine
        .update("db1", "c1", r#"{"K1":"vK1","K2":1}"#, r#"{"$set":{"D1":"b"}}"#)
        .await
        .expect("update");
    let doc = engine.search.document("ns1-db1-c1", &id).expect("doc");
    assert_eq!(doc["D1"], "b");

    // And the delete removes it.
    engine.delete("db1", "c1", r#"{"K1":"vK1","K2":1}"#).await.expect("delete");
    assert!(engine.search.document("ns1-db1-c1", &id).is_none());
}

#[tokio::test]
async fn test_update_keeps_unmentioned_search_fields() {
    let engine = provisioned().await;
    engine
        .insert("db1", "c1", &[r#"{"K1":"vK1","K2":1,"D1":"keep","extra":"still here"}"#])
        .await
        .expect("insert");

    engine
        .update("db1", "c1", r#"{"K1":"vK1","K2":1}"#, r#"{"$set":{"D1":"changed"}}"#)
        .await
        .expect("update");

    let docs = engine.search.documents("ns1-db1-c1");
    assert_eq!(docs[0]["D1"], "changed");
    assert_eq!(docs[0]["extra"], "still here");
}

#[tokio::test]
async fn test_transient_search_failures_are_retried() {
    let engine = provisioned().await;

    // Two failures, then success: within the five-attempt budget.
    engine.search.fail_next(2);
    let outcome = engine
        .insert("db1", "c1", &[r#"{"K1":"vK1","K2":1,"D1":"vD1"}"#])
        .await
        .expect("insert");
    assert!(outcome.indexing_error.is_none());
    assert_eq!(engine.search.documents("ns1-db1-c1").len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_never_fail_the_write() {
    let engine = provisioned().await;

    engine.search.fail_next(10);
    let outcome = engine
        .insert("db1", "c1", &[r#"{"K1":"vK1","K2":1,"D1":"vD1"}"#])
        .await
        .expect("insert commits regardless of indexing");

    // The KV write stands; the indexing failure is surfaced separately.
    assert!(outcome.indexing_error.is_some());
    assert!(engine.search.documents("ns1-db1-c1").is_empty());

    let rows = engine.read("db1", "c1", r#"{"K1":"vK1","K2":1}"#).await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(TestEngine::docs(&rows)[0], json!({"K1":"vK1","K2":1,"D1":"vD1"}));
}

#[tokio::test]
async fn test_metadata_mutations_are_skipped() {
    // DDL-only transactions write metadata records; none of them may
    // reach the search store.
    let engine = TestEngine::new();
    engine.create_database("db1").await.expect("db");
    engine.create_collection("db1", "c1", SCHEMA_STRING_PK).await.expect("coll");

    assert!(engine.search.documents("ns1-db1-c1").is_empty());
}

#[tokio::test]
async fn test_events_arrive_in_program_order() {
    let engine = provisioned().await;

    // One transaction with insert a, insert b, delete a: the surviving
    // search state proves the order was preserved.
    let session = engine.tx_mgr.start_tx().await.expect("begin");
    use folio_server::QueryRunner;
    let mut insert = engine.factory.insert_query_runner(folio_server::InsertRequest {
        db: "db1".to_string(),
        collection: "c1".to_string(),
        documents: vec![
            br#"{"K1":"a","K2":1,"D1":"x"}"#.to_vec(),
            br#"{"K1":"b","K2":2,"D1":"y"}"#.to_vec(),
        ],
    });
    insert.run(&session, &engine.tenant).await.expect("inserts");
    let mut delete = engine.factory.delete_query_runner(folio_server::DeleteRequest {
        db: "db1".to_string(),
        collection: "c1".to_string(),
        filter: br#"{"K1":"a","K2":1}"#.to_vec(),
    });
    delete.run(&session, &engine.tenant).await.expect("delete");

    session.commit().await.expect("commit");
    let events = session.take_events().await;
    use folio_server::TxListener;
    engine.indexer.on_post_commit(&events).await.expect("index");

    let docs = engine.search.documents("ns1-db1-c1");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["K1"], "b");
}
