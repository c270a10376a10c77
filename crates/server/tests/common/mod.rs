//! Shared fixture for the engine integration tests: an in-memory KV
//! store, an in-memory search store, one tenant, and request helpers that
//! drive the full execute pipeline (runner → commit → post-commit
//! indexing).

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use folio_kv::{KeyValueStore, MemKv};
use folio_metadata::{Namespace, TenantManager};
use folio_search::{MemSearch, RetryPolicy, SearchStore};
use folio_server::{
    execute, CreateDatabaseRequest, CreateOrUpdateCollectionRequest, DeleteRequest,
    ExecuteOutcome, InsertRequest, QueryRunner, QueryRunnerFactory, ReadOptions, ReadRequest,
    ReadResponse, ReplaceRequest, Response, SearchIndexer, Tenant, TxManager, UpdateRequest,
    VecStreaming,
};
use folio_types::Result;

/// Default two-field composite primary key schema used across tests.
pub const SCHEMA_C1: &[u8] = br#"{
    "title": "c1",
    "properties": {
        "K1": {"type": "string"},
        "K2": {"type": "integer"},
        "D1": {"type": "string"}
    },
    "primary_key": ["K1", "K2"]
}"#;

/// Single string primary key.
pub const SCHEMA_STRING_PK: &[u8] = br#"{
    "properties": {
        "K1": {"type": "string"},
        "D1": {"type": "string"}
    },
    "primary_key": ["K1"]
}"#;

/// Single integer primary key.
pub const SCHEMA_INT_PK: &[u8] = br#"{
    "properties": {
        "K1": {"type": "integer"},
        "D1": {"type": "string"}
    },
    "primary_key": ["K1"]
}"#;

pub struct TestEngine {
    pub kv: Arc<MemKv>,
    pub search: Arc<MemSearch>,
    pub tenant: Tenant,
    pub tx_mgr: TxManager,
    pub factory: QueryRunnerFactory,
    pub indexer: SearchIndexer,
}

impl TestEngine {
    pub fn new() -> Self {
        let kv = Arc::new(MemKv::new());
        let search = Arc::new(MemSearch::new());
        let manager = TenantManager::new(Namespace::new("ns1", 1));
        let tenant = Tenant::new(manager);
        let tx_mgr = TxManager::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);
        let factory = QueryRunnerFactory::new(tenant.encoder().clone());
        let indexer = SearchIndexer::with_policy(
            Arc::clone(&search) as Arc<dyn SearchStore>,
            tenant.encoder().clone(),
            // Same attempt budget as production, tighter sleep.
            RetryPolicy { attempts: 5, backoff: Duration::from_millis(1) },
        );
        Self { kv, search, tenant, tx_mgr, factory, indexer }
    }

    pub async fn execute(&self, runner: &mut dyn QueryRunner) -> Result<ExecuteOutcome> {
        execute(&self.tx_mgr, &self.tenant, &self.indexer, runner).await
    }

    pub async fn create_database(&self, db: &str) -> Result<Response> {
        let mut runner = self.factory.database_query_runner();
        runner.set_create_database_req(CreateDatabaseRequest { db: db.to_string() });
        Ok(self.execute(&mut runner).await?.response)
    }

    pub async fn create_collection(&self, db: &str, coll: &str, schema: &[u8]) -> Result<Response> {
        let mut runner = self.factory.collection_query_runner();
        runner.set_create_or_update_collection_req(CreateOrUpdateCollectionRequest {
            db: db.to_string(),
            collection: coll.to_string(),
            schema: schema.to_vec(),
            only_create: false,
        });
        Ok(self.execute(&mut runner).await?.response)
    }

    pub async fn insert(&self, db: &str, coll: &str, docs: &[&str]) -> Result<ExecuteOutcome> {
        let mut runner = self.factory.insert_query_runner(InsertRequest {
            db: db.to_string(),
            collection: coll.to_string(),
            documents: docs.iter().map(|d| d.as_bytes().to_vec()).collect(),
        });
        self.execute(&mut runner).await
    }

    pub async fn replace(&self, db: &str, coll: &str, docs: &[&str]) -> Result<ExecuteOutcome> {
        let mut runner = self.factory.replace_query_runner(ReplaceRequest {
            db: db.to_string(),
            collection: coll.to_string(),
            documents: docs.iter().map(|d| d.as_bytes().to_vec()).collect(),
        });
        self.execute(&mut runner).await
    }

    pub async fn update(
        &self,
        db: &str,
        coll: &str,
        filter: &str,
        fields: &str,
    ) -> Result<ExecuteOutcome> {
        let mut runner = self.factory.update_query_runner(UpdateRequest {
            db: db.to_string(),
            collection: coll.to_string(),
            filter: filter.as_bytes().to_vec(),
            fields: fields.as_bytes().to_vec(),
        });
        self.execute(&mut runner).await
    }

    pub async fn delete(&self, db: &str, coll: &str, filter: &str) -> Result<ExecuteOutcome> {
        let mut runner = self.factory.delete_query_runner(DeleteRequest {
            db: db.to_string(),
            collection: coll.to_string(),
            filter: filter.as_bytes().to_vec(),
        });
        self.execute(&mut runner).await
    }

    pub async fn read(&self, db: &str, coll: &str, filter: &str) -> Result<Vec<ReadResponse>> {
        self.read_with(db, coll, filter, "", None).await
    }

    pub async fn read_with(
        &self,
        db: &str,
        coll: &str,
        filter: &str,
        fields: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ReadResponse>> {
        let mut runner = self.factory.streaming_query_runner(
            ReadRequest {
                db: db.to_string(),
                collection: coll.to_string(),
                filter: filter.as_bytes().to_vec(),
                fields: fields.as_bytes().to_vec(),
                options: limit.map(|limit| ReadOptions { limit }),
            },
            VecStreaming::default(),
        );
        self.execute(&mut runner).await?;
        Ok(runner.into_streaming().responses)
    }

    /// Parses streamed rows back into JSON values for assertions.
    pub fn docs(responses: &[ReadResponse]) -> Vec<serde_json::Value> {
        responses
            .iter()
            .map(|r| serde_json::from_slice(&r.data).expect("streamed row is JSON"))
            .collect()
    }
}

/// A fully provisioned engine: `db1` with collection `c1` (composite
/// string+int primary key).
pub async fn provisioned() -> TestEngine {
    let engine = TestEngine::new();
    engine.create_database("db1").await.expect("create db1");
    engine.create_collection("db1", "c1", SCHEMA_C1).await.expect("create c1");
    engine
}
