//! Query runners: one per request kind.
//!
//! Every runner follows the same preamble — resolve the database (staged
//! clone first, then the tenant cache), resolve the collection — and then
//! orchestrates validation, key building and execution against the
//! transaction session. Runners share helpers by composition through
//! [`BaseQueryRunner`].

use std::sync::Arc;

use async_trait::async_trait;
use folio_kv::{Key, TupleValue};
use folio_metadata::{
    Collection, Database, Field, KeyEncoder, Namespace, SchemaFactory, TenantManager,
    PRIMARY_KEY_INDEX_ID,
};
use folio_query::{is_full_collection_scan, FieldFactory, FieldOperatorFactory, Filter, KeyBuilder};
use folio_types::{Error, Result, TableData, Timestamp};
use serde_json::Value;
use tracing::debug;

use crate::request::{
    CreateDatabaseRequest, CreateOrUpdateCollectionRequest, DeleteRequest,
    DescribeCollectionRequest, DescribeDatabaseRequest, DropCollectionRequest,
    DropDatabaseRequest, InsertRequest, ListCollectionsRequest, ListDatabasesRequest,
    ReadRequest, ReplaceRequest, UpdateRequest,
};
use crate::response::{
    CollectionDescription, ReadResponse, Response, ResponsePayload, Status, Streaming,
};
use crate::row_reader::{DatabaseRowReader, Row, RowReader};
use crate::transaction::TxSession;

/// The tenant a request executes under: its namespace dictionary and key
/// encoder.
pub struct Tenant {
    manager: Arc<TenantManager>,
    encoder: KeyEncoder,
}

impl Tenant {
    /// Bundles a tenant manager with its encoder.
    pub fn new(manager: Arc<TenantManager>) -> Self {
        let encoder = KeyEncoder::new(Arc::clone(&manager));
        Self { manager, encoder }
    }

    /// The tenant's metadata manager.
    pub fn manager(&self) -> &Arc<TenantManager> {
        &self.manager
    }

    /// The tenant's key encoder.
    pub fn encoder(&self) -> &KeyEncoder {
        &self.encoder
    }

    /// The tenant's namespace.
    pub fn namespace(&self) -> &Namespace {
        self.manager.namespace()
    }
}

/// Executes one request inside an existing transaction session.
#[async_trait]
pub trait QueryRunner: Send {
    /// Runs the request to completion and produces its response.
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response>;
}

/// Helpers shared by every runner.
pub struct BaseQueryRunner {
    encoder: KeyEncoder,
}

impl BaseQueryRunner {
    /// Creates the shared helper set.
    pub fn new(encoder: KeyEncoder) -> Self {
        Self { encoder }
    }

    /// Resolves the target database: the transaction's staged clone when
    /// DDL has run, the tenant cache otherwise.
    pub async fn get_database(
        &self,
        tx: &TxSession,
        tenant: &Tenant,
        db_name: &str,
    ) -> Result<Database> {
        if let Some(staged) = tx.staged_database().await {
            // A DDL operation has modified the database inside this
            // transaction; everything after it sees the staged clone.
            return Ok(staged);
        }

        tenant
            .manager()
            .get_database(db_name)
            .ok_or_else(|| Error::not_found(format!("database doesn't exist '{db_name}'")))
    }

    /// Resolves a collection by name.
    pub fn get_collection(&self, db: &Database, coll_name: &str) -> Result<Arc<Collection>> {
        db.get_collection(coll_name)
            .ok_or_else(|| Error::not_found(format!("collection doesn't exist '{coll_name}'")))
    }

    // Reads each primary-key field out of the document in schema order and
    // converts it to the declared scalar type.
    fn extract_index_parts(&self, pk_fields: &[Field], doc: &Value) -> Result<Vec<TupleValue>> {
        let mut parts = Vec::with_capacity(pk_fields.len());
        for field in pk_fields {
            let value = match doc.get(&field.name) {
                Some(v) if !v.is_null() => v,
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "missing index key column(s) '{}'",
                        field.name
                    )));
                },
            };
            parts.push(field.field_type.tuple_value(&field.name, value)?);
        }
        Ok(parts)
    }

    async fn insert_or_replace(
        &self,
        tx: &TxSession,
        tenant: &Tenant,
        db: &Database,
        coll: &Collection,
        documents: &[Vec<u8>],
        insert: bool,
    ) -> Result<Timestamp> {
        if documents.is_empty() {
            return Err(Error::invalid_argument("empty documents"));
        }

        // One logical write time for the whole batch.
        let ts = Timestamp::now();
        let table = self.encoder.encode_table(tenant.namespace(), Some(db), Some(coll))?;

        for raw in documents {
            let doc: Value = serde_json::from_slice(raw).map_err(|e| {
                Error::invalid_argument(format!("document is not valid JSON: {e}"))
            })?;
            coll.validate(&doc)?;

            let parts = self.extract_index_parts(&coll.primary_key, &doc)?;
            let key = self.encoder.encode_key(&table, Some(PRIMARY_KEY_INDEX_ID), parts)?;

            let data = TableData::with_timestamps(ts, None, raw.clone());
            if insert {
                tx.insert(&key, &data).await?;
            } else {
                tx.replace(&key, &data).await?;
            }
        }
        Ok(ts)
    }

    fn build_keys_using_filter(
        &self,
        tenant: &Tenant,
        db: &Database,
        coll: &Collection,
        raw_filter: &[u8],
    ) -> Result<Vec<Key>> {
        let filters = Filter::parse(raw_filter)?;
        let table = self.encoder.encode_table(tenant.namespace(), Some(db), Some(coll))?;

        let composer = |parts: Vec<TupleValue>| {
            self.encoder.encode_key(&table, Some(PRIMARY_KEY_INDEX_ID), parts)
        };
        KeyBuilder::build(&filters, &coll.primary_key, &composer)
    }
}

/// Runs an [`InsertRequest`].
pub struct InsertQueryRunner {
    base: BaseQueryRunner,
    req: InsertRequest,
}

#[async_trait]
impl QueryRunner for InsertQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        let db = self.base.get_database(tx, tenant, &self.req.db).await?;
        let coll = self.base.get_collection(&db, &self.req.collection)?;

        let ts = match self
            .base
            .insert_or_replace(tx, tenant, &db, &coll, &self.req.documents, true)
            .await
        {
            Ok(ts) => ts,
            Err(Error::DuplicateKey) => {
                return Err(Error::already_exists("duplicate key"));
            },
            Err(e) => return Err(e),
        };

        Ok(Response { status: Some(Status::Inserted), created_at: Some(ts), ..Response::default() })
    }
}

/// Runs a [`ReplaceRequest`].
pub struct ReplaceQueryRunner {
    base: BaseQueryRunner,
    req: ReplaceRequest,
}

#[async_trait]
impl QueryRunner for ReplaceQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        let db = self.base.get_database(tx, tenant, &self.req.db).await?;
        let coll = self.base.get_collection(&db, &self.req.collection)?;

        let ts = self
            .base
            .insert_or_replace(tx, tenant, &db, &coll, &self.req.documents, false)
            .await?;

        Ok(Response { status: Some(Status::Replaced), created_at: Some(ts), ..Response::default() })
    }
}

/// Runs an [`UpdateRequest`].
pub struct UpdateQueryRunner {
    base: BaseQueryRunner,
    req: UpdateRequest,
}

#[async_trait]
impl QueryRunner for UpdateQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        let ts = Timestamp::now();
        let db = self.base.get_database(tx, tenant, &self.req.db).await?;
        let coll = self.base.get_collection(&db, &self.req.collection)?;

        let keys = self.base.build_keys_using_filter(tenant, &db, &coll, &self.req.filter)?;
        let factory = FieldOperatorFactory::build(&self.req.fields)?;
        // The operand itself must satisfy the schema before any row is
        // touched.
        coll.validate(factory.set_document())?;

        let mut modified_count = 0;
        for key in &keys {
            let coll = Arc::clone(&coll);
            let factory = &factory;
            modified_count += tx
                .update(key, move |existing| {
                    let merged = factory.merge(&existing.raw)?;
                    let parsed: Value = serde_json::from_slice(&merged)
                        .map_err(|e| Error::internal(e.to_string()))?;
                    coll.validate(&parsed)?;
                    Ok(TableData::with_timestamps(existing.created_at, Some(ts), merged))
                })
                .await?;
        }

        Ok(Response {
            status: Some(Status::Updated),
            updated_at: Some(ts),
            modified_count,
            ..Response::default()
        })
    }
}

/// Runs a [`DeleteRequest`].
pub struct DeleteQueryRunner {
    base: BaseQueryRunner,
    req: DeleteRequest,
}

#[async_trait]
impl QueryRunner for DeleteQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        let ts = Timestamp::now();
        let db = self.base.get_database(tx, tenant, &self.req.db).await?;
        let coll = self.base.get_collection(&db, &self.req.collection)?;

        let keys = self.base.build_keys_using_filter(tenant, &db, &coll, &self.req.filter)?;
        for key in &keys {
            tx.delete(key).await?;
        }

        Ok(Response { status: Some(Status::Deleted), updated_at: Some(ts), ..Response::default() })
    }
}

/// Runs a [`ReadRequest`], streaming one response per row.
pub struct StreamingQueryRunner<S: Streaming> {
    base: BaseQueryRunner,
    req: ReadRequest,
    streaming: S,
}

impl<S: Streaming> StreamingQueryRunner<S> {
    /// Consumes the runner, handing the transport back to the caller.
    pub fn into_streaming(self) -> S {
        self.streaming
    }

    async fn iterate(
        &mut self,
        tx: &TxSession,
        keys: Vec<Key>,
        field_factory: &FieldFactory,
    ) -> Result<()> {
        let limit = self.req.options.map(|o| o.limit).unwrap_or(0);

        let mut reader = RowReader::Database(DatabaseRowReader::new(tx, keys));
        let mut row = Row::default();
        let mut total: i64 = 0;
        while reader.next_row(&mut row).await {
            if limit > 0 && total >= limit {
                return Ok(());
            }

            let data = field_factory.apply(&row.data.raw)?;
            self.streaming
                .send(ReadResponse {
                    data,
                    created_at: Some(row.data.created_at),
                    updated_at: row.data.updated_at,
                    resume_token: row.key.clone(),
                })
                .await?;
            total += 1;
        }

        match reader.err() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: Streaming> QueryRunner for StreamingQueryRunner<S> {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        let db = self.base.get_database(tx, tenant, &self.req.db).await?;
        let coll = self.base.get_collection(&db, &self.req.collection)?;

        let field_factory = FieldFactory::build(&self.req.fields)?;

        let keys = if is_full_collection_scan(&self.req.filter) {
            let table =
                self.base.encoder.encode_table(tenant.namespace(), Some(&db), Some(&coll))?;
            vec![Key::table_scan(table)]
        } else {
            self.base.build_keys_using_filter(tenant, &db, &coll, &self.req.filter)?
        };

        if let Err(e) = self.iterate(tx, keys, &field_factory).await {
            debug!(db = %db.name, collection = %coll.name, error = %e, "read iteration failed");
            return Err(e);
        }
        Ok(Response::default())
    }
}

/// Composite runner over the four collection DDL requests.
///
/// DDL never mutates live metadata mid-transaction: the first DDL stages
/// a database clone on the session and every later operation of the
/// transaction sees the clone.
#[derive(Default)]
pub struct CollectionQueryRunner {
    drop_req: Option<DropCollectionRequest>,
    list_req: Option<ListCollectionsRequest>,
    create_or_update_req: Option<CreateOrUpdateCollectionRequest>,
    describe_req: Option<DescribeCollectionRequest>,
    base: Option<BaseQueryRunner>,
}

impl CollectionQueryRunner {
    /// Selects CreateOrUpdateCollection.
    pub fn set_create_or_update_collection_req(&mut self, req: CreateOrUpdateCollectionRequest) {
        self.create_or_update_req = Some(req);
    }

    /// Selects DropCollection.
    pub fn set_drop_collection_req(&mut self, req: DropCollectionRequest) {
        self.drop_req = Some(req);
    }

    /// Selects ListCollections.
    pub fn set_list_collections_req(&mut self, req: ListCollectionsRequest) {
        self.list_req = Some(req);
    }

    /// Selects DescribeCollection.
    pub fn set_describe_collection_req(&mut self, req: DescribeCollectionRequest) {
        self.describe_req = Some(req);
    }

    fn base(&self) -> Result<&BaseQueryRunner> {
        self.base.as_ref().ok_or_else(|| Error::internal("runner base is missing"))
    }
}

#[async_trait]
impl QueryRunner for CollectionQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        if let Some(req) = self.drop_req.clone() {
            let mut db = self.base()?.get_database(tx, tenant, &req.db).await?;
            tenant.manager().drop_collection(tx, &mut db, &req.collection).await?;
            tx.stage_database(db).await;

            return Ok(Response::with_status(Status::Dropped));
        }

        if let Some(req) = self.create_or_update_req.clone() {
            let mut db = self.base()?.get_database(tx, tenant, &req.db).await?;

            if db.get_collection(&req.collection).is_some() && req.only_create {
                return Err(Error::already_exists("collection already exists"));
            }

            let factory = SchemaFactory::build(&req.collection, &req.schema)?;
            match tenant.manager().create_collection(tx, &mut db, factory).await {
                Ok(()) => {},
                Err(Error::DuplicateKey) => {
                    // Concurrent CreateCollection won the metadata record.
                    return Err(Error::aborted("concurrent create collection request, aborting"));
                },
                Err(e) => return Err(e),
            }
            tx.stage_database(db).await;

            return Ok(Response::with_status(Status::Created));
        }

        if let Some(req) = self.list_req.clone() {
            let db = self.base()?.get_database(tx, tenant, &req.db).await?;
            let collections = db.list_collections().iter().map(|c| c.name.clone()).collect();

            return Ok(Response {
                payload: Some(ResponsePayload::ListCollections(collections)),
                ..Response::default()
            });
        }

        if let Some(req) = self.describe_req.clone() {
            let db = self.base()?.get_database(tx, tenant, &req.db).await?;
            let coll = self.base()?.get_collection(&db, &req.collection)?;

            return Ok(Response {
                payload: Some(ResponsePayload::DescribeCollection(CollectionDescription {
                    collection: coll.name.clone(),
                    schema: coll.schema.clone(),
                })),
                ..Response::default()
            });
        }

        Err(Error::unknown("unknown request path"))
    }
}

/// Composite runner over the four database DDL requests.
#[derive(Default)]
pub struct DatabaseQueryRunner {
    drop_req: Option<DropDatabaseRequest>,
    create_req: Option<CreateDatabaseRequest>,
    list_req: Option<ListDatabasesRequest>,
    describe_req: Option<DescribeDatabaseRequest>,
    base: Option<BaseQueryRunner>,
}

impl DatabaseQueryRunner {
    /// Selects CreateDatabase.
    pub fn set_create_database_req(&mut self, req: CreateDatabaseRequest) {
        self.create_req = Some(req);
    }

    /// Selects DropDatabase.
    pub fn set_drop_database_req(&mut self, req: DropDatabaseRequest) {
        self.drop_req = Some(req);
    }

    /// Selects ListDatabases.
    pub fn set_list_databases_req(&mut self, req: ListDatabasesRequest) {
        self.list_req = Some(req);
    }

    /// Selects DescribeDatabase.
    pub fn set_describe_database_req(&mut self, req: DescribeDatabaseRequest) {
        self.describe_req = Some(req);
    }

    fn base(&self) -> Result<&BaseQueryRunner> {
        self.base.as_ref().ok_or_else(|| Error::internal("runner base is missing"))
    }
}

#[async_trait]
impl QueryRunner for DatabaseQueryRunner {
    async fn run(&mut self, tx: &TxSession, tenant: &Tenant) -> Result<Response> {
        if let Some(req) = self.drop_req.clone() {
            let existed = tenant.manager().drop_database(tx, &req.db).await?;
            if !existed {
                return Err(Error::not_found(format!("database doesn't exist '{}'", req.db)));
            }
            return Ok(Response::with_status(Status::Dropped));
        }

        if let Some(req) = self.create_req.clone() {
            let existed = tenant.manager().create_database(tx, &req.db).await?;
            if existed {
                return Err(Error::already_exists("database already exists"));
            }
            return Ok(Response::with_status(Status::Created));
        }

        if self.list_req.is_some() {
            return Ok(Response {
                payload: Some(ResponsePayload::ListDatabases(tenant.manager().list_databases())),
                ..Response::default()
            });
        }

        if let Some(req) = self.describe_req.clone() {
            let db = self.base()?.get_database(tx, tenant, &req.db).await?;
            let collections = db
                .list_collections()
                .iter()
                .map(|c| CollectionDescription {
                    collection: c.name.clone(),
                    schema: c.schema.clone(),
                })
                .collect();

            return Ok(Response {
                payload: Some(ResponsePayload::DescribeDatabase { db: db.name.clone(), collections }),
                ..Response::default()
            });
        }

        Err(Error::unknown("unknown request path"))
    }
}

/// Builds one runner per request kind.
pub struct QueryRunnerFactory {
    encoder: KeyEncoder,
}

impl QueryRunnerFactory {
    /// Creates a factory over the tenant's key encoder.
    pub fn new(encoder: KeyEncoder) -> Self {
        Self { encoder }
    }

    /// Runner for an insert.
    pub fn insert_query_runner(&self, req: InsertRequest) -> InsertQueryRunner {
        InsertQueryRunner { base: BaseQueryRunner::new(self.encoder.clone()), req }
    }

    /// Runner for a replace.
    pub fn replace_query_runner(&self, req: ReplaceRequest) -> ReplaceQueryRunner {
        ReplaceQueryRunner { base: BaseQueryRunner::new(self.encoder.clone()), req }
    }

    /// Runner for an update.
    pub fn update_query_runner(&self, req: UpdateRequest) -> UpdateQueryRunner {
        UpdateQueryRunner { base: BaseQueryRunner::new(self.encoder.clone()), req }
    }

    /// Runner for a delete.
    pub fn delete_query_runner(&self, req: DeleteRequest) -> DeleteQueryRunner {
        DeleteQueryRunner { base: BaseQueryRunner::new(self.encoder.clone()), req }
    }

    /// Runner for a streaming read.
    pub fn streaming_query_runner<S: Streaming>(
        &self,
        req: ReadRequest,
        streaming: S,
    ) -> StreamingQueryRunner<S> {
        StreamingQueryRunner { base: BaseQueryRunner::new(self.encoder.clone()), req, streaming }
    }

    /// Composite runner for collection DDL; select the request with a
    /// setter before running.
    pub fn collection_query_runner(&self) -> CollectionQueryRunner {
        CollectionQueryRunner {
            base: Some(BaseQueryRunner::new(self.encoder.clone())),
            ..CollectionQueryRunner::default()
        }
    }

    /// Composite runner for database DDL; select the request with a
    /// setter before running.
    pub fn database_query_runner(&self) -> DatabaseQueryRunner {
        DatabaseQueryRunner {
            base: Some(BaseQueryRunner::new(self.encoder.clone())),
            ..DatabaseQueryRunner::default()
        }
    }
}
