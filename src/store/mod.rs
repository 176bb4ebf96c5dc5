pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::FilterData;

pub use postgres::PgStore;

/// A stored record as a JSON object.
pub type Record = Map<String, Value>;

/// Errors from the backing store, passed through to callers unmapped.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// CRUD contract of the external data store.
///
/// Deliberately tenant-unaware: injecting and validating the `firm_id`
/// constraint is entirely the gateway's responsibility, so any conforming
/// backend (Postgres in production, an in-memory map in tests) gets the same
/// isolation behavior.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn query(&self, collection: &str, filter: FilterData) -> Result<Vec<Record>, StoreError>;

    /// Number of records matching the filter, ignoring limit/offset.
    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, StoreError>;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError>;

    /// Insert a record, generating an `id` when the caller did not set one.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Apply a partial patch to one record. `Ok(None)` when the id is absent.
    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        patch: Record,
    ) -> Result<Option<Record>, StoreError>;

    /// Returns whether a record was actually removed.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
