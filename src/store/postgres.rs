//! Postgres-backed [`DataStore`] over a single application database.
//!
//! Tenancy here is row-scoped (every table carries `firm_id`), so one lazily
//! created pool serves all requests. Filter documents are compiled to
//! parameterized SQL by the filter module; rows come back as JSON maps.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::filter::{ident, Filter, FilterData};

use super::{DataStore, Record, StoreError};

static POOL: OnceCell<PgPool> = OnceCell::const_new();

async fn pool() -> Result<&'static PgPool, StoreError> {
    POOL.get_or_try_init(|| async {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        let db = &config::config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connect_timeout_secs))
            .connect(&url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("created database pool");
        Ok(pool)
    })
    .await
}

#[derive(Debug, Clone, Default)]
pub struct PgStore;

impl PgStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn query(&self, collection: &str, filter: FilterData) -> Result<Vec<Record>, StoreError> {
        let mut compiled = Filter::new(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        compiled.assign(filter).map_err(|e| StoreError::Query(e.to_string()))?;
        let sql = compiled.to_sql().map_err(|e| StoreError::Query(e.to_string()))?;

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p)?;
        }
        let rows = q.fetch_all(pool().await?).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, StoreError> {
        let mut compiled = Filter::new(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        compiled.assign(filter).map_err(|e| StoreError::Query(e.to_string()))?;
        let sql = compiled.to_count_sql().map_err(|e| StoreError::Query(e.to_string()))?;

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p)?;
        }
        let row = q.fetch_one(pool().await?).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        ident::validate_table_name(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        let sql = format!("SELECT * FROM \"{}\" WHERE \"id\" = $1", collection);
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool().await?).await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        ident::validate_table_name(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        record
            .entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (i, (column, value)) in record.iter().enumerate() {
            ident::validate_column(column).map_err(|e| StoreError::Query(e.to_string()))?;
            columns.push(format!("\"{}\"", column));
            placeholders.push(format!("${}", i + 1));
            values.push(value.clone());
        }

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
            collection,
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut q = sqlx::query(&sql);
        for v in values.iter() {
            q = bind_param(q, v)?;
        }
        let row = q.fetch_one(pool().await?).await?;
        Ok(row_to_record(&row))
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        patch: Record,
    ) -> Result<Option<Record>, StoreError> {
        ident::validate_table_name(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        if patch.is_empty() {
            return self.get(collection, id).await;
        }

        let mut assignments = Vec::with_capacity(patch.len());
        let mut values = Vec::with_capacity(patch.len());
        for (i, (column, value)) in patch.iter().enumerate() {
            if column == "id" {
                return Err(StoreError::Query("record id is immutable".to_string()));
            }
            ident::validate_column(column).map_err(|e| StoreError::Query(e.to_string()))?;
            assignments.push(format!("\"{}\" = ${}", column, i + 1));
            values.push(value.clone());
        }

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ${} RETURNING *",
            collection,
            assignments.join(", "),
            values.len() + 1
        );
        let mut q = sqlx::query(&sql);
        for v in values.iter() {
            q = bind_param(q, v)?;
        }
        let row = q.bind(id).fetch_optional(pool().await?).await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, StoreError> {
        ident::validate_table_name(collection).map_err(|e| StoreError::Query(e.to_string()))?;
        let sql = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", collection);
        let result = sqlx::query(&sql).bind(id).execute(pool().await?).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(pool().await?).await?;
        Ok(())
    }
}

/// Convert a row to a JSON map, trying the common column types in turn.
fn row_to_record(row: &PgRow) -> Record {
    let mut map = Map::new();
    for i in 0..row.len() {
        let column_name = row.column(i).name();
        let value: Value = if let Ok(v) = row.try_get::<Option<Value>, _>(i) {
            v.unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<Uuid>, _>(i) {
            v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
                .unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(Value::Bool).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
            v.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
            v.map(|t| Value::String(t.and_utc().to_rfc3339())).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        map.insert(column_name.to_string(), value);
    }
    map
}

/// Bind a JSON value as a SQL parameter. UUID-shaped strings bind as native
/// uuids so comparisons against `id`/`firm_id` columns type-check.
fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> Result<sqlx::query::Query<'q, sqlx::Postgres, PgArguments>, StoreError> {
    Ok(match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                let i = i64::try_from(u).map_err(|_| {
                    StoreError::Query(format!("integer parameter {} out of range", u))
                })?;
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(uuid) = Uuid::parse_str(s) {
                q.bind(uuid)
            } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                q.bind(ts.with_timezone(&Utc))
            } else {
                q.bind(s)
            }
        }
        // The filter compiler expands $in arrays into individual parameters,
        // so arrays only arrive from record payloads; store them as JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_arrays_and_objects_as_jsonb() {
        let arr = json!(["a", "b"]);
        assert!(bind_param(sqlx::query("SELECT $1"), &arr).is_ok());
        let obj = json!({ "k": "v" });
        assert!(bind_param(sqlx::query("SELECT $1"), &obj).is_ok());
    }

    #[test]
    fn rejects_integers_beyond_i64() {
        let big = json!(u64::MAX);
        let err = bind_param(sqlx::query("SELECT $1"), &big).err().unwrap();
        assert!(matches!(err, StoreError::Query(_)));

        let fits = json!(i64::MAX);
        assert!(bind_param(sqlx::query("SELECT $1"), &fits).is_ok());
    }
}
