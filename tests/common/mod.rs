//! Shared test support: an in-memory DataStore so gateway and session
//! behavior can be exercised without Postgres.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use safework_api::filter::FilterData;
use safework_api::policy::{Actor, Role};
use safework_api::store::{DataStore, Record, StoreError};

#[derive(Default)]
pub struct MemStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    mutations: AtomicUsize,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, collection: &str, record: Value) -> Uuid {
        let mut record = record.as_object().cloned().expect("seed record must be an object");
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        record.insert("id".to_string(), json!(id));
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record);
        id
    }

    pub fn rows(&self, collection: &str) -> Vec<Record> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of insert/update/delete calls that reached the store.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for MemStore {
    async fn query(&self, collection: &str, filter: FilterData) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.lock().unwrap();
        let rows = collections.get(collection).cloned().unwrap_or_default();
        let cond = filter.where_clause.unwrap_or(Value::Null);
        let mut matched: Vec<Record> =
            rows.into_iter().filter(|r| matches_where(r, &cond)).collect();

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        if offset > 0 {
            matched = matched.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    async fn count(&self, collection: &str, filter: FilterData) -> Result<i64, StoreError> {
        let collections = self.collections.lock().unwrap();
        let rows = collections.get(collection).cloned().unwrap_or_default();
        let cond = filter.where_clause.unwrap_or(Value::Null);
        Ok(rows.iter().filter(|r| matches_where(r, &cond)).count() as i64)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .and_then(|rows| rows.iter().find(|r| record_id(r) == Some(id)))
            .cloned())
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        record
            .entry("id".to_string())
            .or_insert_with(|| json!(Uuid::new_v4()));
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        patch: Record,
    ) -> Result<Option<Record>, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(row) = rows.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        for (k, v) in patch {
            row.insert(k, v);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| record_id(r) != Some(id));
        Ok(rows.len() < before)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn record_id(record: &Record) -> Option<Uuid> {
    record
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Evaluate the same WHERE documents the filter compiler accepts, far enough
/// for the fixtures used in these tests.
fn matches_where(record: &Record, cond: &Value) -> bool {
    let Some(obj) = cond.as_object() else {
        return true;
    };
    obj.iter().all(|(key, value)| match key.as_str() {
        "$and" => value
            .as_array()
            .map(|arr| arr.iter().all(|c| matches_where(record, c)))
            .unwrap_or(false),
        "$or" => value
            .as_array()
            .map(|arr| arr.iter().any(|c| matches_where(record, c)))
            .unwrap_or(false),
        "$not" => !matches_where(record, value),
        field => {
            let actual = record.get(field).unwrap_or(&Value::Null);
            match value {
                Value::Object(ops) => ops.iter().all(|(op, data)| match op.as_str() {
                    "$eq" => actual == data,
                    "$ne" => actual != data,
                    "$in" => data.as_array().map(|a| a.contains(actual)).unwrap_or(false),
                    "$ilike" => ilike(actual, data),
                    _ => false,
                }),
                other => actual == other,
            }
        }
    })
}

fn ilike(actual: &Value, pattern: &Value) -> bool {
    let (Some(actual), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    actual
        .to_lowercase()
        .contains(&pattern.trim_matches('%').to_lowercase())
}

pub fn super_admin() -> Actor {
    Actor::new(Uuid::new_v4(), "root@safework.example", Role::SuperAdmin, None)
}

pub fn firm_admin(firm: Uuid) -> Actor {
    Actor::new(Uuid::new_v4(), "admin@firm.example", Role::FirmAdmin, Some(firm))
}

pub fn employee(firm: Uuid) -> Actor {
    Actor::new(Uuid::new_v4(), "worker@firm.example", Role::Employee, Some(firm))
}
