pub mod admins;
pub mod auth;
pub mod drills;
pub mod emergencies;
pub mod employees;
pub mod firms;
pub mod locations;
pub mod safety_classes;
pub mod stats;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filter::FilterData;
use crate::gateway::Collection;
use crate::policy::{self, Actor, Decision, Role};
use crate::store::Record;

/// Common query parameters for list endpoints.
///
/// `firm` is the explicit narrowing a super admin picks in the UI; for firm
/// admins the gateway replaces any such value with their own scope.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub firm: Option<Uuid>,
    pub order: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Build a [`FilterData`] from list parameters.
///
/// `base` holds server-chosen predicates (e.g. the role discriminator on
/// `user_profiles`); `search_columns` are ILIKE'd against `q`.
pub fn list_filter(
    params: &ListParams,
    collection: &Collection,
    search_columns: &[&str],
    base: Map<String, Value>,
) -> FilterData {
    let mut where_doc = base;

    if let Some(q) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = format!("%{}%", q.trim());
        let clauses: Vec<Value> = search_columns
            .iter()
            .map(|col| json!({ *col: { "$ilike": pattern } }))
            .collect();
        where_doc.insert("$or".to_string(), Value::Array(clauses));
    }

    // On the firms table itself this narrows on `id`
    if let Some(firm) = params.firm {
        where_doc.insert(collection.tenant_column.to_string(), json!(firm));
    }

    FilterData {
        where_clause: if where_doc.is_empty() { None } else { Some(Value::Object(where_doc)) },
        order: params.order.clone().map(Value::String),
        limit: params.limit,
        offset: params.offset,
        ..Default::default()
    }
}

/// Route guard; denial renders the generic "not permitted" message.
pub fn ensure_role(actor: &Actor, allowed: &[Role]) -> Result<(), ApiError> {
    match policy::require_role(actor, allowed) {
        Decision::Allow => Ok(()),
        Decision::Deny(_) => Err(ApiError::forbidden("Not permitted")),
    }
}

/// Serialize a payload struct into a store record, dropping unset fields.
pub fn to_record<T: serde::Serialize>(payload: &T) -> Result<Record, ApiError> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::bad_request("Expected a JSON object")),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}

/// Strip fields that must never be echoed to clients.
pub fn scrub(mut record: Record) -> Record {
    record.remove("password_hash");
    record
}

/// Both admins and employees live in `user_profiles`; each route surface only
/// ever serves rows matching its own role discriminator. A mismatched id
/// renders as not-found so the other surface's rows stay opaque.
pub fn ensure_profile_kind(record: &Record, expected: Role) -> Result<(), ApiError> {
    match record.get("role").and_then(Value::as_str) {
        Some(role) if role == expected.as_str() => Ok(()),
        _ => Err(ApiError::not_found("Record not found")),
    }
}
