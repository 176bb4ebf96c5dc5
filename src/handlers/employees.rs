//! Employee roster management, scoped to the acting admin's firm.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::gateway::PROFILES;
use crate::middleware::AuthUser;
use crate::policy::Role;
use crate::state::AppState;

use super::{ensure_profile_kind, ensure_role, list_filter, scrub, to_record, ListParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/employees", get(list).post(create))
        .route("/api/employees/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    /// Required for super admins; ignored for firm admins, whose own firm
    /// always wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEmployee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

fn role_base() -> Map<String, Value> {
    let mut base = Map::new();
    base.insert("role".to_string(), json!(Role::Employee.as_str()));
    base
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let filter = list_filter(
        &params,
        &PROFILES,
        &["first_name", "last_name", "email", "employee_code"],
        role_base(),
    );
    let rows = state.gateway().list(&actor, &PROFILES, filter).await?;
    let rows: Vec<_> = rows.into_iter().map(scrub).collect();
    Ok(Json(json!({ "success": true, "data": rows })))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    let record = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&record, Role::Employee)?;
    Ok(Json(json!({ "success": true, "data": scrub(record) })))
}

async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateEmployee>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    if payload.email.trim().is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }

    let mut record = to_record(&payload)?;
    record.insert("role".to_string(), json!(Role::Employee.as_str()));
    record.insert("is_active".to_string(), json!(true));

    let created = state.gateway().create(&actor, &PROFILES, record).await?;
    Ok(Json(json!({ "success": true, "data": scrub(created) })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployee>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let current = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&current, Role::Employee)?;
    let record = state.gateway().update(&actor, &PROFILES, id, to_record(&payload)?).await?;
    Ok(Json(json!({ "success": true, "data": scrub(record) })))
}

/// DELETE deactivates rather than removes: actor rows are never deleted.
async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let current = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&current, Role::Employee)?;
    let mut patch = Map::new();
    patch.insert("is_active".to_string(), json!(false));
    state.gateway().update(&actor, &PROFILES, id, patch).await?;
    Ok(Json(json!({ "success": true })))
}
