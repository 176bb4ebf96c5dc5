//! Firm-admin account management. Super admin only: firm admins are
//! provisioned for a firm by cross-firm staff, never by each other.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::gateway::PROFILES;
use crate::middleware::AuthUser;
use crate::policy::Role;
use crate::state::AppState;

use super::{ensure_profile_kind, ensure_role, list_filter, scrub, to_record, ListParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admins", get(list).post(create))
        .route("/api/admins/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAdmin {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Initial password; the stored record only ever carries the hash.
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateAdmin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

fn role_base() -> Map<String, Value> {
    let mut base = Map::new();
    base.insert("role".to_string(), json!(Role::FirmAdmin.as_str()));
    base
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    let filter = list_filter(&params, &PROFILES, &["first_name", "last_name", "email"], role_base());
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
    ensure_role(&actor, &[Role::SuperAdmin])?;
    let record = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&record, Role::FirmAdmin)?;
    Ok(Json(json!({ "success": true, "data": scrub(record) })))
}

async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateAdmin>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let mut record = to_record(&payload)?;
    record.insert("role".to_string(), json!(Role::FirmAdmin.as_str()));
    record.insert("is_active".to_string(), json!(true));
    let hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    record.insert("password_hash".to_string(), json!(hash));

    let created = state.gateway().create(&actor, &PROFILES, record).await?;
    Ok(Json(json!({ "success": true, "data": scrub(created) })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAdmin>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    let current = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&current, Role::FirmAdmin)?;
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
    ensure_role(&actor, &[Role::SuperAdmin])?;
    let current = state.gateway().read(&actor, &PROFILES, id).await?;
    ensure_profile_kind(&current, Role::FirmAdmin)?;
    let mut patch = Map::new();
    patch.insert("is_active".to_string(), json!(false));
    state.gateway().update(&actor, &PROFILES, id, patch).await?;
    Ok(Json(json!({ "success": true })))
}
