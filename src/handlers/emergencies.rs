use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::gateway::EMERGENCIES;
use crate::middleware::AuthUser;
use crate::policy::Role;
use crate::state::AppState;

use super::{ensure_role, list_filter, to_record, ListParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/emergencies", get(list).post(create))
        .route("/api/emergencies/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEmergency {
    /// Short incident code shown in the log table, e.g. "WB2154".
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
    /// "open" or "resolved"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEmergency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let filter = list_filter(&params, &EMERGENCIES, &["code", "status"], Map::new());
    let rows = state.gateway().list(&actor, &EMERGENCIES, filter).await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    let record = state.gateway().read(&actor, &EMERGENCIES, id).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateEmergency>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    if payload.code.trim().is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }
    let mut record = to_record(&payload)?;
    record.entry("status".to_string()).or_insert_with(|| json!("open"));
    record
        .entry("reported_at".to_string())
        .or_insert_with(|| json!(Utc::now().to_rfc3339()));
    let created = state.gateway().create(&actor, &EMERGENCIES, record).await?;
    Ok(Json(json!({ "success": true, "data": created })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmergency>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let record = state.gateway().update(&actor, &EMERGENCIES, id, to_record(&payload)?).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    state.gateway().delete(&actor, &EMERGENCIES, id).await?;
    Ok(Json(json!({ "success": true })))
}
