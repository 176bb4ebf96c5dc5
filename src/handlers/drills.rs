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
use crate::gateway::DRILLS;
use crate::middleware::AuthUser;
use crate::policy::Role;
use crate::state::AppState;

use super::{ensure_role, list_filter, to_record, ListParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/drills", get(list).post(create))
        .route("/api/drills/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDrill {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// "scheduled", "completed" or "cancelled"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firm_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateDrill {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let filter = list_filter(&params, &DRILLS, &["name", "status"], Map::new());
    let rows = state.gateway().list(&actor, &DRILLS, filter).await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    let record = state.gateway().read(&actor, &DRILLS, id).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateDrill>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let mut record = to_record(&payload)?;
    record.entry("status".to_string()).or_insert_with(|| json!("scheduled"));
    let created = state.gateway().create(&actor, &DRILLS, record).await?;
    Ok(Json(json!({ "success": true, "data": created })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDrill>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let record = state.gateway().update(&actor, &DRILLS, id, to_record(&payload)?).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    state.gateway().delete(&actor, &DRILLS, id).await?;
    Ok(Json(json!({ "success": true })))
}
