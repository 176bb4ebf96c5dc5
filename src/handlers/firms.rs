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
use crate::gateway::FIRMS;
use crate::middleware::AuthUser;
use crate::policy::Role;
use crate::state::AppState;

use super::{ensure_role, list_filter, to_record, ListParams};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/firms", get(list).post(create))
        .route("/api/firms/:id", get(get_one).put(update).delete(remove))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFirm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateFirm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// GET /api/firms - super admin sees all firms; a firm admin sees their own
async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let filter = list_filter(&params, &FIRMS, &["name", "industry"], Map::new());
    let rows = state.gateway().list(&actor, &FIRMS, filter).await?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    let record = state.gateway().read(&actor, &FIRMS, id).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

/// POST /api/firms - super admin only
async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateFirm>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let record = state.gateway().create(&actor, &FIRMS, to_record(&payload)?).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFirm>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    let record = state.gateway().update(&actor, &FIRMS, id, to_record(&payload)?).await?;
    Ok(Json(json!({ "success": true, "data": record })))
}

async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin])?;
    state.gateway().delete(&actor, &FIRMS, id).await?;
    Ok(Json(json!({ "success": true })))
}
