use axum::{
    extract::State,
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - verify credentials and issue a session token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let outcome = state.sessions().login(payload.email.trim(), &payload.password).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": outcome.token,
            "expires_in": outcome.expires_in_secs,
            "user": {
                "id": outcome.actor.id,
                "email": outcome.actor.email,
                "role": outcome.actor.role,
                "firm_id": outcome.actor.firm_id,
            }
        }
    })))
}

/// POST /auth/logout - stateless acknowledgment; the client discards the token
pub async fn logout() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// GET /auth/whoami - the actor as the policy sees it right now
pub async fn whoami(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "id": actor.id,
            "email": actor.email,
            "role": actor.role,
            "firm_id": actor.firm_id,
        }
    })))
}
