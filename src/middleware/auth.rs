use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::auth::Claims;
use crate::config;
use crate::error::ApiError;
use crate::policy::Role;

/// Authenticated user context extracted from the session token.
///
/// This is only who the token says the caller is; the session resolver still
/// loads the profile row before any policy decision is made.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub firm_id: Option<Uuid>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            firm_id: claims.firm_id,
        }
    }
}

/// JWT authentication middleware that validates tokens and injects the user
/// context into the request extensions.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_user = authenticate(&headers).map_err(|e| e.into_response())?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Rejections carry one fixed message per failure class; the specific cause
/// (header shape, signature, expiry) goes to the log, not the client.
fn authenticate(headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = extract_jwt_from_headers(headers).map_err(|detail| {
        tracing::debug!("authorization header rejected: {}", detail);
        ApiError::unauthenticated("Authentication required")
    })?;

    let claims = validate_jwt(&token).map_err(|detail| {
        tracing::debug!("session token rejected: {}", detail);
        ApiError::unauthenticated("Invalid or expired session token")
    })?;

    Ok(AuthUser::from(claims))
}

fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty session token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("token validation failed: {}", e))?;

    Ok(token_data.claims)
}
