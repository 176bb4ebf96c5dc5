//! Session resolution: from token identity to a policy [`Actor`].
//!
//! The profile row in `user_profiles` is the source of truth for role and
//! firm affiliation. Token claims are only used to locate the row, so a role
//! change or deactivation takes effect on the next request, not at token
//! expiry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::gateway::PROFILES;
use crate::middleware::AuthUser;
use crate::policy::{Actor, Role};
use crate::store::{DataStore, Record};

pub struct SessionService {
    store: Arc<dyn DataStore>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub actor: Actor,
    pub expires_in_secs: i64,
}

impl SessionService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Load the actor behind an authenticated request.
    ///
    /// A missing profile row is expected during the window between account
    /// creation and profile provisioning and resolves to 401, never a crash.
    pub async fn resolve_actor(&self, auth: &AuthUser) -> Result<Actor, ApiError> {
        let profile = self
            .find_profile(json!({ "id": auth.user_id }))
            .await?
            .ok_or_else(|| ApiError::unauthenticated("User profile not provisioned"))?;

        actor_from_profile(&profile)
    }

    /// Verify credentials and issue a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        // One generic message for unknown email and wrong password alike
        let invalid = || ApiError::unauthenticated("Invalid email or password");

        let profile = self
            .find_profile(json!({ "email": email }))
            .await?
            .ok_or_else(invalid)?;

        let hash = profile
            .get("password_hash")
            .and_then(|v| v.as_str())
            .ok_or_else(invalid)?;
        if !auth::verify_password(password, hash) {
            return Err(invalid());
        }

        let actor = actor_from_profile(&profile)?;

        let claims = Claims::new(actor.id, actor.email.clone(), actor.role, actor.firm_id);
        let expires_in_secs = claims.exp - claims.iat;
        let token = auth::generate_jwt(&claims).map_err(|e| {
            tracing::error!("token generation failed: {}", e);
            ApiError::internal_server_error("Could not create session")
        })?;

        self.touch_last_login(actor.id).await;

        Ok(LoginOutcome { token, actor, expires_in_secs })
    }

    async fn find_profile(&self, where_clause: serde_json::Value) -> Result<Option<Record>, ApiError> {
        let filter = FilterData {
            where_clause: Some(where_clause),
            limit: Some(1),
            ..Default::default()
        };
        let rows = self.store.query(PROFILES.name, filter).await?;
        Ok(rows.into_iter().next())
    }

    /// Best effort; a failed stamp never fails the login.
    async fn touch_last_login(&self, user_id: Uuid) {
        let patch = json!({ "last_login_at": Utc::now().to_rfc3339() });
        if let Err(e) = self
            .store
            .update(PROFILES.name, user_id, patch.as_object().cloned().unwrap_or_default())
            .await
        {
            tracing::warn!("failed to stamp last_login_at for {}: {}", user_id, e);
        }
    }
}

fn actor_from_profile(profile: &Record) -> Result<Actor, ApiError> {
    let active = profile.get("is_active").and_then(|v| v.as_bool()).unwrap_or(true);
    if !active {
        return Err(ApiError::unauthenticated("Account deactivated"));
    }

    let id = profile
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            tracing::error!("profile row has no usable id");
            ApiError::internal_server_error("An error occurred while processing your request")
        })?;

    let email = profile
        .get("email")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let role = profile
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(Role::parse)
        .ok_or_else(|| {
            tracing::error!("profile {} has an unknown role", id);
            ApiError::unauthenticated("Account misconfigured")
        })?;

    let firm_id = profile
        .get("firm_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    Ok(Actor::new(id, email, role, firm_id))
}
