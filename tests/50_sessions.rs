mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use safework_api::auth;
use safework_api::error::ApiError;
use safework_api::middleware::AuthUser;
use safework_api::policy::Role;
use safework_api::services::SessionService;
use safework_api::store::DataStore;

fn seed_admin(
    store: &common::MemStore,
    email: &str,
    password: &str,
    role: &str,
    active: bool,
) -> (Uuid, Uuid) {
    let firm = Uuid::new_v4();
    let hash = auth::hash_password(password).unwrap();
    let id = store.seed(
        "user_profiles",
        json!({
            "email": email,
            "password_hash": hash,
            "role": role,
            "firm_id": firm,
            "first_name": "Pat",
            "last_name": "Reyes",
            "is_active": active,
        }),
    );
    (id, firm)
}

#[tokio::test]
async fn login_issues_token_for_valid_credentials() -> Result<()> {
    let store = common::MemStore::new();
    let (id, firm) = seed_admin(&store, "admin@acme.example", "hunter2", "firm_admin", true);

    let sessions = SessionService::new(store.clone());
    let outcome = sessions.login("admin@acme.example", "hunter2").await?;

    assert!(!outcome.token.is_empty());
    assert!(outcome.expires_in_secs > 0);
    assert_eq!(outcome.actor.id, id);
    assert_eq!(outcome.actor.role, Role::FirmAdmin);
    assert_eq!(outcome.actor.firm_id, Some(firm));

    // Login stamps last_login_at on the profile row
    let row = &store.rows("user_profiles")[0];
    assert!(row.get("last_login_at").is_some());
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_password_and_unknown_email_alike() -> Result<()> {
    let store = common::MemStore::new();
    seed_admin(&store, "admin@acme.example", "hunter2", "firm_admin", true);

    let sessions = SessionService::new(store.clone());

    let wrong_pw = sessions.login("admin@acme.example", "hunter3").await.unwrap_err();
    let unknown = sessions.login("nobody@acme.example", "hunter2").await.unwrap_err();

    // Same message for both, so probing cannot distinguish accounts
    assert_eq!(wrong_pw.message(), "Invalid email or password");
    assert_eq!(unknown.message(), "Invalid email or password");
    assert!(matches!(wrong_pw, ApiError::Unauthenticated(_)));
    assert!(matches!(unknown, ApiError::Unauthenticated(_)));
    Ok(())
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() -> Result<()> {
    let store = common::MemStore::new();
    seed_admin(&store, "former@acme.example", "hunter2", "firm_admin", false);

    let sessions = SessionService::new(store.clone());
    let err = sessions.login("former@acme.example", "hunter2").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated(_)));
    Ok(())
}

#[tokio::test]
async fn resolve_actor_reads_the_profile_row_not_the_token() -> Result<()> {
    let store = common::MemStore::new();
    let (id, firm) = seed_admin(&store, "admin@acme.example", "hunter2", "firm_admin", true);

    let sessions = SessionService::new(store.clone());
    // The token still says firm_admin, but the row has since been demoted
    store
        .update("user_profiles", id, json!({ "role": "employee" }).as_object().cloned().unwrap())
        .await?;

    let auth_user = AuthUser {
        user_id: id,
        email: "admin@acme.example".to_string(),
        role: Role::FirmAdmin,
        firm_id: Some(firm),
    };
    let actor = sessions.resolve_actor(&auth_user).await?;
    assert_eq!(actor.role, Role::Employee);
    Ok(())
}

#[tokio::test]
async fn resolve_actor_without_profile_row_is_unauthenticated() -> Result<()> {
    let store = common::MemStore::new();
    let sessions = SessionService::new(store.clone());

    let auth_user = AuthUser {
        user_id: Uuid::new_v4(),
        email: "ghost@acme.example".to_string(),
        role: Role::FirmAdmin,
        firm_id: Some(Uuid::new_v4()),
    };
    let err = sessions.resolve_actor(&auth_user).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated(_)));
    Ok(())
}

#[tokio::test]
async fn resolve_actor_rejects_deactivated_profile() -> Result<()> {
    let store = common::MemStore::new();
    let (id, firm) = seed_admin(&store, "former@acme.example", "hunter2", "firm_admin", false);

    let sessions = SessionService::new(store.clone());
    let auth_user = AuthUser {
        user_id: id,
        email: "former@acme.example".to_string(),
        role: Role::FirmAdmin,
        firm_id: Some(firm),
    };
    let err = sessions.resolve_actor(&auth_user).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated(_)));
    Ok(())
}
