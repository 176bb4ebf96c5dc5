mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use safework_api::error::ApiError;
use safework_api::filter::FilterData;
use safework_api::gateway::{Gateway, GatewayError, DRILLS, FIRMS, LOCATIONS, PROFILES};
use safework_api::handlers::ensure_profile_kind;
use safework_api::policy::{DenyReason, Role};

// These tests drive the gateway directly over an in-memory store, so every
// assertion is about the tenant policy rather than SQL details.

fn where_filter(doc: serde_json::Value) -> FilterData {
    FilterData { where_clause: Some(doc), ..Default::default() }
}

#[tokio::test]
async fn firm_admin_list_is_scoped_despite_caller_filter() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    store.seed("locations", json!({ "firm_id": firm_a, "name": "Warehouse A" }));
    store.seed("locations", json!({ "firm_id": firm_a, "name": "Office A" }));
    store.seed("locations", json!({ "firm_id": firm_b, "name": "Warehouse B" }));

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    // The caller asks for the other firm's rows; the scope wins
    let rows = gateway
        .list(&admin, &LOCATIONS, where_filter(json!({ "firm_id": firm_b })))
        .await?;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["firm_id"], json!(firm_a), "leaked foreign row: {:?}", row);
    }
    Ok(())
}

#[tokio::test]
async fn super_admin_list_crosses_firms_and_narrows_on_request() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    store.seed("drills", json!({ "firm_id": firm_a, "name": "Fire drill", "status": "scheduled" }));
    store.seed("drills", json!({ "firm_id": firm_b, "name": "Evacuation", "status": "scheduled" }));

    let gateway = Gateway::new(store.clone());
    let root = common::super_admin();

    let all = gateway.list(&root, &DRILLS, FilterData::default()).await?;
    assert_eq!(all.len(), 2);

    let narrowed = gateway
        .list(&root, &DRILLS, where_filter(json!({ "firm_id": firm_b })))
        .await?;
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0]["firm_id"], json!(firm_b));
    Ok(())
}

#[tokio::test]
async fn firm_admin_create_forces_own_firm() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    let payload = json!({ "name": "Loading dock", "firm_id": firm_b })
        .as_object()
        .cloned()
        .unwrap();
    let created = gateway.create(&admin, &LOCATIONS, payload).await?;

    assert_eq!(created["firm_id"], json!(firm_a));
    let rows = store.rows("locations");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["firm_id"], json!(firm_a));
    Ok(())
}

#[tokio::test]
async fn super_admin_create_requires_explicit_firm() -> Result<()> {
    let store = common::MemStore::new();
    let gateway = Gateway::new(store.clone());
    let root = common::super_admin();

    let no_firm = json!({ "name": "Loading dock" }).as_object().cloned().unwrap();
    let err = gateway.create(&root, &LOCATIONS, no_firm).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidPayload(_)), "got: {:?}", err);
    assert_eq!(store.mutation_count(), 0);

    let firm = Uuid::new_v4();
    let with_firm = json!({ "name": "Loading dock", "firm_id": firm })
        .as_object()
        .cloned()
        .unwrap();
    let created = gateway.create(&root, &LOCATIONS, with_firm).await?;
    assert_eq!(created["firm_id"], json!(firm));
    Ok(())
}

#[tokio::test]
async fn firm_admin_cannot_create_firms() -> Result<()> {
    let store = common::MemStore::new();
    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(Uuid::new_v4());

    let payload = json!({ "name": "Shadow Firm" }).as_object().cloned().unwrap();
    let err = gateway.create(&admin, &FIRMS, payload).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));
    assert!(store.rows("firms").is_empty());
    Ok(())
}

#[tokio::test]
async fn cross_tenant_update_is_forbidden_and_store_untouched() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    let id = store.seed("locations", json!({ "firm_id": firm_b, "name": "Warehouse B" }));

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    let patch = json!({ "name": "Hijacked" }).as_object().cloned().unwrap();
    let err = gateway.update(&admin, &LOCATIONS, id, patch).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)), "got: {:?}", err);

    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.rows("locations")[0]["name"], json!("Warehouse B"));
    Ok(())
}

#[tokio::test]
async fn cross_tenant_delete_is_forbidden_and_store_untouched() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    let id = store.seed("locations", json!({ "firm_id": firm_b, "name": "Warehouse B" }));

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    let err = gateway.delete(&admin, &LOCATIONS, id).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.rows("locations").len(), 1);
    Ok(())
}

#[tokio::test]
async fn tenant_moves_are_super_admin_only() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    let id = store.seed("locations", json!({ "firm_id": firm_a, "name": "Warehouse A" }));

    let gateway = Gateway::new(store.clone());

    // An admin of the owning firm still cannot move the record out
    let admin = common::firm_admin(firm_a);
    let move_patch = json!({ "firm_id": firm_b }).as_object().cloned().unwrap();
    let err = gateway.update(&admin, &LOCATIONS, id, move_patch.clone()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));
    assert_eq!(store.rows("locations")[0]["firm_id"], json!(firm_a));

    let root = common::super_admin();
    let moved = gateway.update(&root, &LOCATIONS, id, move_patch).await?;
    assert_eq!(moved["firm_id"], json!(firm_b));
    Ok(())
}

#[tokio::test]
async fn firm_admin_without_firm_is_denied_everywhere() -> Result<()> {
    let store = common::MemStore::new();
    let firm = Uuid::new_v4();
    let id = store.seed("locations", json!({ "firm_id": firm, "name": "Warehouse" }));

    let gateway = Gateway::new(store.clone());
    let orphan = safework_api::policy::Actor::new(
        Uuid::new_v4(),
        "orphan@safework.example",
        safework_api::policy::Role::FirmAdmin,
        None,
    );

    let err = gateway.list(&orphan, &LOCATIONS, FilterData::default()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));

    let payload = json!({ "name": "New site" }).as_object().cloned().unwrap();
    let err = gateway.create(&orphan, &LOCATIONS, payload).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));

    let patch = json!({ "name": "Renamed" }).as_object().cloned().unwrap();
    let err = gateway.update(&orphan, &LOCATIONS, id, patch).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));

    assert_eq!(store.mutation_count(), 0);
    Ok(())
}

#[tokio::test]
async fn employees_are_denied_before_the_store_is_written() -> Result<()> {
    let store = common::MemStore::new();
    let firm = Uuid::new_v4();
    let id = store.seed("locations", json!({ "firm_id": firm, "name": "Warehouse" }));

    let gateway = Gateway::new(store.clone());
    let worker = common::employee(firm);

    let err = gateway.list(&worker, &LOCATIONS, FilterData::default()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));

    let err = gateway.read(&worker, &LOCATIONS, id).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));

    let payload = json!({ "name": "New site", "firm_id": firm }).as_object().cloned().unwrap();
    let err = gateway.create(&worker, &LOCATIONS, payload).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));

    let err = gateway.delete(&worker, &LOCATIONS, id).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));

    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.rows("locations").len(), 1);
    Ok(())
}

#[tokio::test]
async fn employee_surface_does_not_serve_same_firm_admin_rows() -> Result<()> {
    let store = common::MemStore::new();
    let firm = Uuid::new_v4();
    let peer_admin = store.seed(
        "user_profiles",
        json!({ "firm_id": firm, "role": "firm_admin", "is_active": true }),
    );

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm);

    // The employee handlers fetch the row and gate on its role before any
    // mutation; a fellow admin's row renders as not-found
    let current = gateway.read(&admin, &PROFILES, peer_admin).await?;
    let err = ensure_profile_kind(&current, Role::Employee).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert_eq!(store.rows("user_profiles")[0]["is_active"], json!(true));
    Ok(())
}

#[tokio::test]
async fn read_of_foreign_record_does_not_reveal_existence() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    let foreign = store.seed("locations", json!({ "firm_id": firm_b, "name": "Warehouse B" }));

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    // Typed as a denial at the gateway; the HTTP layer renders it with the
    // same not-found response a missing record gets
    let err = gateway.read(&admin, &LOCATIONS, foreign).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::TenantMismatch)));

    let missing = gateway.read(&admin, &LOCATIONS, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, GatewayError::NotFound));
    Ok(())
}
