mod common;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use safework_api::filter::FilterData;
use safework_api::gateway::{Gateway, GatewayError, DRILLS, EMERGENCIES, PROFILES};
use safework_api::policy::DenyReason;

fn where_filter(doc: serde_json::Value) -> FilterData {
    FilterData { where_clause: Some(doc), ..Default::default() }
}

#[tokio::test]
async fn firm_admin_counts_own_firm_only() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    store.seed("drills", json!({ "firm_id": firm_a, "status": "scheduled" }));
    store.seed("drills", json!({ "firm_id": firm_a, "status": "completed" }));
    store.seed("drills", json!({ "firm_id": firm_b, "status": "scheduled" }));

    let gateway = Gateway::new(store.clone());
    let admin = common::firm_admin(firm_a);

    assert_eq!(gateway.count(&admin, &DRILLS, FilterData::default()).await?, 2);

    // Status predicates narrow within the firm scope
    let scheduled = gateway
        .count(&admin, &DRILLS, where_filter(json!({ "status": "scheduled" })))
        .await?;
    assert_eq!(scheduled, 1);

    // A caller-supplied foreign firm is replaced by the scope
    let probed = gateway
        .count(&admin, &DRILLS, where_filter(json!({ "firm_id": firm_b })))
        .await?;
    assert_eq!(probed, 2);
    Ok(())
}

#[tokio::test]
async fn super_admin_counts_cross_firm_and_narrows() -> Result<()> {
    let store = common::MemStore::new();
    let firm_a = Uuid::new_v4();
    let firm_b = Uuid::new_v4();
    store.seed("emergencies", json!({ "firm_id": firm_a, "status": "open" }));
    store.seed("emergencies", json!({ "firm_id": firm_b, "status": "open" }));
    store.seed("emergencies", json!({ "firm_id": firm_b, "status": "resolved" }));

    let gateway = Gateway::new(store.clone());
    let root = common::super_admin();

    assert_eq!(gateway.count(&root, &EMERGENCIES, FilterData::default()).await?, 3);
    let narrowed = gateway
        .count(&root, &EMERGENCIES, where_filter(json!({ "firm_id": firm_b })))
        .await?;
    assert_eq!(narrowed, 2);
    Ok(())
}

#[tokio::test]
async fn employees_cannot_count_anything() -> Result<()> {
    let store = common::MemStore::new();
    let firm = Uuid::new_v4();
    store.seed("user_profiles", json!({ "firm_id": firm, "role": "employee" }));

    let gateway = Gateway::new(store.clone());
    let worker = common::employee(firm);

    let err = gateway.count(&worker, &PROFILES, FilterData::default()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(DenyReason::InsufficientRole)));
    Ok(())
}
