//! Resource gateways: policy-checked CRUD over the external store.
//!
//! Every read applies [`policy::scope_filter`] and every mutation applies
//! [`policy::authorize`] before the store is touched. Denials short-circuit
//! into typed errors; store failures pass through unmapped.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::FilterData;
use crate::policy::{self, Actor, Decision, DenyReason, Operation, Role, ScopeFilter};
use crate::store::{DataStore, Record, StoreError};

/// A store collection and the column carrying its tenant affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub tenant_column: &'static str,
}

impl Collection {
    /// The firms table is the tenant root: its tenant key is its own id and
    /// only super admins may create or reshape rows in it.
    pub fn is_tenant_root(&self) -> bool {
        self.tenant_column == "id"
    }
}

pub const FIRMS: Collection = Collection { name: "firms", tenant_column: "id" };
pub const PROFILES: Collection = Collection { name: "user_profiles", tenant_column: "firm_id" };
pub const LOCATIONS: Collection = Collection { name: "locations", tenant_column: "firm_id" };
pub const SAFETY_CLASSES: Collection =
    Collection { name: "safety_classes", tenant_column: "firm_id" };
pub const DRILLS: Collection = Collection { name: "drills", tenant_column: "firm_id" };
pub const EMERGENCIES: Collection = Collection { name: "emergencies", tenant_column: "firm_id" };

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("operation not permitted")]
    Forbidden(DenyReason),

    #[error("record not found")]
    NotFound,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn ensure(decision: Decision) -> Result<(), GatewayError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(GatewayError::Forbidden(reason)),
    }
}

/// The firm owning a record, read from its tenant column.
fn record_firm(record: &Record, collection: &Collection) -> Option<Uuid> {
    record
        .get(collection.tenant_column)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

pub struct Gateway {
    store: Arc<dyn DataStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        collection: &Collection,
        mut raw: FilterData,
    ) -> Result<Vec<Record>, GatewayError> {
        match policy::scope_filter(actor) {
            ScopeFilter::Unrestricted => {}
            ScopeFilter::Firm(firm) => {
                raw.where_clause =
                    Some(merge_scope(raw.where_clause.take(), collection.tenant_column, firm));
            }
            ScopeFilter::DenyAll => return Err(self.deny_all(actor)),
        }
        Ok(self.store.query(collection.name, raw).await?)
    }

    /// Count records in the actor's scope, ignoring limit/offset.
    pub async fn count(
        &self,
        actor: &Actor,
        collection: &Collection,
        mut raw: FilterData,
    ) -> Result<i64, GatewayError> {
        match policy::scope_filter(actor) {
            ScopeFilter::Unrestricted => {}
            ScopeFilter::Firm(firm) => {
                raw.where_clause =
                    Some(merge_scope(raw.where_clause.take(), collection.tenant_column, firm));
            }
            ScopeFilter::DenyAll => return Err(self.deny_all(actor)),
        }
        Ok(self.store.count(collection.name, raw).await?)
    }

    pub async fn read(
        &self,
        actor: &Actor,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Record, GatewayError> {
        ensure(policy::require_role(actor, &[Role::SuperAdmin, Role::FirmAdmin]))?;
        let record = self
            .store
            .get(collection.name, id)
            .await?
            .ok_or(GatewayError::NotFound)?;
        ensure(policy::authorize(actor, Operation::Read, record_firm(&record, collection)))?;
        Ok(record)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        collection: &Collection,
        mut payload: Record,
    ) -> Result<Record, GatewayError> {
        match actor.role {
            Role::SuperAdmin => {
                if !collection.is_tenant_root() {
                    // A super admin acts across tenants, so the target firm
                    // must be explicit in the payload
                    let firm = record_firm(&payload, collection).ok_or_else(|| {
                        GatewayError::InvalidPayload(format!(
                            "{} is required",
                            collection.tenant_column
                        ))
                    })?;
                    ensure(policy::authorize(actor, Operation::Create, Some(firm)))?;
                }
            }
            Role::FirmAdmin => {
                if collection.is_tenant_root() {
                    return Err(GatewayError::Forbidden(DenyReason::InsufficientRole));
                }
                let firm = actor
                    .firm_id
                    .ok_or(GatewayError::Forbidden(DenyReason::TenantMismatch))?;
                // The actor's own firm always wins over whatever the client
                // put in the payload
                payload.insert(collection.tenant_column.to_string(), json!(firm));
            }
            Role::Employee => {
                return Err(GatewayError::Forbidden(DenyReason::InsufficientRole));
            }
        }
        Ok(self.store.insert(collection.name, payload).await?)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        collection: &Collection,
        id: Uuid,
        mut patch: Record,
    ) -> Result<Record, GatewayError> {
        let current = self
            .store
            .get(collection.name, id)
            .await?
            .ok_or(GatewayError::NotFound)?;
        let owner = record_firm(&current, collection);
        ensure(policy::authorize(actor, Operation::Update, owner))?;

        // Moving a record to another tenant is a super-admin operation
        if let Some(target) = patch.get(collection.tenant_column) {
            let target_firm = target.as_str().and_then(|s| Uuid::parse_str(s).ok());
            if target_firm != owner {
                if actor.role != Role::SuperAdmin {
                    return Err(GatewayError::Forbidden(DenyReason::TenantMismatch));
                }
            } else if actor.role != Role::SuperAdmin {
                patch.remove(collection.tenant_column);
            }
        }

        self.store
            .update(collection.name, id, patch)
            .await?
            .ok_or(GatewayError::NotFound)
    }

    pub async fn delete(
        &self,
        actor: &Actor,
        collection: &Collection,
        id: Uuid,
    ) -> Result<(), GatewayError> {
        let current = self
            .store
            .get(collection.name, id)
            .await?
            .ok_or(GatewayError::NotFound)?;
        ensure(policy::authorize(actor, Operation::Delete, record_firm(&current, collection)))?;
        if self.store.delete(collection.name, id).await? {
            Ok(())
        } else {
            Err(GatewayError::NotFound)
        }
    }

    fn deny_all(&self, actor: &Actor) -> GatewayError {
        let reason = match actor.role {
            Role::Employee => DenyReason::InsufficientRole,
            _ => DenyReason::TenantMismatch,
        };
        GatewayError::Forbidden(reason)
    }
}

/// AND the tenant predicate into a caller-supplied WHERE document.
///
/// Any top-level tenant value the caller supplied is dropped first; values
/// smuggled deeper inside `$and`/`$or` can only narrow the result further
/// since the scope predicate is conjoined at the top.
fn merge_scope(raw: Option<Value>, tenant_column: &str, firm: Uuid) -> Value {
    let scope = json!({ tenant_column: firm });
    match raw {
        Some(Value::Object(mut map)) => {
            map.remove(tenant_column);
            if map.is_empty() {
                scope
            } else {
                json!({ "$and": [Value::Object(map), scope] })
            }
        }
        // Non-object documents are rejected later by the filter compiler;
        // scope still applies
        Some(other) => json!({ "$and": [other, scope] }),
        None => scope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_scope_replaces_caller_tenant() {
        let firm = Uuid::new_v4();
        let merged = merge_scope(Some(json!({ "firm_id": "other-firm" })), "firm_id", firm);
        assert_eq!(merged, json!({ "firm_id": firm }));
    }

    #[test]
    fn merge_scope_conjoins_remaining_filters() {
        let firm = Uuid::new_v4();
        let merged = merge_scope(
            Some(json!({ "firm_id": "other-firm", "status": "open" })),
            "firm_id",
            firm,
        );
        assert_eq!(merged, json!({ "$and": [{ "status": "open" }, { "firm_id": firm }] }));
    }

    #[test]
    fn record_firm_reads_tenant_column() {
        let firm = Uuid::new_v4();
        let record = json!({ "id": Uuid::new_v4(), "firm_id": firm })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_firm(&record, &LOCATIONS), Some(firm));
        assert_eq!(record_firm(&record, &FIRMS), record_firm(&record, &FIRMS));

        let unowned = json!({ "id": Uuid::new_v4(), "firm_id": null })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_firm(&unowned, &LOCATIONS), None);
    }
}
