//! Dashboard overview counts, scoped like every other read: a firm admin
//! sees their own firm's numbers, a super admin sees everything and may
//! narrow to one firm with `?firm=`.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filter::FilterData;
use crate::gateway::{Gateway, DRILLS, EMERGENCIES, FIRMS, LOCATIONS, PROFILES, SAFETY_CLASSES};
use crate::middleware::AuthUser;
use crate::policy::{Actor, Role};
use crate::state::AppState;

use super::ensure_role;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/stats", get(overview))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub firm: Option<Uuid>,
}

const DRILL_STATUSES: &[&str] = &["scheduled", "in_progress", "completed", "cancelled"];

async fn overview(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<StatsParams>,
) -> Result<Json<Value>, ApiError> {
    let actor = state.sessions().resolve_actor(&auth).await?;
    ensure_role(&actor, &[Role::SuperAdmin, Role::FirmAdmin])?;
    let gateway = state.gateway();

    let employees = count_profiles(&gateway, &actor, &params, Role::Employee).await?;
    let admins = count_profiles(&gateway, &actor, &params, Role::FirmAdmin).await?;
    let locations = gateway.count(&actor, &LOCATIONS, narrowed(&params, Map::new())).await?;
    let safety_classes =
        gateway.count(&actor, &SAFETY_CLASSES, narrowed(&params, Map::new())).await?;

    let drills_total = gateway.count(&actor, &DRILLS, narrowed(&params, Map::new())).await?;
    let mut drills_by_status = Map::new();
    for status in DRILL_STATUSES {
        let mut base = Map::new();
        base.insert("status".to_string(), json!(status));
        let n = gateway.count(&actor, &DRILLS, narrowed(&params, base)).await?;
        drills_by_status.insert(status.to_string(), json!(n));
    }

    let emergencies_total =
        gateway.count(&actor, &EMERGENCIES, narrowed(&params, Map::new())).await?;
    let mut open_base = Map::new();
    open_base.insert("status".to_string(), json!("open"));
    let emergencies_open =
        gateway.count(&actor, &EMERGENCIES, narrowed(&params, open_base)).await?;

    let mut data = json!({
        "employees": employees,
        "admins": admins,
        "locations": locations,
        "safety_classes": safety_classes,
        "drills": { "total": drills_total, "by_status": drills_by_status },
        "emergencies": { "total": emergencies_total, "open": emergencies_open },
    });
    if actor.role == Role::SuperAdmin {
        let firms = gateway.count(&actor, &FIRMS, FilterData::default()).await?;
        data["firms"] = json!(firms);
    }

    Ok(Json(json!({ "success": true, "data": data })))
}

async fn count_profiles(
    gateway: &Gateway,
    actor: &Actor,
    params: &StatsParams,
    role: Role,
) -> Result<i64, ApiError> {
    let mut base = Map::new();
    base.insert("role".to_string(), json!(role.as_str()));
    Ok(gateway.count(actor, &PROFILES, narrowed(params, base)).await?)
}

fn narrowed(params: &StatsParams, mut base: Map<String, Value>) -> FilterData {
    if let Some(firm) = params.firm {
        base.insert("firm_id".to_string(), json!(firm));
    }
    FilterData {
        where_clause: if base.is_empty() { None } else { Some(Value::Object(base)) },
        ..Default::default()
    }
}
