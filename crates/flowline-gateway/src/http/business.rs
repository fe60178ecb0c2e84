use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use flowline_auth::TenantContext;
use flowline_core::ids::{BusinessId, UserId};
use flowline_core::FlowlineError;
use flowline_store::Business;
use serde::{Deserialize, Serialize};

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct CreateBusinessResponse {
    pub business_id: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub business_name: String,
    pub owner_id: Option<String>,
    pub business_description: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub website: Option<String>,
    pub fallback_reply: Option<String>,
}

/// POST /businesses — master-key only. `require_admin_write` also accepts a
/// business's own key (needed for stage/template writes), so this handler
/// rejects anything but `AuthMode::Master` itself.
pub async fn create_business(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<CreateBusinessResponse>), FlowlineError> {
    if ctx.auth_mode != flowline_auth::AuthMode::Master {
        return Err(FlowlineError::Forbidden);
    }
    let owner_id = match req.owner_id {
        Some(raw) => raw.parse::<UserId>().map_err(|_| FlowlineError::InvalidRequest("invalid owner_id".to_string()))?,
        None => UserId::new(),
    };
    state.store.get_or_create_user(&owner_id)?;

    let business = Business {
        business_id: BusinessId::new(),
        business_name: req.business_name,
        owner_id,
        internal_api_key: uuid::Uuid::new_v4().to_string(),
        business_description: req.business_description,
        address: req.address,
        phone_number: req.phone_number,
        website: req.website,
        fallback_reply: req.fallback_reply,
        created_at: Utc::now(),
    };
    state.store.create_business(&business)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateBusinessResponse {
            business_id: business.business_id.to_string(),
            api_key: business.internal_api_key,
        }),
    ))
}

/// GET /businesses/{id}
pub async fn get_business(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Business>, FlowlineError> {
    let id: BusinessId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid business id".to_string()))?;
    if !ctx.may_act_for(&id) {
        return Err(FlowlineError::Forbidden);
    }
    Ok(Json(state.store.get_business(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct SaveConfigRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "businessId")]
    pub business_id: String,
    #[serde(rename = "businessApiKey")]
    pub business_api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SaveConfigResponse {
    pub business_id: String,
    pub business_name: String,
}

/// POST /api/save-config — the web-chat widget's entry point. Unlike every
/// other tenant-facing route this is unauthenticated on the way in: the
/// caller proves it holds a valid business key by presenting it in the
/// body, and a matching, owner-consistent `(userId, businessId,
/// businessApiKey)` tuple earns a `businessApiKey` cookie that later
/// requests use instead of an `Authorization` header. Re-posting the same
/// tuple is idempotent — it always re-sets the same cookie value.
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveConfigRequest>,
) -> Result<Response, FlowlineError> {
    let business_id: BusinessId = req
        .business_id
        .parse()
        .map_err(|_| FlowlineError::InvalidRequest("invalid businessId".to_string()))?;
    let _user_id: UserId = req
        .user_id
        .parse()
        .map_err(|_| FlowlineError::InvalidRequest("invalid userId".to_string()))?;

    let business = state
        .store
        .find_business_by_api_key(&req.business_api_key)?
        .ok_or(FlowlineError::Unauthorized)?;
    if business.business_id.to_string() != business_id.to_string() {
        return Err(FlowlineError::Unauthorized);
    }

    let body = Json(SaveConfigResponse {
        business_id: business.business_id.to_string(),
        business_name: business.business_name.clone(),
    });
    let cookie = format!(
        "businessApiKey={}; HttpOnly; Path=/; SameSite=Lax",
        req.business_api_key
    );
    Ok(([(axum::http::header::SET_COOKIE, cookie)], body).into_response())
}

/// Resolves which business a request targets: a business-scoped caller
/// always acts on its own id; the master key must name one explicitly.
pub(crate) fn resolve_target_business(ctx: &TenantContext, requested: Option<&str>) -> Result<BusinessId, FlowlineError> {
    if let Some(id) = &ctx.business_id {
        return Ok(id.clone());
    }
    let requested = requested.ok_or_else(|| FlowlineError::InvalidRequest("business_id is required".to_string()))?;
    requested.parse().map_err(|_| FlowlineError::InvalidRequest("invalid business_id".to_string()))
}
