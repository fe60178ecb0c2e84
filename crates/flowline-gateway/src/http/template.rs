use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use flowline_auth::TenantContext;
use flowline_core::ids::TemplateId;
use flowline_core::FlowlineError;
use flowline_store::{Template, TemplateType};
use serde::Deserialize;

use crate::app::AppState;
use crate::http::business::resolve_target_business;

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub business_id: Option<String>,
    pub template_name: String,
    pub template_type: String,
    pub content: String,
    pub system_prompt: Option<String>,
}

fn parse_template_type(raw: &str) -> Result<TemplateType, FlowlineError> {
    TemplateType::parse(raw).ok_or_else(|| FlowlineError::InvalidRequest(format!("unknown template_type '{raw}'")))
}

/// POST /templates — discovers and records variable usage via the
/// `TemplateEngine` facade rather than writing through `Store` directly.
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(req): Json<TemplateRequest>,
) -> Result<Json<Template>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, req.business_id.as_deref())?;
    let now = Utc::now();
    let template = Template {
        template_id: TemplateId::new(),
        business_id,
        template_name: req.template_name,
        template_type: parse_template_type(&req.template_type)?,
        content: req.content,
        system_prompt: req.system_prompt,
        created_at: now,
        updated_at: now,
    };
    state.templates.create_template(&template)?;
    Ok(Json(template))
}

/// GET /templates?business_id=...
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Template>>, FlowlineError> {
    let business_id = resolve_target_business(&ctx, query.get("business_id").map(String::as_str))?;
    Ok(Json(state.store.list_templates(&business_id)?))
}

/// GET /templates/{id}
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<Json<Template>, FlowlineError> {
    let id: TemplateId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid template id".to_string()))?;
    let template = state.store.get_template(&id)?;
    if !ctx.may_act_for(&template.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    Ok(Json(template))
}

/// PUT /templates/{id}
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> Result<Json<Template>, FlowlineError> {
    let id: TemplateId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid template id".to_string()))?;
    let existing = state.store.get_template(&id)?;
    if !ctx.may_act_for(&existing.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    let template = Template {
        template_id: id,
        business_id: existing.business_id,
        template_name: req.template_name,
        template_type: parse_template_type(&req.template_type)?,
        content: req.content,
        system_prompt: req.system_prompt,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };
    state.templates.update_template(&template)?;
    Ok(Json(template))
}

/// DELETE /templates/{id}
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, FlowlineError> {
    let id: TemplateId = id.parse().map_err(|_| FlowlineError::InvalidRequest("invalid template id".to_string()))?;
    let existing = state.store.get_template(&id)?;
    if !ctx.may_act_for(&existing.business_id) {
        return Err(FlowlineError::Forbidden);
    }
    state.store.delete_template(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
