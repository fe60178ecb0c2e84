use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use flowline_auth::AuthGuard;
use flowline_core::config::FlowlineConfig;
use flowline_engine::MessageOrchestrator;
use flowline_store::Store;
use flowline_template::TemplateEngine;

/// Central shared state — passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: FlowlineConfig,
    pub store: Store,
    pub auth: Arc<AuthGuard>,
    pub orchestrator: Arc<MessageOrchestrator>,
    pub templates: TemplateEngine,
}

/// Assembles the full Axum router: master/business-scoped admin routes,
/// the message ingress + webhook routes, and the public health checks —
/// one `Router::new()` with every route wired, `TraceLayer` + `CorsLayer`
/// applied once at the end.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_write = Router::new()
        .route("/businesses", post(crate::http::business::create_business))
        .route("/stages", post(crate::http::stage::create_stage))
        .route("/stages/{id}", put(crate::http::stage::update_stage))
        .route("/stages/{id}", axum::routing::delete(crate::http::stage::delete_stage))
        .route("/templates", post(crate::http::template::create_template))
        .route("/templates/{id}", put(crate::http::template::update_template))
        .route("/templates/{id}", axum::routing::delete(crate::http::template::delete_template))
        .layer(from_fn_with_state(state.auth.clone(), flowline_auth::require_admin_write));

    let admin_read = Router::new()
        .route("/businesses/{id}", get(crate::http::business::get_business))
        .route("/stages", get(crate::http::stage::list_stages))
        .route("/stages/{id}", get(crate::http::stage::get_stage))
        .route("/templates", get(crate::http::template::list_templates))
        .route("/templates/{id}", get(crate::http::template::get_template))
        .route("/conversations/{user_id}", get(crate::http::message::list_conversations))
        .layer(from_fn_with_state(state.auth.clone(), flowline_auth::require_admin));

    let message_ingress = Router::new()
        .route("/message", post(crate::http::message::post_message))
        .layer(from_fn_with_state(state.auth.clone(), flowline_auth::require_message_ingress));

    let public = Router::new()
        .route(
            "/webhooks/{platform}",
            get(crate::http::webhook::verify_challenge).post(crate::http::webhook::receive_webhook),
        )
        .route("/api/save-config", post(crate::http::business::save_config))
        .route("/health", get(crate::http::health::health))
        .route("/ping", get(crate::http::health::ping));

    Router::new()
        .merge(admin_write)
        .merge(admin_read)
        .merge(message_ingress)
        .merge(public)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
