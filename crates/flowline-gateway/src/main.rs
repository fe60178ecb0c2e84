use std::net::SocketAddr;
use std::sync::Arc;

use flowline_auth::AuthGuard;
use flowline_core::config::FlowlineConfig;
use flowline_engine::{MessageOrchestrator, OrchestratorConfig};
use flowline_llm::{HttpLlmClient, LlmClient, MockLlmClient};
use flowline_store::Store;
use flowline_template::{TemplateEngine, VariableRegistry};
use tracing::info;

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // explicit path > FLOWLINE_CONFIG env > ./flowline.toml
    let config_path = std::env::var("FLOWLINE_CONFIG").ok();
    let config = FlowlineConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        FlowlineConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .init();

    let store = Store::open(
        &config.database.path,
        config.database.pool_size,
        config.database.pool_acquire_timeout_ms,
    )?;

    let auth = Arc::new(AuthGuard::new(
        store.clone(),
        config.master_api_key.clone(),
        config.rate_limit.admin_writes_per_min as usize,
        config.rate_limit.message_ingress_per_min as usize,
        config.rate_limit.global_per_day as usize,
    ));

    let llm: Arc<dyn LlmClient> = if config.llm.mock || config.llm.api_key.is_none() {
        info!("LLM backend: in-process mock client");
        Arc::new(MockLlmClient::new(store.clone()))
    } else {
        info!(base_url = %config.llm.base_url, model = %config.llm.model, "LLM backend: HTTP client");
        Arc::new(HttpLlmClient::new(
            store.clone(),
            config.llm.base_url.clone(),
            config.llm.api_key.clone().expect("checked above"),
            config.llm.model.clone(),
            config.llm.timeout_ms,
        ))
    };

    let orchestrator = Arc::new(MessageOrchestrator::new(
        store.clone(),
        llm,
        VariableRegistry::seeded(),
        OrchestratorConfig::default(),
    ));

    let bind = config.server.bind.clone();
    let port = config.server.port;

    let state = Arc::new(app::AppState {
        templates: TemplateEngine::new(store.clone()),
        config,
        store,
        auth,
        orchestrator,
    });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("flowline gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
