//! Gateway server: executor bootstrap and the axum router

use crate::api;
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use interlude_agent::Executor;
use interlude_core::{InterludeConfig, ProviderConfig, ProviderKind};
use interlude_llm::{AnthropicProvider, LlmProvider, ScriptedProvider};
use interlude_tools::{create_default_registry, AssistanceMode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub executor: Executor,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            started_at: Instant::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

pub const REVIEW_PREFIX: &str = "/customize-state";
pub const QUERY_PREFIX: &str = "/human-loop";

pub fn build_provider(config: &ProviderConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    match config.kind {
        ProviderKind::Scripted => {
            info!("Using scripted echo provider (no network)");
            Ok(Arc::new(ScriptedProvider::echo()))
        }
        ProviderKind::Anthropic => {
            let api_key = std::env::var(&config.api_key_env)
                .with_context(|| format!("{} not set", config.api_key_env))?;
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(api_url) = &config.api_url {
                let url = format!("{}/v1/messages", api_url.trim_end_matches('/'));
                info!("Using custom API URL: {}", url);
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
    }
}

/// Executor with the default tools and an in-memory checkpoint store.
pub fn build_executor(config: &InterludeConfig, mode: AssistanceMode) -> anyhow::Result<Executor> {
    let tools = create_default_registry(mode)?;
    info!("Registered tools: {:?}", tools.list());
    let provider = build_provider(&config.provider)?;
    Ok(Executor::with_memory_store(provider, tools, config.agent.clone()))
}

fn routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(api::health))
        .route("/chat", post(api::chat))
        .route("/chat/stream", get(api::chat_stream))
        .route("/respond", post(api::respond))
        .route("/respond/stream", get(api::respond_stream))
        .route("/threads/:thread_id", get(api::thread))
}

fn with_layers(app: Router) -> Router {
    app.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Routes served by a single executor.
pub fn router(state: SharedState) -> Router {
    with_layers(routes().with_state(state))
}

/// One executor per human-assistance flavour. The flavour named by `default`
/// also answers at the root; each flavour answers under its own prefix.
pub fn flavoured_router(review: SharedState, query: SharedState, default: AssistanceMode) -> Router {
    let root = match default {
        AssistanceMode::Review => review.clone(),
        AssistanceMode::Query => query.clone(),
    };
    let app = Router::new()
        .merge(routes().with_state(root))
        .nest(REVIEW_PREFIX, routes().with_state(review))
        .nest(QUERY_PREFIX, routes().with_state(query));
    with_layers(app)
}

pub async fn start_gateway(config: InterludeConfig, mode: AssistanceMode) -> anyhow::Result<()> {
    let review = Arc::new(AppState::new(build_executor(&config, AssistanceMode::Review)?));
    let query = Arc::new(AppState::new(build_executor(&config, AssistanceMode::Query)?));
    let app = flavoured_router(review, query, mode);

    let bind_addr: SocketAddr = format!("{}:{}", config.gateway.bind.to_addr(), config.gateway.port)
        .parse()
        .context("invalid bind address")?;

    info!("Interlude Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Model:        {}", config.agent.model);
    info!("  Max steps:    {}", config.agent.max_steps);
    info!("  Stream:       http://{}/chat/stream?message=...", bind_addr);
    info!("  Flavours:     {} (review), {} (query), root = {:?}", REVIEW_PREFIX, QUERY_PREFIX, mode);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
