//! Phone advisor HTTP Server
//!
//! Axum-based server providing the conversation REST API and the
//! server-sent-event stream for agent turns.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{
    AgentBuilder, ChatService, LlmProvider, MemoryConversationStore, ToolRegistry,
};
use agent_runtime::{OpenAiProvider, RetryPolicy, RetryProvider};
use phone_advisor::{tools::SearchPhonesTool, MemoryCatalog, PhoneCatalog, PHONE_ADVISOR_PROMPT};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // Initialize LLM provider
    let openai: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::from_config(config.openai.clone())?);
    let policy = RetryPolicy::default().with_max_retries(config.max_retries);
    let provider: Arc<dyn LlmProvider> = Arc::new(RetryProvider::new(openai, policy));

    // Verify model endpoint
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", config.openai.api_base);
            tracing::info!("  Model: {}", config.generation.model);
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Model endpoint not reachable - turns will fail");
            tracing::warn!("  Check OPENAI_API_BASE and OPENAI_API_KEY in .env");
        }
    }

    // Load the phone catalog
    let catalog = match &config.catalog_path {
        Some(path) => MemoryCatalog::load(path).await?,
        None => {
            tracing::info!("PHONE_CATALOG_PATH not set - using bundled sample catalog");
            MemoryCatalog::bundled()?
        }
    };
    tracing::info!("✓ Phone catalog loaded ({} phones)", catalog.count().await?);

    // Initialize tools
    let mut tools = ToolRegistry::new();
    tools.register(SearchPhonesTool::new(Arc::new(catalog)));

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = AgentBuilder::new()
        .provider(provider.clone())
        .tools(tools)
        .system_prompt(PHONE_ADVISOR_PROMPT)
        .generation(config.generation.clone())
        .max_iterations(config.max_iterations)
        .build()?;

    // Build application state
    let shutdown = CancellationToken::new();
    let chat = ChatService::new(Arc::new(MemoryConversationStore::new()), Arc::new(agent))
        .with_shutdown(shutdown.clone());

    let state = AppState {
        chat: Arc::new(chat),
        provider,
    };

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(config.cors_layer()),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 phone advisor running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                    - Health check");
    tracing::info!("  GET    /api/models                - List available models");
    tracing::info!("  GET    /api/threads               - List threads");
    tracing::info!("  POST   /api/threads               - Create thread");
    tracing::info!("  GET    /api/threads/{{id}}          - Get thread");
    tracing::info!("  PATCH  /api/threads/{{id}}          - Rename thread");
    tracing::info!("  DELETE /api/threads/{{id}}          - Delete thread");
    tracing::info!("  GET    /api/threads/{{id}}/messages - List messages");
    tracing::info!("  POST   /api/threads/{{id}}/messages - Send message (SSE)");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C, then cancel in-flight turns
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown requested - finishing open streams");
    token.cancel();
}
