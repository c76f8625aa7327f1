//! Marketplace Bot - conversational commerce over WhatsApp
//!
//! Classifies inbound messages with an LLM and walks each user through
//! registering, listing, buying and reviewing on a rural marketplace.

mod api;
mod classifier;
mod config;
mod db;
mod llm;
mod marketplace;
mod notify;
mod runtime;
mod slots;
mod state_machine;

use api::{create_router, AppState};
use classifier::LlmIntentClassifier;
use config::AppConfig;
use db::Database;
use marketplace::HttpMarketplace;
use notify::WebhookNotifier;
use runtime::{DatabaseStorage, DialogueRuntime, RuntimeConfig, RuntimeManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?.with_history_limit(config.history_limit);

    let llm = llm::create_service(&config.llm)?;
    let classifier = LlmIntentClassifier::new(llm);
    tracing::info!(
        provider = ?config.llm.provider,
        model = %classifier.model_id(),
        "Intent classifier ready"
    );

    let marketplace = HttpMarketplace::new(config.marketplace.clone())?;
    let notifier = WebhookNotifier::new(config.notifier.clone())?;

    let runtime = DialogueRuntime::new(
        Arc::new(DatabaseStorage::new(db)) as Arc<dyn runtime::SessionStore>,
        Arc::new(classifier) as Arc<dyn runtime::IntentClassifier>,
        Arc::new(marketplace) as Arc<dyn runtime::MarketplaceBackend>,
        Arc::new(notifier) as Arc<dyn runtime::Notifier>,
        RuntimeConfig {
            session_ttl: config.session_ttl,
            classifier_timeout: config.classifier_timeout,
        },
    );
    let state = AppState::new(RuntimeManager::new(runtime));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Marketplace bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
