mod analysis;
mod cache;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::hasher::Digester;
use crate::analysis::orchestrator::Analyzer;
use crate::cache::{CacheBackend, CacheStore, MemoryCacheBackend, RedisCacheBackend};
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize cache backend (Redis when configured, in-memory otherwise)
    let backend = build_cache_backend(&config).await;
    let cache = CacheStore::new(
        backend,
        config.cache_prefix.clone(),
        chrono::Duration::hours(config.cache_ttl_hours),
    );
    let digester = Digester::from_name(&config.cache_digest);

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    );
    if config.anthropic_api_key.is_some() {
        info!("LLM client initialized (model: {})", config.llm_model);
    } else {
        warn!("ANTHROPIC_API_KEY is not set; analyses will return not-configured results");
    }

    let analyzer = Analyzer::new(Arc::new(llm), config.llm_model.clone(), cache, digester);

    let state = AppState {
        analyzer: Arc::new(analyzer),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connects to Redis when `REDIS_URL` is set. A failed connection degrades to the
/// in-memory backend rather than stopping startup.
async fn build_cache_backend(config: &Config) -> Arc<dyn CacheBackend> {
    let Some(url) = config.redis_url.as_deref() else {
        info!("REDIS_URL not set; using in-memory analysis cache");
        return Arc::new(MemoryCacheBackend::new());
    };

    match RedisCacheBackend::connect(url).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            warn!("Redis unavailable ({e}); using in-memory analysis cache");
            Arc::new(MemoryCacheBackend::new())
        }
    }
}
