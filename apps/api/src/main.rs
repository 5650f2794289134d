mod cache;
mod chains;
mod config;
mod conversation;
mod db;
mod errors;
mod finalize;
mod llm_client;
mod memory;
mod models;
mod opportunity;
mod retrieval;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::chains::Dispatcher;
use crate::config::{CacheBackend, Config};
use crate::db::{connect_redis, create_pool};
use crate::finalize::store::PgApplicationStore;
use crate::llm_client::embeddings::EmbeddingClient;
use crate::llm_client::LlmClient;
use crate::memory::RedisSessionMemory;
use crate::opportunity::gate::HttpSubmissionGate;
use crate::opportunity::store::{CachedOpportunityStore, PgOpportunityStore};
use crate::retrieval::documents::DocumentLoader;
use crate::retrieval::index::PgVectorIndex;
use crate::retrieval::ContextRetriever;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3FileStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
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

    info!("Starting intake API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (session memory, optional shared cache)
    let redis = connect_redis(&config.redis_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let files = Arc::new(S3FileStore::new(
        s3,
        config.s3_bucket.clone(),
        config.public_file_base_url.clone(),
    ));
    info!("S3 client initialized");

    // Initialize completion and embedding clients
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let embedder = EmbeddingClient::new(
        config.embedding_api_url.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
    )?;
    info!("Embedding client initialized (model: {})", config.embedding_model);

    // Opportunity metadata behind a short TTL cache
    let ttl = Duration::from_secs(config.opportunity_cache_ttl_secs);
    let cache: Arc<dyn Cache> = match config.cache_backend {
        CacheBackend::Memory => {
            let memory = Arc::new(MemoryCache::new(ttl));
            memory.clone().spawn_sweeper(ttl.max(Duration::from_secs(30)));
            memory as Arc<dyn Cache>
        }
        CacheBackend::Redis => Arc::new(RedisCache::new(redis.clone(), ttl)),
    };
    info!(
        "Opportunity cache: {:?}, ttl {}s",
        config.cache_backend, config.opportunity_cache_ttl_secs
    );
    let opportunities = Arc::new(CachedOpportunityStore::new(
        Arc::new(PgOpportunityStore::new(db.clone())),
        cache,
    ));

    let retriever = ContextRetriever::new(
        Arc::new(PgVectorIndex::new(db.clone())),
        Arc::new(embedder),
        Arc::new(DocumentLoader::new(files.clone())?),
        config.retrieval_top_k,
    );

    // Build app state
    let state = AppState {
        dispatcher: Dispatcher::new(Arc::new(llm)),
        memory: Arc::new(RedisSessionMemory::new(redis)),
        opportunities,
        gate: Arc::new(HttpSubmissionGate::new(config.submission_limit_url.clone())?),
        retriever: Arc::new(retriever),
        applications: Arc::new(PgApplicationStore::new(db)),
        files,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the applicant web app

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "intake-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
