use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Opens one multiplexed Redis connection shared by session memory and the cache.
pub async fn connect_redis(redis_url: &str) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
    let connection = client
        .get_multiplexed_tokio_connection()
        .await
        .context("Failed to connect to Redis")?;

    info!("Redis connection established");
    Ok(connection)
}
