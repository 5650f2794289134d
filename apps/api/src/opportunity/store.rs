//! Opportunity loading behind a read-through TTL cache.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::errors::AppError;
use crate::models::opportunity::{OpportunityContext, OpportunityRow};

#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// `Ok(None)` when the opportunity does not exist. Any other failure is
    /// `AppError::ContextUnavailable` carrying a detail string.
    async fn load(&self, opportunity_id: &str) -> Result<Option<OpportunityContext>, AppError>;
}

pub struct PgOpportunityStore {
    pool: PgPool,
}

impl PgOpportunityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpportunityStore for PgOpportunityStore {
    async fn load(&self, opportunity_id: &str) -> Result<Option<OpportunityContext>, AppError> {
        let row = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT id, organization_id, title, description, more_context, documents,
                   fixed_questions, hiring_manager_email, status, goodbye_message
            FROM opportunities
            WHERE id = $1
            "#,
        )
        .bind(opportunity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::ContextUnavailable(format!("Failed to load opportunity {opportunity_id}: {e}"))
        })?;

        row.map(OpportunityContext::try_from)
            .transpose()
            .map_err(AppError::ContextUnavailable)
    }
}

/// Read-through cache in front of another store. Misses are not cached.
pub struct CachedOpportunityStore {
    inner: Arc<dyn OpportunityStore>,
    cache: Arc<dyn Cache>,
}

impl CachedOpportunityStore {
    pub fn new(inner: Arc<dyn OpportunityStore>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl OpportunityStore for CachedOpportunityStore {
    async fn load(&self, opportunity_id: &str) -> Result<Option<OpportunityContext>, AppError> {
        let key = format!("opportunity:{opportunity_id}");

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_str::<OpportunityContext>(&cached) {
                Ok(context) => {
                    debug!("Opportunity cache hit: {opportunity_id}");
                    return Ok(Some(context));
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {key}: {e}");
                    self.cache.evict(&key).await;
                }
            }
        }

        let loaded = self.inner.load(opportunity_id).await?;
        if let Some(context) = &loaded {
            match serde_json::to_string(context) {
                Ok(encoded) => self.cache.set(&key, encoded).await,
                Err(e) => warn!("Failed to encode opportunity {opportunity_id} for cache: {e}"),
            }
        }
        Ok(loaded)
    }
}

/// Loads an opportunity or fails with 404.
pub async fn require_opportunity(
    store: &dyn OpportunityStore,
    opportunity_id: &str,
) -> Result<OpportunityContext, AppError> {
    store
        .load(opportunity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {opportunity_id} not found")))
}
