//! Similarity index over opportunity passages, stored in Postgres with pgvector.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::errors::AppError;
use crate::retrieval::RetrievedPassage;

/// One chunk of opportunity text with its embedding, ready to upsert.
#[derive(Debug, Clone)]
pub struct IndexedPassage {
    pub content: String,
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or refreshes passages tagged with `opportunity_id`.
    async fn upsert(
        &self,
        opportunity_id: &str,
        passages: &[IndexedPassage],
    ) -> Result<(), AppError>;

    /// Nearest passages for one opportunity, closest first.
    async fn search(
        &self,
        opportunity_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>, AppError>;
}

pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(
        &self,
        opportunity_id: &str,
        passages: &[IndexedPassage],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(retrieval_error)?;

        for passage in passages {
            sqlx::query(
                r#"
                INSERT INTO opportunity_passages (opportunity_id, content, content_hash, embedding)
                VALUES ($1, $2, md5($2), $3::vector)
                ON CONFLICT (opportunity_id, content_hash)
                DO UPDATE SET embedding = EXCLUDED.embedding
                "#,
            )
            .bind(opportunity_id)
            .bind(&passage.content)
            .bind(to_pgvector(&passage.embedding))
            .execute(&mut *tx)
            .await
            .map_err(retrieval_error)?;
        }

        tx.commit().await.map_err(retrieval_error)?;
        debug!("Upserted {} passages for opportunity {opportunity_id}", passages.len());
        Ok(())
    }

    async fn search(
        &self,
        opportunity_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT opportunity_id, content
            FROM opportunity_passages
            WHERE opportunity_id = $1
            ORDER BY embedding <=> $2::vector
            LIMIT $3
            "#,
        )
        .bind(opportunity_id)
        .bind(to_pgvector(embedding))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieval_error)?;

        Ok(rows
            .iter()
            .map(|row| RetrievedPassage {
                opportunity_id: row.get("opportunity_id"),
                content: row.get("content"),
            })
            .collect())
    }
}

fn retrieval_error(e: sqlx::Error) -> AppError {
    AppError::Retrieval(e.to_string())
}

/// pgvector text literal, bound as text and cast with `::vector`.
pub fn to_pgvector(embedding: &[f32]) -> String {
    let items = embedding
        .iter()
        .map(|v| format!("{v:.8}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}
