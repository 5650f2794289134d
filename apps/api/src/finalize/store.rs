//! Application persistence. One row per session key; a repeated create for
//! the same session returns the existing record instead of a duplicate.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{
    AiFlag, ApplicationRecord, ApplicationRow, ExtractedApplicationData, STATUS_SUBMITTED,
};

/// Everything needed to persist a finished application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub opportunity_id: String,
    pub organization_id: String,
    pub session_key: String,
    pub data: ExtractedApplicationData,
    pub resume_url: Option<String>,
    pub photo_url: Option<String>,
    pub ai_score: u8,
    pub ai_flag: AiFlag,
}

/// Result of a create: the session's record and whether this call inserted it.
#[derive(Debug, Clone)]
pub struct Stored {
    pub record: ApplicationRecord,
    pub inserted: bool,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persists with status SUBMITTED. Idempotent per session key.
    async fn create(&self, application: NewApplication) -> Result<Stored, AppError>;

    async fn find_by_session(&self, session_key: &str)
        -> Result<Option<ApplicationRecord>, AppError>;

    async fn attach_enrichment(
        &self,
        id: Uuid,
        experience_summary: Option<String>,
        ai_assessment: Option<String>,
    ) -> Result<(), AppError>;
}

pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn create(&self, application: NewApplication) -> Result<Stored, AppError> {
        let NewApplication {
            opportunity_id,
            organization_id,
            session_key,
            data,
            resume_url,
            photo_url,
            ai_score,
            ai_flag,
        } = application;

        let inserted = sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications (
                id, opportunity_id, organization_id, session_key, name, email, phone,
                education, experience, portfolio_url, travel_willingness, answers,
                advanced_screening, resume_url, photo_url, ai_score, ai_flag, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (session_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&opportunity_id)
        .bind(&organization_id)
        .bind(&session_key)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.education)
        .bind(&data.experience)
        .bind(&data.portfolio_url)
        .bind(&data.travel_willingness)
        .bind(Json(&data.answers))
        .bind(Json(&data.advanced_screening))
        .bind(&resume_url)
        .bind(&photo_url)
        .bind(i32::from(ai_score))
        .bind(ai_flag.as_str())
        .bind(STATUS_SUBMITTED)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => {
                info!("Created application {} for session {session_key}", row.id);
                Ok(Stored {
                    record: row.into(),
                    inserted: true,
                })
            }
            None => {
                info!("Application for session {session_key} already exists");
                let record = self.find_by_session(&session_key).await?.ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "Application for session {session_key} conflicted but could not be read"
                    ))
                })?;
                Ok(Stored {
                    record,
                    inserted: false,
                })
            }
        }
    }

    async fn find_by_session(
        &self,
        session_key: &str,
    ) -> Result<Option<ApplicationRecord>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE session_key = $1",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApplicationRecord::from))
    }

    async fn attach_enrichment(
        &self,
        id: Uuid,
        experience_summary: Option<String>,
        ai_assessment: Option<String>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE applications
            SET experience_summary = COALESCE($2, experience_summary),
                ai_assessment = COALESCE($3, ai_assessment)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(experience_summary)
        .bind(ai_assessment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
