use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_SUBMITTED: &str = "SUBMITTED";

/// The structured self-assessment attached to the advanced-screening question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningAssessment {
    pub question: String,
    pub answer: String,
    pub assessment: String,
    /// 1 – 10
    pub score: u8,
}

/// Fields pulled out of a transcript. Derived, not authoritative until persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedApplicationData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub experience: String,
    pub portfolio_url: String,
    pub travel_willingness: String,
    pub answers: Vec<String>,
    pub advanced_screening: Vec<ScreeningAssessment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiFlag {
    Normal,
    Spam,
    HighLevel,
    Great,
}

impl AiFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiFlag::Normal => "NORMAL",
            AiFlag::Spam => "SPAM",
            AiFlag::HighLevel => "HIGH_LEVEL",
            AiFlag::Great => "GREAT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NORMAL" => Some(AiFlag::Normal),
            "SPAM" => Some(AiFlag::Spam),
            "HIGH_LEVEL" => Some(AiFlag::HighLevel),
            "GREAT" => Some(AiFlag::Great),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub opportunity_id: String,
    pub organization_id: String,
    pub session_key: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub experience: String,
    pub portfolio_url: String,
    pub travel_willingness: String,
    pub answers: Json<Vec<String>>,
    pub advanced_screening: Json<Vec<ScreeningAssessment>>,
    pub resume_url: Option<String>,
    pub photo_url: Option<String>,
    pub ai_score: i32,
    pub ai_flag: String,
    pub status: String,
    pub experience_summary: Option<String>,
    pub ai_assessment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted application. Created once per completed session; later mutated
/// only to attach the enrichment narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub opportunity_id: String,
    pub organization_id: String,
    pub session_key: String,
    #[serde(flatten)]
    pub data: ExtractedApplicationData,
    pub resume_url: Option<String>,
    pub photo_url: Option<String>,
    pub ai_score: u8,
    pub ai_flag: AiFlag,
    pub status: String,
    pub experience_summary: Option<String>,
    pub ai_assessment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ApplicationRow> for ApplicationRecord {
    fn from(row: ApplicationRow) -> Self {
        let ai_flag = AiFlag::parse(&row.ai_flag).unwrap_or_else(|| {
            tracing::warn!("Unknown ai_flag '{}' on application {}", row.ai_flag, row.id);
            AiFlag::Normal
        });

        ApplicationRecord {
            id: row.id,
            opportunity_id: row.opportunity_id,
            organization_id: row.organization_id,
            session_key: row.session_key,
            data: ExtractedApplicationData {
                name: row.name,
                email: row.email,
                phone: row.phone,
                education: row.education,
                experience: row.experience,
                portfolio_url: row.portfolio_url,
                travel_willingness: row.travel_willingness,
                answers: row.answers.0,
                advanced_screening: row.advanced_screening.0,
            },
            resume_url: row.resume_url,
            photo_url: row.photo_url,
            ai_score: row.ai_score.clamp(0, 100) as u8,
            ai_flag,
            status: row.status,
            experience_summary: row.experience_summary,
            ai_assessment: row.ai_assessment,
            created_at: row.created_at,
        }
    }
}
