use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Every opportunity asks exactly this many fixed questions, in order.
pub const FIXED_QUESTION_COUNT: usize = 6;

#[derive(Debug, Clone, FromRow)]
pub struct OpportunityRow {
    pub id: String,
    pub organization_id: Option<String>,
    pub title: String,
    pub description: String,
    pub more_context: Option<String>,
    pub documents: Vec<String>,
    pub fixed_questions: Vec<String>,
    pub hiring_manager_email: Option<String>,
    pub status: String,
    pub goodbye_message: Option<String>,
}

/// Immutable snapshot of an opportunity, loaded once per session and cached briefly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityContext {
    pub id: String,
    pub organization_id: Option<String>,
    pub title: String,
    pub description: String,
    pub more_context: String,
    pub documents: Vec<String>,
    pub fixed_questions: Vec<String>,
    pub hiring_manager_email: Option<String>,
    pub paused: bool,
    pub goodbye_message: Option<String>,
}

impl OpportunityContext {
    /// Text indexed alongside linked documents: title, description and extra context.
    pub fn indexable_text(&self) -> String {
        [
            self.title.as_str(),
            self.description.as_str(),
            self.more_context.as_str(),
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

impl TryFrom<OpportunityRow> for OpportunityContext {
    type Error = String;

    fn try_from(row: OpportunityRow) -> Result<Self, Self::Error> {
        let questions: Vec<String> = row
            .fixed_questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if questions.len() != FIXED_QUESTION_COUNT {
            return Err(format!(
                "Opportunity {} has {} fixed questions, expected {FIXED_QUESTION_COUNT}",
                row.id,
                questions.len()
            ));
        }

        Ok(OpportunityContext {
            paused: row.status.eq_ignore_ascii_case("paused"),
            id: row.id,
            organization_id: row.organization_id.filter(|o| !o.trim().is_empty()),
            title: row.title,
            description: row.description,
            more_context: row.more_context.unwrap_or_default(),
            documents: row.documents,
            fixed_questions: questions,
            hiring_manager_email: row.hiring_manager_email,
            goodbye_message: row.goodbye_message.filter(|g| !g.trim().is_empty()),
        })
    }
}
