use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::opportunity::OpportunityContext;
use crate::opportunity::store::require_opportunity;
use crate::state::AppState;

/// What an applicant's browser is allowed to see about an opportunity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOpportunity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub fixed_questions: Vec<String>,
    pub documents: Vec<String>,
    pub hiring_manager_email: Option<String>,
    pub paused: bool,
}

impl From<OpportunityContext> for PublicOpportunity {
    fn from(ctx: OpportunityContext) -> Self {
        Self {
            id: ctx.id,
            title: ctx.title,
            description: ctx.description,
            fixed_questions: ctx.fixed_questions,
            documents: ctx.documents,
            hiring_manager_email: ctx.hiring_manager_email,
            paused: ctx.paused,
        }
    }
}

/// GET /api/v1/opportunities/:id/context
pub async fn handle_get_context(
    State(state): State<AppState>,
    Path(opportunity_id): Path<String>,
) -> Result<Json<PublicOpportunity>, AppError> {
    let opportunity = require_opportunity(state.opportunities.as_ref(), &opportunity_id).await?;
    Ok(Json(opportunity.into()))
}
