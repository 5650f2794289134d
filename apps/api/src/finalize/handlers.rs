use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::conversation::engine::load_accepting_opportunity;
use crate::conversation::state::{transition, ConversationState, TurnObservation};
use crate::errors::AppError;
use crate::finalize::finalizer::{finalize, Uploads};
use crate::models::application::ApplicationRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    /// Session key.
    pub channel: String,
    pub opportunity_id: Option<String>,
    pub state: ConversationState,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub application: ApplicationRecord,
    pub state: ConversationState,
}

/// POST /api/v1/applications/finalize
///
/// Only a session in `ReadyToFinish` may be finalized; a `Completed` session
/// is refused so a second record is never created from the same conversation.
pub async fn handle_finalize(
    State(state): State<AppState>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let (resume_url, photo_url) = match &req.state {
        ConversationState::ReadyToFinish {
            resume_url,
            photo_url,
        } => (resume_url.clone(), photo_url.clone()),
        ConversationState::Completed => {
            return Err(AppError::Conflict(
                "This application has already been submitted".to_string(),
            ))
        }
        _ => {
            return Err(AppError::Conflict(
                "The application is not ready to be submitted yet".to_string(),
            ))
        }
    };

    let channel = req.channel.trim();
    if channel.is_empty() {
        return Err(AppError::Validation("Missing required field: channel".to_string()));
    }
    let opportunity_id = req
        .opportunity_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("Missing required field: opportunityId".to_string()))?;

    let opportunity = load_accepting_opportunity(&state, opportunity_id).await?;
    let uploads = Uploads {
        resume_url: req.resume_url.clone().or(Some(resume_url)),
        photo_url: req.photo_url.clone().or(photo_url),
    };
    let application = finalize(&state, channel, &opportunity, uploads).await?;

    let finalized = TurnObservation {
        finalized: true,
        ..Default::default()
    };
    Ok(Json(FinalizeResponse {
        application,
        state: transition(req.state, &finalized),
    }))
}
