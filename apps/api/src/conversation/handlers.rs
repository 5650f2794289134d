use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::conversation::engine::{advance_turn, evaluate_state, load_accepting_opportunity};
use crate::conversation::state::{ConversationState, TurnObservation, UiAffordances};
use crate::errors::AppError;
use crate::llm_client::TextStream;
use crate::opportunity::store::require_opportunity;
use crate::state::AppState;

pub const CLASSIFY_CV: u8 = 0;
pub const ADVANCE_TURN: u8 = 1;
pub const PERSIST_TURN: u8 = 2;
pub const FAREWELL: u8 = 3;
pub const SCREENING_QUESTIONS: u8 = 4;
pub const EXTRACT_ANSWERS: u8 = 5;
pub const LOOKUP_EMAIL: u8 = 7;

/// Body of the multiplexed chat endpoint, discriminated by `type`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "opportunityId", default)]
    pub opportunity_id: Option<String>,
    /// Session key.
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ai_output: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<String>>,
    /// Client-held conversation state, when the client tracks one.
    #[serde(default)]
    pub state: Option<ConversationState>,
}

impl ChatRequest {
    fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation(format!("Missing required field: {field}")))
    }

    fn text(&self) -> Result<&str, AppError> {
        Self::required(&self.text, "text")
    }

    fn channel(&self) -> Result<&str, AppError> {
        Self::required(&self.channel, "channel")
    }

    fn opportunity_id(&self) -> Result<&str, AppError> {
        Self::required(&self.opportunity_id, "opportunityId")
    }

    fn reject_completed(&self) -> Result<(), AppError> {
        match &self.state {
            Some(state) if state.is_completed() => Err(AppError::Conflict(
                "This application has already been submitted".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    match req.kind {
        CLASSIFY_CV => {
            let decision = state.dispatcher.classify_cv_request(req.text()?).await?;
            Ok(plain_text(decision.as_str()))
        }
        ADVANCE_TURN => {
            req.reject_completed()?;
            let (text, channel, opportunity_id) = (req.text()?, req.channel()?, req.opportunity_id()?);
            let stream = advance_turn(&state, channel, opportunity_id, text).await?;
            Ok(stream_response(stream, "continuation"))
        }
        PERSIST_TURN => {
            req.reject_completed()?;
            let (text, channel) = (req.text()?, req.channel()?);
            let ai_output = ChatRequest::required(&req.ai_output, "ai_output")?;
            state.memory.append_pair(channel, text, ai_output).await?;
            Ok(Json(json!({ "ok": true, "channel": channel })).into_response())
        }
        FAREWELL => {
            let channel = req.channel()?;
            let goodbye = match req.opportunity_id.as_deref() {
                Some(id) => require_opportunity(state.opportunities.as_ref(), id)
                    .await?
                    .goodbye_message
                    .unwrap_or_else(|| state.config.goodbye_message.clone()),
                None => state.config.goodbye_message.clone(),
            };
            let history = state.memory.load_history(channel).await?;
            let stream = state.dispatcher.farewell(&history, &goodbye).await?;
            Ok(stream_response(stream, "farewell"))
        }
        SCREENING_QUESTIONS => {
            let history = state.memory.load_history(req.channel()?).await?;
            let stream = state.dispatcher.list_screening_questions(&history).await?;
            Ok(stream_response(stream, "screening_questions"))
        }
        EXTRACT_ANSWERS => {
            let channel = req.channel()?;
            let questions = match (&req.questions, req.opportunity_id.as_deref()) {
                (Some(questions), _) if !questions.is_empty() => questions.clone(),
                (_, Some(id)) => {
                    require_opportunity(state.opportunities.as_ref(), id)
                        .await?
                        .fixed_questions
                }
                _ => {
                    return Err(AppError::Validation(
                        "Missing required field: questions or opportunityId".to_string(),
                    ))
                }
            };
            let history = state.memory.load_history(channel).await?;
            let stream = state.dispatcher.extract_answers(&history, &questions).await?;
            Ok(stream_response(stream, "field_extraction"))
        }
        LOOKUP_EMAIL => {
            let history = state.memory.load_history(req.channel()?).await?;
            let stream = state.dispatcher.lookup_email(&history).await?;
            Ok(stream_response(stream, "email_lookup"))
        }
        other => Err(AppError::Validation(format!("Unknown request type: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRequest {
    #[serde(default)]
    pub state: ConversationState,
    #[serde(default)]
    pub observation: TurnObservation,
    /// When present, the opportunity is re-checked so a paused opportunity
    /// cannot be driven toward the finish line.
    #[serde(default)]
    pub opportunity_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: ConversationState,
    pub affordances: UiAffordances,
}

/// POST /api/v1/chat/state
pub async fn handle_state(
    State(state): State<AppState>,
    Json(req): Json<StateRequest>,
) -> Result<Json<StateResponse>, AppError> {
    if let Some(id) = req.opportunity_id.as_deref() {
        load_accepting_opportunity(&state, id).await?;
    }
    let next = evaluate_state(&state.dispatcher, req.state, req.observation).await?;
    Ok(Json(StateResponse {
        affordances: next.affordances(),
        state: next,
    }))
}

fn plain_text(text: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text.to_string(),
    )
        .into_response()
}

/// Forwards chunks as they arrive. A mid-stream error ends the body early,
/// which the client sees as a truncated response.
fn stream_response(stream: TextStream, chain: &'static str) -> Response {
    info!("Streaming {chain} response");
    let body = stream.inspect(move |chunk| {
        if let Err(e) = chunk {
            error!("{chain} stream failed: {e}");
        }
    });
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}
