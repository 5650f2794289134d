//! One applicant turn: load the opportunity, gate it, gather history and
//! grounding context, then stream the next interviewer message.

use tracing::{debug, info};

use crate::chains::assessment::strip_assessment;
use crate::chains::Dispatcher;
use crate::conversation::state::{transition, ConversationState, TurnObservation};
use crate::errors::AppError;
use crate::llm_client::TextStream;
use crate::models::opportunity::OpportunityContext;
use crate::opportunity::gate::ensure_accepting;
use crate::opportunity::store::require_opportunity;
use crate::state::AppState;

/// Loads the opportunity and applies the business-rule gate. Runs before any model call.
pub async fn load_accepting_opportunity(
    state: &AppState,
    opportunity_id: &str,
) -> Result<OpportunityContext, AppError> {
    let opportunity = require_opportunity(state.opportunities.as_ref(), opportunity_id).await?;
    ensure_accepting(&opportunity, state.gate.as_ref()).await?;
    Ok(opportunity)
}

/// Streams the assistant's answer to `input`. The turn pair is not persisted
/// here; the caller appends it once the stream has finished cleanly.
pub async fn advance_turn(
    state: &AppState,
    session_key: &str,
    opportunity_id: &str,
    input: &str,
) -> Result<TextStream, AppError> {
    let opportunity = load_accepting_opportunity(state, opportunity_id).await?;

    let (history, context) = tokio::try_join!(
        state.memory.load_history(session_key),
        state.retriever.retrieve_or_index(input, &opportunity),
    )?;
    debug!(
        "Advancing session {session_key}: {} prior turns, {} chars of context",
        history.len(),
        context.len()
    );

    state
        .dispatcher
        .continuation(&history, &opportunity, &context, input)
        .await
}

/// Runs the CV classifier when the state could still move toward a résumé
/// request and no verdict was supplied, then applies `transition`.
pub async fn evaluate_state(
    dispatcher: &Dispatcher,
    current: ConversationState,
    mut observation: TurnObservation,
) -> Result<ConversationState, AppError> {
    let needs_verdict = matches!(
        current,
        ConversationState::CollectingAnswers | ConversationState::AwaitingResume { resume_url: None }
    );
    if needs_verdict && observation.cv_request.is_none() {
        if let Some(text) = observation.assistant_text.as_deref() {
            let visible = strip_assessment(text);
            observation.cv_request = Some(dispatcher.classify_cv_request(&visible).await?);
        }
    }

    let next = transition(current.clone(), &observation);
    if next != current {
        info!("Conversation state {:?} -> {:?}", current, next);
    }
    Ok(next)
}
