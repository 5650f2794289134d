//! Application Finalizer: transcript → structured fields → score → record,
//! then best-effort enrichment in the background.

use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{info, warn};

use crate::chains::assessment::{collect_assessments, parse_answer_pairs};
use crate::chains::Dispatcher;
use crate::errors::AppError;
use crate::finalize::scoring::score_application;
use crate::finalize::store::{ApplicationStore, NewApplication};
use crate::memory::Turn;
use crate::models::application::{ApplicationRecord, ExtractedApplicationData};
use crate::models::opportunity::OpportunityContext;
use crate::opportunity::gate::PAUSED_REASON;
use crate::state::AppState;

/// Free-text experience longer than this gets its own summary.
const SUMMARY_THRESHOLD_CHARS: usize = 500;

/// Uploaded file references recorded during the conversation.
#[derive(Debug, Clone, Default)]
pub struct Uploads {
    pub resume_url: Option<String>,
    pub photo_url: Option<String>,
}

pub async fn finalize(
    state: &AppState,
    session_key: &str,
    opportunity: &OpportunityContext,
    uploads: Uploads,
) -> Result<ApplicationRecord, AppError> {
    let organization_id = opportunity
        .organization_id
        .clone()
        .ok_or_else(|| AppError::Validation("Opportunity has no organization".to_string()))?;
    if opportunity.paused {
        return Err(AppError::Forbidden(PAUSED_REASON.to_string()));
    }

    if let Some(existing) = state.applications.find_by_session(session_key).await? {
        info!("Session {session_key} already submitted as {}", existing.id);
        return Ok(existing);
    }

    let history = state.memory.load_history(session_key).await?;
    if history.is_empty() {
        return Err(AppError::Validation(format!(
            "Session {session_key} has no conversation to submit"
        )));
    }

    let mut data = extract_fields(&state.dispatcher, &history, &opportunity.fixed_questions).await?;

    // Blocks the interviewer actually emitted beat the extractor's copy of them.
    let emitted = collect_assessments(&history);
    if !emitted.is_empty() {
        data.advanced_screening = emitted;
    }

    let score = score_application(&data);
    info!(
        "Scored session {session_key}: ai_score={} ai_flag={}",
        score.ai_score,
        score.ai_flag.as_str()
    );

    let stored = state
        .applications
        .create(NewApplication {
            opportunity_id: opportunity.id.clone(),
            organization_id,
            session_key: session_key.to_string(),
            data,
            resume_url: uploads.resume_url,
            photo_url: uploads.photo_url,
            ai_score: score.ai_score,
            ai_flag: score.ai_flag,
        })
        .await?;
    // A concurrent finalize got there first and owns the enrichment.
    if !stored.inserted {
        return Ok(stored.record);
    }
    let record = stored.record;

    let dispatcher = state.dispatcher.clone();
    let applications = state.applications.clone();
    let opportunity = opportunity.clone();
    let enrich_target = record.clone();
    tokio::spawn(async move {
        enrich(&dispatcher, applications, &opportunity, &enrich_target).await;
    });

    Ok(record)
}

/// JSON extraction first; on failure, the `Name => value; ...` list mapped onto the questions.
async fn extract_fields(
    dispatcher: &Dispatcher,
    history: &[Turn],
    questions: &[String],
) -> Result<ExtractedApplicationData, AppError> {
    match dispatcher.extract_application(history, questions).await {
        Ok(data) => Ok(data),
        Err(e) => {
            warn!("Structured extraction failed, falling back to field list: {e}");
            let listed: String = dispatcher
                .extract_answers(history, questions)
                .await?
                .try_collect()
                .await?;
            Ok(from_answer_pairs(parse_answer_pairs(&listed), questions))
        }
    }
}

/// Name and email by label. Answers match their question text, else the next unclaimed pair.
fn from_answer_pairs(pairs: Vec<(String, String)>, questions: &[String]) -> ExtractedApplicationData {
    let mut data = ExtractedApplicationData::default();
    let mut rest = Vec::new();
    for (key, value) in pairs {
        if key.eq_ignore_ascii_case("name") {
            data.name = value;
        } else if key.eq_ignore_ascii_case("email") {
            data.email = value;
        } else {
            rest.push((key, value));
        }
    }

    let matched: Vec<Option<usize>> = questions
        .iter()
        .map(|question| {
            rest.iter()
                .position(|(key, _)| key.trim().eq_ignore_ascii_case(question.trim()))
        })
        .collect();
    let mut unclaimed = rest
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched.contains(&Some(*i)))
        .map(|(_, (_, answer))| answer);
    data.answers = matched
        .iter()
        .map(|slot| match slot {
            Some(i) => rest[*i].1.clone(),
            None => unclaimed.next().cloned().unwrap_or_default(),
        })
        .collect();
    data
}

/// Experience summary (long experience only) and a narrative assessment.
/// Failures are logged; the record is left as it was.
pub async fn enrich(
    dispatcher: &Dispatcher,
    applications: Arc<dyn ApplicationStore>,
    opportunity: &OpportunityContext,
    record: &ApplicationRecord,
) {
    let summary = if record.data.experience.chars().count() > SUMMARY_THRESHOLD_CHARS {
        match dispatcher.summarize_experience(&record.data.experience).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Experience summary failed for application {}: {e}", record.id);
                None
            }
        }
    } else {
        None
    };

    let assessment = match dispatcher.assess_application(opportunity, &record.data).await {
        Ok(assessment) => Some(assessment),
        Err(e) => {
            warn!("Assessment failed for application {}: {e}", record.id);
            None
        }
    };

    if summary.is_none() && assessment.is_none() {
        return;
    }
    match applications
        .attach_enrichment(record.id, summary, assessment)
        .await
    {
        Ok(()) => info!("Enriched application {}", record.id),
        Err(e) => warn!("Failed to attach enrichment to application {}: {e}", record.id),
    }
}
