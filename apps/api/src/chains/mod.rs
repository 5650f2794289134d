//! Completion dispatcher: every named chain the intake engine runs.
//!
//! A chain is `(history, instruction template, extra variables) -> output`.
//! All of them go through the one `CompletionService` held here.

pub mod assessment;
pub mod prompts;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::llm_client::prompts::{
    BARE_OUTPUT_INSTRUCTION, JSON_ONLY_SYSTEM, TRANSCRIPT_GROUNDING_INSTRUCTION,
};
use crate::llm_client::{complete_json, ChatMessage, CompletionRequest, CompletionService, TextStream};
use crate::memory::Turn;
use crate::models::application::ExtractedApplicationData;
use crate::models::opportunity::OpportunityContext;
use prompts::{fill, numbered, render_transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    Continuation,
    CvClassifier,
    Farewell,
    FieldExtraction,
    ApplicationExtraction,
    ScreeningQuestions,
    EmailLookup,
    ExperienceSummary,
    ComprehensiveAssessment,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Continuation => "continuation",
            ChainKind::CvClassifier => "cv_classifier",
            ChainKind::Farewell => "farewell",
            ChainKind::FieldExtraction => "field_extraction",
            ChainKind::ApplicationExtraction => "application_extraction",
            ChainKind::ScreeningQuestions => "screening_questions",
            ChainKind::EmailLookup => "email_lookup",
            ChainKind::ExperienceSummary => "experience_summary",
            ChainKind::ComprehensiveAssessment => "comprehensive_assessment",
        }
    }
}

/// Normalized classifier verdict. Anything but a clear "yes" is `No`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CvDecision {
    Yes,
    No,
}

impl CvDecision {
    pub fn from_model_output(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        if normalized == "yes" {
            CvDecision::Yes
        } else {
            CvDecision::No
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CvDecision::Yes => "yes",
            CvDecision::No => "no",
        }
    }
}

impl From<String> for CvDecision {
    fn from(raw: String) -> Self {
        CvDecision::from_model_output(&raw)
    }
}

const CLASSIFIER_MAX_TOKENS: u32 = 5;
const EXTRACTION_MAX_TOKENS: u32 = 2048;
const ASSESSMENT_MAX_TOKENS: u32 = 1500;

#[derive(Clone)]
pub struct Dispatcher {
    llm: Arc<dyn CompletionService>,
}

impl Dispatcher {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Next interviewer turn, streamed. `context` is retrieved job material.
    pub async fn continuation(
        &self,
        history: &[Turn],
        opportunity: &OpportunityContext,
        context: &str,
        input: &str,
    ) -> Result<TextStream, AppError> {
        let system = fill(
            prompts::CONTINUATION_SYSTEM_TEMPLATE,
            &[
                ("title", opportunity.title.as_str()),
                ("description", opportunity.description.as_str()),
                ("more_context", or_none(&opportunity.more_context)),
                ("questions", numbered(&opportunity.fixed_questions).as_str()),
                ("context", or_none(context)),
                ("assessment_format", prompts::ASSESSMENT_FORMAT),
            ],
        );
        let request = CompletionRequest::new(ChainKind::Continuation, system)
            .messages(history.iter().map(Turn::to_message))
            .message(ChatMessage::user(input));
        Ok(self.llm.stream(request).await?)
    }

    /// Does this assistant utterance ask for a résumé?
    pub async fn classify_cv_request(&self, text: &str) -> Result<CvDecision, AppError> {
        let request = CompletionRequest::new(ChainKind::CvClassifier, BARE_OUTPUT_INSTRUCTION)
            .message(ChatMessage::user(fill(
                prompts::CV_CLASSIFIER_TEMPLATE,
                &[("text", text)],
            )))
            .temperature(0.0)
            .max_tokens(CLASSIFIER_MAX_TOKENS);
        let raw = self.llm.complete(request).await?;
        let decision = CvDecision::from_model_output(&raw);
        debug!("CV classifier: raw={raw:?} decision={}", decision.as_str());
        Ok(decision)
    }

    pub async fn farewell(&self, history: &[Turn], goodbye: &str) -> Result<TextStream, AppError> {
        let system = fill(prompts::FAREWELL_SYSTEM_TEMPLATE, &[("goodbye", goodbye)]);
        let request = CompletionRequest::new(ChainKind::Farewell, system)
            .messages(history.iter().map(Turn::to_message))
            .message(ChatMessage::user("I have finished my application."));
        Ok(self.llm.stream(request).await?)
    }

    /// `Name => ..; Email => ..; <question> => <answer>; ...`, streamed.
    pub async fn extract_answers(
        &self,
        history: &[Turn],
        questions: &[String],
    ) -> Result<TextStream, AppError> {
        let prompt = fill(
            prompts::FIELD_EXTRACTION_TEMPLATE,
            &[
                ("transcript", render_transcript(history).as_str()),
                ("questions", numbered(questions).as_str()),
            ],
        );
        self.stream_transcript_chain(ChainKind::FieldExtraction, prompt, EXTRACTION_MAX_TOKENS)
            .await
    }

    pub async fn extract_application(
        &self,
        history: &[Turn],
        questions: &[String],
    ) -> Result<ExtractedApplicationData, AppError> {
        let prompt = fill(
            prompts::APPLICATION_EXTRACTION_TEMPLATE,
            &[
                ("transcript", render_transcript(history).as_str()),
                ("questions", numbered(questions).as_str()),
            ],
        );
        let system = format!("{JSON_ONLY_SYSTEM}\n{TRANSCRIPT_GROUNDING_INSTRUCTION}");
        let request = CompletionRequest::new(ChainKind::ApplicationExtraction, system)
            .message(ChatMessage::user(prompt))
            .temperature(0.0)
            .max_tokens(EXTRACTION_MAX_TOKENS);
        Ok(complete_json(self.llm.as_ref(), request).await?)
    }

    pub async fn list_screening_questions(&self, history: &[Turn]) -> Result<TextStream, AppError> {
        let prompt = fill(
            prompts::SCREENING_QUESTIONS_TEMPLATE,
            &[("transcript", render_transcript(history).as_str())],
        );
        self.stream_transcript_chain(ChainKind::ScreeningQuestions, prompt, 512)
            .await
    }

    pub async fn lookup_email(&self, history: &[Turn]) -> Result<TextStream, AppError> {
        let prompt = fill(
            prompts::EMAIL_LOOKUP_TEMPLATE,
            &[("transcript", render_transcript(history).as_str())],
        );
        self.stream_transcript_chain(ChainKind::EmailLookup, prompt, 64)
            .await
    }

    pub async fn summarize_experience(&self, experience: &str) -> Result<String, AppError> {
        let request = CompletionRequest::new(
            ChainKind::ExperienceSummary,
            TRANSCRIPT_GROUNDING_INSTRUCTION,
        )
        .message(ChatMessage::user(fill(
            prompts::EXPERIENCE_SUMMARY_TEMPLATE,
            &[("experience", experience)],
        )))
        .temperature(0.3);
        Ok(self.llm.complete(request).await?.trim().to_string())
    }

    pub async fn assess_application(
        &self,
        opportunity: &OpportunityContext,
        application: &ExtractedApplicationData,
    ) -> Result<String, AppError> {
        let application_json = serde_json::to_string_pretty(application)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode application: {e}")))?;
        let prompt = fill(
            prompts::COMPREHENSIVE_ASSESSMENT_TEMPLATE,
            &[
                ("title", opportunity.title.as_str()),
                ("description", opportunity.description.as_str()),
                ("application", application_json.as_str()),
            ],
        );
        let request = CompletionRequest::new(
            ChainKind::ComprehensiveAssessment,
            TRANSCRIPT_GROUNDING_INSTRUCTION,
        )
        .message(ChatMessage::user(prompt))
        .temperature(0.3)
        .max_tokens(ASSESSMENT_MAX_TOKENS);
        Ok(self.llm.complete(request).await?.trim().to_string())
    }

    async fn stream_transcript_chain(
        &self,
        chain: ChainKind,
        prompt: String,
        max_tokens: u32,
    ) -> Result<TextStream, AppError> {
        let system = format!("{TRANSCRIPT_GROUNDING_INSTRUCTION}\n{BARE_OUTPUT_INSTRUCTION}");
        let request = CompletionRequest::new(chain, system)
            .message(ChatMessage::user(prompt))
            .temperature(0.0)
            .max_tokens(max_tokens);
        Ok(self.llm.stream(request).await?)
    }
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none)"
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::testing::{sample_opportunity, ScriptedCompletion};

    #[test]
    fn test_cv_decision_normalization() {
        assert_eq!(CvDecision::from_model_output("Yes"), CvDecision::Yes);
        assert_eq!(CvDecision::from_model_output("  YES.\n"), CvDecision::Yes);
        assert_eq!(CvDecision::from_model_output("no"), CvDecision::No);
        // Ambiguous output fails closed.
        assert_eq!(CvDecision::from_model_output("maybe"), CvDecision::No);
        assert_eq!(CvDecision::from_model_output("yes, please upload"), CvDecision::No);
        assert_eq!(CvDecision::from_model_output(""), CvDecision::No);
    }

    #[test]
    fn test_cv_decision_wire_format() {
        assert_eq!(serde_json::to_string(&CvDecision::Yes).unwrap(), "\"yes\"");
        let parsed: CvDecision = serde_json::from_str("\"Yes\"").unwrap();
        assert_eq!(parsed, CvDecision::Yes);
    }

    #[tokio::test]
    async fn test_classifier_is_stable_and_deterministic() {
        let llm = Arc::new(ScriptedCompletion::default());
        let dispatcher = Dispatcher::new(llm.clone());
        let text = "Thanks! Please upload your resume (CV) to continue.";

        let first = dispatcher.classify_cv_request(text).await.unwrap();
        let second = dispatcher.classify_cv_request(text).await.unwrap();
        assert_eq!(first, CvDecision::Yes);
        assert_eq!(first, second);

        let requests = llm.requests();
        assert!(requests
            .iter()
            .all(|r| r.chain == ChainKind::CvClassifier && r.temperature == 0.0));
    }

    #[tokio::test]
    async fn test_continuation_prompt_carries_questions_and_context() {
        let llm = Arc::new(ScriptedCompletion::default());
        let dispatcher = Dispatcher::new(llm.clone());
        let opportunity = sample_opportunity("opp-1");

        let stream = dispatcher
            .continuation(&[], &opportunity, "Fully remote team", "Hi")
            .await
            .unwrap();
        let _: Vec<_> = stream.collect().await;

        let request = &llm.requests()[0];
        assert_eq!(request.chain, ChainKind::Continuation);
        assert!(request.system.contains("Fully remote team"));
        assert!(request.system.contains(&format!("6. {}", opportunity.fixed_questions[5])));
        assert_eq!(request.messages.last().unwrap().content, "Hi");
    }

    #[tokio::test]
    async fn test_extraction_failure_surfaces_as_llm_error() {
        let llm = Arc::new(ScriptedCompletion::default().failing(ChainKind::ApplicationExtraction));
        let dispatcher = Dispatcher::new(llm);
        let err = dispatcher
            .extract_application(&[Turn::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
