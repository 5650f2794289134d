//! Test doubles for every collaborator behind a trait, plus a ready-made `AppState`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use uuid::Uuid;

use crate::chains::assessment::{ASSESSMENT_CLOSE, ASSESSMENT_OPEN};
use crate::chains::{ChainKind, Dispatcher};
use crate::config::{CacheBackend, Config};
use crate::errors::AppError;
use crate::finalize::store::{ApplicationStore, NewApplication, Stored};
use crate::llm_client::embeddings::{Embedder, EmbeddingError};
use crate::llm_client::{CompletionRequest, CompletionService, LlmError, Role, TextStream};
use crate::memory::{SessionMemory, Turn};
use crate::models::application::{ApplicationRecord, ExtractedApplicationData, STATUS_SUBMITTED};
use crate::models::opportunity::OpportunityContext;
use crate::opportunity::gate::{LimitCheck, SubmissionGate};
use crate::opportunity::store::OpportunityStore;
use crate::retrieval::documents::DocumentSource;
use crate::retrieval::index::{IndexedPassage, VectorIndex};
use crate::retrieval::{ContextRetriever, RetrievedPassage};
use crate::state::AppState;
use crate::storage::FileStore;

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn sample_questions() -> Vec<String> {
    [
        "What is your highest level of education?",
        "How many years of backend experience do you have?",
        "Which programming languages do you use most?",
        "Are you willing to travel occasionally?",
        "Share a link to your portfolio or GitHub.",
        "Describe the hardest production incident you handled.",
    ]
    .iter()
    .map(|q| q.to_string())
    .collect()
}

pub fn sample_opportunity(id: &str) -> OpportunityContext {
    OpportunityContext {
        id: id.to_string(),
        organization_id: Some("org-1".to_string()),
        title: "Backend Engineer".to_string(),
        description: "Build and operate the APIs behind our hiring platform.".to_string(),
        more_context: String::new(),
        documents: vec![],
        fixed_questions: sample_questions(),
        hiring_manager_email: Some("hm@example.com".to_string()),
        paused: false,
        goodbye_message: None,
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/test".to_string(),
        redis_url: "redis://localhost".to_string(),
        s3_bucket: "test-bucket".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        anthropic_api_key: "test".to_string(),
        embedding_api_url: "http://localhost:8081/v1".to_string(),
        embedding_api_key: "test".to_string(),
        embedding_model: "test-embedding".to_string(),
        submission_limit_url: None,
        opportunity_cache_ttl_secs: 60,
        cache_backend: CacheBackend::Memory,
        retrieval_top_k: 4,
        goodbye_message: "Thanks for applying!".to_string(),
        public_file_base_url: "memory://".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
    }
}

pub fn new_application(session_key: &str) -> NewApplication {
    NewApplication {
        opportunity_id: "opp-1".to_string(),
        organization_id: "org-1".to_string(),
        session_key: session_key.to_string(),
        data: ExtractedApplicationData {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            answers: vec!["Mathematics".to_string()],
            ..Default::default()
        },
        resume_url: None,
        photo_url: None,
        ai_score: 40,
        ai_flag: crate::models::application::AiFlag::Normal,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub llm: Arc<ScriptedCompletion>,
    pub applications: Arc<MemoryApplicationStore>,
}

/// State wired entirely to in-memory fakes. Opportunities: `opp-1` (active),
/// `opp-paused` (paused), `opp-broken` (fails to load).
pub fn test_app() -> TestApp {
    let llm = Arc::new(ScriptedCompletion::default());
    let applications = Arc::new(MemoryApplicationStore::default());
    let files = Arc::new(MemoryFileStore::default());

    let mut paused = sample_opportunity("opp-paused");
    paused.paused = true;
    let opportunities =
        MemoryOpportunityStore::with(vec![sample_opportunity("opp-1"), paused]).failing("opp-broken");

    let retriever = ContextRetriever::new(
        Arc::new(MemoryVectorIndex::default()),
        Arc::new(HashEmbedder),
        Arc::new(StaticDocuments::default()),
        4,
    );

    let state = AppState {
        config: test_config(),
        dispatcher: Dispatcher::new(llm.clone()),
        memory: Arc::new(InMemorySessionMemory::default()),
        opportunities: Arc::new(opportunities),
        gate: Arc::new(FixedGate::allow()),
        retriever: Arc::new(retriever),
        applications: applications.clone(),
        files,
    };

    TestApp {
        state,
        llm,
        applications,
    }
}

pub fn test_state() -> (AppState, Arc<ScriptedCompletion>) {
    let app = test_app();
    (app.state, app.llm)
}

// ── Scripted completion service ─────────────────────────────────────────────

pub const APPLICANT_NAME: &str = "Ada Lovelace";
pub const APPLICANT_EMAIL: &str = "ada@example.com";
const NAME_PROMPT: &str = "Welcome! To get started, what is your full name?";
const EMAIL_PROMPT: &str = "Nice to meet you. What is your email address?";
const PHOTO_OFFER: &str =
    "Got it, thank you! Would you like to upload a profile picture? Answer yes or skip.";
const CLOSING: &str =
    "All set! You can finish your application now or ask me anything about the role.";

/// The interviewer's reply after the applicant's `user_turns`-th message.
pub fn interviewer_reply(user_turns: usize, latest_input: &str) -> String {
    let questions = sample_questions();
    match user_turns {
        0 | 1 => NAME_PROMPT.to_string(),
        2 => EMAIL_PROMPT.to_string(),
        n if n <= questions.len() + 2 => format!("Question {}: {}", n - 2, questions[n - 3]),
        n if n == questions.len() + 3 => format!(
            "Thank you! Please upload your resume (CV) to continue.\n\n{ASSESSMENT_OPEN}\n\
             Question: {}\nAnswer: {latest_input}\nAssessment: Clear, specific answer.\n\
             Score: 8/10\n{ASSESSMENT_CLOSE}",
            questions[questions.len() - 1]
        ),
        n if n == questions.len() + 4 => PHOTO_OFFER.to_string(),
        _ => CLOSING.to_string(),
    }
}

/// A complete interview up to the résumé request, as stored turns.
pub fn scripted_interview(opportunity: &OpportunityContext) -> Vec<Turn> {
    let mut inputs = vec!["Hi".to_string(), APPLICANT_NAME.to_string(), APPLICANT_EMAIL.to_string()];
    inputs.extend(
        opportunity
            .fixed_questions
            .iter()
            .enumerate()
            .map(|(i, _)| format!("My answer to question {}", i + 1)),
    );

    inputs
        .iter()
        .enumerate()
        .flat_map(|(i, input)| [Turn::user(input.clone()), Turn::assistant(interviewer_reply(i + 1, input))])
        .collect()
}

/// Deterministic stand-in for the completion service. Records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    requests: Mutex<Vec<CompletionRequest>>,
    failing: HashSet<ChainKind>,
}

impl ScriptedCompletion {
    pub fn failing(mut self, chain: ChainKind) -> Self {
        self.failing.insert(chain);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn respond(&self, request: CompletionRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.failing.contains(&request.chain) {
            return Err(LlmError::Api {
                status: 529,
                message: "Overloaded".to_string(),
            });
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(match request.chain {
            ChainKind::Continuation => {
                let user_turns = request.messages.iter().filter(|m| m.role == Role::User).count();
                interviewer_reply(user_turns, &prompt)
            }
            ChainKind::CvClassifier => {
                let text = prompt
                    .split("\"\"\"")
                    .nth(1)
                    .unwrap_or_default()
                    .to_lowercase();
                let asks = text
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|w| w == "resume" || w == "cv");
                let verdict = if asks { "Yes\n" } else { "no" };
                verdict.to_string()
            }
            ChainKind::Farewell => "Goodbye, and thanks for applying!".to_string(),
            ChainKind::FieldExtraction => {
                let fields = TranscriptFields::parse(&prompt);
                let mut parts = vec![
                    format!("Name => {}", fields.name),
                    format!("Email => {}", fields.email),
                ];
                parts.extend(fields.answers.iter().map(|(q, a)| format!("{q} => {a}")));
                parts.join("; ")
            }
            ChainKind::ApplicationExtraction => {
                let fields = TranscriptFields::parse(&prompt);
                let data = ExtractedApplicationData {
                    name: fields.name,
                    email: fields.email,
                    answers: fields.answers.into_iter().map(|(_, a)| a).collect(),
                    ..Default::default()
                };
                format!("```json\n{}\n```", serde_json::to_string(&data)?)
            }
            ChainKind::ScreeningQuestions => "No questions asked.".to_string(),
            ChainKind::EmailLookup => TranscriptFields::parse(&prompt).email,
            ChainKind::ExperienceSummary => "Seasoned distributed-systems engineer.".to_string(),
            ChainKind::ComprehensiveAssessment => "Strong fit for the role.".to_string(),
        })
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.respond(request)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream, LlmError> {
        let text = self.respond(request)?;
        let chunks: Vec<Result<String, LlmError>> =
            text.split_inclusive(' ').map(|c| Ok(c.to_string())).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Reads name, email and numbered answers back out of a rendered transcript.
struct TranscriptFields {
    name: String,
    email: String,
    answers: Vec<(String, String)>,
}

enum Pending {
    Name,
    Email,
    Question(String),
}

impl TranscriptFields {
    fn parse(prompt: &str) -> Self {
        let mut fields = TranscriptFields {
            name: String::new(),
            email: String::new(),
            answers: Vec::new(),
        };
        let mut pending = None;

        for line in prompt.lines() {
            if let Some(text) = line.strip_prefix("Assistant: ") {
                pending = if text == NAME_PROMPT {
                    Some(Pending::Name)
                } else if text == EMAIL_PROMPT {
                    Some(Pending::Email)
                } else {
                    text.strip_prefix("Question ")
                        .and_then(|rest| rest.split_once(": "))
                        .map(|(_, question)| Pending::Question(question.to_string()))
                };
            } else if let Some(answer) = line.strip_prefix("Applicant: ") {
                match pending.take() {
                    Some(Pending::Name) => fields.name = answer.to_string(),
                    Some(Pending::Email) => fields.email = answer.to_string(),
                    Some(Pending::Question(q)) => fields.answers.push((q, answer.to_string())),
                    None => {}
                }
            }
        }
        fields
    }
}

// ── Retrieval fakes ─────────────────────────────────────────────────────────

const EMBEDDING_DIMS: usize = 64;

/// Bag-of-words vectors: each lowercase word hashed into a bucket.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; EMBEDDING_DIMS];
                for word in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let bucket = word
                        .bytes()
                        .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                    vector[bucket % EMBEDDING_DIMS] += 1.0;
                }
                vector
            })
            .collect())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    passages: Mutex<Vec<(String, IndexedPassage)>>,
    upserts: AtomicUsize,
}

impl MemoryVectorIndex {
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, opportunity_id: &str, passages: &[IndexedPassage]) -> Result<(), AppError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut stored = self
            .passages
            .lock()
            .map_err(|_| AppError::Retrieval("index lock poisoned".to_string()))?;
        for passage in passages {
            stored.retain(|(id, p)| !(id == opportunity_id && p.content == passage.content));
            stored.push((opportunity_id.to_string(), passage.clone()));
        }
        Ok(())
    }

    async fn search(
        &self,
        opportunity_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>, AppError> {
        let stored = self
            .passages
            .lock()
            .map_err(|_| AppError::Retrieval("index lock poisoned".to_string()))?;
        let mut scored: Vec<(f32, RetrievedPassage)> = stored
            .iter()
            .filter(|(id, _)| id == opportunity_id)
            .map(|(id, p)| {
                (
                    cosine(embedding, &p.embedding),
                    RetrievedPassage {
                        content: p.content.clone(),
                        opportunity_id: id.clone(),
                    },
                )
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, p)| p).collect())
    }
}

/// Returns a fixed result set for every search, whatever the opportunity.
pub struct LeakyVectorIndex {
    results: Vec<RetrievedPassage>,
}

impl LeakyVectorIndex {
    pub fn new(results: Vec<RetrievedPassage>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl VectorIndex for LeakyVectorIndex {
    async fn upsert(&self, _: &str, _: &[IndexedPassage]) -> Result<(), AppError> {
        Ok(())
    }

    async fn search(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<RetrievedPassage>, AppError> {
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub struct StaticDocuments {
    texts: HashMap<String, String>,
    failing: HashSet<String>,
}

impl StaticDocuments {
    pub fn with(mut self, reference: &str, text: &str) -> Self {
        self.texts.insert(reference.to_string(), text.to_string());
        self
    }

    pub fn failing(mut self, reference: &str) -> Self {
        self.failing.insert(reference.to_string());
        self
    }
}

#[async_trait]
impl DocumentSource for StaticDocuments {
    async fn fetch_text(&self, reference: &str) -> Result<String, AppError> {
        if self.failing.contains(reference) {
            return Err(AppError::Retrieval(format!("{reference} unreachable")));
        }
        self.texts
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::NotFound(reference.to_string()))
    }
}

// ── Stores ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySessionMemory {
    sessions: Mutex<HashMap<String, Vec<Turn>>>,
}

#[async_trait]
impl SessionMemory for InMemorySessionMemory {
    async fn append(&self, session_key: &str, turn: &Turn) -> Result<(), AppError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("session lock poisoned")))?;
        sessions
            .entry(session_key.to_string())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn load_history(&self, session_key: &str) -> Result<Vec<Turn>, AppError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("session lock poisoned")))?;
        Ok(sessions.get(session_key).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryOpportunityStore {
    opportunities: HashMap<String, OpportunityContext>,
    broken: HashSet<String>,
    loads: AtomicUsize,
}

impl MemoryOpportunityStore {
    pub fn with(opportunities: Vec<OpportunityContext>) -> Self {
        Self {
            opportunities: opportunities.into_iter().map(|o| (o.id.clone(), o)).collect(),
            ..Default::default()
        }
    }

    /// `id` fails to load as if its row were malformed.
    pub fn failing(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpportunityStore for MemoryOpportunityStore {
    async fn load(&self, opportunity_id: &str) -> Result<Option<OpportunityContext>, AppError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(opportunity_id) {
            return Err(AppError::ContextUnavailable(format!(
                "Opportunity {opportunity_id} has 5 fixed questions, expected 6"
            )));
        }
        Ok(self.opportunities.get(opportunity_id).cloned())
    }
}

pub struct FixedGate {
    check: LimitCheck,
}

impl FixedGate {
    pub fn allow() -> Self {
        Self {
            check: LimitCheck::allowed(),
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            check: LimitCheck {
                allowed: false,
                reason: Some(reason.to_string()),
                limit: Some(10),
                current: Some(10),
            },
        }
    }
}

#[async_trait]
impl SubmissionGate for FixedGate {
    async fn check(&self, _: &str, _: &str) -> Result<LimitCheck, AppError> {
        Ok(self.check.clone())
    }
}

#[derive(Default)]
pub struct MemoryApplicationStore {
    records: Mutex<Vec<ApplicationRecord>>,
}

impl MemoryApplicationStore {
    pub fn get(&self, id: Uuid) -> Option<ApplicationRecord> {
        self.records
            .lock()
            .ok()?
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn create(&self, application: NewApplication) -> Result<Stored, AppError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("store lock poisoned")))?;
        if let Some(existing) = records.iter().find(|r| r.session_key == application.session_key) {
            return Ok(Stored {
                record: existing.clone(),
                inserted: false,
            });
        }

        let record = ApplicationRecord {
            id: Uuid::new_v4(),
            opportunity_id: application.opportunity_id,
            organization_id: application.organization_id,
            session_key: application.session_key,
            data: application.data,
            resume_url: application.resume_url,
            photo_url: application.photo_url,
            ai_score: application.ai_score,
            ai_flag: application.ai_flag,
            status: STATUS_SUBMITTED.to_string(),
            experience_summary: None,
            ai_assessment: None,
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(Stored {
            record,
            inserted: true,
        })
    }

    async fn find_by_session(
        &self,
        session_key: &str,
    ) -> Result<Option<ApplicationRecord>, AppError> {
        let records = self
            .records
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("store lock poisoned")))?;
        Ok(records.iter().find(|r| r.session_key == session_key).cloned())
    }

    async fn attach_enrichment(
        &self,
        id: Uuid,
        experience_summary: Option<String>,
        ai_assessment: Option<String>,
    ) -> Result<(), AppError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("store lock poisoned")))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;
        record.experience_summary = experience_summary.or(record.experience_summary.take());
        record.ai_assessment = ai_assessment.or(record.ai_assessment.take());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, key: &str, _content_type: &str, content: Bytes) -> Result<String, AppError> {
        self.files
            .lock()
            .map_err(|_| AppError::Storage("file lock poisoned".to_string()))?
            .insert(key.to_string(), content);
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> Result<Bytes, AppError> {
        self.files
            .lock()
            .map_err(|_| AppError::Storage("file lock poisoned".to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("No object at {key}")))
    }
}
