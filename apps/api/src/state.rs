use std::sync::Arc;

use crate::chains::Dispatcher;
use crate::config::Config;
use crate::finalize::store::ApplicationStore;
use crate::memory::SessionMemory;
use crate::opportunity::gate::SubmissionGate;
use crate::opportunity::store::OpportunityStore;
use crate::retrieval::ContextRetriever;
use crate::storage::FileStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator sits behind a trait object so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
    pub memory: Arc<dyn SessionMemory>,
    /// Read-through cached in production.
    pub opportunities: Arc<dyn OpportunityStore>,
    pub gate: Arc<dyn SubmissionGate>,
    pub retriever: Arc<ContextRetriever>,
    pub applications: Arc<dyn ApplicationStore>,
    pub files: Arc<dyn FileStore>,
}
