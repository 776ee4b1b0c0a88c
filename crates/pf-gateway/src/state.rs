use std::sync::Arc;

use pf_broadcast::Broadcaster;
use pf_catalog::Catalog;
use pf_contextpack::ContextBuilder;
use pf_domain::config::Config;
use pf_llm::LlmProvider;
use pf_store::SessionStore;
use pf_toolserver::ToolServer;

use crate::runtime::conductor::ConductorRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub store: SessionStore,
    pub tools: Arc<ToolServer>,
    pub broadcast: Arc<Broadcaster>,
    pub llm: Arc<dyn LlmProvider>,
    pub context: Arc<dyn ContextBuilder>,
    pub conductors: Arc<ConductorRegistry>,
}
