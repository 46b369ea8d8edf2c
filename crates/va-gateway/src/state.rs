//! Process-global application state, shared across all sessions (§4.11).

use std::sync::Arc;

use va_domain::config::Config;
use va_identity::IdentityStore;
use va_providers::LlmProvider;
use va_skills::SkillsRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when `config.llm` has no usable endpoint/credential — the
    /// gateway still serves connections but every turn ends in an
    /// immediate `error` (§6 readiness flags).
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub identity: Arc<IdentityStore>,
    pub skills: Arc<SkillsRegistry>,
}
