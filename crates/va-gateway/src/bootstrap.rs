//! `AppState` construction, extracted from `main.rs` (§4.11).

use std::sync::Arc;

use va_domain::config::Config;
use va_identity::IdentityStore;
use va_providers::registry::build_llm_provider;

use crate::state::AppState;

/// Build the process-global [`AppState`] from a validated [`Config`].
///
/// The LLM provider is built eagerly (shared across sessions, stateless
/// per request); ASR/TTS adapters are per-session and are constructed by
/// `ws.rs` when a client connects, since each holds its own upstream
/// connection.
pub fn build_app_state(config: Arc<Config>) -> AppState {
    let llm = if config.readiness().llm_configured {
        match build_llm_provider(&config.llm) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "failed to initialize LLM provider, turns will error");
                None
            }
        }
    } else {
        tracing::warn!("no LLM provider configured — turns will error until configured");
        None
    };

    let identity = Arc::new(IdentityStore::new(config.identity.root.clone()));

    let skills = match va_skills::SkillsRegistry::load(&config.skills.root) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::warn!(error = %e, "failed to load skills registry, starting with none");
            Arc::new(va_skills::SkillsRegistry::empty())
        }
    };

    AppState {
        config,
        llm,
        identity,
        skills,
    }
}
