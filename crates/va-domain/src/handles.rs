//! Narrow seams the tool registry is injected with, so `va-tools` can stay
//! decoupled from the concrete identity-store and session-state types that
//! live in `va-identity`/the gateway orchestrator (§4.5, §4.6).

use crate::error::Result;

/// Overwrite the user-profile identity artifact. Implemented by the
/// identity store; a tool holds a handle to one instance.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn write_profile(&self, content: &str) -> Result<()>;
}

/// Toggle a named entry in the session's active-skill set (§4.5's
/// `activate_skill`/`deactivate_skill`). Implemented by the orchestrator's
/// per-session state; a tool holds a handle scoped to one session.
pub trait SkillToggle: Send + Sync {
    /// Returns `true` if the set actually changed.
    fn set_active(&self, name: &str, active: bool) -> bool;
}
