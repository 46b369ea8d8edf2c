//! `activate_skill` / `deactivate_skill` — mutate session state rather than
//! returning computed data: the orchestrator rebuilds the system prompt on
//! the next turn from the session's active-skill set (§4.5).

use std::sync::Arc;

use serde_json::Value;

use va_domain::{CancelToken, SkillToggle, ToolDefinition};

use crate::registry::{Tool, ToolOutcome};

pub struct ActivateSkillTool {
    toggle: Arc<dyn SkillToggle>,
}

impl ActivateSkillTool {
    pub fn new(toggle: Arc<dyn SkillToggle>) -> Self {
        Self { toggle }
    }
}

#[async_trait::async_trait]
impl Tool for ActivateSkillTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "activate_skill".into(),
            description: "Activates a named skill for the remainder of the session.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let Some(name) = arguments.get("name").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing required field 'name'");
        };
        let changed = self.toggle.set_active(name, true);
        ToolOutcome::ok(if changed {
            format!("skill '{name}' activated")
        } else {
            format!("skill '{name}' was already active")
        })
    }
}

pub struct DeactivateSkillTool {
    toggle: Arc<dyn SkillToggle>,
}

impl DeactivateSkillTool {
    pub fn new(toggle: Arc<dyn SkillToggle>) -> Self {
        Self { toggle }
    }
}

#[async_trait::async_trait]
impl Tool for DeactivateSkillTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "deactivate_skill".into(),
            description: "Deactivates a named skill for the remainder of the session.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let Some(name) = arguments.get("name").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing required field 'name'");
        };
        let changed = self.toggle.set_active(name, false);
        ToolOutcome::ok(if changed {
            format!("skill '{name}' deactivated")
        } else {
            format!("skill '{name}' was not active")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use va_domain::ActiveSkills;

    struct SessionSkills(Mutex<ActiveSkills>);

    impl SkillToggle for SessionSkills {
        fn set_active(&self, name: &str, active: bool) -> bool {
            let mut skills = self.0.lock();
            if active {
                skills.activate(name)
            } else {
                skills.deactivate(name)
            }
        }
    }

    #[tokio::test]
    async fn activate_then_deactivate() {
        let skills = Arc::new(SessionSkills(Mutex::new(ActiveSkills::default())));
        let activate = ActivateSkillTool::new(skills.clone());
        let deactivate = DeactivateSkillTool::new(skills.clone());

        let outcome = activate
            .invoke(serde_json::json!({"name": "coder"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert!(skills.0.lock().contains("coder"));

        let outcome = deactivate
            .invoke(serde_json::json!({"name": "coder"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert!(!skills.0.lock().contains("coder"));
    }

    #[tokio::test]
    async fn deactivating_inactive_skill_reports_no_change() {
        let skills = Arc::new(SessionSkills(Mutex::new(ActiveSkills::default())));
        let deactivate = DeactivateSkillTool::new(skills);
        let outcome = deactivate
            .invoke(serde_json::json!({"name": "ghost"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert!(outcome.text.contains("not active"));
    }
}
