//! `update_user_profile` — overwrites the user-profile identity artifact.

use std::sync::Arc;

use serde_json::Value;

use va_domain::{CancelToken, ProfileStore, ToolDefinition};

use crate::registry::{Tool, ToolOutcome};

pub struct UpdateUserProfileTool {
    store: Arc<dyn ProfileStore>,
}

impl UpdateUserProfileTool {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateUserProfileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "update_user_profile".into(),
            description: "Overwrites the user-profile artifact with new content.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "Full replacement text of the user profile."}
                },
                "required": ["content"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let Some(content) = arguments.get("content").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing required field 'content'");
        };

        match self.store.write_profile(content).await {
            Ok(()) => ToolOutcome::ok("profile updated"),
            Err(e) => ToolOutcome::error(format!("failed to write profile: {e}")),
        }
    }
}
