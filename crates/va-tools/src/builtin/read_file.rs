//! `read_file` — reads a text file from a sandboxed workspace root.

use std::path::PathBuf;

use serde_json::Value;
use tokio::fs;

use va_domain::{CancelToken, ToolDefinition};

use crate::file_ops::validate_path;
use crate::registry::{Tool, ToolOutcome};

pub struct ReadFileTool {
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Reads a text file from the sandboxed workspace root.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path relative to the workspace root."}
                },
                "required": ["path"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let Some(path) = arguments.get("path").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing required field 'path'");
        };

        let resolved = match validate_path(&self.workspace_root, path) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::error(e),
        };

        match fs::read_to_string(&resolved).await {
            Ok(content) => ToolOutcome::ok(content),
            Err(e) => ToolOutcome::error(format!("failed to read '{path}': {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = std::env::temp_dir().join(format!("va-tools-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hello.txt"), "hi there").unwrap();

        let tool = ReadFileTool::new(dir.clone());
        let outcome = tool
            .invoke(serde_json::json!({"path": "hello.txt"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.text, "hi there");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = std::env::temp_dir().join(format!("va-tools-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let tool = ReadFileTool::new(dir.clone());
        let outcome = tool
            .invoke(serde_json::json!({"path": "../etc/passwd"}), CancelToken::new())
            .await;
        assert!(outcome.is_error);

        std::fs::remove_dir_all(&dir).ok();
    }
}
