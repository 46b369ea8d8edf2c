//! Tool registry: `describe()` / `invoke(name, arguments, cancel_token)` (§4.5).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use va_domain::config::ToolsConfig;
use va_domain::{CancelToken, ToolDefinition};

/// The outcome of one tool invocation. Always a textual representation;
/// failures are carried as `is_error = true`, never propagated as an
/// orchestrator-level error, so the model can observe and recover (§4.5).
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// One registered tool. `invoke` receives the already-parsed argument
/// object and the turn's shared cancellation token.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn invoke(&self, arguments: Value, cancel: CancelToken) -> ToolOutcome;
}

/// Registry of all tools available to the agent loop. Invocation is
/// bounded by a wall-clock timeout (default 30 s, tool-overridable).
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    config: ToolsConfig,
}

impl ToolRegistry {
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            tools: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.definition().name.clone(), tool);
    }

    pub fn describe(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke a tool by name under its configured timeout. An unknown tool
    /// name, or a timeout, is surfaced as an `is_error` outcome — never a
    /// `Result::Err` — matching the no-exceptions-to-orchestrator contract.
    pub async fn invoke(&self, name: &str, arguments: Value, cancel: CancelToken) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::error(format!("tool not found: {name}"));
        };

        let timeout = self.config.timeout_for(name);
        match tokio::time::timeout(timeout, tool.invoke(arguments, cancel)).await {
            Ok(outcome) => outcome,
            Err(_) => ToolOutcome::error(format!(
                "tool '{name}' timed out after {}s",
                timeout.as_secs()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
            ToolOutcome::ok(arguments.to_string())
        }
    }

    struct SlowTool;

    #[async_trait::async_trait]
    impl Tool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".into(),
                description: "never returns in time".into(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn invoke(&self, _arguments: Value, _cancel: CancelToken) -> ToolOutcome {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            ToolOutcome::ok("too late")
        }
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_error_not_panic() {
        let registry = ToolRegistry::new(ToolsConfig::default());
        let outcome = registry
            .invoke("nonexistent", serde_json::json!({}), CancelToken::new())
            .await;
        assert!(outcome.is_error);
    }

    #[tokio::test]
    async fn invoke_known_tool_returns_text() {
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(EchoTool));
        let outcome = registry
            .invoke("echo", serde_json::json!({"x": 1}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.text, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn invoke_timeout_yields_error_not_panic() {
        let mut config = ToolsConfig::default();
        config
            .timeout_overrides_sec
            .insert("slow".into(), 0);
        let mut registry = ToolRegistry::new(config);
        registry.register(Arc::new(SlowTool));
        let outcome = registry
            .invoke("slow", serde_json::json!({}), CancelToken::new())
            .await;
        assert!(outcome.is_error);
        assert!(outcome.text.contains("timed out"));
    }

    #[test]
    fn describe_lists_registered_tools_sorted() {
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(SlowTool));
        let defs = registry.describe();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "slow");
    }
}
