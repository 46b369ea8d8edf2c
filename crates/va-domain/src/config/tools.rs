use serde::{Deserialize, Serialize};

/// Tool registry settings (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default wall-clock timeout for any tool invocation (seconds).
    #[serde(default = "d_timeout_sec")]
    pub default_timeout_sec: u64,
    /// Per-tool timeout overrides (tool name → seconds).
    #[serde(default)]
    pub timeout_overrides_sec: std::collections::HashMap<String, u64>,
    /// Sandbox root for `read_file` (path-traversal guarded).
    #[serde(default = "d_workspace_root")]
    pub workspace_root: std::path::PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_sec: d_timeout_sec(),
            timeout_overrides_sec: std::collections::HashMap::new(),
            workspace_root: d_workspace_root(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout_for(&self, tool_name: &str) -> std::time::Duration {
        let secs = self
            .timeout_overrides_sec
            .get(tool_name)
            .copied()
            .unwrap_or(self.default_timeout_sec);
        std::time::Duration::from_secs(secs)
    }
}

fn d_timeout_sec() -> u64 {
    30
}
fn d_workspace_root() -> std::path::PathBuf {
    std::path::PathBuf::from("./workspace")
}
