use serde::{Deserialize, Serialize};

/// ASR provider connection settings (§4.2, §6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    /// WebSocket endpoint of the streaming ASR provider.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Environment variable holding the ASR API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// BCP-47 language hint(s) passed to the provider.
    #[serde(default = "d_languages")]
    pub languages: Vec<String>,
    /// Whether to route the initial connect through an outbound HTTP proxy
    /// (env `HTTPS_PROXY`/`ALL_PROXY`). On failure the adapter retries once
    /// with proxying disabled, per §4.2.
    #[serde(default = "d_true")]
    pub use_proxy: bool,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: d_api_key_env(),
            languages: d_languages(),
            use_proxy: true,
        }
    }
}

impl AsrConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && std::env::var(&self.api_key_env).is_ok()
    }
}

fn d_api_key_env() -> String {
    "VOICEAGENT_ASR_API_KEY".into()
}
fn d_languages() -> Vec<String> {
    vec!["en-US".into()]
}
fn d_true() -> bool {
    true
}
