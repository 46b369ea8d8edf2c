use serde::{Deserialize, Serialize};

/// Which wire format the LLM adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmWireFormat {
    /// OpenAI-compatible `/chat/completions` streaming format.
    OpenAiCompat,
    /// Anthropic `/v1/messages` streaming format.
    Anthropic,
}

impl Default for LlmWireFormat {
    fn default() -> Self {
        LlmWireFormat::OpenAiCompat
    }
}

/// LLM provider connection settings (§4.4, §6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub wire_format: LlmWireFormat,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            wire_format: LlmWireFormat::default(),
            base_url: None,
            api_key_env: d_api_key_env(),
            model: d_model(),
            request_timeout_ms: d_timeout_ms(),
            temperature: None,
        }
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && std::env::var(&self.api_key_env).is_ok()
    }
}

fn d_api_key_env() -> String {
    "VOICEAGENT_LLM_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_timeout_ms() -> u64 {
    30_000
}
