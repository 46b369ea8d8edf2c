use serde::{Deserialize, Serialize};

/// TTS provider connection settings (§4.3, §6 Configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Voice identifier passed to the provider.
    #[serde(default = "d_voice")]
    pub voice: String,
    /// Target sample rate for downlink PCM — fixed at 24 kHz per §4.1.
    #[serde(default = "d_sample_rate")]
    pub sample_rate_hz: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: d_api_key_env(),
            voice: d_voice(),
            sample_rate_hz: d_sample_rate(),
        }
    }
}

impl TtsConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && std::env::var(&self.api_key_env).is_ok()
    }
}

fn d_api_key_env() -> String {
    "VOICEAGENT_TTS_API_KEY".into()
}
fn d_voice() -> String {
    "default".into()
}
fn d_sample_rate() -> u32 {
    24_000
}
