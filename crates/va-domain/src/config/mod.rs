mod agent;
mod asr;
mod identity;
mod llm;
mod server;
mod skills;
mod tools;
mod tts;

pub use agent::*;
pub use asr::*;
pub use identity::*;
pub use llm::*;
pub use server::*;
pub use skills::*;
pub use tools::*;
pub use tts::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub asr: AsrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub agent: AgentLoopConfig,
}

/// Severity of a single configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

/// Readiness flags derived from configuration: which adapters are
/// usable given current env vars and endpoints (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub asr_configured: bool,
    pub llm_configured: bool,
    pub tts_configured: bool,
}

impl Config {
    /// Load configuration from the TOML file named by `VOICEAGENT_CONFIG`
    /// (defaulting to `config.toml`), falling back to [`Config::default`]
    /// when no such file exists. Per-adapter secrets are read separately
    /// from the environment variables named by each `*_config.api_key_env`
    /// field, never stored in the file.
    pub fn from_env() -> anyhow::Result<(Self, String)> {
        let config_path =
            std::env::var("VOICEAGENT_CONFIG").unwrap_or_else(|_| "config.toml".into());

        let config = if std::path::Path::new(&config_path).exists() {
            let raw = std::fs::read_to_string(&config_path)
                .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
            toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
        } else {
            Config::default()
        };

        Ok((config, config_path))
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            asr_configured: self.asr.is_configured(),
            llm_configured: self.llm.is_configured(),
            tts_configured: self.tts.is_configured(),
        }
    }

    /// Validate the configuration and return a list of issues. An empty
    /// vec means the config is usable as-is.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if !self.llm.is_configured() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm".into(),
                message: format!(
                    "no LLM endpoint configured, or {} is unset — turns cannot be run",
                    self.llm.api_key_env
                ),
            });
        }
        if !self.asr.is_configured() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "asr".into(),
                message: format!(
                    "no ASR endpoint configured, or {} is unset — uplink audio will not transcribe",
                    self.asr.api_key_env
                ),
            });
        }
        if !self.tts.is_configured() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "tts".into(),
                message: format!(
                    "no TTS endpoint configured, or {} is unset — replies will not speak",
                    self.tts.api_key_env
                ),
            });
        }

        if self.agent.max_rounds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "agent.max_rounds".into(),
                message: "max_rounds must be greater than 0".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        std::env::set_var("VOICEAGENT_TEST_LLM_KEY", "x");
        std::env::set_var("VOICEAGENT_TEST_ASR_KEY", "x");
        std::env::set_var("VOICEAGENT_TEST_TTS_KEY", "x");
        Config {
            llm: LlmConfig {
                base_url: Some("https://api.example.com/v1".into()),
                api_key_env: "VOICEAGENT_TEST_LLM_KEY".into(),
                ..LlmConfig::default()
            },
            asr: AsrConfig {
                endpoint: Some("wss://asr.example.com".into()),
                api_key_env: "VOICEAGENT_TEST_ASR_KEY".into(),
                ..AsrConfig::default()
            },
            tts: TtsConfig {
                endpoint: Some("wss://tts.example.com".into()),
                api_key_env: "VOICEAGENT_TEST_TTS_KEY".into(),
                ..TtsConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn fully_configured_has_no_errors() {
        let cfg = configured();
        let errors: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
        let ready = cfg.readiness();
        assert!(ready.llm_configured && ready.asr_configured && ready.tts_configured);
    }

    #[test]
    fn default_config_warns_on_unconfigured_adapters() {
        let cfg = Config::default();
        let warnings: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|i| i.severity == ConfigSeverity::Warning)
            .collect();
        assert!(warnings.iter().any(|w| w.field == "llm"));
        assert!(warnings.iter().any(|w| w.field == "asr"));
        assert!(warnings.iter().any(|w| w.field == "tts"));
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = configured();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = configured();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.cors.allowed_origins"));
    }
}
