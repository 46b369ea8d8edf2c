//! Client↔server wire messages (§6).
//!
//! Every text frame is one of these, tagged on `type`. Binary frames carry
//! raw PCM and are not represented here — the transport layer (`ws.rs`)
//! handles them directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use va_domain::SessionState;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartSession,
    StopSession,
    Interrupt,
    ActivateSkill { name: String },
    DeactivateSkill { name: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State {
        state: SessionState,
    },
    SessionInfo {
        model: String,
        asr_configured: bool,
        llm_configured: bool,
        tts_configured: bool,
        tools: Vec<String>,
        skills: Vec<String>,
        identity_summary: String,
    },
    ConnectionStatus {
        service: &'static str,
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Asr {
        text: String,
        is_final: bool,
    },
    Turn {
        event: &'static str,
        turn_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Llm {
        turn_id: String,
        text: String,
        done: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        token_index: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Tool {
        event: &'static str,
        turn_id: String,
        tool_call_id: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    Skill {
        event: &'static str,
        name: String,
        skills: Vec<String>,
    },
    SkillsList {
        skills: Vec<String>,
    },
    Metrics {
        turn_id: String,
        listening_duration_ms: i64,
        thinking_ms: i64,
        speaking_ms: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        llm_first_token_ms: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tts_first_audio_ms: Option<i64>,
        e2e_latency_ms: i64,
        tts_audio_chunks: u32,
        tts_est_duration_ms: u64,
        llm_tokens: u32,
        llm_tok_per_sec: f64,
        tool_calls: u32,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        turn_id: Option<String>,
        message: String,
    },
}

impl ServerMessage {
    pub fn from_metrics(turn_id: String, m: va_domain::TurnMetrics) -> Self {
        ServerMessage::Metrics {
            turn_id,
            listening_duration_ms: m.listening_duration_ms,
            thinking_ms: m.thinking_ms,
            speaking_ms: m.speaking_ms,
            llm_first_token_ms: m.llm_first_token_ms,
            tts_first_audio_ms: m.tts_first_audio_ms,
            e2e_latency_ms: m.e2e_latency_ms,
            tts_audio_chunks: m.tts_audio_chunks,
            tts_est_duration_ms: m.tts_est_duration_ms,
            llm_tokens: m.llm_tokens,
            llm_tok_per_sec: m.llm_tok_per_sec,
            tool_calls: m.tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_activate_skill() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"activate_skill","name":"coder"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ActivateSkill { name } if name == "coder"));
    }

    #[test]
    fn state_message_uses_lowercase_state_names() {
        let msg = ServerMessage::State {
            state: SessionState::Listening,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"state","state":"listening"}"#);
    }

    #[test]
    fn error_omits_turn_id_when_none() {
        let msg = ServerMessage::Error {
            turn_id: None,
            message: "boom".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("turn_id"));
    }
}
