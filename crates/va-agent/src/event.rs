//! Events the agent loop yields to its caller as it runs (§4.7, §4.8).
//!
//! The orchestrator forwards `Text` into the TTS ingress stream and maps
//! `ToolStart`/`ToolResult` directly onto the wire `tool` start/result
//! messages (§6) — that's also how it distinguishes the `thinking` and
//! `executing` sub-states of a single agent-loop task.

use serde_json::Value;

use va_domain::Message;

#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// An incremental assistant text token, forwarded to TTS ingress.
    Text(String),
    /// A tool call is about to be dispatched.
    ToolStart {
        tool_call_id: String,
        name: String,
        arguments: Value,
    },
    /// A tool call finished (or was never dispatched due to a malformed
    /// arguments payload — always reported as `is_error`, never dropped).
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
        is_error: bool,
        elapsed_ms: u64,
    },
    /// The loop is finished: either the model stopped cleanly, or the round
    /// budget was exhausted. Carries the updated history and the counters
    /// the orchestrator folds into the turn's metrics.
    Done {
        history: Vec<Message>,
        tool_calls: u32,
        llm_tokens: u32,
    },
    /// The LLM stream itself failed (network/provider error, not a tool
    /// failure — those are always `ToolResult { is_error: true, .. }`).
    Error(String),
}
