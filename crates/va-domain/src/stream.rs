//! Streaming event types shared by the LLM, ASR and TTS adapters.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream — used for every adapter's streaming contract.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Token usage for an LLM completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the LLM stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
}

/// Events emitted by an [`LlmProvider`](crate::provider::LlmProvider) streaming
/// chat completion. Tool-call arguments are only ever emitted once fully
/// assembled — never as partial JSON.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    /// An incremental text token.
    Text { delta: String },
    /// A fully-assembled tool call request.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Argument accumulation failed to parse as JSON at end-of-stream.
    ToolCallArgumentsError { id: String, name: String },
    /// Terminal event.
    End {
        finish_reason: FinishReason,
        usage: Option<Usage>,
    },
}

/// Events emitted by the ASR adapter as it consumes uplink PCM.
#[derive(Debug, Clone, PartialEq)]
pub enum AsrEvent {
    /// A non-final (provisional) transcription of the current utterance tail.
    Partial { text: String },
    /// A final token — appended to the per-utterance buffer.
    Final { text: String },
    /// The provider detected the speaker stopped; carries the committed text
    /// (concatenation of all `Final` tokens since the last endpoint).
    Endpoint { text: String },
    /// Unrecoverable connection failure — the adapter is now half-open.
    Error { message: String },
}
