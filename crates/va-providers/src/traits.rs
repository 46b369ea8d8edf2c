//! Adapter contracts for the three streaming services (§4.2–§4.4).

use va_domain::error::Result;
use va_domain::message::{Message, ToolDefinition};
use va_domain::stream::{AsrEvent, BoxStream, LlmEvent};

/// Trait every LLM adapter must implement (§4.4).
///
/// Implementations are provider-specific (OpenAI-compatible chat-completions,
/// Anthropic messages) and translate between [`Message`]/[`ToolDefinition`]
/// and their own wire format.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream a chat completion over the given history and tool schema list.
    async fn stream(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, Result<LlmEvent>>>;

    /// A unique identifier for this provider instance (used in logs/traces).
    fn provider_id(&self) -> &str;
}

/// Trait the streaming ASR adapter implements (§4.2).
#[async_trait::async_trait]
pub trait AsrAdapter: Send + Sync {
    /// Feed a chunk of raw 16 kHz mono PCM. Silently drops while half-open.
    async fn feed(&self, pcm: &[u8]) -> Result<()>;

    /// The event stream for this adapter's lifetime. Call once; the
    /// returned stream yields `partial`/`final`/`endpoint`/`error` events
    /// until the adapter is dropped.
    fn events(&self) -> BoxStream<'static, AsrEvent>;

    /// Request a reconnect after the adapter entered the half-open state.
    async fn reconnect(&self) -> Result<()>;
}

/// Trait the streaming TTS adapter implements (§4.3).
#[async_trait::async_trait]
pub trait TtsAdapter: Send + Sync {
    /// Begin synthesizing. Returns a PCM chunk stream (24 kHz mono); the
    /// caller pushes text fragments via [`TtsAdapter::push_text`] and
    /// signals completion with [`TtsAdapter::finish`].
    async fn synthesize(&self) -> Result<BoxStream<'static, Result<Vec<u8>>>>;

    /// Push one text fragment to the in-flight synthesis.
    async fn push_text(&self, fragment: &str) -> Result<()>;

    /// Signal no more text fragments are coming.
    async fn finish(&self) -> Result<()>;

    /// Cancel in-flight synthesis. Within ~50 ms no further PCM chunks are
    /// emitted and the upstream session is closed (§4.3).
    fn cancel(&self);
}
