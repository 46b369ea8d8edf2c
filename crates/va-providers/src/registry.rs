//! Builds the configured [`LlmProvider`] from [`LlmConfig`] (§4.4, §4.11).

use std::sync::Arc;

use va_domain::config::{LlmConfig, LlmWireFormat};
use va_domain::error::Result;

use crate::llm_anthropic::AnthropicProvider;
use crate::llm_openai::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Instantiate the LLM adapter selected by `config.wire_format`.
pub fn build_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.wire_format {
        LlmWireFormat::OpenAiCompat => {
            Ok(Arc::new(OpenAiCompatProvider::from_config(config)?) as Arc<dyn LlmProvider>)
        }
        LlmWireFormat::Anthropic => {
            Ok(Arc::new(AnthropicProvider::from_config(config)?) as Arc<dyn LlmProvider>)
        }
    }
}
