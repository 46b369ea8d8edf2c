//! OpenAI-compatible LLM adapter.
//!
//! Works with OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any other
//! endpoint that follows the OpenAI chat-completions streaming contract.

use std::collections::HashMap;

use serde_json::Value;

use va_domain::config::LlmConfig;
use va_domain::error::{Error, Result};
use va_domain::message::{Message, Role, ToolDefinition};
use va_domain::stream::{BoxStream, FinishReason, LlmEvent, Usage};

use crate::traits::LlmProvider;
use crate::util::{from_reqwest, resolve_api_key};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("llm.base_url is not set".into()))?
            .trim_end_matches('/')
            .to_string();
        let api_key = resolve_api_key(&cfg.api_key_env)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url,
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            client,
        })
    }

    fn build_body(&self, history: &[Message], tools: &[ToolDefinition]) -> Value {
        let messages: Vec<Value> = history.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });
        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let tool_calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": if msg.content.is_empty() { Value::Null } else { Value::String(msg.content.clone()) },
                "tool_calls": tool_calls,
            })
        }
        _ => serde_json::json!({
            "role": role_to_str(msg.role),
            "content": msg.content,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn finish_reason_from_str(s: &str) -> FinishReason {
    match s {
        "tool_calls" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Accumulates fragmented tool-call argument deltas across SSE chunks,
/// keyed by the provider's `index` field, and assembles a well-formed
/// `ToolCall` event only once the stream signals `finish_reason`.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    args_buffer: String,
}

#[derive(Default)]
struct StreamState {
    calls: HashMap<u64, ToolCallAccumulator>,
    usage: Option<Usage>,
}

fn parse_sse_data(data: &str, state: &mut StreamState) -> Vec<Result<LlmEvent>> {
    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(usage) = v.get("usage").and_then(parse_usage) {
        state.usage = Some(usage);
    }

    let choice = match v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first()) {
        Some(c) => c,
        None => return Vec::new(),
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let entry = state.calls.entry(idx).or_default();
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                entry.id = id.to_string();
            }
            if let Some(name) = tc
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str())
            {
                entry.name.push_str(name);
            }
            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                entry.args_buffer.push_str(args);
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(LlmEvent::Text { delta: text.to_string() }));
        }
    }

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let mut indices: Vec<u64> = state.calls.keys().copied().collect();
        indices.sort_unstable();
        for idx in indices {
            let acc = state.calls.remove(&idx).unwrap();
            let args_text = if acc.args_buffer.trim().is_empty() {
                "{}"
            } else {
                acc.args_buffer.as_str()
            };
            match serde_json::from_str::<Value>(args_text) {
                Ok(arguments) => events.push(Ok(LlmEvent::ToolCall {
                    id: acc.id,
                    name: acc.name,
                    arguments,
                })),
                Err(_) => events.push(Ok(LlmEvent::ToolCallArgumentsError {
                    id: acc.id,
                    name: acc.name,
                })),
            }
        }
        events.push(Ok(LlmEvent::End {
            finish_reason: finish_reason_from_str(fr),
            usage: state.usage.take(),
        }));
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn stream(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, Result<LlmEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(history, tools);

        tracing::debug!(provider = %self.id, %url, "llm stream request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {text}", status.as_u16()),
            });
        }

        let mut state = StreamState::default();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_sse_data(data, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_parses() {
        let mut state = StreamState::default();
        let events = parse_sse_data(
            r#"{"choices":[{"delta":{"content":"hi"},"index":0}]}"#,
            &mut state,
        );
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            LlmEvent::Text { delta } => assert_eq!(delta, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn tool_call_assembled_from_fragments_on_finish() {
        let mut state = StreamState::default();
        let _ = parse_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_datetime","arguments":""}}]}}]}"#,
            &mut state,
        );
        let _ = parse_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"tz\""}}]}}]}"#,
            &mut state,
        );
        let _ = parse_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"UTC\"}"}}]}}]}"#,
            &mut state,
        );
        let events = parse_sse_data(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            &mut state,
        );
        let mut saw_call = false;
        for ev in events {
            if let LlmEvent::ToolCall { name, arguments, .. } = ev.unwrap() {
                assert_eq!(name, "get_datetime");
                assert_eq!(arguments["tz"], "UTC");
                saw_call = true;
            }
        }
        assert!(saw_call);
    }

    #[test]
    fn malformed_arguments_yield_error_marker_not_partial_json() {
        let mut state = StreamState::default();
        let _ = parse_sse_data(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"x","arguments":"{not json"}}]}}]}"#,
            &mut state,
        );
        let events = parse_sse_data(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            &mut state,
        );
        let mut saw_error = false;
        for ev in events {
            if let LlmEvent::ToolCallArgumentsError { id, name } = ev.unwrap() {
                assert_eq!(id, "c1");
                assert_eq!(name, "x");
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
