//! Anthropic Messages API adapter.

use std::collections::HashMap;

use serde_json::Value;

use va_domain::config::LlmConfig;
use va_domain::error::{Error, Result};
use va_domain::message::{Message, Role, ToolDefinition};
use va_domain::stream::{BoxStream, FinishReason, LlmEvent, Usage};

use crate::traits::LlmProvider;
use crate::util::{from_reqwest, resolve_api_key};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl AnthropicProvider {
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
            id: "anthropic".into(),
            base_url,
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            client,
        })
    }

    fn build_body(&self, history: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut system_parts = Vec::new();
        let mut messages = Vec::new();

        for msg in history {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User => messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content,
                })),
                Role::Assistant => {
                    let mut blocks: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(serde_json::json!({"type": "text", "text": msg.content}));
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(serde_json::json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    messages.push(serde_json::json!({"role": "assistant", "content": blocks}));
                }
                Role::Tool => {
                    messages.push(serde_json::json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                            "content": msg.content,
                        }],
                    }));
                }
            }
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "max_tokens": 4096,
        });
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

fn finish_reason_from_str(s: &str) -> FinishReason {
    match s {
        "tool_use" => FinishReason::ToolCalls,
        "max_tokens" => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

#[derive(Default)]
struct ActiveToolCall {
    id: String,
    name: String,
    args_buffer: String,
}

#[derive(Default)]
struct StreamState {
    active: HashMap<u64, ActiveToolCall>,
    usage: Option<Usage>,
    end_emitted: bool,
}

fn parse_sse_data(data: &str, state: &mut StreamState) -> Vec<Result<LlmEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };
    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let mut events = Vec::new();

    match event_type {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_usage);
            }
        }
        "content_block_start" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    let id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    state.active.insert(idx, ActiveToolCall { id, name, args_buffer: String::new() });
                }
            }
        }
        "content_block_delta" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                match delta.get("type").and_then(|v| v.as_str()) {
                    Some("text_delta") => {
                        if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                events.push(Ok(LlmEvent::Text { delta: text.to_string() }));
                            }
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                            if let Some(tc) = state.active.get_mut(&idx) {
                                tc.args_buffer.push_str(partial);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "content_block_stop" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(tc) = state.active.remove(&idx) {
                let args_text = if tc.args_buffer.trim().is_empty() { "{}" } else { &tc.args_buffer };
                match serde_json::from_str::<Value>(args_text) {
                    Ok(arguments) => events.push(Ok(LlmEvent::ToolCall { id: tc.id, name: tc.name, arguments })),
                    Err(_) => events.push(Ok(LlmEvent::ToolCallArgumentsError { id: tc.id, name: tc.name })),
                }
            }
        }
        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(|v| v.as_u64())
            {
                if let Some(u) = state.usage.as_mut() {
                    u.completion_tokens = output as u32;
                    u.total_tokens = u.prompt_tokens + u.completion_tokens;
                }
            }
            if let Some(stop_reason) = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
            {
                state.end_emitted = true;
                events.push(Ok(LlmEvent::End {
                    finish_reason: finish_reason_from_str(stop_reason),
                    usage: state.usage,
                }));
            }
        }
        "message_stop" => {
            if !state.end_emitted {
                state.end_emitted = true;
                events.push(Ok(LlmEvent::End { finish_reason: FinishReason::Stop, usage: state.usage }));
            }
        }
        _ => {}
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn stream(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<BoxStream<'static, Result<LlmEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(history, tools);

        tracing::debug!(provider = %self.id, %url, "llm stream request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            &mut state,
        );
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            LlmEvent::Text { delta } => assert_eq!(delta, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn tool_call_assembled_on_block_stop() {
        let mut state = StreamState::default();
        let _ = parse_sse_data(
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_datetime"}}"#,
            &mut state,
        );
        let _ = parse_sse_data(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"tz\":\"UTC\"}"}}"#,
            &mut state,
        );
        let events = parse_sse_data(r#"{"type":"content_block_stop","index":0}"#, &mut state);
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
}
