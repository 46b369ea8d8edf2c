//! Bounded multi-round LLM↔tool loop (§4.7).
//!
//! Each round streams the LLM once, queues any tool calls it emits, and —
//! if there were any — dispatches them in parallel before looping. Text
//! deltas are forwarded only while the model is actively answering; a round
//! that queues tool calls holds its text back from the caller's stream
//! until the next (non-tool) round, so a TTS consumer never hears a
//! fragment of an answer that's about to be followed by a tool detour.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde_json::Value;

use va_domain::config::AgentLoopConfig;
use va_domain::stream::LlmEvent;
use va_domain::{CancelToken, Message, ToolCall};
use va_providers::LlmProvider;
use va_tools::{ToolOutcome, ToolRegistry};

use crate::event::AgentEvent;

/// One call queued during a round — either a genuine tool call, or one
/// whose arguments failed to parse as JSON at end-of-stream.
#[derive(Debug, Clone)]
struct QueuedCall {
    id: String,
    name: String,
    arguments: Value,
    arg_error: bool,
}

pub struct AgentLoop {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentLoopConfig) -> Self {
        Self { llm, tools, config }
    }

    /// Run the loop over `history` (which must already include the new user
    /// message) until the model stops cleanly or the round budget is
    /// exhausted. Every tool invocation shares `cancel`; a cancelled token
    /// aborts the loop before its next suspension point.
    pub fn run(self: Arc<Self>, history: Vec<Message>, cancel: CancelToken) -> impl futures_core::Stream<Item = AgentEvent> {
        async_stream::stream! {
            let mut history = history;
            enforce_history_cap(&mut history, self.config.max_history_messages);

            let mut total_tool_calls = 0u32;
            let mut total_tokens = 0u32;

            for _round in 0..self.config.max_rounds {
                if cancel.is_cancelled() {
                    return;
                }

                let tool_defs = self.tools.describe();
                let mut stream = match self.llm.stream(&history, &tool_defs).await {
                    Ok(s) => s,
                    Err(e) => {
                        yield AgentEvent::Error(e.to_string());
                        return;
                    }
                };

                let mut assistant_text = String::new();
                let mut queued: Vec<QueuedCall> = Vec::new();

                while let Some(event) = stream.next().await {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match event {
                        Ok(LlmEvent::Text { delta }) => {
                            assistant_text.push_str(&delta);
                            yield AgentEvent::Text(delta);
                        }
                        Ok(LlmEvent::ToolCall { id, name, arguments }) => {
                            queued.push(QueuedCall { id, name, arguments, arg_error: false });
                        }
                        Ok(LlmEvent::ToolCallArgumentsError { id, name }) => {
                            queued.push(QueuedCall {
                                id,
                                name,
                                arguments: Value::Null,
                                arg_error: true,
                            });
                        }
                        Ok(LlmEvent::End { usage, .. }) => {
                            if let Some(usage) = usage {
                                total_tokens += usage.completion_tokens;
                            }
                            break;
                        }
                        Err(e) => {
                            yield AgentEvent::Error(e.to_string());
                            return;
                        }
                    }
                }

                let tool_calls: Vec<ToolCall> = queued
                    .iter()
                    .map(|q| ToolCall {
                        id: q.id.clone(),
                        name: q.name.clone(),
                        arguments: q.arguments.clone(),
                    })
                    .collect();

                history.push(if tool_calls.is_empty() {
                    Message::assistant(assistant_text)
                } else {
                    Message::assistant_with_tool_calls(assistant_text, tool_calls)
                });

                if queued.is_empty() {
                    yield AgentEvent::Done {
                        history,
                        tool_calls: total_tool_calls,
                        llm_tokens: total_tokens,
                    };
                    return;
                }

                if cancel.is_cancelled() {
                    return;
                }

                total_tool_calls += queued.len() as u32;

                for call in &queued {
                    yield AgentEvent::ToolStart {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    };
                }

                let tools = self.tools.clone();
                let dispatches = queued.iter().cloned().map(|call| {
                    let tools = tools.clone();
                    let cancel = cancel.clone();
                    async move {
                        let start = Instant::now();
                        let outcome = if call.arg_error {
                            ToolOutcome::error("tool call arguments were not valid JSON")
                        } else {
                            tools.invoke(&call.name, call.arguments.clone(), cancel).await
                        };
                        (call, outcome, start.elapsed())
                    }
                });
                let results = futures_util::future::join_all(dispatches).await;

                if cancel.is_cancelled() {
                    return;
                }

                for (call, outcome, elapsed) in results {
                    yield AgentEvent::ToolResult {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        content: outcome.text.clone(),
                        is_error: outcome.is_error,
                        elapsed_ms: elapsed.as_millis() as u64,
                    };
                    history.push(Message::tool_result(call.id, outcome.text));
                }
            }

            let terminal = "(reached maximum reasoning rounds)";
            yield AgentEvent::Text(terminal.to_string());
            history.push(Message::assistant(terminal));
            yield AgentEvent::Done {
                history,
                tool_calls: total_tool_calls,
                llm_tokens: total_tokens,
            };
        }
    }
}

/// Drop the oldest non-system messages once history exceeds `max_messages`.
/// The system message (always `history[0]` once present) is never pruned.
fn enforce_history_cap(history: &mut Vec<Message>, max_messages: usize) {
    if max_messages == 0 || history.len() <= max_messages {
        return;
    }
    let has_system = matches!(history.first(), Some(m) if m.role == va_domain::Role::System);
    let keep_from = history.len() - max_messages + if has_system { 1 } else { 0 };
    if has_system {
        history.drain(1..keep_from.max(1));
    } else {
        history.drain(0..keep_from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_core::Stream;
    use std::pin::Pin;
    use va_domain::config::ToolsConfig;
    use va_domain::error::Result;
    use va_domain::stream::{BoxStream, FinishReason};
    use va_domain::ToolDefinition;
    use va_tools::Tool;

    struct ScriptedLlm {
        rounds: std::sync::Mutex<Vec<Vec<LlmEvent>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn stream(
            &self,
            _history: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<BoxStream<'static, Result<LlmEvent>>> {
            let mut rounds = self.rounds.lock().unwrap();
            let round = if rounds.is_empty() {
                vec![LlmEvent::End {
                    finish_reason: FinishReason::Stop,
                    usage: None,
                }]
            } else {
                rounds.remove(0)
            };
            Ok(Box::pin(futures_util::stream::iter(round.into_iter().map(Ok))))
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echo".into(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
            ToolOutcome::ok(arguments.to_string())
        }
    }

    async fn collect(stream: Pin<Box<dyn Stream<Item = AgentEvent> + Send>>) -> Vec<AgentEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn clean_stop_with_no_tool_calls_commits_and_closes() {
        let llm = Arc::new(ScriptedLlm {
            rounds: std::sync::Mutex::new(vec![vec![
                LlmEvent::Text { delta: "hi".into() },
                LlmEvent::End {
                    finish_reason: FinishReason::Stop,
                    usage: None,
                },
            ]]),
        });
        let tools = Arc::new(ToolRegistry::new(ToolsConfig::default()));
        let agent = Arc::new(AgentLoop::new(llm, tools, AgentLoopConfig::default()));

        let events = collect(Box::pin(agent.run(vec![Message::user("hey")], CancelToken::new()))).await;

        assert!(matches!(events.first(), Some(AgentEvent::Text(t)) if t == "hi"));
        match events.last() {
            Some(AgentEvent::Done { history, tool_calls, .. }) => {
                assert_eq!(*tool_calls, 0);
                assert_eq!(history.last().unwrap().content, "hi");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_round_dispatches_then_continues() {
        let llm = Arc::new(ScriptedLlm {
            rounds: std::sync::Mutex::new(vec![
                vec![
                    LlmEvent::ToolCall {
                        id: "c1".into(),
                        name: "echo".into(),
                        arguments: serde_json::json!({"x": 1}),
                    },
                    LlmEvent::End {
                        finish_reason: FinishReason::ToolCalls,
                        usage: None,
                    },
                ],
                vec![
                    LlmEvent::Text { delta: "done".into() },
                    LlmEvent::End {
                        finish_reason: FinishReason::Stop,
                        usage: None,
                    },
                ],
            ]),
        });
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(EchoTool));
        let agent = Arc::new(AgentLoop::new(llm, Arc::new(registry), AgentLoopConfig::default()));

        let events = collect(Box::pin(agent.run(vec![Message::user("go")], CancelToken::new()))).await;

        let starts = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolStart { .. }))
            .count();
        let results = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolResult { is_error, .. } if !is_error))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(results, 1);
        match events.last() {
            Some(AgentEvent::Done { tool_calls, .. }) => assert_eq!(*tool_calls, 1),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn round_budget_exhausted_synthesizes_terminal_message() {
        let many_rounds: Vec<Vec<LlmEvent>> = (0..10)
            .map(|_| {
                vec![
                    LlmEvent::ToolCall {
                        id: "c".into(),
                        name: "echo".into(),
                        arguments: serde_json::json!({}),
                    },
                    LlmEvent::End {
                        finish_reason: FinishReason::ToolCalls,
                        usage: None,
                    },
                ]
            })
            .collect();
        let llm = Arc::new(ScriptedLlm {
            rounds: std::sync::Mutex::new(many_rounds),
        });
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(EchoTool));
        let config = AgentLoopConfig {
            max_rounds: 2,
            ..AgentLoopConfig::default()
        };
        let agent = Arc::new(AgentLoop::new(llm, Arc::new(registry), config));

        let events = collect(Box::pin(agent.run(vec![Message::user("go")], CancelToken::new()))).await;

        match events.last() {
            Some(AgentEvent::Done { history, .. }) => {
                assert_eq!(history.last().unwrap().content, "(reached maximum reasoning rounds)");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_before_first_round_stops_immediately() {
        let llm = Arc::new(ScriptedLlm {
            rounds: std::sync::Mutex::new(vec![]),
        });
        let tools = Arc::new(ToolRegistry::new(ToolsConfig::default()));
        let agent = Arc::new(AgentLoop::new(llm, tools, AgentLoopConfig::default()));
        let cancel = CancelToken::new();
        cancel.cancel();

        let events = collect(Box::pin(agent.run(vec![Message::user("hey")], cancel))).await;
        assert!(events.is_empty());
    }

    #[test]
    fn enforce_history_cap_keeps_system_message_and_trims_oldest() {
        let mut history = vec![Message::system("persona")];
        for i in 0..10 {
            history.push(Message::user(format!("msg {i}")));
        }
        enforce_history_cap(&mut history, 5);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, va_domain::Role::System);
        assert_eq!(history.last().unwrap().content, "msg 9");
    }
}
