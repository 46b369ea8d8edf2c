use serde::Serialize;

/// Structured trace events emitted across the voice-agent crates.
///
/// These are logged (not persisted) — `emit()` serializes the event to JSON
/// and attaches it to a single `tracing::info!` record so a log shipper can
/// index on `trace_event` without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AdapterConnected {
        adapter: &'static str,
    },
    AdapterDisconnected {
        adapter: &'static str,
        reason: String,
    },
    TurnCommitted {
        turn_id: String,
        chars: usize,
        tool_calls: u32,
    },
    TurnCancelled {
        turn_id: String,
        state: String,
    },
    BargeIn {
        turn_id: String,
        trigger: &'static str,
    },
    ToolInvoked {
        turn_id: String,
        tool_call_id: String,
        name: String,
        is_error: bool,
        elapsed_ms: u64,
    },
    SkillToggled {
        name: String,
        activated: bool,
    },
    IdentityWritten {
        artifact: &'static str,
        bytes: usize,
    },
    SkillDocLoaded {
        skill_name: String,
        doc_chars: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "va_event");
    }
}
