//! Core session/turn data model (§3 of the spec).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five orchestrator states. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Listening,
    Thinking,
    Executing,
    Speaking,
}

impl SessionState {
    /// Whether `(self, next)` is a legal transition per the §4.8 table.
    ///
    /// `Idle` can be reached from any state (`stop_session` is accepted
    /// everywhere); every other edge is listed explicitly.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        if next == Idle {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Listening)
                | (Listening, Thinking)
                | (Thinking, Executing)
                | (Thinking, Speaking)
                | (Executing, Thinking)
                | (Executing, Speaking)
                | (Speaking, Listening)
                | (Executing, Listening)
                | (Thinking, Listening)
        )
    }
}

/// Per-turn stage timestamps, used to derive the `metrics` wire message.
#[derive(Debug, Clone, Default)]
pub struct TurnTimestamps {
    pub listening_start: Option<DateTime<Utc>>,
    pub listening_end: Option<DateTime<Utc>>,
    pub first_llm_token: Option<DateTime<Utc>>,
    pub first_tts_audio: Option<DateTime<Utc>>,
    pub speaking_end: Option<DateTime<Utc>>,
}

/// One user-utterance-to-synthesized-response cycle.
#[derive(Debug, Clone)]
pub struct Turn {
    pub turn_id: String,
    pub user_text: String,
    pub started_at: DateTime<Utc>,
    pub timestamps: TurnTimestamps,
    pub llm_tokens: u32,
    pub tool_calls: u32,
    pub tts_audio_chunks: u32,
    pub tts_est_duration_ms: u64,
}

impl Turn {
    pub fn new(turn_id: impl Into<String>, user_text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            turn_id: turn_id.into(),
            user_text: user_text.into(),
            started_at: now,
            timestamps: TurnTimestamps {
                listening_end: Some(now),
                ..Default::default()
            },
            llm_tokens: 0,
            tool_calls: 0,
            tts_audio_chunks: 0,
            tts_est_duration_ms: 0,
        }
    }
}

/// Wire-ready per-turn timing counters (§4.10 / §6 `metrics` message).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TurnMetrics {
    pub listening_duration_ms: i64,
    pub thinking_ms: i64,
    pub speaking_ms: i64,
    pub llm_first_token_ms: Option<i64>,
    pub tts_first_audio_ms: Option<i64>,
    pub e2e_latency_ms: i64,
    pub tts_audio_chunks: u32,
    pub tts_est_duration_ms: u64,
    pub llm_tokens: u32,
    pub llm_tok_per_sec: f64,
    pub tool_calls: u32,
}

impl Turn {
    /// Compute the wire metrics for this turn. Pure — no I/O, never called
    /// for a cancelled turn (per §4.10).
    pub fn metrics(&self, listening_start: DateTime<Utc>) -> TurnMetrics {
        let ts = &self.timestamps;
        let listening_duration_ms = ts
            .listening_end
            .map(|end| (end - listening_start).num_milliseconds())
            .unwrap_or(0)
            .max(0);

        let thinking_ms = match (ts.listening_end, ts.first_llm_token) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0),
            _ => 0,
        };

        let speaking_ms = match (ts.first_tts_audio, ts.speaking_end) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0),
            _ => 0,
        };

        let e2e_latency_ms = ts
            .speaking_end
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
            .max(0);

        let llm_first_token_ms = ts
            .first_llm_token
            .map(|t| (t - self.started_at).num_milliseconds().max(0));
        let tts_first_audio_ms = ts
            .first_tts_audio
            .map(|t| (t - self.started_at).num_milliseconds().max(0));

        let llm_tok_per_sec = if thinking_ms > 0 {
            self.llm_tokens as f64 / (thinking_ms as f64 / 1000.0)
        } else {
            0.0
        };

        TurnMetrics {
            listening_duration_ms,
            thinking_ms,
            speaking_ms,
            llm_first_token_ms,
            tts_first_audio_ms,
            e2e_latency_ms,
            tts_audio_chunks: self.tts_audio_chunks,
            tts_est_duration_ms: self.tts_est_duration_ms,
            llm_tokens: self.llm_tokens,
            llm_tok_per_sec,
            tool_calls: self.tool_calls,
        }
    }
}

/// Tracks which named skills are currently active for a session.
#[derive(Debug, Clone, Default)]
pub struct ActiveSkills(HashSet<String>);

impl ActiveSkills {
    pub fn activate(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn deactivate(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn names_sorted(&self) -> Vec<String> {
        let mut v: Vec<String> = self.0.iter().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn legal_transitions_from_listening() {
        assert!(SessionState::Listening.can_transition_to(SessionState::Thinking));
        assert!(!SessionState::Listening.can_transition_to(SessionState::Speaking));
    }

    #[test]
    fn idle_reachable_from_any_state() {
        for s in [
            SessionState::Idle,
            SessionState::Listening,
            SessionState::Thinking,
            SessionState::Executing,
            SessionState::Speaking,
        ] {
            assert!(s.can_transition_to(SessionState::Idle));
        }
    }

    #[test]
    fn metrics_are_nonnegative_and_e2e_positive() {
        let t0 = Utc::now();
        let mut turn = Turn::new("t1", "hello", t0);
        turn.timestamps.listening_start = Some(t0);
        turn.timestamps.listening_end = Some(t0 + Duration::milliseconds(200));
        turn.timestamps.first_llm_token = Some(t0 + Duration::milliseconds(400));
        turn.timestamps.first_tts_audio = Some(t0 + Duration::milliseconds(600));
        turn.timestamps.speaking_end = Some(t0 + Duration::milliseconds(1200));
        turn.llm_tokens = 20;

        let m = turn.metrics(t0);
        assert_eq!(m.listening_duration_ms, 200);
        assert_eq!(m.thinking_ms, 200);
        assert_eq!(m.speaking_ms, 600);
        assert_eq!(m.e2e_latency_ms, 1200);
        assert!(m.llm_tok_per_sec > 0.0);
    }

    #[test]
    fn active_skills_toggle() {
        let mut skills = ActiveSkills::default();
        assert!(skills.activate("coder"));
        assert!(!skills.activate("coder")); // already active
        assert!(skills.contains("coder"));
        assert!(skills.deactivate("coder"));
        assert!(!skills.contains("coder"));
    }
}
