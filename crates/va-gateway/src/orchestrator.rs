//! Session orchestrator (§4.8): the five-state machine binding the
//! transport, the three streaming adapters, and the agent loop together.
//!
//! The orchestrator is a single-owner coordinator: one task, `&mut self`
//! on every transition, driven by a single funnel of events. Inbound
//! control/PCM from the client, ASR events, agent-loop events, and TTS PCM
//! chunks all arrive as [`OrchestratorEvent`]s on one channel so no two
//! transitions can observe each other mid-flight (§5).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::{pin_mut, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use va_agent::{AgentEvent, AgentLoop};
use va_domain::config::Config;
use va_domain::{ActiveSkills, CancelToken, Message, SessionState, SkillToggle, Turn};
use va_identity::{IdentityArtifact, IdentityStore};
use va_providers::{AsrAdapter, LlmProvider, TtsAdapter};
use va_skills::SkillsRegistry;
use va_tools::{
    ActivateSkillTool, CalculateTool, DeactivateSkillTool, GetDatetimeTool, ReadFileTool,
    RunPythonTool, ToolRegistry, UpdateUserProfileTool,
};

use crate::protocol::ServerMessage;

/// One frame the writer task forwards to the client socket.
pub enum OutFrame {
    Json(ServerMessage),
    Pcm(Vec<u8>),
}

/// Everything the orchestrator's event loop reacts to.
pub enum OrchestratorEvent {
    Control(crate::protocol::ClientMessage),
    UplinkPcm(Vec<u8>),
    ClientClosed,
    Asr(va_domain::AsrEvent),
    Agent(AgentEvent),
    /// Tagged with the turn that started the egress task producing it, so a
    /// chunk already queued on the event channel when that turn is
    /// cancelled is recognized as stale and dropped rather than leaked into
    /// whatever turn (or `Listening`) is current by the time it's drained.
    TtsPcm(String, va_domain::Result<Vec<u8>>),
    TtsDone(String),
}

/// Per-session wrapper around [`ActiveSkills`] implementing [`SkillToggle`]
/// so the `activate_skill`/`deactivate_skill` tools can mutate it through
/// an `Arc<dyn SkillToggle>` handle shared with the tool registry.
struct SessionSkills(Mutex<ActiveSkills>);

impl SkillToggle for SessionSkills {
    fn set_active(&self, name: &str, active: bool) -> bool {
        let mut skills = self.0.lock();
        if active {
            skills.activate(name)
        } else {
            skills.deactivate(name)
        }
    }
}

struct TurnState {
    turn: Turn,
    cancel: CancelToken,
    agent_task: JoinHandle<()>,
    egress_task: Option<JoinHandle<()>>,
    tts_started: bool,
}

pub struct Orchestrator {
    session_id: String,
    config: Arc<Config>,
    state: SessionState,
    history: Vec<Message>,
    skills_active: Arc<SessionSkills>,
    skills_registry: Arc<SkillsRegistry>,
    identity: Arc<IdentityStore>,
    persona: String,
    llm: Option<Arc<dyn LlmProvider>>,
    asr: Option<Arc<dyn AsrAdapter>>,
    tts: Option<Arc<dyn TtsAdapter>>,
    out: mpsc::Sender<OutFrame>,
    listening_start: Option<DateTime<Utc>>,
    last_bargein: Option<(String, DateTime<Utc>)>,
    current_turn: Option<TurnState>,
}

impl Orchestrator {
    pub fn new(
        session_id: String,
        config: Arc<Config>,
        llm: Option<Arc<dyn LlmProvider>>,
        identity: Arc<IdentityStore>,
        skills_registry: Arc<SkillsRegistry>,
        asr: Option<Arc<dyn AsrAdapter>>,
        tts: Option<Arc<dyn TtsAdapter>>,
        persona: String,
        out: mpsc::Sender<OutFrame>,
    ) -> Self {
        Self {
            session_id,
            config,
            state: SessionState::Idle,
            history: Vec::new(),
            skills_active: Arc::new(SessionSkills(Mutex::new(ActiveSkills::default()))),
            skills_registry,
            identity,
            persona,
            llm,
            asr,
            tts,
            out,
            listening_start: None,
            last_bargein: None,
            current_turn: None,
        }
    }

    /// Drain `rx` until the client disconnects or the session is torn down.
    pub async fn run(mut self, mut rx: mpsc::Receiver<OrchestratorEvent>, self_tx: mpsc::Sender<OrchestratorEvent>) {
        if let Some(asr) = self.asr.clone() {
            spawn_asr_pump(asr, self_tx.clone());
        }

        self.send_session_info().await;
        self.send_state().await;

        while let Some(event) = rx.recv().await {
            match event {
                OrchestratorEvent::ClientClosed => break,
                OrchestratorEvent::Control(msg) => self.handle_control(msg, &self_tx).await,
                OrchestratorEvent::UplinkPcm(pcm) => self.handle_uplink(pcm).await,
                OrchestratorEvent::Asr(ev) => self.handle_asr(ev, &self_tx).await,
                OrchestratorEvent::Agent(ev) => self.handle_agent(ev, &self_tx).await,
                OrchestratorEvent::TtsPcm(turn_id, res) => self.handle_tts_pcm(turn_id, res).await,
                OrchestratorEvent::TtsDone(turn_id) => self.commit_turn(turn_id).await,
            }
        }

        self.teardown().await;
    }

    async fn send_session_info(&self) {
        let readiness = self.config.readiness();
        let identity_summary = if self.persona.is_empty() {
            "no persona configured".to_string()
        } else {
            format!("{} chars of persona loaded", self.persona.len())
        };
        self.emit(ServerMessage::SessionInfo {
            model: self.config.llm.model.clone(),
            asr_configured: readiness.asr_configured,
            llm_configured: readiness.llm_configured,
            tts_configured: readiness.tts_configured,
            tools: self.build_tool_registry().describe().into_iter().map(|t| t.name).collect(),
            skills: self.skills_registry.list_ready().into_iter().map(|s| s.name).collect(),
            identity_summary,
        })
        .await;
    }

    async fn send_state(&self) {
        self.emit(ServerMessage::State { state: self.state }).await;
    }

    async fn emit(&self, msg: ServerMessage) {
        let _ = self.out.send(OutFrame::Json(msg)).await;
    }

    // ── Control / transport ──────────────────────────────────────────

    async fn handle_control(&mut self, msg: crate::protocol::ClientMessage, self_tx: &mpsc::Sender<OrchestratorEvent>) {
        use crate::protocol::ClientMessage::*;
        match msg {
            StartSession => {
                if self.state == SessionState::Idle {
                    self.enter_listening().await;
                }
            }
            StopSession => {
                self.cancel_current_turn("stop_session").await;
                self.state = SessionState::Idle;
                self.send_state().await;
            }
            Interrupt => {
                if matches!(
                    self.state,
                    SessionState::Speaking | SessionState::Executing | SessionState::Thinking
                ) {
                    self.barge_in("client_interrupt").await;
                }
            }
            ActivateSkill { name } => {
                let changed = self.skills_active.set_active(&name, true);
                va_domain::TraceEvent::SkillToggled {
                    name: name.clone(),
                    activated: true,
                }
                .emit();
                if changed {
                    self.emit(ServerMessage::Skill {
                        event: "activated",
                        name,
                        skills: self.skills_active.0.lock().names_sorted(),
                    })
                    .await;
                }
            }
            DeactivateSkill { name } => {
                let changed = self.skills_active.set_active(&name, false);
                va_domain::TraceEvent::SkillToggled {
                    name: name.clone(),
                    activated: false,
                }
                .emit();
                if changed {
                    self.emit(ServerMessage::Skill {
                        event: "deactivated",
                        name,
                        skills: self.skills_active.0.lock().names_sorted(),
                    })
                    .await;
                }
            }
        }
        let _ = self_tx;
    }

    async fn enter_listening(&mut self) {
        self.state = SessionState::Listening;
        self.listening_start = Some(Utc::now());
        self.send_state().await;
    }

    async fn handle_uplink(&mut self, pcm: Vec<u8>) {
        // Fed while Listening (normal capture) and while Speaking/Executing
        // (so the auto barge-in heuristic's ASR `Final` events can arrive at
        // all — §4.9). Dropped in Thinking/Idle, where no utterance is live.
        if !matches!(
            self.state,
            SessionState::Listening | SessionState::Speaking | SessionState::Executing
        ) {
            return;
        }
        if let Some(asr) = &self.asr {
            if let Err(e) = asr.feed(&pcm).await {
                tracing::warn!(session = %self.session_id, error = %e, "asr feed failed");
            }
        }
    }

    // ── ASR ───────────────────────────────────────────────────────────

    async fn handle_asr(&mut self, ev: va_domain::AsrEvent, self_tx: &mpsc::Sender<OrchestratorEvent>) {
        use va_domain::AsrEvent::*;
        match ev {
            Partial { text } => {
                if self.state == SessionState::Listening {
                    self.emit(ServerMessage::Asr { text, is_final: false }).await;
                }
            }
            Final { text } => {
                if self.state == SessionState::Listening {
                    self.emit(ServerMessage::Asr {
                        text: text.clone(),
                        is_final: true,
                    })
                    .await;
                }
                if matches!(self.state, SessionState::Speaking | SessionState::Executing) {
                    self.maybe_auto_bargein(&text).await;
                }
            }
            Endpoint { text } => {
                if self.state == SessionState::Listening {
                    self.commit_utterance(text, self_tx).await;
                }
            }
            Error { message } => {
                self.emit(ServerMessage::ConnectionStatus {
                    service: "asr",
                    status: "error",
                    detail: Some(message),
                })
                .await;
            }
        }
    }

    async fn maybe_auto_bargein(&mut self, text: &str) {
        let normalized = text.trim().to_lowercase();
        if normalized.chars().count() < 3 {
            return;
        }
        let now = Utc::now();
        let qualifies = match &self.last_bargein {
            Some((last_text, last_at)) => {
                &normalized != last_text && now - *last_at >= Duration::milliseconds(1500)
            }
            None => true,
        };
        if qualifies {
            self.last_bargein = Some((normalized, now));
            self.barge_in("auto_asr_final").await;
        }
    }

    // ── Turn lifecycle ────────────────────────────────────────────────

    async fn commit_utterance(&mut self, text: String, self_tx: &mpsc::Sender<OrchestratorEvent>) {
        let Some(llm) = self.llm.clone() else {
            self.emit(ServerMessage::Error {
                turn_id: None,
                message: "no LLM provider configured".into(),
            })
            .await;
            return;
        };

        let turn_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut turn = Turn::new(turn_id.clone(), text.clone(), now);
        turn.timestamps.listening_end = Some(now);

        self.history.push(Message::user(text.clone()));
        self.emit(ServerMessage::Turn {
            event: "user_committed",
            turn_id: turn_id.clone(),
            text: Some(text),
        })
        .await;

        self.state = SessionState::Thinking;
        self.send_state().await;

        let system_prompt = self.build_system_prompt().await;
        let mut history = self.history.clone();
        if matches!(history.first(), Some(m) if m.role == va_domain::Role::System) {
            history[0] = Message::system(system_prompt);
        } else {
            history.insert(0, Message::system(system_prompt));
        }

        let tools = Arc::new(self.build_tool_registry());
        let agent = Arc::new(AgentLoop::new(llm, tools, self.config.agent.clone()));
        let cancel = CancelToken::new();

        let agent_task = {
            let agent = agent.clone();
            let cancel = cancel.clone();
            let tx = self_tx.clone();
            tokio::spawn(async move {
                let stream = agent.run(history, cancel);
                pin_mut!(stream);
                while let Some(ev) = stream.next().await {
                    if tx.send(OrchestratorEvent::Agent(ev)).await.is_err() {
                        break;
                    }
                }
            })
        };

        self.current_turn = Some(TurnState {
            turn,
            cancel,
            agent_task,
            egress_task: None,
            tts_started: false,
        });
    }

    async fn build_system_prompt(&self) -> String {
        let profile = self
            .identity
            .read(IdentityArtifact::UserProfile)
            .await
            .unwrap_or_default();

        let mut sections = vec![self.persona.clone()];
        if !profile.trim().is_empty() {
            sections.push(profile);
        }
        sections.push(
            "Respond conversationally and concisely; you are speaking out loud to the user."
                .to_string(),
        );

        for name in self.skills_active.0.lock().names_sorted() {
            if let Ok(decl) = self.skills_registry.declaration(&name) {
                sections.push(decl);
            }
        }

        let tools = self.build_tool_registry().describe();
        if !tools.is_empty() {
            let listing = tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Available tools:\n{listing}"));
        }

        sections.join("\n\n")
    }

    fn build_tool_registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new(self.config.tools.clone());
        registry.register(Arc::new(GetDatetimeTool));
        registry.register(Arc::new(CalculateTool));
        registry.register(Arc::new(RunPythonTool));
        registry.register(Arc::new(ReadFileTool::new(
            self.config.tools.workspace_root.clone(),
        )));
        registry.register(Arc::new(UpdateUserProfileTool::new(
            self.identity.clone() as Arc<dyn va_domain::ProfileStore>,
        )));
        registry.register(Arc::new(ActivateSkillTool::new(
            self.skills_active.clone() as Arc<dyn SkillToggle>,
        )));
        registry.register(Arc::new(DeactivateSkillTool::new(
            self.skills_active.clone() as Arc<dyn SkillToggle>,
        )));
        registry
    }

    async fn handle_agent(&mut self, ev: AgentEvent, self_tx: &mpsc::Sender<OrchestratorEvent>) {
        let Some(turn_id) = self.current_turn.as_ref().map(|t| t.turn.turn_id.clone()) else {
            return;
        };

        match ev {
            AgentEvent::Text(delta) => {
                if let Some(ts) = self.current_turn.as_mut() {
                    if ts.turn.timestamps.first_llm_token.is_none() {
                        ts.turn.timestamps.first_llm_token = Some(Utc::now());
                    }
                }

                if matches!(self.state, SessionState::Thinking | SessionState::Executing) {
                    self.state = SessionState::Speaking;
                    self.send_state().await;
                }

                self.start_tts_if_needed(self_tx).await;

                if let Some(tts) = self.tts.clone() {
                    if let Err(e) = tts.push_text(&delta).await {
                        tracing::warn!(session = %self.session_id, error = %e, "tts push_text failed");
                    }
                }

                self.emit(ServerMessage::Llm {
                    turn_id,
                    text: delta,
                    done: false,
                    token_index: None,
                    elapsed_ms: None,
                })
                .await;
            }
            AgentEvent::ToolStart { tool_call_id, name, arguments } => {
                if self.state != SessionState::Executing {
                    self.state = SessionState::Executing;
                    self.send_state().await;
                }
                self.emit(ServerMessage::Tool {
                    event: "start",
                    turn_id,
                    tool_call_id,
                    name,
                    arguments: Some(arguments),
                    content: None,
                    is_error: None,
                    elapsed_ms: None,
                })
                .await;
            }
            AgentEvent::ToolResult {
                tool_call_id,
                name,
                content,
                is_error,
                elapsed_ms,
            } => {
                va_domain::TraceEvent::ToolInvoked {
                    turn_id: turn_id.clone(),
                    tool_call_id: tool_call_id.clone(),
                    name: name.clone(),
                    is_error,
                    elapsed_ms,
                }
                .emit();
                self.emit(ServerMessage::Tool {
                    event: "result",
                    turn_id,
                    tool_call_id,
                    name,
                    arguments: None,
                    content: Some(content),
                    is_error: Some(is_error),
                    elapsed_ms: Some(elapsed_ms),
                })
                .await;
                if self.state == SessionState::Executing {
                    self.state = SessionState::Thinking;
                    self.send_state().await;
                }
            }
            AgentEvent::Done {
                history,
                tool_calls,
                llm_tokens,
            } => {
                self.history = history;
                if let Some(ts) = self.current_turn.as_mut() {
                    ts.turn.tool_calls = tool_calls;
                    ts.turn.llm_tokens = llm_tokens;
                }
                self.emit(ServerMessage::Llm {
                    turn_id: turn_id.clone(),
                    text: String::new(),
                    done: true,
                    token_index: None,
                    elapsed_ms: None,
                })
                .await;
                if let Some(tts) = self.tts.clone() {
                    if let Err(e) = tts.finish().await {
                        tracing::warn!(session = %self.session_id, error = %e, "tts finish failed");
                    }
                } else {
                    // No TTS configured — nothing will ever produce `TtsDone`.
                    self.commit_turn(turn_id).await;
                }
            }
            AgentEvent::Error(message) => {
                self.emit(ServerMessage::Error {
                    turn_id: Some(turn_id),
                    message,
                })
                .await;
                self.abandon_turn_to_listening().await;
            }
        }
    }

    /// Starts TTS synthesis on the first text delta of the turn. Returns
    /// `false` if TTS isn't configured or failed to start (turn continues
    /// text-only; the client still receives `llm` events). Egress chunks
    /// are funneled back through the shared event channel rather than
    /// written straight to the writer, so counters and `TtsDone` stay
    /// under the single-owner loop's control.
    async fn start_tts_if_needed(&mut self, self_tx: &mpsc::Sender<OrchestratorEvent>) -> bool {
        let already_started = self
            .current_turn
            .as_ref()
            .map(|t| t.tts_started)
            .unwrap_or(true);
        if already_started {
            return self.tts.is_some();
        }

        let Some(tts) = self.tts.clone() else {
            if let Some(ts) = self.current_turn.as_mut() {
                ts.tts_started = true;
            }
            return false;
        };

        let turn_id = match self.current_turn.as_ref() {
            Some(ts) => ts.turn.turn_id.clone(),
            None => return false,
        };

        match tts.synthesize().await {
            Ok(stream) => {
                let tx = self_tx.clone();
                let egress_task = tokio::spawn(async move {
                    pin_mut!(stream);
                    while let Some(item) = stream.next().await {
                        let is_err = item.is_err();
                        if tx.send(OrchestratorEvent::TtsPcm(turn_id.clone(), item)).await.is_err() || is_err {
                            break;
                        }
                    }
                    let _ = tx.send(OrchestratorEvent::TtsDone(turn_id)).await;
                });
                if let Some(ts) = self.current_turn.as_mut() {
                    ts.tts_started = true;
                    ts.egress_task = Some(egress_task);
                }
                true
            }
            Err(e) => {
                tracing::warn!(session = %self.session_id, error = %e, "tts synthesize failed");
                if let Some(ts) = self.current_turn.as_mut() {
                    ts.tts_started = true;
                }
                false
            }
        }
    }

    async fn handle_tts_pcm(&mut self, turn_id: String, res: va_domain::Result<Vec<u8>>) {
        // A chunk already queued on the event channel when its turn was
        // cancelled drains after `current_turn` is gone (or has moved on to
        // a newer turn) — drop it rather than leak cancelled-turn audio.
        let Some(ts) = self.current_turn.as_mut() else {
            return;
        };
        if ts.turn.turn_id != turn_id {
            return;
        }
        if let Ok(chunk) = res {
            let _ = self.out.send(OutFrame::Pcm(chunk.clone())).await;
            ts.turn.tts_audio_chunks += 1;
            ts.turn.tts_est_duration_ms += chunk.len() as u64 / 48;
            if ts.turn.timestamps.first_tts_audio.is_none() {
                ts.turn.timestamps.first_tts_audio = Some(Utc::now());
            }
        }
    }

    async fn commit_turn(&mut self, turn_id: String) {
        if matches!(&self.current_turn, Some(ts) if ts.turn.turn_id != turn_id) {
            return;
        }
        let Some(ts) = self.current_turn.take() else {
            return;
        };
        let mut turn = ts.turn;
        turn.timestamps.speaking_end = Some(Utc::now());
        if turn.timestamps.first_tts_audio.is_none() {
            turn.timestamps.first_tts_audio = turn.timestamps.speaking_end;
        }

        let listening_start = self.listening_start.unwrap_or(turn.started_at);
        let metrics = turn.metrics(listening_start);

        let summary = format!(
            "turn {}: user said \"{}\"; {} tool call(s); {} chars spoken",
            turn.turn_id, turn.user_text, turn.tool_calls, metrics.tts_est_duration_ms
        );
        if let Err(e) = self.identity.append_memory(&summary).await {
            tracing::warn!(session = %self.session_id, error = %e, "failed to append memory");
        }

        va_domain::TraceEvent::TurnCommitted {
            turn_id: turn.turn_id.clone(),
            chars: turn.user_text.len(),
            tool_calls: turn.tool_calls,
        }
        .emit();

        self.emit(ServerMessage::Turn {
            event: "finished",
            turn_id: turn.turn_id.clone(),
            text: None,
        })
        .await;
        self.emit(ServerMessage::from_metrics(turn.turn_id, metrics)).await;

        self.state = SessionState::Listening;
        self.listening_start = Some(Utc::now());
        self.send_state().await;
    }

    async fn abandon_turn_to_listening(&mut self) {
        if let Some(ts) = self.current_turn.take() {
            if let Some(tts) = &self.tts {
                tts.cancel();
            }
            ts.cancel.cancel();
            ts.agent_task.abort();
            if let Some(egress) = ts.egress_task {
                egress.abort();
            }
            va_domain::TraceEvent::TurnCancelled {
                turn_id: ts.turn.turn_id,
                state: format!("{:?}", self.state),
            }
            .emit();
        }
        self.state = SessionState::Listening;
        self.listening_start = Some(Utc::now());
        self.send_state().await;
    }

    /// Barge-in (§4.9): cancel TTS first, then the agent loop, then
    /// transition — in that order, so no audio from the cancelled turn
    /// leaks past the transition.
    async fn barge_in(&mut self, trigger: &'static str) {
        if let Some(ts) = self.current_turn.take() {
            if let Some(tts) = &self.tts {
                tts.cancel();
            }
            ts.cancel.cancel();
            ts.agent_task.abort();
            if let Some(egress) = ts.egress_task {
                egress.abort();
            }

            va_domain::TraceEvent::BargeIn {
                turn_id: ts.turn.turn_id.clone(),
                trigger,
            }
            .emit();
            va_domain::TraceEvent::TurnCancelled {
                turn_id: ts.turn.turn_id.clone(),
                state: format!("{:?}", self.state),
            }
            .emit();

            self.emit(ServerMessage::Turn {
                event: "finished",
                turn_id: ts.turn.turn_id,
                text: None,
            })
            .await;
        }

        self.state = SessionState::Listening;
        self.listening_start = Some(Utc::now());
        self.send_state().await;
    }

    async fn cancel_current_turn(&mut self, reason: &'static str) {
        if let Some(ts) = self.current_turn.take() {
            if let Some(tts) = &self.tts {
                tts.cancel();
            }
            ts.cancel.cancel();
            ts.agent_task.abort();
            if let Some(egress) = ts.egress_task {
                egress.abort();
            }
            va_domain::TraceEvent::TurnCancelled {
                turn_id: ts.turn.turn_id,
                state: reason.to_string(),
            }
            .emit();
        }
    }

    async fn teardown(mut self) {
        self.cancel_current_turn("client_disconnected").await;
    }
}

fn spawn_asr_pump(asr: Arc<dyn AsrAdapter>, tx: mpsc::Sender<OrchestratorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let stream = asr.events();
        pin_mut!(stream);
        while let Some(ev) = stream.next().await {
            if tx.send(OrchestratorEvent::Asr(ev)).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_bargein_requires_minimum_length() {
        // `maybe_auto_bargein` is exercised indirectly through the full
        // event loop in integration tests; this unit test only pins down
        // the normalization helper's behavior on short utterances.
        let normalized = "hi".trim().to_lowercase();
        assert!(normalized.chars().count() < 3);
    }
}
