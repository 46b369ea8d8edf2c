//! The single transport endpoint (§4.1, C1): `GET /v1/voice/ws`.
//!
//! Follows the split-sink/split-stream + reader-loop/writer-task pattern:
//! a writer task drains an `mpsc::Receiver<OutFrame>` into the socket sink
//! while the reader loop dispatches inbound frames onto the orchestrator's
//! event channel. Binary frames carry raw uplink PCM; text frames carry
//! JSON [`crate::protocol::ClientMessage`]s.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use va_identity::IdentityArtifact;
use va_providers::{AsrAdapter, TtsAdapter, WsAsrAdapter, WsTtsAdapter};

use crate::orchestrator::{OrchestratorEvent, OutFrame};
use crate::protocol::ClientMessage;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session = %session_id, "session connected");

    let asr = connect_asr(&state).await;
    let tts = connect_tts(&state);
    let persona = state
        .identity
        .read(IdentityArtifact::Persona)
        .await
        .unwrap_or_default();

    let (out_tx, mut out_rx) = mpsc::channel::<OutFrame>(64);
    let (ev_tx, ev_rx) = mpsc::channel::<OrchestratorEvent>(256);

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let msg = match frame {
                OutFrame::Json(m) => match serde_json::to_string(&m) {
                    Ok(text) => WsMessage::Text(text),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize outbound message");
                        continue;
                    }
                },
                OutFrame::Pcm(bytes) => WsMessage::Binary(bytes),
            };
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let orchestrator = crate::orchestrator::Orchestrator::new(
        session_id.clone(),
        state.config.clone(),
        state.llm.clone(),
        state.identity.clone(),
        state.skills.clone(),
        asr,
        tts,
        persona,
        out_tx,
    );
    let orchestrator_tx = ev_tx.clone();
    let orchestrator_task = tokio::spawn(orchestrator.run(ev_rx, orchestrator_tx));

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            WsMessage::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if ev_tx.send(OrchestratorEvent::Control(client_msg)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "malformed client message");
                }
            },
            WsMessage::Binary(pcm) => {
                if ev_tx.send(OrchestratorEvent::UplinkPcm(pcm)).await.is_err() {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }

    let _ = ev_tx.send(OrchestratorEvent::ClientClosed).await;
    drop(ev_tx);

    let _ = orchestrator_task.await;
    writer.abort();

    tracing::info!(session = %session_id, "session disconnected");
}

async fn connect_asr(state: &AppState) -> Option<Arc<dyn AsrAdapter>> {
    if !state.config.readiness().asr_configured {
        return None;
    }
    match WsAsrAdapter::from_config(&state.config.asr).await {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to connect ASR adapter for session");
            None
        }
    }
}

fn connect_tts(state: &AppState) -> Option<Arc<dyn TtsAdapter>> {
    if !state.config.readiness().tts_configured {
        return None;
    }
    match WsTtsAdapter::from_config(&state.config.tts) {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to initialize TTS adapter for session");
            None
        }
    }
}
