//! WebSocket streaming TTS adapter (§4.3).
//!
//! The upstream session runs in an isolated worker task. A shared
//! `AtomicBool` cancellation flag is polled by the worker's send loop and
//! receive loop alike; cancellation flushes a sentinel onto the bounded
//! audio channel so the consumer side observes end-of-stream promptly
//! instead of blocking on a channel that will never fill again. The same
//! adapter is reused across every turn of a session, so `synthesize()`
//! clears the flag on entry — otherwise a cancelled turn would leave all
//! later turns permanently unable to speak.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use va_domain::config::TtsConfig;
use va_domain::error::{Error, Result};
use va_domain::stream::BoxStream;

use crate::traits::TtsAdapter;
use crate::util::resolve_api_key;

const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// One chunk of the internal audio channel: either a PCM payload or the
/// end-of-stream sentinel.
enum AudioChunk {
    Pcm(Vec<u8>),
    End,
}

pub struct WsTtsAdapter {
    endpoint: String,
    api_key: String,
    voice: String,
    cancelled: Arc<AtomicBool>,
    text_tx: Arc<tokio::sync::Mutex<Option<mpsc::Sender<TextOp>>>>,
}

enum TextOp {
    Fragment(String),
    Finish,
}

impl WsTtsAdapter {
    pub fn from_config(cfg: &TtsConfig) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("tts.endpoint is not set".into()))?;
        let api_key = resolve_api_key(&cfg.api_key_env)?;

        Ok(Self {
            endpoint,
            api_key,
            voice: cfg.voice.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
            text_tx: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }
}

#[async_trait::async_trait]
impl TtsAdapter for WsTtsAdapter {
    async fn synthesize(&self) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        self.cancelled.store(false, Ordering::Release);

        let url = format!("{}?voice={}", self.endpoint, self.voice);
        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .body(())
            .map_err(|e| Error::Provider {
                provider: "tts".into(),
                message: e.to_string(),
            })?;

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Provider {
                provider: "tts".into(),
                message: e.to_string(),
            })?;
        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (text_tx, mut text_rx) = mpsc::channel::<TextOp>(AUDIO_CHANNEL_CAPACITY);
        *self.text_tx.lock().await = Some(text_tx);

        let (audio_tx, mut audio_rx) = mpsc::channel::<AudioChunk>(AUDIO_CHANNEL_CAPACITY);

        let cancelled_send = self.cancelled.clone();
        tokio::spawn(async move {
            while let Some(op) = text_rx.recv().await {
                if cancelled_send.load(Ordering::Acquire) {
                    break;
                }
                let frame = match op {
                    TextOp::Fragment(text) => {
                        WsMessage::Text(serde_json::json!({"type": "text", "text": text}).to_string())
                    }
                    TextOp::Finish => WsMessage::Text(
                        serde_json::json!({"type": "finish"}).to_string(),
                    ),
                };
                if ws_sink.send(frame).await.is_err() {
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        let cancelled_recv = self.cancelled.clone();
        tokio::spawn(async move {
            loop {
                if cancelled_recv.load(Ordering::Acquire) {
                    let _ = audio_tx.send(AudioChunk::End).await;
                    break;
                }
                match ws_stream.next().await {
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        if cancelled_recv.load(Ordering::Acquire) {
                            let _ = audio_tx.send(AudioChunk::End).await;
                            break;
                        }
                        if audio_tx.send(AudioChunk::Pcm(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        let _ = audio_tx.send(AudioChunk::End).await;
                        break;
                    }
                    Some(Err(_)) => {
                        let _ = audio_tx.send(AudioChunk::End).await;
                        break;
                    }
                    _ => {}
                }
            }
        });

        let stream = async_stream::stream! {
            while let Some(chunk) = audio_rx.recv().await {
                match chunk {
                    AudioChunk::Pcm(bytes) => yield Ok(bytes),
                    AudioChunk::End => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn push_text(&self, fragment: &str) -> Result<()> {
        if self.cancelled.load(Ordering::Acquire) {
            return Ok(());
        }
        let guard = self.text_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(TextOp::Fragment(fragment.to_string())).await;
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let guard = self.text_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(TextOp::Finish).await;
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_sets_flag_immediately() {
        let cfg = TtsConfig {
            endpoint: Some("wss://tts.example.com".into()),
            api_key_env: "VA_TEST_TTS_KEY_XYZ".into(),
            ..TtsConfig::default()
        };
        std::env::set_var("VA_TEST_TTS_KEY_XYZ", "secret");
        let adapter = WsTtsAdapter::from_config(&cfg).unwrap();
        assert!(!adapter.cancelled.load(Ordering::Acquire));
        adapter.cancel();
        assert!(adapter.cancelled.load(Ordering::Acquire));
        std::env::remove_var("VA_TEST_TTS_KEY_XYZ");
    }

    #[test]
    fn from_config_requires_endpoint() {
        let cfg = TtsConfig::default();
        let err = WsTtsAdapter::from_config(&cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
