//! WebSocket streaming ASR adapter (§4.2).
//!
//! Maintains a single outbound WebSocket connection to the ASR provider.
//! The initial connect is attempted through the configured proxy (if any);
//! on failure it retries once with proxying disabled. Once the connection
//! is lost beyond that, the adapter enters a half-open state where `feed`
//! silently drops frames until [`AsrAdapter::reconnect`] succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use va_domain::config::AsrConfig;
use va_domain::error::{Error, Result};
use va_domain::stream::{AsrEvent, BoxStream};

use crate::traits::AsrAdapter;
use crate::util::resolve_api_key;

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

/// Streaming ASR adapter backed by a provider WebSocket session.
pub struct WsAsrAdapter {
    endpoint: String,
    api_key: String,
    languages: Vec<String>,
    use_proxy: bool,
    half_open: Arc<AtomicBool>,
    sink: Arc<Mutex<Option<WsSink>>>,
    events_tx: broadcast::Sender<AsrEvent>,
    /// Accumulates `final` token text across the current utterance; drained
    /// and committed as the `Endpoint` text, then cleared (§4.2).
    final_buffer: Arc<Mutex<String>>,
}

impl WsAsrAdapter {
    pub async fn from_config(cfg: &AsrConfig) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("asr.endpoint is not set".into()))?;
        let api_key = resolve_api_key(&cfg.api_key_env)?;
        let (events_tx, _rx) = broadcast::channel(256);

        let adapter = Self {
            endpoint,
            api_key,
            languages: cfg.languages.clone(),
            use_proxy: cfg.use_proxy,
            half_open: Arc::new(AtomicBool::new(false)),
            sink: Arc::new(Mutex::new(None)),
            events_tx,
            final_buffer: Arc::new(Mutex::new(String::new())),
        };
        adapter.connect().await?;
        Ok(adapter)
    }

    fn connect_url(&self) -> String {
        let langs = self.languages.join(",");
        format!(
            "{}?languages={}&endpointing=true",
            self.endpoint,
            urlencoding_join(&langs)
        )
    }

    async fn connect(&self) -> Result<()> {
        match self.try_connect(self.use_proxy).await {
            Ok(()) => Ok(()),
            Err(first_err) if self.use_proxy => {
                tracing::warn!(error = %first_err, "asr connect via proxy failed, retrying direct");
                self.try_connect(false).await
            }
            Err(e) => Err(e),
        }
    }

    async fn try_connect(&self, via_proxy: bool) -> Result<()> {
        let url = self.connect_url();

        let mut request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .body(())
            .map_err(|e| Error::Provider {
                provider: "asr".into(),
                message: e.to_string(),
            })?;
        if !via_proxy {
            request
                .headers_mut()
                .insert("X-No-Proxy", tokio_tungstenite::tungstenite::http::HeaderValue::from_static("1"));
        }

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Provider {
                provider: "asr".into(),
                message: e.to_string(),
            })?;

        let (sink, mut stream) = ws_stream.split();
        *self.sink.lock() = Some(sink);
        self.half_open.store(false, Ordering::Release);

        let events_tx = self.events_tx.clone();
        let half_open = self.half_open.clone();
        let final_buffer = self.final_buffer.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        if let Some(frame) = parse_provider_frame(&text) {
                            let mut buffer = final_buffer.lock();
                            if let Some(event) = apply_provider_frame(&mut buffer, frame) {
                                drop(buffer);
                                let _ = events_tx.send(event);
                            }
                        }
                    }
                    Ok(WsMessage::Close(_)) | Err(_) => {
                        half_open.store(true, Ordering::Release);
                        let _ = events_tx.send(AsrEvent::Error {
                            message: "asr connection closed".into(),
                        });
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(())
    }
}

fn urlencoding_join(s: &str) -> String {
    s.replace(' ', "%20")
}

/// One provider transcription frame, before per-utterance final-token
/// assembly. An `endpoint` frame carries no text of its own — the
/// committed text is always the accumulated `final` buffer (§4.2).
#[derive(Debug, PartialEq)]
enum ProviderFrame {
    Partial(String),
    Final(String),
    Endpoint,
}

/// Parse one provider transcription frame.
///
/// Expected shape: `{"type":"partial"|"final"|"endpoint","text":"..."}`.
fn parse_provider_frame(text: &str) -> Option<ProviderFrame> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    let kind = v.get("type")?.as_str()?;
    let payload_text = v.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string();
    match kind {
        "partial" => Some(ProviderFrame::Partial(payload_text)),
        "final" => Some(ProviderFrame::Final(payload_text)),
        "endpoint" => Some(ProviderFrame::Endpoint),
        _ => None,
    }
}

/// Fold a provider frame into the per-utterance final-token buffer,
/// producing the domain event to forward (§3, §4.2). `final` tokens are
/// appended and also forwarded immediately for live display; `endpoint`
/// commits the full concatenation and clears the buffer for the next
/// utterance.
fn apply_provider_frame(buffer: &mut String, frame: ProviderFrame) -> Option<AsrEvent> {
    match frame {
        ProviderFrame::Partial(text) => Some(AsrEvent::Partial { text }),
        ProviderFrame::Final(text) => {
            buffer.push_str(&text);
            Some(AsrEvent::Final { text })
        }
        ProviderFrame::Endpoint => {
            let text = std::mem::take(buffer);
            Some(AsrEvent::Endpoint { text })
        }
    }
}

#[async_trait::async_trait]
impl AsrAdapter for WsAsrAdapter {
    async fn feed(&self, pcm: &[u8]) -> Result<()> {
        if self.half_open.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut guard = self.sink.lock();
        if let Some(sink) = guard.as_mut() {
            if sink.send(WsMessage::Binary(pcm.to_vec())).await.is_err() {
                self.half_open.store(true, Ordering::Release);
            }
        }
        Ok(())
    }

    fn events(&self) -> BoxStream<'static, AsrEvent> {
        let rx = self.events_tx.subscribe();
        Box::pin(async_stream::stream! {
            let mut rx = rx;
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn reconnect(&self) -> Result<()> {
        self.connect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_frame() {
        let frame = parse_provider_frame(r#"{"type":"partial","text":"hel"}"#).unwrap();
        assert_eq!(frame, ProviderFrame::Partial("hel".into()));
    }

    #[test]
    fn parses_final_frame() {
        let frame = parse_provider_frame(r#"{"type":"final","text":"hello "}"#).unwrap();
        assert_eq!(frame, ProviderFrame::Final("hello ".into()));
    }

    #[test]
    fn unknown_type_yields_none() {
        assert!(parse_provider_frame(r#"{"type":"ping"}"#).is_none());
    }

    #[test]
    fn endpoint_commits_concatenated_final_tokens() {
        let mut buffer = String::new();
        assert_eq!(
            apply_provider_frame(&mut buffer, ProviderFrame::Final("hel".into())),
            Some(AsrEvent::Final { text: "hel".into() })
        );
        assert_eq!(
            apply_provider_frame(&mut buffer, ProviderFrame::Final("lo wor".into())),
            Some(AsrEvent::Final { text: "lo wor".into() })
        );
        assert_eq!(
            apply_provider_frame(&mut buffer, ProviderFrame::Final("ld".into())),
            Some(AsrEvent::Final { text: "ld".into() })
        );
        let committed = apply_provider_frame(&mut buffer, ProviderFrame::Endpoint);
        assert_eq!(committed, Some(AsrEvent::Endpoint { text: "hello world".into() }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn endpoint_with_no_final_tokens_commits_empty_text() {
        let mut buffer = String::new();
        let committed = apply_provider_frame(&mut buffer, ProviderFrame::Endpoint);
        assert_eq!(committed, Some(AsrEvent::Endpoint { text: String::new() }));
    }

    #[test]
    fn buffer_is_cleared_after_endpoint_for_the_next_utterance() {
        let mut buffer = String::new();
        apply_provider_frame(&mut buffer, ProviderFrame::Final("first".into()));
        apply_provider_frame(&mut buffer, ProviderFrame::Endpoint);
        apply_provider_frame(&mut buffer, ProviderFrame::Final("second".into()));
        let committed = apply_provider_frame(&mut buffer, ProviderFrame::Endpoint);
        assert_eq!(committed, Some(AsrEvent::Endpoint { text: "second".into() }));
    }
}
