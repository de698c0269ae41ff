use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::messages::{ClientMessage, ServerMessage, Setup};
use super::transport::{LiveCommand, LiveConnection, LiveTransport, SessionEvent};
use crate::error::{BridgeError, Result};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Events buffered between the socket task and the bridge
const EVENT_BUFFER: usize = 64;

/// Gemini Live over a WebSocket
pub struct GeminiLiveTransport {
    url: String,
    api_key: String,
}

impl GeminiLiveTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}?key={}", self.url, self.api_key)
    }
}

#[async_trait::async_trait]
impl LiveTransport for GeminiLiveTransport {
    async fn connect(&self, setup: Setup) -> Result<LiveConnection> {
        if self.api_key.is_empty() {
            return Err(BridgeError::transport("Gemini API key is not configured"));
        }

        let request = self
            .endpoint()
            .into_client_request()
            .map_err(|e| BridgeError::transport(format!("Invalid Live endpoint: {}", e)))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        info!("Connecting to Gemini Live at {} (model={})", self.url, setup.model);

        tokio::spawn(async move {
            match connect_async(request).await {
                Ok((ws, _response)) => run_socket(ws, setup, command_rx, event_tx).await,
                Err(e) => {
                    error!("Gemini Live connect failed: {}", e);
                    let _ = event_tx
                        .send(SessionEvent::Error(format!("WebSocket connect error: {}", e)))
                        .await;
                }
            }
        });

        Ok(LiveConnection {
            commands: command_tx,
            events: event_rx,
        })
    }
}

/// Socket pump: sends setup, then forwards commands out and events in until
/// either side closes. Emits exactly one terminal event unless the bridge
/// has already hung up.
async fn run_socket(
    ws: WsStream,
    setup: Setup,
    mut commands: mpsc::UnboundedReceiver<LiveCommand>,
    events: mpsc::Sender<SessionEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    let setup_message = ClientMessage {
        setup: Some(setup),
        ..Default::default()
    };
    let sent = match serde_json::to_string(&setup_message) {
        Ok(json) => sink.send(Message::Text(json)).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = sent {
        let _ = events
            .send(SessionEvent::Error(format!("Failed to send setup: {}", e)))
            .await;
        return;
    }
    debug!("Sent Live setup message");

    let terminal = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LiveCommand::Input(input)) => {
                    let message = ClientMessage {
                        realtime_input: Some(input),
                        ..Default::default()
                    };
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Dropping unserializable input: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        break Some(SessionEvent::Error(format!("Send failed: {}", e)));
                    }
                }
                Some(LiveCommand::Close) | None => {
                    debug!("Closing Live socket");
                    let _ = sink.send(Message::Close(None)).await;
                    break None;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_event(text.as_bytes()) {
                        if events.send(event).await.is_err() {
                            break None;
                        }
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    if let Some(event) = parse_event(&bytes) {
                        if events.send(event).await.is_err() {
                            break None;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Gemini Live closed the session: {:?}", frame);
                    break Some(SessionEvent::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(SessionEvent::Error(e.to_string())),
                None => break Some(SessionEvent::Closed),
            },
        }
    };

    if let Some(event) = terminal {
        let _ = events.send(event).await;
    }
}

/// `setupComplete` maps to `Open`; everything else is passed through.
/// Frames that fail to parse are logged and skipped.
fn parse_event(raw: &[u8]) -> Option<SessionEvent> {
    match serde_json::from_slice::<ServerMessage>(raw) {
        Ok(message) if message.is_setup_complete() => Some(SessionEvent::Open),
        Ok(message) => Some(SessionEvent::Message(message)),
        Err(e) => {
            warn!("Ignoring unparseable Live message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setup_complete() {
        assert!(matches!(
            parse_event(br#"{"setupComplete":{}}"#),
            Some(SessionEvent::Open)
        ));
    }

    #[test]
    fn test_parse_server_content() {
        let event = parse_event(br#"{"serverContent":{"interrupted":true}}"#);
        match event {
            Some(SessionEvent::Message(msg)) => assert!(msg.is_interrupted()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_garbage_is_skipped() {
        assert!(parse_event(b"not json").is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_rejected() {
        let transport = GeminiLiveTransport::new("wss://example.invalid/live", "");
        let setup = Setup::audio("models/live", "Kore", "");
        let result = transport.connect(setup).await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }
}
