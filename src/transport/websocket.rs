//! WebSocket transport implementation backed by tokio-tungstenite

use crate::connection::Headers;
use crate::transport::traits::{Connector, Link, LinkEvent, OutboundFrame};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Capacity of the inbound event queue for a single link
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Connector that opens a WebSocket client connection
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str, headers: &Headers) -> Result<Link> {
        let mut request = url
            .into_client_request()
            .with_context(|| format!("Invalid host URL: {}", url))?;

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .context("WebSocket handshake failed")?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (event_tx, event_rx) = mpsc::channel::<LinkEvent>(EVENT_CHANNEL_CAPACITY);

        // Reader: forward text frames, then report how the link ended
        let writer_events = event_tx.clone();
        let reader = tokio::spawn(async move {
            let last = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx.send(LinkEvent::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "closed without reason".into());
                        break LinkEvent::Closed { reason };
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break LinkEvent::Error(e.to_string()),
                    None => {
                        break LinkEvent::Closed {
                            reason: "stream ended".into(),
                        }
                    }
                }
            };
            let _ = event_tx.send(last).await;
        });

        // Writer: drain queued frames until close is requested or the socket
        // fails. The read half never outlives it.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            debug!("WebSocket write failed: {}", e);
                            let _ = writer_events
                                .send(LinkEvent::Error(format!("write failed: {}", e)))
                                .await;
                            break;
                        }
                    }
                    OutboundFrame::Close => {
                        if let Err(e) = sink.close().await {
                            debug!("WebSocket close failed: {}", e);
                        }
                        break;
                    }
                }
            }
            reader.abort();
        });

        Ok(Link {
            outbound: outbound_tx,
            events: event_rx,
        })
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}
