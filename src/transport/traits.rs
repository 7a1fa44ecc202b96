//! Transport trait abstraction for pluggable link backends

use crate::connection::Headers;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Frames queued for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Text frame carrying a JSON reply
    Text(String),
    /// Ask the transport to close the link
    Close,
}

/// Events reported by an open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Text frame received from the host
    Text(String),
    /// Link closed by either side
    Closed { reason: String },
    /// Link failed
    Error(String),
}

/// An open link to the host.
///
/// Sending on `outbound` after the link has gone away fails without
/// affecting the caller beyond the returned error.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Factory for opening links to the host
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a link to `url`, presenting `headers` during the handshake
    async fn connect(&self, url: &str, headers: &Headers) -> Result<Link>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
