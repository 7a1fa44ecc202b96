//! In-memory transport used by tests in place of a socket

use crate::connection::Headers;
use crate::transport::traits::{Connector, Link, LinkEvent, OutboundFrame};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A connect attempt as seen by the connector
#[derive(Debug, Clone)]
pub struct Attempt {
    pub url: String,
    pub headers: Headers,
}

/// Host side of an in-memory link
pub struct MemoryPeer {
    pub events: mpsc::Sender<LinkEvent>,
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl MemoryPeer {
    /// Deliver a text frame to the device
    pub async fn send_text(&self, text: &str) {
        self.events
            .send(LinkEvent::Text(text.to_owned()))
            .await
            .expect("link receiver dropped");
    }

    /// Next text frame the device sent, if one is queued
    pub fn try_recv_text(&mut self) -> Option<String> {
        match self.outbound.try_recv() {
            Ok(OutboundFrame::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Connector that hands the host side of each link to the test
#[derive(Clone)]
pub struct MemoryConnector {
    attempts: Arc<Mutex<Vec<Attempt>>>,
    refuse: Arc<AtomicBool>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            attempts: Arc::new(Mutex::new(Vec::new())),
            refuse: Arc::new(AtomicBool::new(false)),
            peers,
        };
        (connector, peers_rx)
    }

    /// Make every following connect attempt fail
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str, headers: &Headers) -> Result<Link> {
        self.attempts.lock().unwrap().push(Attempt {
            url: url.to_owned(),
            headers: headers.clone(),
        });

        if self.refuse.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(16);
        let _ = self.peers.send(MemoryPeer {
            events: event_tx,
            outbound: outbound_rx,
        });

        Ok(Link {
            outbound: outbound_tx,
            events: event_rx,
        })
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
