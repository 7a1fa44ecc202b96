//! Connection manager with a single persistent link and automatic reconnection

use super::headers::{build_headers, target_url};
use super::outbox::Outbox;
use crate::config::{ConfigStore, LinkConfig};
use crate::transport::{Connector, Link, LinkEvent, OutboundFrame};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectScheduled,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ReconnectScheduled => write!(f, "reconnect scheduled"),
        }
    }
}

/// Receiver for text frames arriving on the link
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    /// Handle one frame. Frames are delivered one at a time in arrival order.
    async fn on_text(&self, text: String);

    /// Release background resources when the service stops
    fn shutdown(&self) {}
}

/// Owns the single link to the host and keeps it alive while running
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: LinkConfig,
    store: Arc<dyn ConfigStore>,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn InboundHandler>,
    outbox: Outbox,
    running: AtomicBool,
    /// Set while a reconnect timer is pending
    reconnecting: AtomicBool,
    /// Cancelled once on shutdown; pending timers observe it
    stopped: CancellationToken,
    /// Serialises connect attempts so only one link can be opened at a time
    connect_lock: tokio::sync::Mutex<()>,
    slot: Mutex<Slot>,
}

struct Slot {
    state: ConnectionState,
    link: Option<ActiveLink>,
    reconnect: Option<JoinHandle<()>>,
    generation: u64,
}

struct ActiveLink {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    receiver: JoinHandle<()>,
    generation: u64,
}

impl ConnectionManager {
    /// Create an idle manager. Nothing happens until [`start`](Self::start).
    pub fn new(
        config: LinkConfig,
        store: Arc<dyn ConfigStore>,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn InboundHandler>,
        outbox: Outbox,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                connector,
                handler,
                outbox,
                running: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                stopped: CancellationToken::new(),
                connect_lock: tokio::sync::Mutex::new(()),
                slot: Mutex::new(Slot {
                    state: ConnectionState::Disconnected,
                    link: None,
                    reconnect: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Start the service and make the first connect attempt.
    ///
    /// Calling this while already running does nothing. A manager cannot be
    /// restarted after [`shutdown`](Self::shutdown).
    pub async fn start(&self) {
        if self.inner.stopped.is_cancelled() {
            warn!("Reverse connection service already shut down");
            return;
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("Reverse connection service already running");
            return;
        }
        info!("Starting reverse connection service");
        self.inner.connect().await;
    }

    /// Connect again now, replacing any live link. Used after the
    /// configuration changes; a manager left idle by a missing host URL
    /// does not retry on its own.
    pub async fn reconnect_now(&self) {
        self.inner.cancel_pending_reconnect();
        self.inner.connect().await;
    }

    /// Close the live link, if any
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Arrange a single deferred reconnect
    pub fn schedule_reconnect(&self) {
        self.inner.schedule_reconnect();
    }

    /// Stop the service: cancel any pending reconnect, close the link and
    /// stop the inbound handler. No reconnect fires afterwards.
    pub fn shutdown(&self) {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        self.inner.stopped.cancel();

        self.inner.cancel_pending_reconnect();
        self.inner.disconnect();
        self.inner.set_state(ConnectionState::Disconnected);

        if was_running {
            self.inner.handler.shutdown();
            info!("Reverse connection service stopped");
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Send path shared with the router
    pub fn outbox(&self) -> &Outbox {
        &self.inner.outbox
    }
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.slot().state = state;
    }

    /// Abort the reconnect timer and clear the guard
    fn cancel_pending_reconnect(&self) {
        let timer = self.slot().reconnect.take();
        if let Some(timer) = timer {
            timer.abort();
        }
        self.reconnecting.store(false, Ordering::SeqCst);
    }

    async fn connect(self: &Arc<Self>) {
        let _attempt = self.connect_lock.lock().await;

        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let device = self.store.snapshot();
        if device.host_url.trim().is_empty() {
            warn!("No host URL configured, waiting for configuration");
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        // Never leave a previous link behind
        self.disconnect();
        self.set_state(ConnectionState::Connecting);

        let url = target_url(&device.host_url, &device.device_id);
        let headers = build_headers(&device);
        info!("Connecting to host via {}: {}", self.connector.name(), url);

        match self.connector.connect(&url, &headers).await {
            Ok(link) => self.attach(link, &url),
            Err(e) => {
                error!("Failed to initiate connection: {:#}", e);
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn attach(self: &Arc<Self>, link: Link, url: &str) {
        let Link { outbound, events } = link;
        let mut slot = self.slot();

        if !self.running.load(Ordering::SeqCst) {
            debug!("Service stopped while connecting, closing new link");
            let _ = outbound.send(OutboundFrame::Close);
            slot.state = ConnectionState::Disconnected;
            return;
        }

        slot.generation += 1;
        let generation = slot.generation;
        let receiver = tokio::spawn(receive_loop(Arc::clone(self), events, generation));

        self.outbox.attach(outbound.clone());
        slot.link = Some(ActiveLink {
            outbound,
            receiver,
            generation,
        });
        slot.state = ConnectionState::Connected;
        info!("Connected to host: {}", url);
    }

    fn disconnect(&self) {
        let link = {
            let mut slot = self.slot();
            if slot.state != ConnectionState::ReconnectScheduled {
                slot.state = ConnectionState::Disconnected;
            }
            slot.link.take()
        };
        self.outbox.detach();

        if let Some(link) = link {
            // The old receive loop must not report this close as a failure
            link.receiver.abort();
            if link.outbound.send(OutboundFrame::Close).is_err() {
                debug!("Link already closed");
            }
            debug!("Closed link #{}", link.generation);
        }
    }

    /// Called by the receive loop when its link ends
    fn link_lost(self: &Arc<Self>, generation: u64) {
        {
            let mut slot = self.slot();
            match &slot.link {
                Some(link) if link.generation == generation => {
                    slot.link = None;
                    slot.state = ConnectionState::Disconnected;
                }
                _ => return,
            }
        }
        self.outbox.detach();
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            debug!("Reconnect already scheduled");
            return;
        }

        let delay = self.config.reconnect_delay;
        debug!("Scheduling reconnect in {}ms", delay.as_millis());

        let inner = Arc::clone(self);
        let stopped = self.stopped.clone();
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = stopped.cancelled() => {
                    inner.reconnecting.store(false, Ordering::SeqCst);
                }
                _ = tokio::time::sleep(delay) => {
                    inner.reconnecting.store(false, Ordering::SeqCst);
                    if inner.running.load(Ordering::SeqCst) {
                        debug!("Attempting reconnect...");
                        inner.connect().await;
                    }
                }
            }
        });

        let mut slot = self.slot();
        slot.state = ConnectionState::ReconnectScheduled;
        slot.reconnect = Some(timer);
    }
}

/// Deliver inbound frames to the handler until the link ends
async fn receive_loop(inner: Arc<Inner>, mut events: mpsc::Receiver<LinkEvent>, generation: u64) {
    loop {
        match events.recv().await {
            Some(LinkEvent::Text(text)) => inner.handler.on_text(text).await,
            Some(LinkEvent::Closed { reason }) => {
                warn!("Disconnected from host: {}", reason);
                break;
            }
            Some(LinkEvent::Error(e)) => {
                error!("Connection error: {}", e);
                break;
            }
            None => {
                warn!("Link dropped without close");
                break;
            }
        }
    }
    inner.link_lost(generation);
}
