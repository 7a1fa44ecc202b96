//! Inbound message router
//!
//! Classifies each frame from the host, resolves the dispatcher and routes
//! commands either inline or to the background lane. Every failure is
//! handled here so nothing escapes into the connection's receive loop.

use super::dispatcher::{invoke, Dispatcher, DispatcherProvider};
use super::lane::{AsyncLane, LaneJob};
use crate::connection::{InboundHandler, Outbox};
use async_trait::async_trait;
use reverse_link_shared::log::{truncate, FRAME_LOG_LIMIT, PARAMS_LOG_LIMIT};
use reverse_link_shared::{
    parse_frame, protocol, DisplayId, Inbound, Reply, Request, RequestId, ResponseKind,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

/// Error text sent while the dispatcher is unavailable
pub const NOT_READY_MESSAGE: &str = "Automation service not ready, cannot dispatch command";

/// Strip the routing prefixes, each at most once and in order
pub fn normalize_method(method: &str) -> &str {
    protocol::METHOD_PREFIXES
        .iter()
        .fold(method, |rest, prefix| rest.strip_prefix(prefix).unwrap_or(rest))
}

/// Routes inbound frames to the dispatcher and sends the replies
pub struct Router {
    outbox: Outbox,
    provider: Arc<dyn DispatcherProvider>,
    dispatcher: OnceCell<Arc<dyn Dispatcher>>,
    lane: AsyncLane,
    long_running_method: String,
}

impl Router {
    /// Create a router. Spawns the background lane, so it must be called
    /// inside a tokio runtime.
    pub fn new(
        outbox: Outbox,
        provider: Arc<dyn DispatcherProvider>,
        long_running_method: impl Into<String>,
    ) -> Self {
        Self {
            lane: AsyncLane::new(outbox.clone()),
            outbox,
            provider,
            dispatcher: OnceCell::new(),
            long_running_method: long_running_method.into(),
        }
    }

    /// Handle one raw text frame
    pub async fn handle_text(&self, text: &str) {
        debug!("Received message: {}", truncate(text, FRAME_LOG_LIMIT));

        let inbound = match parse_frame(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Dropping unreadable frame: {}", e);
                return;
            }
        };

        match inbound {
            Inbound::Request(request) => self.route(request).await,
            Inbound::Response {
                id,
                kind: ResponseKind::Result,
            } => {
                debug!("Received result for id={}", DisplayId(id.as_ref()));
            }
            Inbound::Response {
                id,
                kind: ResponseKind::Error(error),
            } => {
                warn!(
                    "Received error for id={}: {}",
                    DisplayId(id.as_ref()),
                    truncate(&error.to_string(), PARAMS_LOG_LIMIT)
                );
            }
            Inbound::Unclassified { .. } => {
                warn!(
                    "Received message without method, result, or error: {}",
                    truncate(text, FRAME_LOG_LIMIT)
                );
            }
            Inbound::Invalid { id, reason } => {
                warn!("Rejecting frame (id={}): {}", DisplayId(id.as_ref()), reason);
                if id.is_some() {
                    self.send_error(id, reason);
                }
            }
        }
    }

    async fn route(&self, request: Request) {
        let Request { id, method, params } = request;

        let dispatcher = match self.dispatcher().await {
            Some(dispatcher) => dispatcher,
            None => {
                error!("{}", NOT_READY_MESSAGE);
                self.send_error(id, NOT_READY_MESSAGE);
                return;
            }
        };

        let params_log = serde_json::to_string(&params).unwrap_or_default();
        debug!(
            "Dispatching {} (id={}, params={})",
            method,
            DisplayId(id.as_ref()),
            truncate(&params_log, PARAMS_LOG_LIMIT)
        );

        let method = normalize_method(&method).to_owned();

        if method == self.long_running_method {
            self.lane.submit(LaneJob {
                id,
                method,
                params,
                dispatcher,
            });
            return;
        }

        let reply = match invoke(dispatcher.as_ref(), &method, &params, id.as_ref()).await {
            Ok(value) => {
                debug!("Command {} executed", method);
                Reply::success(id.clone(), value)
            }
            Err(message) => {
                warn!("Command {} failed: {}", method, message);
                Reply::failure(id.clone(), message)
            }
        };

        if let Err(e) = self.outbox.send_reply(&reply) {
            error!("Error processing message: {}", e);
            if id.is_some() {
                self.send_error(id, e.to_string());
            }
        }
    }

    /// Resolve the dispatcher once; later calls reuse it. While the provider
    /// has nothing to offer, each call asks again.
    async fn dispatcher(&self) -> Option<Arc<dyn Dispatcher>> {
        self.dispatcher
            .get_or_try_init(|| async { self.provider.resolve().ok_or(()) })
            .await
            .ok()
            .cloned()
    }

    fn send_error(&self, id: Option<RequestId>, message: impl Into<String>) {
        if let Err(e) = self.outbox.send_reply(&Reply::failure(id, message)) {
            error!("Error responding with an error: {}", e);
        }
    }

    /// Stop the background lane
    pub fn shutdown(&self) {
        self.lane.shutdown();
    }
}

#[async_trait]
impl InboundHandler for Router {
    async fn on_text(&self, text: String) {
        self.handle_text(&text).await;
    }

    fn shutdown(&self) {
        Router::shutdown(self);
    }
}
