//! Built-in dispatcher for the commands this binary answers itself

use super::dispatcher::{Dispatcher, Origin};
use super::handlers::{self, HandlerContext};
use crate::config::ConfigStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reverse_link_shared::RequestId;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Dispatches commands to the built-in handlers
pub struct CommandRegistry {
    store: Arc<dyn ConfigStore>,
    started: Instant,
}

impl CommandRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl Dispatcher for CommandRegistry {
    async fn dispatch(
        &self,
        method: &str,
        params: &Map<String, Value>,
        origin: Origin,
        request_id: Option<&RequestId>,
    ) -> Result<Value> {
        let ctx = HandlerContext {
            device: self.store.snapshot(),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            origin,
            request_id: request_id.cloned(),
        };
        debug!("Executing command: {}", method);

        match method {
            "ping" => handlers::handle_ping(&ctx, params).await,
            "device.info" => handlers::handle_device_info(&ctx).await,
            other => Err(anyhow!("Unknown method: {}", other)),
        }
    }
}
