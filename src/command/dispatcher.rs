//! Interface to the command executor that performs device actions

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use reverse_link_shared::RequestId;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Channel a command arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    WebSocketReverse,
}

/// Executes a named command with parameters
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(
        &self,
        method: &str,
        params: &Map<String, Value>,
        origin: Origin,
        request_id: Option<&RequestId>,
    ) -> Result<Value>;
}

/// Capability query for a dispatcher that may not be available yet
pub trait DispatcherProvider: Send + Sync {
    /// The dispatcher, once the subsystem that owns it is up
    fn resolve(&self) -> Option<Arc<dyn Dispatcher>>;
}

impl<F> DispatcherProvider for F
where
    F: Fn() -> Option<Arc<dyn Dispatcher>> + Send + Sync,
{
    fn resolve(&self) -> Option<Arc<dyn Dispatcher>> {
        self()
    }
}

/// Provider for a dispatcher that is available from the start
pub struct Ready(pub Arc<dyn Dispatcher>);

impl DispatcherProvider for Ready {
    fn resolve(&self) -> Option<Arc<dyn Dispatcher>> {
        Some(Arc::clone(&self.0))
    }
}

/// Run a dispatch, turning errors and panics into an error message
pub async fn invoke(
    dispatcher: &dyn Dispatcher,
    method: &str,
    params: &Map<String, Value>,
    request_id: Option<&RequestId>,
) -> Result<Value, String> {
    let call = dispatcher.dispatch(method, params, Origin::WebSocketReverse, request_id);
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(_) => Err(format!("Command {} panicked", method)),
    }
}
