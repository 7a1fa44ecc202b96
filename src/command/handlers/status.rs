//! Liveness command handler

use super::HandlerContext;
use anyhow::Result;
use reverse_link_shared::DisplayId;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Handle `ping`; echoes `params.echo` when present
pub async fn handle_ping(ctx: &HandlerContext, params: &Map<String, Value>) -> Result<Value> {
    debug!(
        "[PING] id={} uptime={}ms origin={:?}",
        DisplayId(ctx.request_id.as_ref()),
        ctx.uptime_ms,
        ctx.origin
    );

    let mut reply = json!({
        "pong": true,
        "uptimeMs": ctx.uptime_ms,
    });
    if let Some(echo) = params.get("echo") {
        reply["echo"] = echo.clone();
    }
    Ok(reply)
}
