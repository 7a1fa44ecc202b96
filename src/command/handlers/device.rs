//! Device identity command handler

use super::HandlerContext;
use anyhow::Result;
use serde_json::{json, Value};

/// Handle `device.info`
pub async fn handle_device_info(ctx: &HandlerContext) -> Result<Value> {
    Ok(json!({
        "deviceId": ctx.device.device_id,
        "deviceName": ctx.device.device_name,
        "countryCode": ctx.device.country_code,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
