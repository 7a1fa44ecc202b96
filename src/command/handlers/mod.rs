//! Built-in command handlers

mod device;
mod status;

pub use device::handle_device_info;
pub use status::handle_ping;

use crate::command::dispatcher::Origin;
use crate::config::DeviceConfig;
use reverse_link_shared::RequestId;

/// Context passed to command handlers
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub device: DeviceConfig,
    pub uptime_ms: u64,
    pub origin: Origin,
    pub request_id: Option<RequestId>,
}
