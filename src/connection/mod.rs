//! Connection management for the reverse link to the control host
//!
//! This module handles:
//! - A single persistent link with automatic reconnection
//! - Handshake identity headers built from the current configuration
//! - The shared send path used by synchronous and background replies

mod headers;
mod manager;
mod outbox;

pub use headers::{build_headers, target_url, Headers};
pub use manager::{ConnectionManager, ConnectionState, InboundHandler};
pub use outbox::Outbox;
