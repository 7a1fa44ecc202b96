#[cfg(test)]
pub mod memory;
pub mod traits;
pub mod websocket;

pub use traits::{Connector, Link, LinkEvent, OutboundFrame};
pub use websocket::WsConnector;
