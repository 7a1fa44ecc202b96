//! Command handling for requests arriving from the host
//!
//! This module handles:
//! - Classifying inbound frames and correlating replies by id
//! - Dispatching commands inline or on the background lane
//! - The dispatcher interface and the built-in command registry

mod dispatcher;
pub mod handlers;
mod lane;
mod registry;
mod router;

pub use dispatcher::{invoke, Dispatcher, DispatcherProvider, Origin, Ready};
pub use lane::{AsyncLane, LaneJob};
pub use registry::CommandRegistry;
pub use router::{normalize_method, Router, NOT_READY_MESSAGE};
