//! Reverse-link device client
//!
//! Keeps one persistent connection to a remote control host, executes the
//! commands it sends and returns correlated results over the same link.

pub mod command;
pub mod config;
pub mod connection;
pub mod transport;
