//! Relay server module.
//!
//! This module provides the TCP listener, the participant registry and the
//! per-connection relay loop.

mod connection;
mod listener;
mod registry;

pub use connection::{announce_departures, handle_connection, relay_message};
pub use listener::{ConnectionPermit, RelayServer};
pub use registry::{ConnectionRegistry, Delivery, Frame, Outbound, Participant};
