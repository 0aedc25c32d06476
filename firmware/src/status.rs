//! Node status shared between the node task and interrupt-driven producers.
//!
//! The dispatcher publishes state and link here; the button task reads it to
//! gate uplinks without touching the dispatcher.

use node_core::status::{NodeState, SharedStatus};

/// Published by the node task, read by the triggers.
pub static NODE_STATUS: SharedStatus = SharedStatus::new();

/// Whether the node currently accepts uplink requests.
pub fn uplinks_open() -> bool {
    NODE_STATUS.state().accepts_uplinks()
}

/// True once the node loop has stopped on an error.
pub fn halted() -> bool {
    NODE_STATUS.state() == NodeState::Error
}
