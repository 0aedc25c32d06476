//! Node lifecycle state and the atomic snapshot shared with interrupt context.
//!
//! The dispatcher owns the authoritative [`NodeState`]; it mirrors the state,
//! the active link, and the "send once connected" flag into [`SharedStatus`] so
//! button handlers can decide what to enqueue without touching the context.

use core::fmt;

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::links::LinkType;

/// Application lifecycle state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeState {
    #[default]
    Init,
    StackNotReady,
    StackReady,
    SecureChannelReady,
    /// Terminal. The dispatcher loop has stopped.
    Error,
}

impl NodeState {
    /// Returns `true` when uplinks may be submitted. On the short-range link
    /// this also means no connection request is needed.
    #[must_use]
    pub const fn accepts_uplinks(self) -> bool {
        matches!(self, NodeState::StackReady | NodeState::SecureChannelReady)
    }

    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            NodeState::Init => 0,
            NodeState::StackNotReady => 1,
            NodeState::StackReady => 2,
            NodeState::SecureChannelReady => 3,
            NodeState::Error => 4,
        }
    }

    /// Decodes a raw value; anything unknown maps to [`NodeState::Error`].
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => NodeState::Init,
            1 => NodeState::StackNotReady,
            2 => NodeState::StackReady,
            3 => NodeState::SecureChannelReady,
            _ => NodeState::Error,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeState::Init => "init",
            NodeState::StackNotReady => "not-ready",
            NodeState::StackReady => "ready",
            NodeState::SecureChannelReady => "secure-channel-ready",
            NodeState::Error => "error",
        };
        f.write_str(label)
    }
}

const LINK_BLE: u8 = 0;
const LINK_FSK: u8 = 1;
const LINK_CSS: u8 = 2;

const fn encode_link(link: LinkType) -> u8 {
    match link {
        LinkType::Ble => LINK_BLE,
        LinkType::Fsk => LINK_FSK,
        LinkType::Css => LINK_CSS,
    }
}

const fn decode_link(raw: u8) -> LinkType {
    match raw {
        LINK_FSK => LinkType::Fsk,
        LINK_CSS => LinkType::Css,
        _ => LinkType::Ble,
    }
}

/// Lock-free view of the node state readable from any context.
pub struct SharedStatus {
    state: AtomicU8,
    link: AtomicU8,
    send_after_connect: AtomicBool,
    registered: AtomicBool,
}

impl SharedStatus {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(0),
            link: AtomicU8::new(LINK_BLE),
            send_after_connect: AtomicBool::new(false),
            registered: AtomicBool::new(false),
        }
    }

    pub fn publish_state(&self, state: NodeState) {
        self.state.store(state.to_raw(), Ordering::Release);
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        NodeState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn publish_link(&self, link: LinkType) {
        self.link.store(encode_link(link), Ordering::Release);
    }

    #[must_use]
    pub fn link(&self) -> LinkType {
        decode_link(self.link.load(Ordering::Acquire))
    }

    /// Marks an uplink as owed once the short-range link connects.
    ///
    /// Returns `true` if the flag was already set.
    pub fn request_send_after_connect(&self) -> bool {
        self.send_after_connect.swap(true, Ordering::AcqRel)
    }

    /// Clears the flag, returning whether it was set.
    pub fn take_send_after_connect(&self) -> bool {
        self.send_after_connect.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn send_after_connect_pending(&self) -> bool {
        self.send_after_connect.load(Ordering::Acquire)
    }

    /// Latches registration for this boot. Returns `true` the first time only.
    pub fn mark_registered(&self) -> bool {
        !self.registered.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}
