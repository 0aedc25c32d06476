//! Contract with the external wireless protocol stack.
//!
//! The node never looks inside the stack: it owns an opaque handle created by
//! [`WirelessStack::init`], drives it through start/stop/process calls, and
//! receives notifications through [`StackCallbacks`] while `process` runs.
//! Firmware binds the real vendor stack, the emulator and bring-up builds use
//! [`crate::loopback::LoopbackStack`].

use core::fmt;

use crate::config::{ConnectionPolicy, DeviceProfile, MultiLinkPolicy};
use crate::links::{LinkMask, LinkType};

/// Identifier assigned by the stack to an accepted uplink.
pub type MessageId = u16;

/// Error codes reported by the wireless stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// Operation needs a started link that is not ready yet.
    NotReady,
    /// An argument or option value was rejected.
    InvalidArgs,
    /// The build does not support the requested option or link.
    NoSupport,
    /// The stack is busy with a previous request.
    Busy,
    /// A radio operation timed out.
    Timeout,
    /// The radio driver reported a failure.
    Radio,
    /// No buffer space left for the request.
    OutOfMemory,
    /// Vendor specific code without a dedicated variant.
    Other(i16),
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::NotReady => f.write_str("not-ready"),
            StackError::InvalidArgs => f.write_str("invalid-args"),
            StackError::NoSupport => f.write_str("no-support"),
            StackError::Busy => f.write_str("busy"),
            StackError::Timeout => f.write_str("timeout"),
            StackError::Radio => f.write_str("radio"),
            StackError::OutOfMemory => f.write_str("out-of-memory"),
            StackError::Other(code) => write!(f, "code({code})"),
        }
    }
}

/// Stack initialization parameters for one link selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Links the handle will be started with.
    pub link_mask: LinkMask,
    pub device: DeviceProfile,
}

impl LinkConfig {
    #[must_use]
    pub const fn new(link_mask: LinkMask, device: DeviceProfile) -> Self {
        Self { link_mask, device }
    }

    /// Whether the short-range sub-configuration must be supplied.
    #[must_use]
    pub const fn uses_short_range(self) -> bool {
        self.link_mask.contains(LinkType::Ble)
    }

    /// Whether the sub-GHz sub-configuration must be supplied.
    #[must_use]
    pub const fn uses_sub_ghz(self) -> bool {
        self.link_mask.contains(LinkType::Fsk) || self.link_mask.contains(LinkType::Css)
    }
}

/// Options applied after init through [`WirelessStack::set_option`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackOption {
    ConnectionPolicy(ConnectionPolicy),
    MultiLinkPolicy(MultiLinkPolicy),
}

/// Message classes understood by the stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    Get,
    Set,
    Notify,
    Response,
}

/// Routing metadata submitted with, or delivered alongside, a message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageDescriptor {
    pub kind: MessageKind,
    pub link: LinkMask,
    /// Assigned by the stack once the message has been accepted.
    pub id: Option<MessageId>,
}

impl MessageDescriptor {
    /// Notification uplink on the given links.
    #[must_use]
    pub const fn notify(link: LinkMask) -> Self {
        Self {
            kind: MessageKind::Notify,
            link,
            id: None,
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Network time reported by the stack.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub seconds: u32,
    pub nanos: u32,
}

/// Stack-level readiness reported by status notifications.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackState {
    Ready,
    NotReady,
    SecureChannelReady,
    Error,
}

/// Registration progress reported by status notifications.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    Registered,
    Unregistered,
}

/// Snapshot delivered through [`StackCallbacks::on_status_changed`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackStatus {
    pub state: StackState,
    pub registration: RegistrationStatus,
    pub time_synced: bool,
    /// Links currently up.
    pub link_status: LinkMask,
}

impl StackStatus {
    #[must_use]
    pub const fn new(state: StackState, registration: RegistrationStatus) -> Self {
        Self {
            state,
            registration,
            time_synced: false,
            link_status: LinkMask::NONE,
        }
    }
}

/// Notifications the stack raises while [`WirelessStack::process`] runs.
///
/// The generic "work pending" notification is not part of this trait because
/// it fires from interrupt context; it goes through
/// [`crate::triggers::Triggers::notify_stack_event`] instead.
pub trait StackCallbacks {
    fn on_msg_received(&mut self, descriptor: &MessageDescriptor, payload: &[u8]);

    fn on_msg_sent(&mut self, descriptor: &MessageDescriptor);

    fn on_send_error(&mut self, error: StackError, descriptor: &MessageDescriptor);

    fn on_status_changed(&mut self, status: &StackStatus);

    fn on_factory_reset(&mut self);
}

/// Operations the node needs from the wireless stack.
pub trait WirelessStack {
    /// Opaque per-initialization handle.
    type Handle;

    /// Creates a handle configured for `config.link_mask`.
    fn init(&mut self, config: &LinkConfig) -> Result<Self::Handle, StackError>;

    /// Destroys the handle. The handle is consumed even when this fails.
    fn deinit(&mut self, handle: Self::Handle) -> Result<(), StackError>;

    fn start(&mut self, handle: &mut Self::Handle, links: LinkMask) -> Result<(), StackError>;

    fn stop(&mut self, handle: &mut Self::Handle, links: LinkMask) -> Result<(), StackError>;

    /// Applies a policy option. [`StackError::NoSupport`] marks options the
    /// build does not implement.
    fn set_option(
        &mut self,
        handle: &mut Self::Handle,
        option: StackOption,
    ) -> Result<(), StackError>;

    /// Queues an uplink and returns the identifier the stack assigned to it.
    fn submit_message(
        &mut self,
        handle: &mut Self::Handle,
        payload: &[u8],
        descriptor: &MessageDescriptor,
    ) -> Result<MessageId, StackError>;

    fn query_time(&mut self, handle: &mut Self::Handle) -> Result<Timestamp, StackError>;

    fn query_mtu(&mut self, handle: &mut Self::Handle, links: LinkMask)
    -> Result<usize, StackError>;

    /// Asks the stack to wipe its persistent state. Completion is announced
    /// through [`StackCallbacks::on_factory_reset`].
    fn request_factory_reset(&mut self, handle: &mut Self::Handle) -> Result<(), StackError>;

    /// Returns the error behind the most recent `Error` status.
    fn last_error(&mut self, handle: &mut Self::Handle) -> StackError;

    /// Opens (`true`) or drops (`false`) a short-range connection.
    fn request_connection(
        &mut self,
        handle: &mut Self::Handle,
        connect: bool,
    ) -> Result<(), StackError>;

    /// Runs pending stack work, invoking `callbacks` synchronously.
    fn process(
        &mut self,
        handle: &mut Self::Handle,
        callbacks: &mut dyn StackCallbacks,
    ) -> Result<(), StackError>;
}
