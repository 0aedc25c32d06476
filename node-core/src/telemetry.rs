//! Structured record of what the node decided, kept in a fixed-size ring.
//!
//! Every observable action of the dispatcher lands here with a monotonically
//! increasing id. Tests assert on the ring, the emulator narrates it, and the
//! firmware keeps the most recent entries for post-mortem inspection.

use core::fmt;

use heapless::HistoryBuf;

use crate::events::Event;
use crate::lifecycle::LinkError;
use crate::links::LinkType;
use crate::platform::RestartReason;
use crate::sleep::SleepStep;
use crate::stack::{MessageId, StackError, Timestamp};
use crate::status::NodeState;

/// Number of records retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeEventKind {
    StateChanged(NodeState),
    LinkStarted(LinkType),
    /// Switch requested on a single-link build.
    LinkSwitchSkipped(LinkType),
    UplinkQueued { counter: u32, id: MessageId },
    UplinkRejected { counter: u32, error: StackError },
    /// Counter update dropped because the stack is not ready.
    UplinkSkipped(NodeState),
    UplinkDelivered(Option<MessageId>),
    SendFailed(StackError),
    DownlinkReceived { len: u16 },
    TimeReported(Timestamp),
    MtuReported { link: LinkType, mtu: u16 },
    QueryFailed(StackError),
    ConnectionRequested,
    /// Connection request ignored because the link is already ready.
    ConnectionAlreadyReady,
    Registered,
    StackFault(StackError),
    SleepStep(SleepStep),
    SleepAborted(SleepStep, StackError),
    FactoryResetRequested,
    RestartRequested(RestartReason),
    /// Event dropped because no stack handle exists.
    EventIgnored(Event),
    Fatal(LinkError),
}

impl fmt::Display for NodeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeEventKind::StateChanged(state) => write!(f, "state {state}"),
            NodeEventKind::LinkStarted(link) => write!(f, "link-started {link}"),
            NodeEventKind::LinkSwitchSkipped(link) => {
                write!(f, "link-switch-skipped only {link} available")
            }
            NodeEventKind::UplinkQueued { counter, id } => {
                write!(f, "uplink-queued counter={counter} id={id}")
            }
            NodeEventKind::UplinkRejected { counter, error } => {
                write!(f, "uplink-rejected counter={counter} error={error}")
            }
            NodeEventKind::UplinkSkipped(state) => write!(f, "uplink-skipped state={state}"),
            NodeEventKind::UplinkDelivered(Some(id)) => write!(f, "uplink-delivered id={id}"),
            NodeEventKind::UplinkDelivered(None) => f.write_str("uplink-delivered"),
            NodeEventKind::SendFailed(error) => write!(f, "send-failed {error}"),
            NodeEventKind::DownlinkReceived { len } => write!(f, "downlink len={len}"),
            NodeEventKind::TimeReported(time) => {
                write!(f, "time {}.{:09}", time.seconds, time.nanos)
            }
            NodeEventKind::MtuReported { link, mtu } => write!(f, "mtu {link}={mtu}"),
            NodeEventKind::QueryFailed(error) => write!(f, "query-failed {error}"),
            NodeEventKind::ConnectionRequested => f.write_str("connection-requested"),
            NodeEventKind::ConnectionAlreadyReady => f.write_str("connection-already-ready"),
            NodeEventKind::Registered => f.write_str("registered"),
            NodeEventKind::StackFault(error) => write!(f, "stack-error {error}"),
            NodeEventKind::SleepStep(step) => write!(f, "sleep-step {step}"),
            NodeEventKind::SleepAborted(step, error) => {
                write!(f, "sleep-aborted {step} {error}")
            }
            NodeEventKind::FactoryResetRequested => f.write_str("factory-reset-requested"),
            NodeEventKind::RestartRequested(reason) => write!(f, "restart {reason}"),
            NodeEventKind::EventIgnored(event) => write!(f, "ignored {event} (no handle)"),
            NodeEventKind::Fatal(error) => write!(f, "fatal {error}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: NodeEventKind,
}

/// Fixed-capacity telemetry ring.
pub struct TelemetryRecorder {
    ring: HistoryBuf<TelemetryRecord, TELEMETRY_RING_CAPACITY>,
    next_event_id: EventId,
}

impl TelemetryRecorder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends a record, evicting the oldest once the ring is full.
    pub fn record(&mut self, event: NodeEventKind) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, event });
        id
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `id`, oldest first.
    pub fn since(&self, id: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.oldest_first().filter(move |record| record.id >= id)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Id the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.recent().is_none()
    }

    /// Returns `true` if any retained record matches `event`.
    #[must_use]
    pub fn contains(&self, event: NodeEventKind) -> bool {
        self.oldest_first().any(|record| record.event == event)
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
