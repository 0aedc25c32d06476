//! Deterministic in-memory wireless stack.
//!
//! [`LoopbackStack`] honours the [`WirelessStack`] contract without a radio:
//! notifications are queued internally and delivered on the next `process`
//! call, and every queued notification raises a `StackProcess` event through
//! the supplied producer, exactly like the generic-event callback of a real
//! stack. Faults can be injected per operation to exercise error paths.

use heapless::{Deque, Vec};

use crate::events::{Event, EventProducer};
use crate::links::{LinkMask, LinkType};
use crate::log;
use crate::stack::{
    LinkConfig, MessageDescriptor, MessageId, MessageKind, RegistrationStatus, StackCallbacks,
    StackError, StackOption, StackState, StackStatus, Timestamp, WirelessStack,
};

/// Notifications buffered between `process` calls.
pub const LOOPBACK_PENDING_DEPTH: usize = 8;

/// Largest downlink payload the loopback stack can inject.
pub const LOOPBACK_MAX_PAYLOAD: usize = 32;

/// Seconds reported by the first time query.
const CLOCK_ORIGIN_SECONDS: u32 = 1_400_000_000;

/// Per-operation fault injection. `Some(error)` makes that call fail.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LoopbackFaults {
    pub init: Option<StackError>,
    pub deinit: Option<StackError>,
    pub start: Option<StackError>,
    pub stop: Option<StackError>,
    pub set_option: Option<StackError>,
    pub submit: Option<StackError>,
    pub query: Option<StackError>,
    pub factory_reset: Option<StackError>,
    pub connection: Option<StackError>,
}

/// Handle issued by [`LoopbackStack::init`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoopbackHandle {
    pub id: u8,
    pub links: LinkMask,
    pub started: bool,
    pub connected: bool,
}

impl LoopbackHandle {
    fn ready(&self) -> bool {
        self.started && (self.connected || !self.links.contains(LinkType::Ble))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Notification {
    Status(StackStatus),
    Sent(MessageDescriptor),
    SendError(StackError, MessageDescriptor),
    Received(MessageDescriptor, Vec<u8, LOOPBACK_MAX_PAYLOAD>),
    FactoryReset,
}

/// Loopback implementation of [`WirelessStack`].
pub struct LoopbackStack<P> {
    events: P,
    pending: Deque<Notification, LOOPBACK_PENDING_DEPTH>,
    faults: LoopbackFaults,
    registered: bool,
    next_handle: u8,
    next_message: MessageId,
    clock_queries: u32,
    last_error: StackError,
    live_handles: u8,
}

impl<P: EventProducer> LoopbackStack<P> {
    /// Creates an unregistered loopback stack that raises `StackProcess`
    /// through `events`.
    pub const fn new(events: P) -> Self {
        Self {
            events,
            pending: Deque::new(),
            faults: LoopbackFaults {
                init: None,
                deinit: None,
                start: None,
                stop: None,
                set_option: None,
                submit: None,
                query: None,
                factory_reset: None,
                connection: None,
            },
            registered: false,
            next_handle: 0,
            next_message: 0,
            clock_queries: 0,
            last_error: StackError::Other(0),
            live_handles: 0,
        }
    }

    /// Starts out already registered, as after a previous boot.
    #[must_use]
    pub fn registered(mut self) -> Self {
        self.registered = true;
        self
    }

    pub fn faults_mut(&mut self) -> &mut LoopbackFaults {
        &mut self.faults
    }

    #[must_use]
    pub const fn faults(&self) -> &LoopbackFaults {
        &self.faults
    }

    pub fn clear_faults(&mut self) {
        self.faults = LoopbackFaults::default();
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Handles created and not yet deinitialized.
    #[must_use]
    pub const fn live_handles(&self) -> u8 {
        self.live_handles
    }

    /// Queues a downlink delivered on the next `process` call. Payloads longer
    /// than [`LOOPBACK_MAX_PAYLOAD`] are truncated.
    pub fn inject_downlink(&mut self, link: LinkMask, payload: &[u8]) {
        let len = payload.len().min(LOOPBACK_MAX_PAYLOAD);
        let mut data = Vec::new();
        // Length clamped above, so this cannot overflow.
        let _ = data.extend_from_slice(&payload[..len]);
        let descriptor = MessageDescriptor {
            kind: MessageKind::Set,
            link,
            id: Some(self.allocate_message_id()),
        };
        self.queue(Notification::Received(descriptor, data));
    }

    /// Queues an `Error` status; `last_error` will report `error`.
    pub fn inject_status_error(&mut self, error: StackError) {
        self.last_error = error;
        let status = StackStatus::new(StackState::Error, self.registration());
        self.queue(Notification::Status(status));
    }

    /// Queues a status notification as-is.
    pub fn inject_status(&mut self, status: StackStatus) {
        self.queue(Notification::Status(status));
    }

    /// Number of notifications waiting for `process`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn registration(&self) -> RegistrationStatus {
        if self.registered {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::Unregistered
        }
    }

    fn status_for(&self, handle: &LoopbackHandle) -> StackStatus {
        let state = if handle.ready() {
            StackState::Ready
        } else {
            StackState::NotReady
        };
        StackStatus {
            state,
            registration: self.registration(),
            time_synced: handle.ready(),
            link_status: if handle.ready() {
                handle.links
            } else {
                LinkMask::NONE
            },
        }
    }

    fn allocate_message_id(&mut self) -> MessageId {
        let id = self.next_message;
        self.next_message = self.next_message.wrapping_add(1);
        id
    }

    fn queue(&mut self, notification: Notification) {
        if self.pending.push_back(notification).is_err() {
            log::queue_full(Event::StackProcess);
            return;
        }
        if let Err(error) = self.events.try_push(Event::StackProcess) {
            log::queue_full(error.0);
        }
    }
}

fn check(fault: Option<StackError>) -> Result<(), StackError> {
    fault.map_or(Ok(()), Err)
}

impl<P: EventProducer> WirelessStack for LoopbackStack<P> {
    type Handle = LoopbackHandle;

    fn init(&mut self, config: &LinkConfig) -> Result<LoopbackHandle, StackError> {
        check(self.faults.init)?;
        if config.link_mask.is_empty() {
            return Err(StackError::InvalidArgs);
        }

        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.live_handles = self.live_handles.saturating_add(1);
        Ok(LoopbackHandle {
            id,
            links: config.link_mask,
            started: false,
            connected: false,
        })
    }

    fn deinit(&mut self, _: LoopbackHandle) -> Result<(), StackError> {
        // The handle is gone either way.
        self.live_handles = self.live_handles.saturating_sub(1);
        self.pending.clear();
        check(self.faults.deinit)
    }

    fn start(&mut self, handle: &mut LoopbackHandle, links: LinkMask) -> Result<(), StackError> {
        check(self.faults.start)?;
        handle.links = links;
        handle.started = true;

        // Registration completes as soon as any link comes up.
        self.registered = true;
        let status = self.status_for(handle);
        self.queue(Notification::Status(status));
        Ok(())
    }

    fn stop(&mut self, handle: &mut LoopbackHandle, _: LinkMask) -> Result<(), StackError> {
        check(self.faults.stop)?;
        handle.started = false;
        handle.connected = false;
        Ok(())
    }

    fn set_option(&mut self, _: &mut LoopbackHandle, _: StackOption) -> Result<(), StackError> {
        check(self.faults.set_option)
    }

    fn submit_message(
        &mut self,
        handle: &mut LoopbackHandle,
        _: &[u8],
        descriptor: &MessageDescriptor,
    ) -> Result<MessageId, StackError> {
        check(self.faults.submit)?;
        if !handle.ready() {
            return Err(StackError::NotReady);
        }

        let id = self.allocate_message_id();
        self.queue(Notification::Sent(descriptor.with_id(id)));
        Ok(id)
    }

    fn query_time(&mut self, handle: &mut LoopbackHandle) -> Result<Timestamp, StackError> {
        check(self.faults.query)?;
        if !handle.ready() {
            return Err(StackError::NotReady);
        }
        self.clock_queries = self.clock_queries.wrapping_add(1);
        Ok(Timestamp {
            seconds: CLOCK_ORIGIN_SECONDS.wrapping_add(self.clock_queries),
            nanos: 0,
        })
    }

    fn query_mtu(&mut self, _: &mut LoopbackHandle, links: LinkMask) -> Result<usize, StackError> {
        check(self.faults.query)?;
        match links.primary() {
            Some(LinkType::Ble) => Ok(255),
            Some(LinkType::Fsk) => Ok(200),
            Some(LinkType::Css) => Ok(19),
            None => Err(StackError::InvalidArgs),
        }
    }

    fn request_factory_reset(&mut self, _: &mut LoopbackHandle) -> Result<(), StackError> {
        check(self.faults.factory_reset)?;
        self.registered = false;
        self.queue(Notification::FactoryReset);
        Ok(())
    }

    fn last_error(&mut self, _: &mut LoopbackHandle) -> StackError {
        self.last_error
    }

    fn request_connection(
        &mut self,
        handle: &mut LoopbackHandle,
        connect: bool,
    ) -> Result<(), StackError> {
        check(self.faults.connection)?;
        if !handle.links.contains(LinkType::Ble) {
            return Err(StackError::NoSupport);
        }
        if !handle.started {
            return Err(StackError::NotReady);
        }

        handle.connected = connect;
        let status = self.status_for(handle);
        self.queue(Notification::Status(status));
        Ok(())
    }

    fn process(
        &mut self,
        _: &mut LoopbackHandle,
        callbacks: &mut dyn StackCallbacks,
    ) -> Result<(), StackError> {
        while let Some(notification) = self.pending.pop_front() {
            match notification {
                Notification::Status(status) => callbacks.on_status_changed(&status),
                Notification::Sent(descriptor) => callbacks.on_msg_sent(&descriptor),
                Notification::SendError(error, descriptor) => {
                    callbacks.on_send_error(error, &descriptor);
                }
                Notification::Received(descriptor, payload) => {
                    callbacks.on_msg_received(&descriptor, &payload);
                }
                Notification::FactoryReset => callbacks.on_factory_reset(),
            }
        }
        Ok(())
    }
}

impl<P: EventProducer> LoopbackStack<P> {
    /// Queues a delivery failure for an uplink previously accepted.
    pub fn inject_send_error(&mut self, error: StackError, link: LinkMask) {
        let descriptor = MessageDescriptor::notify(link);
        self.queue(Notification::SendError(error, descriptor));
    }
}
