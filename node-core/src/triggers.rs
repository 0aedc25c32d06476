//! Upstream trigger functions callable from interrupt or task context.
//!
//! Every trigger only enqueues and returns. A full queue is logged and
//! reported back to the caller; the dispatcher never learns about the drop.

use crate::events::{Event, EventProducer, QueueFull};
use crate::log;
use crate::status::SharedStatus;

/// What [`Triggers::trigger_connect_and_send`] decided to do.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectAndSend {
    /// The link can carry the uplink right away.
    SendQueued,
    /// A short-range connection was requested; the uplink follows once ready.
    ConnectionRequested,
    /// A connection is already pending; nothing was enqueued.
    AlreadyPending,
}

/// Enqueue-only facade over the event queue.
pub struct Triggers<'a, Q> {
    queue: Q,
    status: &'a SharedStatus,
}

impl<'a, Q> Triggers<'a, Q>
where
    Q: EventProducer,
{
    pub const fn new(queue: Q, status: &'a SharedStatus) -> Self {
        Self { queue, status }
    }

    #[must_use]
    pub const fn status(&self) -> &'a SharedStatus {
        self.status
    }

    /// Sends the counter, connecting the short-range link first if needed.
    ///
    /// On the short-range link the node only transmits while connected, so a
    /// press while not ready requests a connection and marks the uplink as
    /// owed. A second press before the connection completes is ignored.
    pub fn trigger_connect_and_send(&self) -> Result<ConnectAndSend, QueueFull> {
        let link = self.status.link();
        if link.is_short_range() && !self.status.state().accepts_uplinks() {
            if self.status.request_send_after_connect() {
                log::connection_already_pending();
                return Ok(ConnectAndSend::AlreadyPending);
            }
            if let Err(error) = self.push(Event::ConnectionRequest) {
                self.status.take_send_after_connect();
                return Err(error);
            }
            return Ok(ConnectAndSend::ConnectionRequested);
        }

        self.push(Event::SendCounterUpdate)?;
        Ok(ConnectAndSend::SendQueued)
    }

    pub fn trigger_send_counter_update(&self) -> Result<(), QueueFull> {
        self.push(Event::SendCounterUpdate)
    }

    pub fn trigger_link_switch(&self) -> Result<(), QueueFull> {
        self.push(Event::LinkSwitch)
    }

    /// Requests the deep-sleep sequence; used by the inactivity timer and the
    /// long button press.
    pub fn trigger_idle_sleep(&self) -> Result<(), QueueFull> {
        self.push(Event::IdleTimeout)
    }

    pub fn trigger_factory_reset(&self) -> Result<(), QueueFull> {
        self.push(Event::FactoryReset)
    }

    pub fn trigger_get_time(&self) -> Result<(), QueueFull> {
        self.push(Event::GetTime)
    }

    pub fn trigger_get_mtu(&self) -> Result<(), QueueFull> {
        self.push(Event::GetMtu)
    }

    pub fn trigger_connection_request(&self) -> Result<(), QueueFull> {
        self.push(Event::ConnectionRequest)
    }

    pub fn trigger_switch_to_default_link(&self) -> Result<(), QueueFull> {
        self.push(Event::Registered)
    }

    /// Generic "stack has work" notification raised from interrupt context.
    pub fn notify_stack_event(&self) -> Result<(), QueueFull> {
        self.push(Event::StackProcess)
    }

    fn push(&self, event: Event) -> Result<(), QueueFull> {
        self.queue.try_push(event).inspect_err(|error| {
            log::queue_full(error.0);
        })
    }
}
