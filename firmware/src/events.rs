//! Embassy channel carrying node events.
//!
//! Buttons, the idle timer and the stack's work notification all push through
//! [`ChannelProducer`]; the node task is the only reader via
//! [`ChannelSource`].

#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use node_core::events::{EVENT_QUEUE_DEPTH, Event, EventProducer, EventSource, QueueFull};

#[cfg(target_os = "none")]
pub type EventMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
pub type EventMutex = NoopRawMutex;

/// Bounded event queue shared by every producer.
pub type EventQueue = Channel<EventMutex, Event, EVENT_QUEUE_DEPTH>;

pub type EventSender<'a> = Sender<'a, EventMutex, Event, EVENT_QUEUE_DEPTH>;

pub type EventReceiver<'a> = Receiver<'a, EventMutex, Event, EVENT_QUEUE_DEPTH>;

/// Non-blocking producer half. Safe to use from interrupt context.
#[derive(Clone, Copy)]
pub struct ChannelProducer<'a> {
    sender: EventSender<'a>,
}

impl<'a> ChannelProducer<'a> {
    pub fn new(sender: EventSender<'a>) -> Self {
        Self { sender }
    }
}

impl EventProducer for ChannelProducer<'_> {
    fn try_push(&self, event: Event) -> Result<(), QueueFull> {
        self.sender.try_send(event).map_err(|error| match error {
            TrySendError::Full(event) => QueueFull(event),
        })
    }
}

/// Consumer half used by the dispatcher.
pub struct ChannelSource<'a> {
    receiver: EventReceiver<'a>,
}

impl<'a> ChannelSource<'a> {
    pub fn new(receiver: EventReceiver<'a>) -> Self {
        Self { receiver }
    }
}

impl EventSource for ChannelSource<'_> {
    async fn next_event(&mut self) -> Event {
        self.receiver.receive().await
    }

    fn try_next_event(&mut self) -> Option<Event> {
        self.receiver.try_receive().ok()
    }
}
