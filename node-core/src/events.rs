//! Event catalog and the queue seam between producers and the dispatcher.
//!
//! Producers (interrupt handlers, stack notifications, application triggers)
//! only ever call [`EventProducer::try_push`], which never blocks. The single
//! consumer awaits [`EventSource::next_event`]. Firmware backs both traits with
//! an embassy channel; host tooling and tests use [`LocalEventQueue`].

use core::cell::RefCell;
use core::fmt;
use core::future::poll_fn;
use core::task::Poll;

use heapless::Deque;

pub use crate::config::EVENT_QUEUE_DEPTH;

/// Work items processed by the dispatcher, one at a time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The stack has pending work; run its processing step.
    StackProcess,
    /// Submit the uplink counter.
    SendCounterUpdate,
    GetTime,
    GetMtu,
    FactoryReset,
    /// Move to the next available link.
    LinkSwitch,
    /// The inactivity timer expired.
    IdleTimeout,
    /// Registration completed; move to the default link.
    Registered,
    /// Open a short-range connection.
    ConnectionRequest,
    Invalid,
}

impl Event {
    /// Short label used by logs and the emulator narration.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Event::StackProcess => "stack-process",
            Event::SendCounterUpdate => "send-counter-update",
            Event::GetTime => "get-time",
            Event::GetMtu => "get-mtu",
            Event::FactoryReset => "factory-reset",
            Event::LinkSwitch => "link-switch",
            Event::IdleTimeout => "idle-timeout",
            Event::Registered => "registered",
            Event::ConnectionRequest => "connection-request",
            Event::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when the queue has no free slot. The event is dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull(pub Event);

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event queue full, dropped {}", self.0)
    }
}

/// Non-blocking, interrupt-safe enqueue side of the event queue.
pub trait EventProducer {
    /// Appends `event` at the tail. Fails without blocking when the queue is
    /// full; earlier events are never displaced.
    fn try_push(&self, event: Event) -> Result<(), QueueFull>;
}

impl<T: EventProducer + ?Sized> EventProducer for &T {
    fn try_push(&self, event: Event) -> Result<(), QueueFull> {
        (**self).try_push(event)
    }
}

/// Single-consumer dequeue side of the event queue.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Waits for the next event in arrival order.
    async fn next_event(&mut self) -> Event;

    /// Pops the next event if one is already queued.
    fn try_next_event(&mut self) -> Option<Event>;
}

/// Single-threaded bounded queue for host builds and tests.
pub struct LocalEventQueue<const N: usize = EVENT_QUEUE_DEPTH> {
    slots: RefCell<Deque<Event, N>>,
}

impl<const N: usize> LocalEventQueue<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: RefCell::new(Deque::new()),
        }
    }

    /// Removes the oldest event.
    pub fn try_pop(&self) -> Option<Event> {
        self.slots.borrow_mut().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discards every queued event.
    pub fn clear(&self) {
        self.slots.borrow_mut().clear();
    }
}

impl<const N: usize> Default for LocalEventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventProducer for LocalEventQueue<N> {
    fn try_push(&self, event: Event) -> Result<(), QueueFull> {
        self.slots
            .borrow_mut()
            .push_back(event)
            .map_err(QueueFull)
    }
}

/// Host event source.
///
/// Producers share the consumer's thread, so an empty queue can only be
/// refilled by work outside the awaiting future. `next_event` on an empty
/// queue keeps re-polling until that happens; under a plain `block_on` it
/// spins forever. Hand `EventDispatcher::run` a queue that ends in an exiting
/// event (`IdleTimeout`, a factory reset), or feed the dispatcher with
/// `EventDispatcher::drain` between inputs as the emulator does.
impl<const N: usize> EventSource for &LocalEventQueue<N> {
    async fn next_event(&mut self) -> Event {
        poll_fn(|cx| match self.try_pop() {
            Some(event) => Poll::Ready(event),
            None => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }

    fn try_next_event(&mut self) -> Option<Event> {
        self.try_pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_arrival_order() {
        let queue: LocalEventQueue<4> = LocalEventQueue::new();
        queue.try_push(Event::GetTime).expect("push");
        queue.try_push(Event::GetMtu).expect("push");
        queue.try_push(Event::LinkSwitch).expect("push");

        assert_eq!(queue.try_pop(), Some(Event::GetTime));
        assert_eq!(queue.try_pop(), Some(Event::GetMtu));
        assert_eq!(queue.try_pop(), Some(Event::LinkSwitch));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn overflow_drops_newest_and_keeps_accepted_events() {
        let queue: LocalEventQueue<2> = LocalEventQueue::new();
        queue.try_push(Event::SendCounterUpdate).expect("push");
        queue.try_push(Event::GetTime).expect("push");

        let error = queue
            .try_push(Event::IdleTimeout)
            .expect_err("third push must overflow");
        assert_eq!(error, QueueFull(Event::IdleTimeout));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_pop(), Some(Event::SendCounterUpdate));
        assert_eq!(queue.try_pop(), Some(Event::GetTime));
    }

    #[test]
    fn reference_producer_forwards_to_queue() {
        let queue: LocalEventQueue = LocalEventQueue::new();
        let producer = &queue;
        producer.try_push(Event::Registered).expect("push");
        assert_eq!(queue.capacity(), EVENT_QUEUE_DEPTH);
        assert_eq!(queue.try_pop(), Some(Event::Registered));
    }

    #[test]
    fn next_event_resolves_queued_event() {
        let queue: LocalEventQueue = LocalEventQueue::new();
        queue.try_push(Event::ConnectionRequest).expect("push");

        let mut source = &queue;
        let event = embassy_futures::block_on(source.next_event());
        assert_eq!(event, Event::ConnectionRequest);
        assert!(queue.is_empty());
    }
}
