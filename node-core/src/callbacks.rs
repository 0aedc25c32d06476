//! Adapter turning stack notifications into state changes and queued events.
//!
//! The stack calls back synchronously from inside
//! [`crate::stack::WirelessStack::process`], on the dispatcher's own call
//! stack. The adapter borrows just the pieces of the dispatcher it needs, so
//! the handle stays exclusively borrowed by the stack while callbacks run.

use crate::events::{Event, EventProducer};
use crate::log;
use crate::platform::{LowPowerPlatform, RestartReason};
use crate::stack::{
    MessageDescriptor, RegistrationStatus, StackCallbacks, StackError, StackState, StackStatus,
};
use crate::status::{NodeState, SharedStatus};
use crate::telemetry::{NodeEventKind, TelemetryRecorder};

/// Follow-up work the dispatcher performs once `process` has returned.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallbackReport {
    /// A status notification reported `Error`; query the stack's last error.
    pub status_error: bool,
    /// The device was asked to restart.
    pub restart: Option<RestartReason>,
}

/// [`StackCallbacks`] implementation bound to one `process` call.
pub struct StackCallbackAdapter<'a, P, Q> {
    state: &'a mut NodeState,
    status: &'a SharedStatus,
    queue: &'a Q,
    platform: &'a mut P,
    telemetry: &'a mut TelemetryRecorder,
    report: CallbackReport,
}

impl<'a, P, Q> StackCallbackAdapter<'a, P, Q>
where
    P: LowPowerPlatform,
    Q: EventProducer,
{
    pub fn new(
        state: &'a mut NodeState,
        status: &'a SharedStatus,
        queue: &'a Q,
        platform: &'a mut P,
        telemetry: &'a mut TelemetryRecorder,
    ) -> Self {
        Self {
            state,
            status,
            queue,
            platform,
            telemetry,
            report: CallbackReport::default(),
        }
    }

    /// Ends the callback window and returns the follow-up work.
    #[must_use]
    pub fn finish(self) -> CallbackReport {
        self.report
    }

    fn set_state(&mut self, state: NodeState) {
        if *self.state != state {
            *self.state = state;
            self.status.publish_state(state);
            self.telemetry.record(NodeEventKind::StateChanged(state));
        }
        log::state_changed(state);
    }

    fn push(&self, event: Event) {
        if let Err(error) = self.queue.try_push(event) {
            log::queue_full(error.0);
        }
    }
}

impl<P, Q> StackCallbacks for StackCallbackAdapter<'_, P, Q>
where
    P: LowPowerPlatform,
    Q: EventProducer,
{
    fn on_msg_received(&mut self, descriptor: &MessageDescriptor, payload: &[u8]) {
        self.platform.reset_inactivity_timer();
        let len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
        log::downlink_received(descriptor, len);
        self.telemetry
            .record(NodeEventKind::DownlinkReceived { len });
    }

    fn on_msg_sent(&mut self, descriptor: &MessageDescriptor) {
        self.platform.reset_inactivity_timer();
        log::uplink_delivered(descriptor);
        self.telemetry
            .record(NodeEventKind::UplinkDelivered(descriptor.id));
    }

    fn on_send_error(&mut self, error: StackError, descriptor: &MessageDescriptor) {
        self.platform.reset_inactivity_timer();
        log::send_failed(descriptor, error);
        self.telemetry.record(NodeEventKind::SendFailed(error));
    }

    fn on_status_changed(&mut self, status: &StackStatus) {
        match status.state {
            StackState::Ready => self.set_state(NodeState::StackReady),
            StackState::NotReady => self.set_state(NodeState::StackNotReady),
            StackState::SecureChannelReady => self.set_state(NodeState::SecureChannelReady),
            StackState::Error => self.report.status_error = true,
        }

        // Only the first registered report moves the node to its default link.
        if status.registration == RegistrationStatus::Registered && self.status.mark_registered() {
            self.push(Event::Registered);
        }
        log::status_detail(status);

        if status.state == StackState::Ready && self.status.take_send_after_connect() {
            self.push(Event::SendCounterUpdate);
        }
    }

    fn on_factory_reset(&mut self) {
        log::factory_reset_complete();
        let reason = RestartReason::FactoryResetComplete;
        self.telemetry.record(NodeEventKind::RestartRequested(reason));
        self.report.restart = Some(reason);
        self.platform.system_reset(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::time::Duration;

    use crate::config::WakeSources;
    use crate::events::LocalEventQueue;
    use crate::links::LinkMask;

    #[derive(Default)]
    struct CountingPlatform {
        resets: usize,
        restarts: usize,
    }

    impl LowPowerPlatform for CountingPlatform {
        fn arm_inactivity_timer(&mut self, _: Duration) {}

        fn reset_inactivity_timer(&mut self) {
            self.resets += 1;
        }

        fn put_external_radio_to_sleep(&mut self, _: Duration) -> Result<(), StackError> {
            Ok(())
        }

        fn enter_deep_sleep(&mut self, _: WakeSources) {}

        fn system_reset(&mut self, _: RestartReason) {
            self.restarts += 1;
        }
    }

    #[test]
    fn traffic_notifications_reset_inactivity_timer() {
        let mut state = NodeState::StackReady;
        let status = SharedStatus::new();
        let queue: LocalEventQueue = LocalEventQueue::new();
        let mut platform = CountingPlatform::default();
        let mut telemetry = TelemetryRecorder::new();
        let descriptor = MessageDescriptor::notify(LinkMask::LINK_1).with_id(3);

        let mut adapter =
            StackCallbackAdapter::new(&mut state, &status, &queue, &mut platform, &mut telemetry);
        adapter.on_msg_received(&descriptor, b"hello");
        adapter.on_msg_sent(&descriptor);
        adapter.on_send_error(StackError::Timeout, &descriptor);
        let report = adapter.finish();

        assert_eq!(platform.resets, 3);
        assert_eq!(report, CallbackReport::default());
        assert!(telemetry.contains(NodeEventKind::DownlinkReceived { len: 5 }));
        assert!(telemetry.contains(NodeEventKind::UplinkDelivered(Some(3))));
        assert!(queue.is_empty());
    }

    #[test]
    fn ready_status_releases_owed_uplink() {
        let mut state = NodeState::StackNotReady;
        let status = SharedStatus::new();
        status.request_send_after_connect();
        let queue: LocalEventQueue = LocalEventQueue::new();
        let mut platform = CountingPlatform::default();
        let mut telemetry = TelemetryRecorder::new();

        let mut adapter =
            StackCallbackAdapter::new(&mut state, &status, &queue, &mut platform, &mut telemetry);
        adapter.on_status_changed(&StackStatus::new(
            StackState::Ready,
            RegistrationStatus::Registered,
        ));
        let _ = adapter.finish();

        assert_eq!(state, NodeState::StackReady);
        assert_eq!(status.state(), NodeState::StackReady);
        assert_eq!(queue.try_pop(), Some(Event::Registered));
        assert_eq!(queue.try_pop(), Some(Event::SendCounterUpdate));
        assert!(!status.send_after_connect_pending());
    }

    #[test]
    fn registration_follow_up_is_queued_once() {
        let mut state = NodeState::StackNotReady;
        let status = SharedStatus::new();
        let queue: LocalEventQueue = LocalEventQueue::new();
        let mut platform = CountingPlatform::default();
        let mut telemetry = TelemetryRecorder::new();
        let registered = StackStatus::new(StackState::NotReady, RegistrationStatus::Registered);

        let mut adapter =
            StackCallbackAdapter::new(&mut state, &status, &queue, &mut platform, &mut telemetry);
        adapter.on_status_changed(&registered);
        adapter.on_status_changed(&registered);
        let _ = adapter.finish();

        assert_eq!(queue.try_pop(), Some(Event::Registered));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn error_status_keeps_state_and_flags_query() {
        let mut state = NodeState::StackReady;
        let status = SharedStatus::new();
        let queue: LocalEventQueue = LocalEventQueue::new();
        let mut platform = CountingPlatform::default();
        let mut telemetry = TelemetryRecorder::new();

        let mut adapter =
            StackCallbackAdapter::new(&mut state, &status, &queue, &mut platform, &mut telemetry);
        adapter.on_status_changed(&StackStatus::new(
            StackState::Error,
            RegistrationStatus::Unregistered,
        ));
        let report = adapter.finish();

        assert!(report.status_error);
        assert_eq!(state, NodeState::StackReady);
        assert!(queue.is_empty());
    }

    #[test]
    fn factory_reset_notification_restarts_device() {
        let mut state = NodeState::StackReady;
        let status = SharedStatus::new();
        let queue: LocalEventQueue = LocalEventQueue::new();
        let mut platform = CountingPlatform::default();
        let mut telemetry = TelemetryRecorder::new();

        let mut adapter =
            StackCallbackAdapter::new(&mut state, &status, &queue, &mut platform, &mut telemetry);
        adapter.on_factory_reset();
        let report = adapter.finish();

        assert_eq!(report.restart, Some(RestartReason::FactoryResetComplete));
        assert_eq!(platform.restarts, 1);
    }
}
