//! Per-message log hooks.
//!
//! With the `defmt` feature every hook emits a deferred-format record; without
//! it the hooks compile to nothing so host builds stay quiet.

pub(crate) use imp::*;

#[cfg(feature = "defmt")]
mod imp {
    use crate::events::Event;
    use crate::lifecycle::{LifecycleStep, LinkError};
    use crate::links::LinkType;
    use crate::sleep::SleepStep;
    use crate::stack::{MessageDescriptor, MessageId, StackError, StackOption, StackStatus, Timestamp};
    use crate::status::NodeState;

    pub(crate) fn main_task_started(link: LinkType) {
        defmt::info!("main task started on {}", link);
    }

    pub(crate) fn event_received(event: Event) {
        defmt::debug!("event {}", event);
    }

    pub(crate) fn invalid_event() {
        defmt::warn!("invalid event ignored");
    }

    pub(crate) fn no_handle(event: Event) {
        defmt::warn!("{} ignored: no stack handle", event);
    }

    pub(crate) fn queue_full(event: Event) {
        defmt::error!("event queue full, dropped {}", event);
    }

    pub(crate) fn link_started(link: LinkType) {
        defmt::info!("stack started on {}", link);
    }

    pub(crate) fn link_stopped(link: LinkType) {
        defmt::info!("stack stopped on {}", link);
    }

    pub(crate) fn link_deinitialized(link: LinkType) {
        defmt::info!("stack deinitialized ({})", link);
    }

    pub(crate) fn link_step_failed(link: LinkType, step: LifecycleStep, cause: StackError) {
        defmt::error!("link {} {} failed: {}", link, step, cause);
    }

    pub(crate) fn policy_applied(option: StackOption) {
        defmt::info!("policy applied: {}", option);
    }

    pub(crate) fn policy_unsupported(option: StackOption) {
        defmt::warn!("policy not supported on this platform: {}", option);
    }

    pub(crate) fn single_link_available(link: LinkType) {
        defmt::warn!("link switch skipped, only {} available", link);
    }

    pub(crate) fn already_on_default_link(link: LinkType) {
        defmt::debug!("already on default link {}", link);
    }

    pub(crate) fn teardown_failed(cause: StackError) {
        defmt::error!("stack teardown failed: {}", cause);
    }

    pub(crate) fn fatal(error: LinkError) {
        defmt::error!("fatal link error: {}", error);
    }

    pub(crate) fn state_changed(state: NodeState) {
        defmt::info!("stack status {}", state);
    }

    pub(crate) fn status_detail(status: &StackStatus) {
        defmt::info!(
            "registration {} time-sync {} links {}",
            status.registration,
            status.time_synced,
            status.link_status
        );
    }

    pub(crate) fn stack_status_error(error: StackError) {
        defmt::error!("stack status error: {}", error);
    }

    pub(crate) fn process_failed(error: StackError) {
        defmt::error!("stack processing failed: {}", error);
    }

    pub(crate) fn stack_not_ready(state: NodeState) {
        defmt::warn!("counter update skipped, stack {}", state);
    }

    pub(crate) fn uplink_queued(counter: u32, id: MessageId) {
        defmt::info!("counter {} queued as message {}", counter, id);
    }

    pub(crate) fn uplink_rejected(counter: u32, error: StackError) {
        defmt::error!("counter {} rejected: {}", counter, error);
    }

    pub(crate) fn uplink_delivered(descriptor: &MessageDescriptor) {
        defmt::info!("message sent: {}", descriptor);
    }

    pub(crate) fn send_failed(descriptor: &MessageDescriptor, error: StackError) {
        defmt::error!("send failed: {} ({})", error, descriptor);
    }

    pub(crate) fn downlink_received(descriptor: &MessageDescriptor, len: u16) {
        defmt::info!("downlink {} bytes: {}", len, descriptor);
    }

    pub(crate) fn time_reported(time: Timestamp) {
        defmt::info!("network time {}.{}", time.seconds, time.nanos);
    }

    pub(crate) fn mtu_reported(link: LinkType, mtu: u16) {
        defmt::info!("mtu on {}: {}", link, mtu);
    }

    pub(crate) fn query_failed(error: StackError) {
        defmt::error!("stack query failed: {}", error);
    }

    pub(crate) fn factory_reset_requested() {
        defmt::info!("factory reset requested");
    }

    pub(crate) fn factory_reset_rejected(error: StackError) {
        defmt::error!("factory reset rejected ({}), restarting", error);
    }

    pub(crate) fn factory_reset_complete() {
        defmt::info!("factory reset complete, restarting");
    }

    pub(crate) fn connection_requested() {
        defmt::info!("short-range connection requested");
    }

    pub(crate) fn connection_already_pending() {
        defmt::warn!("connection request already in progress");
    }

    pub(crate) fn connection_already_established() {
        defmt::warn!("short-range connection already established");
    }

    pub(crate) fn connection_not_applicable(link: LinkType) {
        defmt::warn!("connection request ignored on {}", link);
    }

    pub(crate) fn connection_request_failed(error: StackError) {
        defmt::error!("connection request failed: {}", error);
    }

    pub(crate) fn sleep_aborted(step: SleepStep, cause: StackError) {
        defmt::error!("deep sleep aborted at {}: {}", step, cause);
    }

    pub(crate) fn entering_deep_sleep() {
        defmt::info!("entering deep sleep");
    }
}

#[cfg(not(feature = "defmt"))]
#[allow(clippy::needless_pass_by_value, clippy::trivially_copy_pass_by_ref)]
mod imp {
    use crate::events::Event;
    use crate::lifecycle::{LifecycleStep, LinkError};
    use crate::links::LinkType;
    use crate::sleep::SleepStep;
    use crate::stack::{MessageDescriptor, MessageId, StackError, StackOption, StackStatus, Timestamp};
    use crate::status::NodeState;

    pub(crate) fn main_task_started(_: LinkType) {}
    pub(crate) fn event_received(_: Event) {}
    pub(crate) fn invalid_event() {}
    pub(crate) fn no_handle(_: Event) {}
    pub(crate) fn queue_full(_: Event) {}
    pub(crate) fn link_started(_: LinkType) {}
    pub(crate) fn link_stopped(_: LinkType) {}
    pub(crate) fn link_deinitialized(_: LinkType) {}
    pub(crate) fn link_step_failed(_: LinkType, _: LifecycleStep, _: StackError) {}
    pub(crate) fn policy_applied(_: StackOption) {}
    pub(crate) fn policy_unsupported(_: StackOption) {}
    pub(crate) fn single_link_available(_: LinkType) {}
    pub(crate) fn already_on_default_link(_: LinkType) {}
    pub(crate) fn teardown_failed(_: StackError) {}
    pub(crate) fn fatal(_: LinkError) {}
    pub(crate) fn state_changed(_: NodeState) {}
    pub(crate) fn status_detail(_: &StackStatus) {}
    pub(crate) fn stack_status_error(_: StackError) {}
    pub(crate) fn process_failed(_: StackError) {}
    pub(crate) fn stack_not_ready(_: NodeState) {}
    pub(crate) fn uplink_queued(_: u32, _: MessageId) {}
    pub(crate) fn uplink_rejected(_: u32, _: StackError) {}
    pub(crate) fn uplink_delivered(_: &MessageDescriptor) {}
    pub(crate) fn send_failed(_: &MessageDescriptor, _: StackError) {}
    pub(crate) fn downlink_received(_: &MessageDescriptor, _: u16) {}
    pub(crate) fn time_reported(_: Timestamp) {}
    pub(crate) fn mtu_reported(_: LinkType, _: u16) {}
    pub(crate) fn query_failed(_: StackError) {}
    pub(crate) fn factory_reset_requested() {}
    pub(crate) fn factory_reset_rejected(_: StackError) {}
    pub(crate) fn factory_reset_complete() {}
    pub(crate) fn connection_requested() {}
    pub(crate) fn connection_already_pending() {}
    pub(crate) fn connection_already_established() {}
    pub(crate) fn connection_not_applicable(_: LinkType) {}
    pub(crate) fn connection_request_failed(_: StackError) {}
    pub(crate) fn sleep_aborted(_: SleepStep, _: StackError) {}
    pub(crate) fn entering_deep_sleep() {}
}
