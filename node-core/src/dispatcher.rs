//! The control loop: one event at a time, run to completion.
//!
//! [`EventDispatcher`] owns the application context, the stack, and the
//! low-power platform. Producers reach it only through the event queue; the
//! stack reaches it only through [`StackCallbackAdapter`] while `process`
//! runs on the dispatcher's own call stack.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::callbacks::StackCallbackAdapter;
use crate::config::NodeConfig;
use crate::events::{Event, EventProducer, EventSource};
use crate::lifecycle::{LinkError, LinkLifecycle, LinkTransition, SwitchOutcome};
use crate::links::{LinkMask, LinkType};
use crate::log;
use crate::platform::{LowPowerPlatform, RestartReason};
use crate::sleep::SleepCoordinator;
use crate::stack::{MessageDescriptor, WirelessStack};
use crate::status::{NodeState, SharedStatus};
use crate::telemetry::{NodeEventKind, TelemetryRecorder};

/// Size of the counter uplink: the decimal counter, zero padded.
pub const COUNTER_FRAME_LEN: usize = 10;

/// Why the dispatcher loop stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopExit {
    /// A link transition failed; the stack was torn down.
    Fatal(LinkError),
    /// The device was asked to restart.
    Restart(RestartReason),
    /// The node handed off to deep sleep.
    DeepSleep,
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::Fatal(error) => write!(f, "fatal: {error}"),
            LoopExit::Restart(reason) => write!(f, "restart: {reason}"),
            LoopExit::DeepSleep => f.write_str("deep sleep"),
        }
    }
}

/// Whether the loop keeps going after an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flow {
    Continue,
    Exit(LoopExit),
}

/// State touched only by the dispatcher.
pub struct ApplicationContext<H> {
    state: NodeState,
    links: LinkLifecycle<H>,
    counter: u32,
}

impl<H> ApplicationContext<H> {
    #[must_use]
    pub const fn new(registration_link: LinkType) -> Self {
        Self {
            state: NodeState::Init,
            links: LinkLifecycle::new(registration_link),
            counter: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> NodeState {
        self.state
    }

    /// Next counter value to be sent.
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    #[must_use]
    pub const fn links(&self) -> &LinkLifecycle<H> {
        &self.links
    }
}

/// Single-consumer event loop.
pub struct EventDispatcher<'a, S, P, Q>
where
    S: WirelessStack,
{
    config: NodeConfig,
    stack: S,
    platform: P,
    queue: Q,
    status: &'a SharedStatus,
    context: ApplicationContext<S::Handle>,
    telemetry: TelemetryRecorder,
    exit: Option<LoopExit>,
}

impl<'a, S, P, Q> EventDispatcher<'a, S, P, Q>
where
    S: WirelessStack,
    P: LowPowerPlatform,
    Q: EventProducer,
{
    /// Creates a dispatcher in the `Init` state. Nothing touches the stack
    /// until [`EventDispatcher::start`].
    pub fn new(
        config: NodeConfig,
        stack: S,
        platform: P,
        queue: Q,
        status: &'a SharedStatus,
    ) -> Self {
        status.publish_state(NodeState::Init);
        status.publish_link(config.registration_link);
        Self {
            context: ApplicationContext::new(config.registration_link),
            config,
            stack,
            platform,
            queue,
            status,
            telemetry: TelemetryRecorder::new(),
            exit: None,
        }
    }

    /// Brings the registration link up and arms the inactivity timer.
    ///
    /// A failure is fatal: the dispatcher ends in `Error` and
    /// [`EventDispatcher::exit`] reports the cause.
    pub fn start(&mut self) -> Result<(), LinkError> {
        self.set_state(NodeState::StackNotReady);

        let link = self.config.registration_link;
        match self
            .context
            .links
            .init_and_start(&mut self.stack, &self.config, link)
        {
            Ok(transition) => self.settle_link(link, transition),
            Err(error) => {
                self.fatal(error);
                return Err(error);
            }
        }

        log::main_task_started(link);
        self.platform
            .arm_inactivity_timer(self.config.inactivity_timeout);
        Ok(())
    }

    /// Starts the node and processes events until the loop exits.
    ///
    /// The future only completes on an exit. Single-threaded host callers
    /// must queue an exiting event up front or use [`EventDispatcher::drain`].
    pub async fn run<E: EventSource>(&mut self, events: &mut E) -> LoopExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        if self.context.state == NodeState::Init
            && let Err(error) = self.start()
        {
            return LoopExit::Fatal(error);
        }

        loop {
            let event = events.next_event().await;
            if let Flow::Exit(exit) = self.dispatch(event) {
                return exit;
            }
        }
    }

    /// Dispatches every event already queued. Returns the exit reason if the
    /// loop stopped.
    pub fn drain<E: EventSource>(&mut self, events: &mut E) -> Option<LoopExit> {
        if let Some(exit) = self.exit {
            return Some(exit);
        }
        while let Some(event) = events.try_next_event() {
            if let Flow::Exit(exit) = self.dispatch(event) {
                return Some(exit);
            }
        }
        None
    }

    /// Processes a single event to completion.
    ///
    /// Once the loop has exited every further event is refused.
    pub fn dispatch(&mut self, event: Event) -> Flow {
        if let Some(exit) = self.exit {
            return Flow::Exit(exit);
        }

        log::event_received(event);
        match event {
            Event::StackProcess => self.process_stack(),
            Event::SendCounterUpdate => self.send_counter_update(),
            Event::GetTime => self.get_time(),
            Event::GetMtu => self.get_mtu(),
            Event::FactoryReset => self.factory_reset(),
            Event::LinkSwitch => self.link_switch(),
            Event::IdleTimeout => self.idle_sleep(),
            Event::Registered => self.switch_to_default_link(),
            Event::ConnectionRequest => self.connection_request(),
            Event::Invalid => {
                log::invalid_event();
                Flow::Continue
            }
        }
    }

    fn process_stack(&mut self) -> Flow {
        let Some(handle) = self.context.links.handle_mut() else {
            return self.ignore(Event::StackProcess);
        };

        let mut adapter = StackCallbackAdapter::new(
            &mut self.context.state,
            self.status,
            &self.queue,
            &mut self.platform,
            &mut self.telemetry,
        );
        let result = self.stack.process(handle, &mut adapter);
        let report = adapter.finish();

        if let Err(error) = result {
            log::process_failed(error);
        }

        if report.status_error
            && let Some(handle) = self.context.links.handle_mut()
        {
            let error = self.stack.last_error(handle);
            log::stack_status_error(error);
            self.telemetry.record(NodeEventKind::StackFault(error));
        }

        match report.restart {
            Some(reason) => self.exit_with(LoopExit::Restart(reason)),
            None => Flow::Continue,
        }
    }

    fn send_counter_update(&mut self) -> Flow {
        let state = self.context.state;
        if !state.accepts_uplinks() {
            log::stack_not_ready(state);
            self.telemetry.record(NodeEventKind::UplinkSkipped(state));
            return Flow::Continue;
        }

        let Some(handle) = self.context.links.handle_mut() else {
            return self.ignore(Event::SendCounterUpdate);
        };

        let counter = self.context.counter;
        let frame = counter_frame(counter);
        let descriptor = MessageDescriptor::notify(LinkMask::ANY);
        match self.stack.submit_message(handle, &frame, &descriptor) {
            Ok(id) => {
                log::uplink_queued(counter, id);
                self.telemetry
                    .record(NodeEventKind::UplinkQueued { counter, id });
            }
            Err(error) => {
                log::uplink_rejected(counter, error);
                self.telemetry
                    .record(NodeEventKind::UplinkRejected { counter, error });
            }
        }

        self.context.counter = counter.wrapping_add(1);
        Flow::Continue
    }

    fn get_time(&mut self) -> Flow {
        let Some(handle) = self.context.links.handle_mut() else {
            return self.ignore(Event::GetTime);
        };

        match self.stack.query_time(handle) {
            Ok(time) => {
                log::time_reported(time);
                self.telemetry.record(NodeEventKind::TimeReported(time));
            }
            Err(error) => {
                log::query_failed(error);
                self.telemetry.record(NodeEventKind::QueryFailed(error));
            }
        }
        Flow::Continue
    }

    fn get_mtu(&mut self) -> Flow {
        let link = self.context.links.current_link();
        let Some(handle) = self.context.links.handle_mut() else {
            return self.ignore(Event::GetMtu);
        };

        match self.stack.query_mtu(handle, link.mask()) {
            Ok(mtu) => {
                let mtu = u16::try_from(mtu).unwrap_or(u16::MAX);
                log::mtu_reported(link, mtu);
                self.telemetry
                    .record(NodeEventKind::MtuReported { link, mtu });
            }
            Err(error) => {
                log::query_failed(error);
                self.telemetry.record(NodeEventKind::QueryFailed(error));
            }
        }
        Flow::Continue
    }

    fn factory_reset(&mut self) -> Flow {
        let Some(handle) = self.context.links.handle_mut() else {
            return self.ignore(Event::FactoryReset);
        };

        match self.stack.request_factory_reset(handle) {
            Ok(()) => {
                log::factory_reset_requested();
                self.telemetry.record(NodeEventKind::FactoryResetRequested);
                Flow::Continue
            }
            Err(error) => {
                log::factory_reset_rejected(error);
                let reason = RestartReason::FactoryResetRejected;
                self.telemetry.record(NodeEventKind::RestartRequested(reason));
                self.platform.system_reset(reason);
                self.exit_with(LoopExit::Restart(reason))
            }
        }
    }

    fn link_switch(&mut self) -> Flow {
        match self
            .context
            .links
            .link_switch(&mut self.stack, &self.config)
        {
            Ok(SwitchOutcome::Switched(link)) => {
                self.settle_link(link, LinkTransition::Started);
                Flow::Continue
            }
            Ok(SwitchOutcome::SingleLink(link)) => {
                self.telemetry
                    .record(NodeEventKind::LinkSwitchSkipped(link));
                Flow::Continue
            }
            Err(error) => self.fatal(error),
        }
    }

    fn idle_sleep(&mut self) -> Flow {
        let coordinator = SleepCoordinator::new(&self.config);
        match coordinator.run(
            &mut self.context.links,
            &mut self.stack,
            &mut self.platform,
            &mut self.telemetry,
        ) {
            Ok(()) => self.exit_with(LoopExit::DeepSleep),
            Err(_) => {
                if !self.context.links.has_handle() {
                    self.set_state(NodeState::StackNotReady);
                }
                // Expiry disarmed the countdown; try again after the next idle window.
                self.platform
                    .arm_inactivity_timer(self.config.inactivity_timeout);
                Flow::Continue
            }
        }
    }

    fn switch_to_default_link(&mut self) -> Flow {
        self.telemetry.record(NodeEventKind::Registered);
        let link = self.config.default_link;
        if self.context.links.link_mask() == link.mask() {
            log::already_on_default_link(link);
            return Flow::Continue;
        }

        match self
            .context
            .links
            .init_and_start(&mut self.stack, &self.config, link)
        {
            Ok(transition) => {
                self.settle_link(link, transition);
                Flow::Continue
            }
            Err(error) => self.fatal(error),
        }
    }

    fn connection_request(&mut self) -> Flow {
        let link = self.context.links.current_link();
        if !link.is_short_range() {
            log::connection_not_applicable(link);
            return Flow::Continue;
        }

        if self.context.state.accepts_uplinks() {
            log::connection_already_established();
            self.telemetry.record(NodeEventKind::ConnectionAlreadyReady);
            return Flow::Continue;
        }

        let Some(handle) = self.context.links.handle_mut() else {
            self.status.take_send_after_connect();
            return self.ignore(Event::ConnectionRequest);
        };

        match self.stack.request_connection(handle, true) {
            Ok(()) => {
                self.context.links.set_connection_requested(true);
                log::connection_requested();
                self.telemetry.record(NodeEventKind::ConnectionRequested);
            }
            Err(error) => {
                // Let the next button press retry the connection.
                self.status.take_send_after_connect();
                log::connection_request_failed(error);
            }
        }
        Flow::Continue
    }

    fn settle_link(&mut self, link: LinkType, transition: LinkTransition) {
        self.status.publish_link(link);
        self.status.take_send_after_connect();
        if transition == LinkTransition::Started {
            self.telemetry.record(NodeEventKind::LinkStarted(link));
        }
    }

    fn ignore(&mut self, event: Event) -> Flow {
        log::no_handle(event);
        self.telemetry.record(NodeEventKind::EventIgnored(event));
        Flow::Continue
    }

    fn fatal(&mut self, error: LinkError) -> Flow {
        log::fatal(error);
        let mask = self.context.links.link_mask();
        if let Some(mut handle) = self.context.links.take_handle() {
            if let Err(cause) = self.stack.stop(&mut handle, mask) {
                log::teardown_failed(cause);
            }
            if let Err(cause) = self.stack.deinit(handle) {
                log::teardown_failed(cause);
            }
        }
        self.set_state(NodeState::Error);
        self.telemetry.record(NodeEventKind::Fatal(error));
        self.exit_with(LoopExit::Fatal(error))
    }

    fn exit_with(&mut self, exit: LoopExit) -> Flow {
        self.exit = Some(exit);
        Flow::Exit(exit)
    }

    fn set_state(&mut self, state: NodeState) {
        if self.context.state != state {
            self.context.state = state;
            self.status.publish_state(state);
            self.telemetry.record(NodeEventKind::StateChanged(state));
        }
    }

    #[must_use]
    pub const fn context(&self) -> &ApplicationContext<S::Handle> {
        &self.context
    }

    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Reason the loop stopped, once it has.
    #[must_use]
    pub const fn exit(&self) -> Option<LoopExit> {
        self.exit
    }
}

/// Encodes `counter` as the uplink frame: ASCII decimal digits followed by
/// zero bytes up to [`COUNTER_FRAME_LEN`].
#[must_use]
pub fn counter_frame(counter: u32) -> [u8; COUNTER_FRAME_LEN] {
    let mut text: String<COUNTER_FRAME_LEN> = String::new();
    // u32::MAX has ten digits, so the write always fits.
    let _ = write!(text, "{counter}");

    let mut frame = [0u8; COUNTER_FRAME_LEN];
    frame[..text.len()].copy_from_slice(text.as_bytes());
    frame
}
