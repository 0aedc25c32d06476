#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use core::time::Duration;

use node_core::config::WakeSources;
use node_core::links::LinkMask;
use node_core::platform::{LowPowerPlatform, RestartReason};
use node_core::stack::{
    LinkConfig, MessageDescriptor, MessageId, StackCallbacks, StackError, StackOption,
    StackStatus, Timestamp, WirelessStack,
};

/// Every call the node makes into the stack or the platform, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Init(LinkMask),
    Deinit(u32),
    Start(u32, LinkMask),
    Stop(u32, LinkMask),
    SetOption(StackOption),
    Submit(Vec<u8>),
    QueryTime,
    QueryMtu(LinkMask),
    FactoryReset,
    LastError,
    Connect(bool),
    Process,
    ArmTimer(Duration),
    ResetTimer,
    RadioSleep(Duration),
    DeepSleep(WakeSources),
    SystemReset(RestartReason),
}

pub type Trace = Rc<RefCell<Vec<Call>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

/// Calls recorded so far, leaving the trace intact.
pub fn calls(trace: &Trace) -> Vec<Call> {
    trace.borrow().clone()
}

/// Drains the trace.
pub fn take_calls(trace: &Trace) -> Vec<Call> {
    trace.borrow_mut().drain(..).collect()
}

#[derive(Clone, Copy, Debug)]
pub enum Scripted {
    Status(StackStatus),
    Sent(MessageDescriptor),
    FactoryResetDone,
}

#[derive(Default)]
pub struct StackFaults {
    pub init: Option<StackError>,
    pub deinit: Option<StackError>,
    pub start: Option<StackError>,
    pub stop: Option<StackError>,
    pub set_option: Option<StackError>,
    pub submit: Option<StackError>,
    pub factory_reset: Option<StackError>,
    pub connect: Option<StackError>,
}

/// Stack that records calls and replays scripted notifications on `process`.
pub struct RecordingStack {
    pub trace: Trace,
    pub faults: StackFaults,
    pub script: Vec<Scripted>,
    pub last_error: StackError,
    next_handle: u32,
    next_message: MessageId,
}

impl RecordingStack {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
            faults: StackFaults::default(),
            script: Vec::new(),
            last_error: StackError::Other(-1),
            next_handle: 1,
            next_message: 100,
        }
    }

    pub fn notify(&mut self, notification: Scripted) {
        self.script.push(notification);
    }

    fn log(&self, call: Call) {
        self.trace.borrow_mut().push(call);
    }
}

fn check(fault: Option<StackError>) -> Result<(), StackError> {
    match fault {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

impl WirelessStack for RecordingStack {
    type Handle = u32;

    fn init(&mut self, config: &LinkConfig) -> Result<u32, StackError> {
        self.log(Call::Init(config.link_mask));
        check(self.faults.init)?;
        let handle = self.next_handle;
        self.next_handle += 1;
        Ok(handle)
    }

    fn deinit(&mut self, handle: u32) -> Result<(), StackError> {
        self.log(Call::Deinit(handle));
        check(self.faults.deinit)
    }

    fn start(&mut self, handle: &mut u32, links: LinkMask) -> Result<(), StackError> {
        self.log(Call::Start(*handle, links));
        check(self.faults.start)
    }

    fn stop(&mut self, handle: &mut u32, links: LinkMask) -> Result<(), StackError> {
        self.log(Call::Stop(*handle, links));
        check(self.faults.stop)
    }

    fn set_option(&mut self, _: &mut u32, option: StackOption) -> Result<(), StackError> {
        self.log(Call::SetOption(option));
        check(self.faults.set_option)
    }

    fn submit_message(
        &mut self,
        _: &mut u32,
        payload: &[u8],
        _: &MessageDescriptor,
    ) -> Result<MessageId, StackError> {
        self.log(Call::Submit(payload.to_vec()));
        check(self.faults.submit)?;
        let id = self.next_message;
        self.next_message += 1;
        Ok(id)
    }

    fn query_time(&mut self, _: &mut u32) -> Result<Timestamp, StackError> {
        self.log(Call::QueryTime);
        Ok(Timestamp {
            seconds: 1_000,
            nanos: 5,
        })
    }

    fn query_mtu(&mut self, _: &mut u32, links: LinkMask) -> Result<usize, StackError> {
        self.log(Call::QueryMtu(links));
        Ok(255)
    }

    fn request_factory_reset(&mut self, _: &mut u32) -> Result<(), StackError> {
        self.log(Call::FactoryReset);
        check(self.faults.factory_reset)
    }

    fn last_error(&mut self, _: &mut u32) -> StackError {
        self.log(Call::LastError);
        self.last_error
    }

    fn request_connection(&mut self, _: &mut u32, connect: bool) -> Result<(), StackError> {
        self.log(Call::Connect(connect));
        check(self.faults.connect)
    }

    fn process(
        &mut self,
        _: &mut u32,
        callbacks: &mut dyn StackCallbacks,
    ) -> Result<(), StackError> {
        self.log(Call::Process);
        for notification in std::mem::take(&mut self.script) {
            match notification {
                Scripted::Status(status) => callbacks.on_status_changed(&status),
                Scripted::Sent(descriptor) => callbacks.on_msg_sent(&descriptor),
                Scripted::FactoryResetDone => callbacks.on_factory_reset(),
            }
        }
        Ok(())
    }
}

/// Platform that records calls into the same trace as the stack.
pub struct RecordingPlatform {
    pub trace: Trace,
    pub radio_fault: Option<StackError>,
}

impl RecordingPlatform {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: Rc::clone(trace),
            radio_fault: None,
        }
    }

    fn log(&self, call: Call) {
        self.trace.borrow_mut().push(call);
    }
}

impl LowPowerPlatform for RecordingPlatform {
    fn arm_inactivity_timer(&mut self, timeout: Duration) {
        self.log(Call::ArmTimer(timeout));
    }

    fn reset_inactivity_timer(&mut self) {
        self.log(Call::ResetTimer);
    }

    fn put_external_radio_to_sleep(&mut self, duration: Duration) -> Result<(), StackError> {
        self.log(Call::RadioSleep(duration));
        check(self.radio_fault)
    }

    fn enter_deep_sleep(&mut self, wake: WakeSources) {
        self.log(Call::DeepSleep(wake));
    }

    fn system_reset(&mut self, reason: RestartReason) {
        self.log(Call::SystemReset(reason));
    }
}

/// Calls that reached the stack, without platform bookkeeping.
pub fn stack_calls(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|call| {
            !matches!(
                call,
                Call::ArmTimer(_)
                    | Call::ResetTimer
                    | Call::RadioSleep(_)
                    | Call::DeepSleep(_)
                    | Call::SystemReset(_)
            )
        })
        .cloned()
        .collect()
}
