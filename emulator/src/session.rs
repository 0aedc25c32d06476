use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use node_core::config::{NodeConfig, WakeSources};
use node_core::console::{COMMANDS, ConsoleCommand, Submitted};
use node_core::countdown::{InactivityCountdown, TimerCommand};
use node_core::dispatcher::{EventDispatcher, LoopExit};
use node_core::events::{Event, EventProducer, LocalEventQueue};
use node_core::links::{LinkSet, LinkType};
use node_core::loopback::{LoopbackFaults, LoopbackStack};
use node_core::platform::{LowPowerPlatform, RestartReason};
use node_core::stack::StackError;
use node_core::status::SharedStatus;
use node_core::telemetry::EventId;
use node_core::triggers::{ConnectAndSend, Triggers};

/// Commands the emulator understands on top of the node console.
pub const EMULATOR_TOPICS: &[(&str, &str)] = &[
    (
        "fault",
        "fault <op> <error> | fault clear  - make a loopback stack call fail",
    ),
    (
        "downlink",
        "downlink <text>                  - deliver a downlink on the current link",
    ),
    (
        "stack-error",
        "stack-error <error>              - report an error status from the stack",
    ),
    (
        "idle",
        "idle                             - let the inactivity timer expire now",
    ),
    (
        "wake",
        "wake                             - reboot after deep sleep or a reset",
    ),
];

const FAULT_OPS: &str = "init, deinit, start, stop, option, submit, query, reset, connect";

/// Board variants the emulator can impersonate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    /// Every link fitted, registration and traffic over BLE.
    Reference,
    /// BLE for registration, FSK afterwards, external radio fitted.
    SubGhz,
    /// FSK only.
    FskOnly,
}

impl TranscriptProfile {
    pub const ALL: [TranscriptProfile; 3] = [
        TranscriptProfile::Reference,
        TranscriptProfile::SubGhz,
        TranscriptProfile::FskOnly,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            TranscriptProfile::Reference => "reference",
            TranscriptProfile::SubGhz => "sub-ghz",
            TranscriptProfile::FskOnly => "fsk-only",
        }
    }

    pub fn log_path(self) -> String {
        format!("transcripts/emulator-{}.log", self.tag())
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Reference => "Node emulator transcript (all links, BLE default)",
            TranscriptProfile::SubGhz => "Node emulator transcript (BLE registration, FSK default)",
            TranscriptProfile::FskOnly => "Node emulator transcript (FSK only)",
        }
    }

    pub fn config(self) -> NodeConfig {
        match self {
            TranscriptProfile::Reference => NodeConfig::default(),
            TranscriptProfile::SubGhz => NodeConfig::new()
                .with_default_link(LinkType::Fsk)
                .with_external_radio(true),
            TranscriptProfile::FskOnly => NodeConfig::new()
                .with_links(LinkSet::only(LinkType::Fsk))
                .with_registration_link(LinkType::Fsk)
                .with_default_link(LinkType::Fsk)
                .with_external_radio(true),
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| format!("Unknown profile `{tag}`"))
    }
}

/// Host stand-in for the MCU low-power controller.
pub struct SimulatedPlatform {
    countdown: InactivityCountdown<HostInstant>,
    radio_fault: Option<StackError>,
    radio_sleeps: u32,
    asleep: Option<WakeSources>,
    restart: Option<RestartReason>,
}

impl SimulatedPlatform {
    fn new(timeout: Duration) -> Self {
        Self {
            countdown: InactivityCountdown::new(timeout),
            radio_fault: None,
            radio_sleeps: 0,
            asleep: None,
            restart: None,
        }
    }

    fn expire_now(&mut self) -> bool {
        if self.countdown.deadline().is_none() {
            return false;
        }
        self.countdown.disarm();
        true
    }

    fn poll_expired(&mut self) -> bool {
        self.countdown.poll_expired(HostInstant::now())
    }
}

impl LowPowerPlatform for SimulatedPlatform {
    fn arm_inactivity_timer(&mut self, timeout: Duration) {
        self.countdown
            .apply(TimerCommand::Arm(timeout), HostInstant::now());
    }

    fn reset_inactivity_timer(&mut self) {
        self.countdown.apply(TimerCommand::Reset, HostInstant::now());
    }

    fn put_external_radio_to_sleep(&mut self, _: Duration) -> Result<(), StackError> {
        if let Some(error) = self.radio_fault {
            return Err(error);
        }
        self.radio_sleeps += 1;
        Ok(())
    }

    fn enter_deep_sleep(&mut self, wake: WakeSources) {
        self.countdown.disarm();
        self.asleep = Some(wake);
    }

    fn system_reset(&mut self, reason: RestartReason) {
        self.countdown.disarm();
        self.restart = Some(reason);
    }
}

type Queue = &'static LocalEventQueue;
type Node = EventDispatcher<'static, LoopbackStack<Queue>, SimulatedPlatform, Queue>;

pub struct Session {
    profile: TranscriptProfile,
    node: Node,
    queue: Queue,
    status: &'static SharedStatus,
    transcript: TranscriptLogger,
    started_at: HostInstant,
    mark: EventId,
    boots: u32,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let queue: Queue = Box::leak(Box::new(LocalEventQueue::new()));
        let status: &'static SharedStatus = Box::leak(Box::new(SharedStatus::new()));

        Ok(Self {
            profile,
            node: build_node(profile, queue, status, false),
            queue,
            status,
            transcript,
            started_at: HostInstant::now(),
            mark: 0,
            boots: 0,
        })
    }

    /// Brings the node up and narrates the boot.
    pub fn boot(&mut self) -> io::Result<Vec<String>> {
        self.boots += 1;
        let elapsed = self.started_at.elapsed();
        let mut lines = vec![format!(
            "boot #{} profile={} registration={} default={} links={}",
            self.boots,
            self.profile.tag(),
            self.node.config().registration_link,
            self.node.config().default_link,
            self.node.config().available.mask(),
        )];

        if let Err(error) = self.node.start() {
            lines.push(format!("ERR startup {error}"));
        }
        self.run_pending(&mut lines);
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = Vec::new();
        if self.node.platform_mut().poll_expired() {
            lines.push("inactivity timer expired".to_string());
            self.push(Event::IdleTimeout, &mut lines);
        }

        let mut words = trimmed.split_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();
        match keyword.as_str() {
            "fault" => self.handle_fault(&rest, &mut lines),
            "downlink" => self.handle_downlink(&rest, &mut lines),
            "stack-error" => self.handle_stack_error(&rest, &mut lines),
            "idle" => self.handle_idle(&mut lines),
            "wake" => return self.handle_wake(elapsed, lines),
            _ => self.handle_console(trimmed, &mut lines),
        }

        self.run_pending(&mut lines);
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn handle_console(&mut self, line: &str, lines: &mut Vec<String>) {
        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(error) => {
                lines.push(format!("ERR {error}"));
                return;
            }
        };

        match command {
            ConsoleCommand::Help(topic) => {
                self.handle_help(topic.map(|tag| tag.spec().name), lines);
                return;
            }
            ConsoleCommand::Status => {
                self.describe_status(lines);
                return;
            }
            _ => {}
        }

        if let Some(exit) = self.node.exit() {
            lines.push(format!("ERR node stopped ({exit}), type `wake`"));
            return;
        }

        let triggers = Triggers::new(self.queue, self.status);
        match command.submit(&triggers) {
            Ok(Submitted::ConnectAndSend(ConnectAndSend::SendQueued)) => {
                lines.push("OK send queued".to_string());
            }
            Ok(Submitted::ConnectAndSend(ConnectAndSend::ConnectionRequested)) => {
                lines.push("OK connecting, send follows once ready".to_string());
            }
            Ok(Submitted::ConnectAndSend(ConnectAndSend::AlreadyPending)) => {
                lines.push("WARN connection already pending".to_string());
            }
            Ok(Submitted::Queued) => lines.push(format!("OK {}", line.trim())),
            Ok(Submitted::Local) => {}
            Err(error) => lines.push(format!("ERR {error}")),
        }
    }

    fn handle_help(&self, topic: Option<&str>, lines: &mut Vec<String>) {
        match topic {
            Some(name) => {
                if let Some(spec) = COMMANDS.iter().find(|spec| spec.name == name) {
                    lines.push(format!("{:<14} {}", spec.name, spec.summary));
                }
            }
            None => {
                lines.push("Node commands:".to_string());
                for spec in &COMMANDS {
                    lines.push(format!("  {:<14} {}", spec.name, spec.summary));
                }
                lines.push("Emulator commands:".to_string());
                for (_, detail) in EMULATOR_TOPICS {
                    lines.push(format!("  {detail}"));
                }
            }
        }
    }

    fn describe_status(&self, lines: &mut Vec<String>) {
        let context = self.node.context();
        let stack = self.node.stack();
        lines.push(format!(
            "state={} link={} counter={} handle={} registered={} pending-send={}",
            context.state(),
            context.links().current_link(),
            context.counter(),
            if context.links().has_handle() {
                "yes"
            } else {
                "no"
            },
            stack.is_registered(),
            self.status.send_after_connect_pending(),
        ));
        if let Some(exit) = self.node.exit() {
            lines.push(format!("stopped: {exit}"));
        }
    }

    fn handle_fault(&mut self, args: &[&str], lines: &mut Vec<String>) {
        match args {
            ["clear"] => {
                self.node.stack_mut().clear_faults();
                self.node.platform_mut().radio_fault = None;
                lines.push("OK faults cleared".to_string());
            }
            [op, error] => {
                let Some(error) = parse_stack_error(error) else {
                    lines.push(format!("ERR unknown error `{error}`"));
                    return;
                };
                if op.eq_ignore_ascii_case("radio") {
                    self.node.platform_mut().radio_fault = Some(error);
                } else if let Some(slot) = fault_slot(self.node.stack_mut().faults_mut(), op) {
                    *slot = Some(error);
                } else {
                    lines.push(format!("ERR unknown operation `{op}` ({FAULT_OPS}, radio)"));
                    return;
                }
                lines.push(format!("OK {op} fails with {error}"));
            }
            _ => lines.push("ERR usage: fault <op> <error> | fault clear".to_string()),
        }
    }

    fn handle_downlink(&mut self, args: &[&str], lines: &mut Vec<String>) {
        let payload = args.join(" ");
        let link = self.node.context().links().link_mask();
        self.node
            .stack_mut()
            .inject_downlink(link, payload.as_bytes());
        lines.push(format!("OK downlink {} bytes", payload.len()));
    }

    fn handle_stack_error(&mut self, args: &[&str], lines: &mut Vec<String>) {
        match args.first().and_then(|arg| parse_stack_error(arg)) {
            Some(error) => {
                self.node.stack_mut().inject_status_error(error);
                lines.push(format!("OK error status {error}"));
            }
            None => lines.push("ERR usage: stack-error <error>".to_string()),
        }
    }

    fn handle_idle(&mut self, lines: &mut Vec<String>) {
        if self.node.platform_mut().expire_now() {
            lines.push("inactivity timer expired".to_string());
            self.push(Event::IdleTimeout, lines);
        } else {
            lines.push("inactivity timer not armed".to_string());
        }
    }

    fn handle_wake(&mut self, elapsed: Duration, mut lines: Vec<String>) -> io::Result<Vec<String>> {
        let Some(exit) = self.node.exit() else {
            lines.push("ERR node is running".to_string());
            self.record_output(elapsed, &lines)?;
            return Ok(lines);
        };

        // Deep sleep and a rejected reset keep the stored registration.
        let registered = match exit {
            LoopExit::Restart(RestartReason::FactoryResetComplete) => false,
            _ => self.node.stack().is_registered(),
        };
        self.record_output(elapsed, &lines)?;

        self.queue.clear();
        self.status = Box::leak(Box::new(SharedStatus::new()));
        self.node = build_node(self.profile, self.queue, self.status, registered);
        self.mark = 0;

        let mut boot = self.boot()?;
        lines.append(&mut boot);
        Ok(lines)
    }

    fn push(&mut self, event: Event, lines: &mut Vec<String>) {
        if let Err(error) = self.queue.try_push(event) {
            lines.push(format!("ERR {error}"));
        }
    }

    fn run_pending(&mut self, lines: &mut Vec<String>) {
        let was_running = self.node.exit().is_none();
        let mut source = self.queue;
        let exit = self.node.drain(&mut source);

        for record in self.node.telemetry().since(self.mark) {
            lines.push(format!("  #{:<3} {}", record.id, record.event));
        }
        self.mark = self.node.telemetry().next_id();

        if was_running && let Some(exit) = exit {
            lines.push(format!("node stopped: {exit}"));
            match exit {
                LoopExit::DeepSleep => {
                    let wake = self.node.platform().asleep;
                    let radio = self.node.platform().radio_sleeps;
                    lines.push(format!(
                        "deep sleep wake={} radio-sleeps={radio}, type `wake`",
                        describe_wake(wake)
                    ));
                }
                LoopExit::Restart(reason) => {
                    lines.push(format!("system reset ({reason}), type `wake`"));
                }
                LoopExit::Fatal(_) => {}
            }
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn build_node(
    profile: TranscriptProfile,
    queue: Queue,
    status: &'static SharedStatus,
    registered: bool,
) -> Node {
    let config = profile.config();
    let stack = if registered {
        LoopbackStack::new(queue).registered()
    } else {
        LoopbackStack::new(queue)
    };
    EventDispatcher::new(
        config,
        stack,
        SimulatedPlatform::new(config.inactivity_timeout),
        queue,
        status,
    )
}

fn describe_wake(wake: Option<WakeSources>) -> String {
    match wake {
        Some(WakeSources {
            timer: Some(interval),
            button,
        }) => format!("timer:{}ms button:{button}", interval.as_millis()),
        Some(WakeSources {
            timer: None,
            button,
        }) => format!("button:{button}"),
        None => "none".to_string(),
    }
}

fn fault_slot<'a>(faults: &'a mut LoopbackFaults, op: &str) -> Option<&'a mut Option<StackError>> {
    let slot = match op.to_ascii_lowercase().as_str() {
        "init" => &mut faults.init,
        "deinit" => &mut faults.deinit,
        "start" => &mut faults.start,
        "stop" => &mut faults.stop,
        "option" => &mut faults.set_option,
        "submit" => &mut faults.submit,
        "query" => &mut faults.query,
        "reset" => &mut faults.factory_reset,
        "connect" => &mut faults.connection,
        _ => return None,
    };
    Some(slot)
}

fn parse_stack_error(label: &str) -> Option<StackError> {
    let error = match label.to_ascii_lowercase().as_str() {
        "not-ready" => StackError::NotReady,
        "invalid-args" => StackError::InvalidArgs,
        "no-support" => StackError::NoSupport,
        "busy" => StackError::Busy,
        "timeout" => StackError::Timeout,
        "radio" => StackError::Radio,
        "out-of-memory" => StackError::OutOfMemory,
        other => StackError::Other(other.parse().ok()?),
    };
    Some(error)
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let log_path = profile.log_path();
        let path = Path::new(&log_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_errors_parse_from_their_labels() {
        assert_eq!(parse_stack_error("busy"), Some(StackError::Busy));
        assert_eq!(parse_stack_error("NO-SUPPORT"), Some(StackError::NoSupport));
        assert_eq!(parse_stack_error("-7"), Some(StackError::Other(-7)));
        assert_eq!(parse_stack_error("bogus"), None);
    }

    #[test]
    fn profiles_round_trip_through_tags() {
        for profile in TranscriptProfile::ALL {
            assert_eq!(TranscriptProfile::from_tag(profile.tag()), Ok(profile));
        }
        assert!(TranscriptProfile::from_tag("lora").is_err());
    }

    #[test]
    fn fsk_only_profile_has_a_single_link() {
        let config = TranscriptProfile::FskOnly.config();
        assert_eq!(config.available.len(), 1);
        assert_eq!(config.registration_link, LinkType::Fsk);
    }

    #[test]
    fn fault_slots_cover_every_stack_operation() {
        let mut faults = LoopbackFaults::default();
        for op in FAULT_OPS.split(", ") {
            let slot = fault_slot(&mut faults, op).expect("known op");
            *slot = Some(StackError::Busy);
        }
        assert_eq!(faults.factory_reset, Some(StackError::Busy));
        assert_eq!(faults.connection, Some(StackError::Busy));
        assert!(fault_slot(&mut faults, "radio").is_none());
    }
}
