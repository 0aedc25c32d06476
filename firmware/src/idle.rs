//! Inactivity timer backed by embassy-time.
//!
//! The platform layer sends [`TimerCommand`]s through [`TimerSignal`]; the
//! timer task owns the [`InactivityCountdown`] and raises `IdleTimeout` when
//! the deadline passes with no traffic.

use core::ops::Add;

use embassy_futures::select::{Either, select};
use embassy_sync::signal::Signal;
use embassy_time::{Duration as EmbassyDuration, Instant, Timer};
use node_core::config::DEFAULT_INACTIVITY_TIMEOUT;
use node_core::countdown::{InactivityCountdown, TimerCommand};
use node_core::events::{Event, EventProducer};

use crate::events::EventMutex;

/// Latest-wins mailbox for timer commands.
pub type TimerSignal = Signal<EventMutex, TimerCommand>;

/// Embassy instant that accepts `core::time::Duration` offsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = FirmwareInstant;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        let offset = EmbassyDuration::from_micros(micros);
        FirmwareInstant(self.0.checked_add(offset).unwrap_or(Instant::MAX))
    }
}

/// Countdown type driven by the timer task.
pub type IdleCountdown = InactivityCountdown<FirmwareInstant>;

/// Creates the countdown with the default timeout; `Arm` replaces it.
pub const fn idle_countdown() -> IdleCountdown {
    InactivityCountdown::new(DEFAULT_INACTIVITY_TIMEOUT)
}

/// Runs the countdown forever, pushing `IdleTimeout` on expiry.
pub async fn run_countdown<P: EventProducer>(
    signal: &TimerSignal,
    events: &P,
    mut countdown: IdleCountdown,
) -> ! {
    loop {
        let Some(deadline) = countdown.deadline() else {
            let command = signal.wait().await;
            countdown.apply(command, FirmwareInstant::now());
            continue;
        };

        match select(signal.wait(), Timer::at(deadline.into_embassy())).await {
            Either::First(command) => countdown.apply(command, FirmwareInstant::now()),
            Either::Second(()) => {
                if countdown.poll_expired(FirmwareInstant::now())
                    && let Err(error) = events.try_push(Event::IdleTimeout)
                {
                    log_dropped_timeout(error.0);
                }
            }
        }
    }
}

#[cfg(target_os = "none")]
fn log_dropped_timeout(event: Event) {
    defmt::warn!("idle timeout dropped, queue full ({})", event);
}

#[cfg(not(target_os = "none"))]
fn log_dropped_timeout(_: Event) {}

#[cfg(test)]
mod tests {
    use super::*;

    use core::time::Duration;

    #[test]
    fn firmware_instant_adds_core_durations() {
        let start = FirmwareInstant::from(Instant::from_millis(1_000));
        let later = start + Duration::from_millis(250);

        assert_eq!(later.into_embassy(), Instant::from_millis(1_250));
        assert!(later > start);
    }

    #[test]
    fn countdown_expires_on_firmware_clock() {
        let mut countdown = idle_countdown();
        let start = FirmwareInstant::from(Instant::from_secs(10));
        countdown.apply(TimerCommand::Arm(Duration::from_secs(5)), start);

        assert!(!countdown.poll_expired(FirmwareInstant::from(Instant::from_secs(14))));
        assert!(countdown.poll_expired(FirmwareInstant::from(Instant::from_secs(15))));
    }

    #[test]
    fn huge_offsets_saturate() {
        let start = FirmwareInstant::from(Instant::from_secs(1));
        let end = start + Duration::MAX;
        assert_eq!(end.into_embassy(), Instant::MAX);
    }
}
