//! Deadline bookkeeping for the inactivity timer.
//!
//! The firmware timer task owns one [`InactivityCountdown`] and sleeps until
//! its deadline; the dispatcher side only sends [`TimerCommand`]s. Expiry
//! disarms the countdown so a single idle period yields a single
//! `IdleTimeout`.

use core::ops::Add;
use core::time::Duration;

/// Requests delivered to the timer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerCommand {
    /// Start (or restart) the countdown with a new timeout.
    Arm(Duration),
    /// Restart the countdown if it is running.
    Reset,
    /// Stop the countdown.
    Disarm,
}

/// Idle countdown generic over the platform's monotonic instant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InactivityCountdown<I> {
    timeout: Duration,
    deadline: Option<I>,
}

impl<I> InactivityCountdown<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Creates a disarmed countdown.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Arms the countdown from `now` and returns the new deadline.
    pub fn arm(&mut self, now: I) -> I {
        let deadline = now + self.timeout;
        self.deadline = Some(deadline);
        deadline
    }

    /// Restarts a running countdown. A disarmed countdown stays disarmed.
    pub fn reset(&mut self, now: I) -> Option<I> {
        if self.deadline.is_some() {
            Some(self.arm(now))
        } else {
            None
        }
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Applies a command received from the dispatcher side.
    pub fn apply(&mut self, command: TimerCommand, now: I) {
        match command {
            TimerCommand::Arm(timeout) => {
                self.timeout = timeout;
                self.arm(now);
            }
            TimerCommand::Reset => {
                self.reset(now);
            }
            TimerCommand::Disarm => self.disarm(),
        }
    }

    /// Returns `true` exactly once when the deadline has passed, disarming the
    /// countdown.
    pub fn poll_expired(&mut self, now: I) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<I> {
        self.deadline
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}
