//! Ordered shutdown that precedes retention-less deep sleep.
//!
//! Each step must succeed before the next runs. An aborted sequence leaves the
//! node awake; the dispatcher re-arms the inactivity timer so the node tries
//! again after the next idle window.

use core::fmt;

use crate::config::NodeConfig;
use crate::lifecycle::LinkLifecycle;
use crate::log;
use crate::platform::LowPowerPlatform;
use crate::stack::{StackError, WirelessStack};
use crate::telemetry::{NodeEventKind, TelemetryRecorder};

/// Steps of the sleep sequence, in execution order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepStep {
    StopLink,
    RadioSleep,
    Deinit,
    EnterDeepSleep,
}

impl fmt::Display for SleepStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SleepStep::StopLink => "stop-link",
            SleepStep::RadioSleep => "radio-sleep",
            SleepStep::Deinit => "deinit",
            SleepStep::EnterDeepSleep => "enter-deep-sleep",
        };
        f.write_str(label)
    }
}

/// Step that prevented the node from sleeping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepAbort {
    pub step: SleepStep,
    pub cause: StackError,
}

impl fmt::Display for SleepAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sleep aborted at {}: {}", self.step, self.cause)
    }
}

/// Runs the stop → radio sleep → deinit → deep sleep sequence.
pub struct SleepCoordinator<'a> {
    config: &'a NodeConfig,
}

impl<'a> SleepCoordinator<'a> {
    #[must_use]
    pub const fn new(config: &'a NodeConfig) -> Self {
        Self { config }
    }

    /// Shuts the link down and hands off to the platform.
    ///
    /// On success the handle has been released and the platform has been asked
    /// to enter deep sleep. On hardware that call does not return.
    ///
    /// A stop failure keeps the handle. Once the link is stopped any later
    /// failure releases it.
    pub fn run<S, P>(
        &self,
        lifecycle: &mut LinkLifecycle<S::Handle>,
        stack: &mut S,
        platform: &mut P,
        telemetry: &mut TelemetryRecorder,
    ) -> Result<(), SleepAbort>
    where
        S: WirelessStack,
        P: LowPowerPlatform,
    {
        let link = lifecycle.current_link();
        let mask = lifecycle.link_mask();

        telemetry.record(NodeEventKind::SleepStep(SleepStep::StopLink));
        let Some(handle) = lifecycle.handle_mut() else {
            return Err(abort(telemetry, SleepStep::StopLink, StackError::NotReady));
        };
        if let Err(cause) = stack.stop(handle, mask) {
            return Err(abort(telemetry, SleepStep::StopLink, cause));
        }
        log::link_stopped(link);

        if self.config.external_radio && !link.is_short_range() {
            telemetry.record(NodeEventKind::SleepStep(SleepStep::RadioSleep));
            if let Err(cause) = platform.put_external_radio_to_sleep(self.config.radio_sleep) {
                // The link is already stopped; the handle cannot carry traffic.
                if let Some(handle) = lifecycle.take_handle()
                    && let Err(error) = stack.deinit(handle)
                {
                    log::teardown_failed(error);
                }
                return Err(abort(telemetry, SleepStep::RadioSleep, cause));
            }
        }

        telemetry.record(NodeEventKind::SleepStep(SleepStep::Deinit));
        if let Some(handle) = lifecycle.take_handle()
            && let Err(cause) = stack.deinit(handle)
        {
            return Err(abort(telemetry, SleepStep::Deinit, cause));
        }
        log::link_deinitialized(link);

        telemetry.record(NodeEventKind::SleepStep(SleepStep::EnterDeepSleep));
        log::entering_deep_sleep();
        platform.enter_deep_sleep(self.config.wake_sources);
        Ok(())
    }
}

fn abort(telemetry: &mut TelemetryRecorder, step: SleepStep, cause: StackError) -> SleepAbort {
    log::sleep_aborted(step, cause);
    telemetry.record(NodeEventKind::SleepAborted(step, cause));
    SleepAbort { step, cause }
}
