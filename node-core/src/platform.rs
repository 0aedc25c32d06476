//! Low-power peripheral controller seam.

use core::fmt;
use core::time::Duration;

use crate::config::WakeSources;
use crate::stack::StackError;

/// Why the platform is asked to restart the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// The stack confirmed its factory reset.
    FactoryResetComplete,
    /// The stack refused the factory reset request.
    FactoryResetRejected,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::FactoryResetComplete => f.write_str("factory-reset-complete"),
            RestartReason::FactoryResetRejected => f.write_str("factory-reset-rejected"),
        }
    }
}

/// Timer, radio, and power-mode control supplied by the board.
pub trait LowPowerPlatform {
    /// Starts the inactivity countdown; expiry must enqueue
    /// [`crate::events::Event::IdleTimeout`].
    fn arm_inactivity_timer(&mut self, timeout: Duration);

    /// Restarts the countdown after traffic.
    fn reset_inactivity_timer(&mut self);

    /// Puts the external sub-GHz radio into its own sleep mode.
    fn put_external_radio_to_sleep(&mut self, duration: Duration) -> Result<(), StackError>;

    /// Arms the wake sources, gates the high-frequency clocks, and enters
    /// retention-less deep sleep. Hardware never returns from this call;
    /// host implementations return and the caller treats the node as asleep.
    fn enter_deep_sleep(&mut self, wake: WakeSources);

    /// Restarts the device. Hardware never returns from this call.
    fn system_reset(&mut self, reason: RestartReason);
}
