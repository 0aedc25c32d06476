//! Board wiring.
//!
//! | Signal              | Pin  |
//! |---------------------|------|
//! | User button         | PC13 |
//! | Wake button         | PA0  |
//! | Radio chip select   | PA4  |
//! | Radio antenna switch| PB2  |
//!
//! The wake-up timer is the independent watchdog. It keeps counting on LSI
//! in Stop mode and its reset restarts the node from scratch.

use core::time::Duration;

pub mod power;

/// Longest watchdog period: LSI at 32 kHz, prescaler 256, reload 4095.
pub const WATCHDOG_MAX_PERIOD: Duration = Duration::from_millis(32_000);

/// Watchdog timeout in microseconds for a wake-up interval, clamped to what
/// the hardware can count.
pub fn watchdog_timeout_us(interval: Duration) -> u32 {
    let period = interval.min(WATCHDOG_MAX_PERIOD);
    u32::try_from(period.as_micros()).unwrap_or(u32::MAX)
}

/// Whole milliseconds, saturating, for log output.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
