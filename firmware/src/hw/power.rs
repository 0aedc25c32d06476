//! Low-power controller for the STM32G0 node board.
//!
//! Timer requests go to the idle task through its signal. Deep sleep parks the
//! external radio lines, starts the wake-up watchdog and stops the core. Every
//! wake is a cold restart: the watchdog resets the chip, and a button
//! interrupt leaves `wfi` and resets it from here.

#![cfg(target_os = "none")]

use core::time::Duration;

use cortex_m::peripheral::SCB;
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use node_core::config::WakeSources;
use node_core::countdown::TimerCommand;
use node_core::platform::{LowPowerPlatform, RestartReason};
use node_core::stack::StackError;

use super::millis;
use crate::idle::TimerSignal;

/// Control lines of the external sub-GHz transceiver.
pub struct RadioLines {
    /// SPI chip select. Held high the transceiver stays in sleep.
    chip_select: Output<'static>,
    antenna_switch: Output<'static>,
}

impl RadioLines {
    pub fn new(chip_select: Output<'static>, antenna_switch: Output<'static>) -> Self {
        Self {
            chip_select,
            antenna_switch,
        }
    }
}

/// Watchdog configured for the wake-up interval, started only at deep sleep.
pub type WakeTimer = IndependentWatchdog<'static, IWDG>;

pub struct McuPlatform {
    timer: &'static TimerSignal,
    radio: Option<RadioLines>,
    wake_timer: Option<WakeTimer>,
}

impl McuPlatform {
    pub fn new(
        timer: &'static TimerSignal,
        radio: Option<RadioLines>,
        wake_timer: Option<WakeTimer>,
    ) -> Self {
        Self {
            timer,
            radio,
            wake_timer,
        }
    }
}

impl LowPowerPlatform for McuPlatform {
    fn arm_inactivity_timer(&mut self, timeout: Duration) {
        self.timer.signal(TimerCommand::Arm(timeout));
    }

    fn reset_inactivity_timer(&mut self) {
        self.timer.signal(TimerCommand::Reset);
    }

    fn put_external_radio_to_sleep(&mut self, duration: Duration) -> Result<(), StackError> {
        let Some(radio) = self.radio.as_mut() else {
            return Err(StackError::NoSupport);
        };

        radio.chip_select.set_high();
        radio.antenna_switch.set_low();
        defmt::info!("external radio parked for {} ms", millis(duration));
        Ok(())
    }

    fn enter_deep_sleep(&mut self, wake: WakeSources) {
        self.timer.signal(TimerCommand::Disarm);

        match (wake.timer, self.wake_timer.as_mut()) {
            (Some(interval), Some(watchdog)) => {
                watchdog.unleash();
                defmt::info!(
                    "deep sleep, wake timer {} ms, button {}",
                    millis(interval),
                    wake.button
                );
            }
            (Some(_), None) => defmt::warn!("deep sleep, wake timer not fitted"),
            (None, _) => defmt::info!("deep sleep, button {}", wake.button),
        }

        cortex_m::interrupt::disable();
        // SAFETY: interrupts are off and the node task never returns from
        // here, so nothing else touches SCB.
        let mut core = unsafe { cortex_m::Peripherals::steal() };
        core.SCB.set_sleepdeep();
        cortex_m::asm::dsb();
        // A pending interrupt ends WFI even with PRIMASK set.
        cortex_m::asm::wfi();
        SCB::sys_reset();
    }

    fn system_reset(&mut self, reason: RestartReason) {
        defmt::warn!("system reset: {}", reason);
        SCB::sys_reset();
    }
}
