use embassy_stm32::exti::ExtiInput;
use embassy_time::Instant;
use node_core::triggers::Triggers;

use crate::buttons::{self, Button, ButtonAction};
use crate::config::BUTTON_LAYOUT;
use crate::events::ChannelProducer;
use crate::status;

#[embassy_executor::task(pool_size = 2)]
pub async fn run(
    mut input: ExtiInput<'static>,
    button: Button,
    triggers: Triggers<'static, ChannelProducer<'static>>,
) -> ! {
    loop {
        input.wait_for_falling_edge().await;
        let pressed = Instant::now();
        input.wait_for_rising_edge().await;
        let held = core::time::Duration::from_micros(pressed.elapsed().as_micros());

        let Some(press) = buttons::classify(held) else {
            continue;
        };
        let Some(action) = buttons::action(BUTTON_LAYOUT, button, press) else {
            continue;
        };

        if status::halted() {
            defmt::warn!("{} press ignored, node halted", button);
            continue;
        }
        if action == ButtonAction::ConnectAndSend && !status::uplinks_open() {
            defmt::info!("{} press while stack not ready", button);
        }

        defmt::debug!("{} {} press: {}", button, press, action);
        if let Err(error) = buttons::fire(action, &triggers) {
            defmt::warn!("button event dropped, queue full ({})", error.0);
        }
    }
}
