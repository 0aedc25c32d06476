use crate::events::ChannelProducer;
use crate::idle::{self, TimerSignal};

#[embassy_executor::task]
pub async fn run(signal: &'static TimerSignal, events: ChannelProducer<'static>) -> ! {
    idle::run_countdown(signal, &events, idle::idle_countdown()).await
}
