use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use node_core::dispatcher::EventDispatcher;
use node_core::loopback::LoopbackStack;
use node_core::triggers::Triggers;

use crate::buttons::Button;
use crate::config;
use crate::events::{ChannelProducer, ChannelSource, EventQueue};
use crate::hw::power::{McuPlatform, RadioLines};
use crate::hw::watchdog_timeout_us;
use crate::idle::TimerSignal;
use crate::status::NODE_STATUS;

mod button_task;
mod idle_task;
mod node_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static EVENT_QUEUE: EventQueue = Channel::new();
pub(super) static TIMER_SIGNAL: TimerSignal = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        PA0,
        PA4,
        PB2,
        PC13,
        EXTI0,
        EXTI13,
        IWDG,
        ..
    } = hal::init(hal::Config::default());

    let node_config = config::node_config();
    defmt::info!("node config: {}", node_config);

    let radio = if node_config.external_radio {
        Some(RadioLines::new(
            Output::new(PA4, Level::High, Speed::Low),
            Output::new(PB2, Level::Low, Speed::Low),
        ))
    } else {
        None
    };

    let wake_timer = node_config
        .wake_sources
        .timer
        .map(|interval| IndependentWatchdog::new(IWDG, watchdog_timeout_us(interval)));

    let producer = ChannelProducer::new(EVENT_QUEUE.sender());
    let dispatcher = EventDispatcher::new(
        node_config,
        LoopbackStack::new(producer),
        McuPlatform::new(&TIMER_SIGNAL, radio, wake_timer),
        producer,
        &NODE_STATUS,
    );

    spawner
        .spawn(node_task::run(
            dispatcher,
            ChannelSource::new(EVENT_QUEUE.receiver()),
        ))
        .expect("failed to spawn node task");

    spawner
        .spawn(idle_task::run(&TIMER_SIGNAL, producer))
        .expect("failed to spawn idle timer task");

    spawner
        .spawn(button_task::run(
            ExtiInput::new(PC13, EXTI13, Pull::Up),
            Button::User,
            Triggers::new(producer, &NODE_STATUS),
        ))
        .expect("failed to spawn user button task");

    if cfg!(feature = "dual-button") {
        spawner
            .spawn(button_task::run(
                ExtiInput::new(PA0, EXTI0, Pull::Up),
                Button::Wake,
                Triggers::new(producer, &NODE_STATUS),
            ))
            .expect("failed to spawn wake button task");
    }

    core::future::pending::<()>().await;
}
