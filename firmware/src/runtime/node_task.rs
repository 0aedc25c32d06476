use node_core::dispatcher::{EventDispatcher, LoopExit};
use node_core::loopback::LoopbackStack;

use crate::events::{ChannelProducer, ChannelSource};
use crate::hw::power::McuPlatform;

pub type NodeDispatcher = EventDispatcher<
    'static,
    LoopbackStack<ChannelProducer<'static>>,
    McuPlatform,
    ChannelProducer<'static>,
>;

#[embassy_executor::task]
pub async fn run(mut dispatcher: NodeDispatcher, mut events: ChannelSource<'static>) -> ! {
    match dispatcher.run(&mut events).await {
        LoopExit::Fatal(error) => defmt::error!("node halted: {}", error),
        exit => defmt::warn!("node loop returned: {}", exit),
    }

    loop {
        core::future::pending::<()>().await;
    }
}
