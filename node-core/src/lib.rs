#![no_std]

// Control core for a battery-powered wireless end node.
//
// Everything here stays `no_std` so the firmware image and the host emulator
// drive the exact same dispatcher, link lifecycle, and sleep sequencing.

pub mod callbacks;
pub mod config;
pub mod console;
pub mod countdown;
pub mod dispatcher;
pub mod events;
pub mod lifecycle;
pub mod links;
pub mod loopback;
pub mod platform;
pub mod sleep;
pub mod stack;
pub mod status;
pub mod telemetry;
pub mod triggers;

mod log;
