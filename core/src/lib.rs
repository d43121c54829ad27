#![no_std]

#[cfg(test)]
extern crate std;

pub mod clock;
pub mod error;
pub mod network;
pub mod sensors;
pub mod telemetry;
pub mod time;

#[cfg(test)]
mod testing;

pub use self::{
    clock::{Clock, Millis, Stopwatch},
    error::{Error, Result},
    telemetry::{Buttons, LoopConfig, Sensors, TelemetryNode},
};
