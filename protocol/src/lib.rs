#![cfg_attr(feature = "no-std", no_std)]

pub mod snapshot;
pub mod types;

pub use self::{
    snapshot::{Snapshot, TimestampString, TIMESTAMP_CAPACITY},
    types::{LightState, SliderPosition},
};

/// Topic the machine state snapshot is published on.
pub const TOPIC_STATE: &str = "State";

/// Topic the node announces itself on after every successful broker connection.
pub const TOPIC_ALIVE: &str = "esp_state";
pub const ALIVE_PAYLOAD: &[u8] = b"i am alive";
