use crate::types::{LightState, SliderPosition};
use heapless::String;
use serde::{Deserialize, Serialize};

/// Capacity of the formatted timestamp, `YYYY-MM-DDTHH:MM:SS` plus headroom.
pub const TIMESTAMP_CAPACITY: usize = 32;

pub type TimestampString = String<TIMESTAMP_CAPACITY>;

/// The state of the coffee machine as published on [`crate::TOPIC_STATE`].
///
/// Every field is always present in the serialised form, an unsynchronised clock is represented
/// by an empty `Timestamp` rather than by omitting the field.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    pub button_coffee_left: bool,
    pub button_coffee_right: bool,
    pub slider_position: SliderPosition,
    pub light_left: LightState,
    pub light_right: LightState,
    pub water_switch: bool,
    pub timestamp: TimestampString,
}

impl Snapshot {
    /// Names of every key in the serialised snapshot, in serialisation order.
    pub const FIELDS: [&'static str; 7] = [
        "ButtonCoffeeLeft",
        "ButtonCoffeeRight",
        "SliderPosition",
        "LightLeft",
        "LightRight",
        "WaterSwitch",
        "Timestamp",
    ];
}
