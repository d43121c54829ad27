use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoStaticStr};

/// Position of the two contact brew strength slider.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, IntoStaticStr,
    EnumIter,
)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum SliderPosition {
    Left,
    Right,
    /// Either both contacts or neither contact is closed.
    #[default]
    None,
}

impl SliderPosition {
    pub fn from_contacts(left_pressed: bool, right_pressed: bool) -> Self {
        match (left_pressed, right_pressed) {
            (true, false) => Self::Left,
            (false, true) => Self::Right,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// State of an indicator lamp on the machine front panel.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, IntoStaticStr,
    EnumIter,
)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LightState {
    #[default]
    Off,
    On,
    Blink,
}

impl LightState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}
