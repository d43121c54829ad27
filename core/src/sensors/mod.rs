pub mod analog;
pub mod blink;
pub mod button;
pub mod slider;
pub mod threshold;

pub use self::{
    analog::{AdcChannel, AnalogFrontEnd, AnalogRead, AnalogSampler, Sample},
    blink::{BlinkConfig, BlinkSensor, EDGE_HISTORY},
    button::{DebouncedButton, Edge, Polarity, Pull, DEBOUNCE_MS},
    slider::SliderButton,
    threshold::ThresholdSensor,
};
