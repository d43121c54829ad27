use super::analog::{AdcChannel, AnalogRead};
use crate::error::{Error, Result};
use log::info;

/// Binary state derived from an analog level with hysteresis.
///
/// The output only switches after `required` consecutive samples agree on the new state.
#[derive(Debug, Clone)]
pub struct ThresholdSensor {
    on_threshold: u16,
    off_threshold: u16,
    required: u8,

    state: bool,
    candidate: Option<bool>,
    count: u8,
}

impl ThresholdSensor {
    pub fn new(on_threshold: u16, off_threshold: u16, required: u8) -> Result<Self> {
        if on_threshold <= off_threshold {
            return Err(Error::InvalidThresholds {
                on: on_threshold,
                off: off_threshold,
            });
        }

        Ok(Self {
            on_threshold,
            off_threshold,
            required: required.max(1),
            state: false,
            candidate: None,
            count: 0,
        })
    }

    pub fn update(&mut self, sampler: &impl AnalogRead, channel: AdcChannel) {
        self.update_value(sampler.read(channel));
    }

    pub fn update_value(&mut self, value: u16) {
        let target = if !self.state && value >= self.on_threshold {
            true
        } else if self.state && value < self.off_threshold {
            false
        } else {
            self.candidate = None;
            self.count = 0;
            return;
        };

        if self.candidate == Some(target) {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = Some(target);
            self.count = 1;
        }

        if self.count >= self.required {
            info!("Threshold sensor now {} (value {})", target, value);
            self.state = target;
            self.candidate = None;
            self.count = 0;
        }
    }

    pub fn state(&self) -> bool {
        self.state
    }
}
