use crate::error::{Error, Result};
use enumset::{EnumSet, EnumSetType};
use log::{debug, error, info, warn};

/// Single ended input of the analog front end.
#[derive(Debug, EnumSetType)]
pub enum AdcChannel {
    A0,
    A1,
    A2,
    A3,
}

impl AdcChannel {
    pub const COUNT: usize = 4;

    fn index(self) -> usize {
        self as usize
    }
}

/// A single conversion result as reported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub channel: AdcChannel,
    pub value: u16,
}

/// Driver for a multi-channel ADC that converts the enabled channels round-robin.
pub trait AnalogFrontEnd {
    type Error: core::fmt::Debug;

    fn init(&mut self, channels: EnumSet<AdcChannel>) -> core::result::Result<(), Self::Error>;

    /// Returns the next completed conversion, or `None` if nothing new is available yet.
    ///
    /// Must not block waiting for a conversion.
    fn poll(&mut self) -> core::result::Result<Option<Sample>, Self::Error>;
}

/// Filtered view of analog channels.
pub trait AnalogRead {
    fn read(&self, channel: AdcChannel) -> u16;
}

pub const MAX_FILTER_DEPTH: usize = 16;
pub const DEFAULT_FILTER_DEPTH: u8 = 4;

/// Upper bound on conversions consumed by one call to [`AnalogSampler::update`].
const MAX_SAMPLES_PER_UPDATE: usize = AdcChannel::COUNT * MAX_FILTER_DEPTH;

/// Arithmetic mean over the last `depth` samples.
#[derive(Debug, Clone)]
struct MovingAverage {
    samples: [u16; MAX_FILTER_DEPTH],
    depth: usize,
    next: usize,
    len: usize,
    mean: u16,
}

impl MovingAverage {
    fn new(depth: usize) -> Self {
        Self {
            samples: [0; MAX_FILTER_DEPTH],
            depth,
            next: 0,
            len: 0,
            mean: 0,
        }
    }

    fn push(&mut self, value: u16) {
        self.samples[self.next] = value;
        self.next = (self.next + 1) % self.depth;
        self.len = core::cmp::min(self.len + 1, self.depth);

        // Until the buffer wraps the valid samples are exactly the first `len` slots
        let sum: u32 = self.samples[..self.len].iter().map(|v| u32::from(*v)).sum();
        self.mean = (sum / self.len as u32) as u16;
    }
}

/// Continuously drains conversions from an [`AnalogFrontEnd`] and keeps a moving average per
/// channel.
pub struct AnalogSampler<F> {
    front_end: F,
    enabled: EnumSet<AdcChannel>,
    filters: [MovingAverage; AdcChannel::COUNT],
    initialised: bool,
}

impl<F: AnalogFrontEnd> AnalogSampler<F> {
    pub fn new(front_end: F) -> Self {
        Self {
            front_end,
            enabled: EnumSet::empty(),
            filters: core::array::from_fn(|_| MovingAverage::new(DEFAULT_FILTER_DEPTH.into())),
            initialised: false,
        }
    }

    /// Configures the front end.
    ///
    /// A failure is reported but the sampler stays usable, reads then return the last cached
    /// value (zero if nothing was ever sampled).
    pub fn begin(&mut self, channels: EnumSet<AdcChannel>, filter_depth: u8) -> Result<()> {
        let depth = usize::from(filter_depth).clamp(1, MAX_FILTER_DEPTH);
        if depth != usize::from(filter_depth) {
            warn!("Filter depth {} out of range, using {}", filter_depth, depth);
        }

        match self.front_end.init(channels) {
            Ok(()) => {
                self.filters = core::array::from_fn(|_| MovingAverage::new(depth));
                self.enabled = channels;
                info!(
                    "Analog front end ready, {} channels, filter depth {}",
                    channels.len(),
                    depth
                );
                self.initialised = true;
                Ok(())
            }
            Err(e) => {
                error!("Analog front end init failed: {:?}", e);
                self.initialised = false;
                Err(Error::AnalogInit)
            }
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Consumes every conversion completed since the last call.
    pub fn update(&mut self) {
        for _ in 0..MAX_SAMPLES_PER_UPDATE {
            match self.front_end.poll() {
                Ok(Some(sample)) => {
                    if self.enabled.contains(sample.channel) {
                        self.filters[sample.channel.index()].push(sample.value);
                    } else {
                        debug!("Ignoring sample from disabled channel {:?}", sample.channel);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Analog front end read failed: {:?}", e);
                    break;
                }
            }
        }
    }

    pub fn read(&self, channel: AdcChannel) -> u16 {
        self.filters[channel.index()].mean
    }
}

impl<F: AnalogFrontEnd> AnalogRead for AnalogSampler<F> {
    fn read(&self, channel: AdcChannel) -> u16 {
        AnalogSampler::read(self, channel)
    }
}
