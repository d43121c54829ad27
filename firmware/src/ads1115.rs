//! Driver for the TI ADS1115 16 bit ADC, scanning the enabled single ended inputs in continuous
//! conversion mode.

use coffee_telemetry_core::{
    clock::elapsed,
    sensors::{AdcChannel, AnalogFrontEnd, Sample},
    Clock, Millis,
};
use embedded_hal::i2c::I2c;
use enumset::EnumSet;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Ads1115Error<E: core::fmt::Debug> {
    #[error("I2C error: {0:?}")]
    I2c(E),
    #[error("No channels enabled")]
    NoChannels,
}

pub(crate) struct Ads1115<I, K> {
    i2c: I,
    clock: K,

    channels: EnumSet<AdcChannel>,
    current: Option<AdcChannel>,
    selected_at: Millis,
}

impl<I: I2c, K: Clock> Ads1115<I, K> {
    pub(crate) fn new(i2c: I, clock: K) -> Self {
        Self {
            i2c,
            clock,
            channels: EnumSet::empty(),
            current: None,
            selected_at: 0,
        }
    }

    fn select(&mut self, channel: AdcChannel) -> Result<(), Ads1115Error<I::Error>> {
        let config = CONFIG_BASE | mux(channel);
        let [msb, lsb] = config.to_be_bytes();

        self.i2c
            .write(ADDRESS, &[REGISTER_CONFIG, msb, lsb])
            .map_err(Ads1115Error::I2c)?;

        self.current = Some(channel);
        self.selected_at = self.clock.now_ms();
        Ok(())
    }

    fn read_conversion(&mut self) -> Result<u16, Ads1115Error<I::Error>> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(ADDRESS, &[REGISTER_CONVERSION], &mut buf)
            .map_err(Ads1115Error::I2c)?;

        // Single ended inputs only go negative by noise around ground
        Ok(i16::from_be_bytes(buf).max(0) as u16)
    }

    fn next_channel(&self, after: AdcChannel) -> Option<AdcChannel> {
        self.channels
            .iter()
            .skip_while(|c| *c != after)
            .nth(1)
            .or_else(|| self.channels.iter().next())
    }
}

impl<I: I2c, K: Clock> AnalogFrontEnd for Ads1115<I, K> {
    type Error = Ads1115Error<I::Error>;

    fn init(&mut self, channels: EnumSet<AdcChannel>) -> Result<(), Self::Error> {
        let first = channels.iter().next().ok_or(Ads1115Error::NoChannels)?;
        self.channels = channels;

        debug!("ADS1115 scanning {} channels", channels.len());
        self.select(first)
    }

    fn poll(&mut self) -> Result<Option<Sample>, Self::Error> {
        let Some(channel) = self.current else {
            return Ok(None);
        };

        if elapsed(self.selected_at, self.clock.now_ms()) < CONVERSION_MS {
            return Ok(None);
        }

        let value = self.read_conversion()?;

        match self.next_channel(channel) {
            Some(next) if next != channel => self.select(next)?,
            _ => self.selected_at = self.clock.now_ms(),
        }

        Ok(Some(Sample { channel, value }))
    }
}

fn mux(channel: AdcChannel) -> u16 {
    let input = match channel {
        AdcChannel::A0 => 0b100,
        AdcChannel::A1 => 0b101,
        AdcChannel::A2 => 0b110,
        AdcChannel::A3 => 0b111,
    };
    input << 12
}

const ADDRESS: u8 = 0x48;

const REGISTER_CONVERSION: u8 = 0x00;
const REGISTER_CONFIG: u8 = 0x01;

/// +/-4.096 V range, continuous conversion, 860 SPS, comparator disabled.
const CONFIG_BASE: u16 = 0b0000_0010_1110_0011;

/// One conversion period at 860 SPS plus margin for the input multiplexer to settle.
const CONVERSION_MS: Millis = 3;
