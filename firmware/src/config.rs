//! Build time configuration of the node.
//!
//! Hardware pinout: I2C SDA on GPIO16 and SCL on GPIO15, buttons on GPIO33 (left coffee),
//! GPIO17 (right coffee), GPIO21 (slider left) and GPIO18 (slider right). The pins are taken from
//! the peripherals in `main`.

use coffee_telemetry_core::{
    network::{BrokerConfig, WifiConfig},
    sensors::{AdcChannel, BlinkConfig},
    time::TimeSyncConfig,
    Millis,
};
use enumset::{enum_set, EnumSet};

pub(crate) const WIFI_SSID: &str = env!("WIFI_SSID");
pub(crate) const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub(crate) const WIFI_CONNECT_TIMEOUT_MS: Millis = 15_000;

pub(crate) fn wifi_config() -> WifiConfig<'static> {
    WifiConfig {
        ssid: Some(WIFI_SSID),
        password: Some(WIFI_PASSWORD),
        static_ip: None,
        tx_power_dbm: 8,
        channel: 0,
        scan_for_channel: true,
    }
}

pub(crate) const CLIENT_ID: &str = "IOT-Coffeemaker";
const BROKER_HOST: &str = "mqtt.example.org";
const BROKER_PORT: u16 = 1883;
const BROKER_USERNAME: &str = "coffee";
const BROKER_PASSWORD: &str = env!("MQTT_PASSWORD");
pub(crate) const BROKER_CONNECT_TIMEOUT_MS: Millis = 5000;

pub(crate) fn broker_config() -> coffee_telemetry_core::Result<BrokerConfig> {
    BrokerConfig::by_host(
        BROKER_HOST,
        BROKER_PORT,
        Some(BROKER_USERNAME),
        Some(BROKER_PASSWORD),
    )
}

pub(crate) const NTP_SERVER: &str = "192.168.178.21";
pub(crate) const TIME_SYNC: TimeSyncConfig = TimeSyncConfig {
    update_interval_ms: 60_000,
    // CEST
    timezone_offset_s: 7200,
};

pub(crate) const ADC_CHANNELS: EnumSet<AdcChannel> =
    enum_set!(AdcChannel::A0 | AdcChannel::A1 | AdcChannel::A2);
pub(crate) const ADC_FILTER_DEPTH: u8 = 4;

pub(crate) const WATER_ON_THRESHOLD: u16 = 13000;
pub(crate) const WATER_OFF_THRESHOLD: u16 = 7000;
pub(crate) const WATER_CONFIRMATION: u8 = 3;

pub(crate) const LIGHT: BlinkConfig = BlinkConfig {
    mid_threshold: 10000,
    window_ms: 1500,
    edge_count: 3,
};
