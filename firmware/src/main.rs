mod ads1115;
mod clock;
mod config;
mod mqtt;
mod ntp;
mod wifi;

use crate::{
    ads1115::Ads1115, clock::EspClock, mqtt::EspBrokerClient, ntp::EspTimeSource,
    wifi::EspWifiDriver,
};
use coffee_telemetry_core::{
    network::{BrokerSupervisor, ConnectResult, NetworkSupervisor, RadioSettings},
    sensors::{AnalogSampler, BlinkSensor, DebouncedButton, Polarity, Pull, ThresholdSensor},
    time::TimeSynchroniser,
    Buttons, LoopConfig, Sensors, TelemetryNode,
};
use embedded_hal::delay::DelayNs;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{
        delay::FreeRtos,
        gpio::{self, AnyInputPin, Input, InputPin, PinDriver},
        i2c::{I2cConfig, I2cDriver},
        peripherals::Peripherals,
        prelude::*,
    },
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::EspWifi,
};
use log::{error, info, warn};

type ButtonPin = PinDriver<'static, AnyInputPin, Input>;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let clock = EspClock;
    let mut delay = FreeRtos;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio16,
        peripherals.pins.gpio15,
        &I2cConfig::new().baudrate(400.kHz().into()),
    )?;

    let mut sampler = AnalogSampler::new(Ads1115::new(i2c, clock));
    if sampler
        .begin(config::ADC_CHANNELS, config::ADC_FILTER_DEPTH)
        .is_err()
    {
        error!("ADC not available, analog inputs read as zero");
        delay.delay_ms(3000);
    }

    let buttons = Buttons {
        coffee_left: button(peripherals.pins.gpio33.downgrade_input())?,
        coffee_right: button(peripherals.pins.gpio17.downgrade_input())?,
        slider_left: button(peripherals.pins.gpio21.downgrade_input())?,
        slider_right: button(peripherals.pins.gpio18.downgrade_input())?,
    };

    let sensors = Sensors {
        sampler,
        buttons,
        light_left: BlinkSensor::new(config::LIGHT),
        light_right: BlinkSensor::new(config::LIGHT),
        water_level: ThresholdSensor::new(
            config::WATER_ON_THRESHOLD,
            config::WATER_OFF_THRESHOLD,
            config::WATER_CONFIRMATION,
        )?,
    };

    // Dropping the supervisor shuts the radio down, it lives as long as the node
    let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut network = NetworkSupervisor::new(EspWifiDriver::new(wifi), clock);
    network.begin(&RadioSettings::default());

    let result = network.connect(
        &config::wifi_config(),
        config::WIFI_CONNECT_TIMEOUT_MS,
        &mut delay,
    );
    if result != ConnectResult::Connected {
        warn!("WiFi not connected ({result:?}), carrying on");
    }

    let time_source = EspTimeSource::new(config::NTP_SERVER);
    let mut time = TimeSynchroniser::new(time_source, config::TIME_SYNC);
    time.begin();

    let mut broker = BrokerSupervisor::new(EspBrokerClient::default(), clock, config::CLIENT_ID)?;
    if !broker.connect(
        config::broker_config()?,
        config::BROKER_CONNECT_TIMEOUT_MS,
        &mut delay,
    ) {
        warn!("Broker not connected, retrying in the background");
    }

    info!("Setup done");

    let mut node = TelemetryNode::new(LoopConfig::default(), clock, sensors, broker, time);
    node.run(&mut delay)
}

fn button(pin: AnyInputPin) -> anyhow::Result<DebouncedButton<ButtonPin>> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(gpio::Pull::Up)?;
    Ok(DebouncedButton::new(driver, Polarity::NormallyClosed, Pull::PullUp))
}
