use crate::{
    clock::{Clock, Millis, Stopwatch},
    network::{BrokerClient, BrokerSupervisor},
    sensors::{
        AdcChannel, AnalogFrontEnd, AnalogSampler, BlinkSensor, DebouncedButton, SliderButton,
        ThresholdSensor,
    },
    time::{TimeSource, TimeSynchroniser},
};
use coffee_telemetry_protocol::{Snapshot, TOPIC_STATE};
use embedded_hal::{delay::DelayNs, digital::InputPin};
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub publish_interval_ms: Millis,
    pub publish_topic: &'static str,

    /// Pause at the end of every iteration.
    pub yield_ms: u32,

    pub light_left_channel: AdcChannel,
    pub light_right_channel: AdcChannel,
    pub water_level_channel: AdcChannel,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 500,
            publish_topic: TOPIC_STATE,
            yield_ms: 2,
            light_left_channel: AdcChannel::A0,
            light_right_channel: AdcChannel::A1,
            water_level_channel: AdcChannel::A2,
        }
    }
}

pub struct Buttons<P> {
    pub coffee_left: DebouncedButton<P>,
    pub coffee_right: DebouncedButton<P>,
    pub slider_left: DebouncedButton<P>,
    pub slider_right: DebouncedButton<P>,
}

/// Every input of the machine.
pub struct Sensors<F, P> {
    pub sampler: AnalogSampler<F>,
    pub buttons: Buttons<P>,
    pub light_left: BlinkSensor,
    pub light_right: BlinkSensor,
    pub water_level: ThresholdSensor,
}

/// Owns all sensor and connection state and runs the sample/publish loop.
pub struct TelemetryNode<F, P, C, S, K> {
    config: LoopConfig,
    clock: K,

    sensors: Sensors<F, P>,
    slider: SliderButton,

    broker: BrokerSupervisor<C, K>,
    time: TimeSynchroniser<S>,

    snapshot: Snapshot,
    publish_watch: Stopwatch,
}

impl<F, P, C, S, K> TelemetryNode<F, P, C, S, K>
where
    F: AnalogFrontEnd,
    P: InputPin,
    C: BrokerClient,
    S: TimeSource,
    K: Clock,
{
    pub fn new(
        config: LoopConfig,
        clock: K,
        sensors: Sensors<F, P>,
        broker: BrokerSupervisor<C, K>,
        time: TimeSynchroniser<S>,
    ) -> Self {
        let publish_watch = Stopwatch::started_at(clock.now_ms());

        Self {
            config,
            clock,
            sensors,
            slider: SliderButton::default(),
            broker,
            time,
            snapshot: Snapshot::default(),
            publish_watch,
        }
    }

    /// Runs one iteration, returns true if a snapshot was published.
    pub fn tick(&mut self) -> bool {
        self.broker.update();

        // Everything below sees the same instant
        let now = self.clock.now_ms();
        self.time.update(now);

        self.update_sensors(now);
        self.refresh_snapshot(now);

        if self.publish_watch.elapsed_ms(now) >= self.config.publish_interval_ms
            && self.broker.connected()
        {
            self.publish_watch.restart(now);
            self.broker
                .publish(self.config.publish_topic, &self.snapshot, false)
        } else {
            false
        }
    }

    pub fn run(&mut self, delay: &mut impl DelayNs) -> ! {
        info!("Telemetry loop running");
        loop {
            self.tick();
            delay.delay_ms(self.config.yield_ms);
        }
    }

    fn update_sensors(&mut self, now: Millis) {
        let sensors = &mut self.sensors;
        let buttons = &mut sensors.buttons;

        sensors.sampler.update();

        buttons.coffee_left.update(now);
        buttons.coffee_right.update(now);
        buttons.slider_left.update(now);
        buttons.slider_right.update(now);

        sensors
            .light_left
            .update(&sensors.sampler, self.config.light_left_channel, now);
        sensors
            .light_right
            .update(&sensors.sampler, self.config.light_right_channel, now);
        sensors
            .water_level
            .update(&sensors.sampler, self.config.water_level_channel);

        self.slider.update(
            buttons.slider_left.is_pressed(),
            buttons.slider_right.is_pressed(),
            now,
        );

        if buttons.coffee_left.rising_edge() {
            info!("Left coffee button pressed");
        }
        if buttons.coffee_right.rising_edge() {
            info!("Right coffee button pressed");
        }
    }

    fn refresh_snapshot(&mut self, now: Millis) {
        let sensors = &self.sensors;

        self.snapshot = Snapshot {
            button_coffee_left: sensors.buttons.coffee_left.is_pressed(),
            button_coffee_right: sensors.buttons.coffee_right.is_pressed(),
            slider_position: self.slider.position(),
            light_left: sensors.light_left.state(),
            light_right: sensors.light_right.state(),
            water_switch: sensors.water_level.state(),
            timestamp: self.time.formatted_time(now),
        };
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn broker(&mut self) -> &mut BrokerSupervisor<C, K> {
        &mut self.broker
    }
}
