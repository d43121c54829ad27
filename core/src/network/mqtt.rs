use crate::{
    clock::{elapsed, Clock, Millis},
    error::{bounded, Result},
};
use coffee_telemetry_protocol::{ALIVE_PAYLOAD, TOPIC_ALIVE};
use core::{fmt, net::Ipv4Addr};
use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, info, warn};
use serde::Serialize;

/// Size of the buffer JSON payloads are serialised into.
pub const MQTT_BUFFER_SIZE: usize = 512;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_RETRY_WAIT_MS: Millis = 2000;

/// Interval between attempts during a blocking connect.
pub const CONNECT_POLL_MS: u32 = 100;

pub const HOST_CAPACITY: usize = 64;
pub const USERNAME_CAPACITY: usize = 32;
pub const PASSWORD_CAPACITY: usize = 64;
pub const CLIENT_ID_CAPACITY: usize = 32;
pub const TOPIC_CAPACITY: usize = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String<USERNAME_CAPACITY>,
    pub password: String<PASSWORD_CAPACITY>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Where and how to reach the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerConfig {
    ByIp {
        ip: Ipv4Addr,
        port: u16,
    },
    ByHost {
        host: String<HOST_CAPACITY>,
        port: u16,
        auth: Option<Credentials>,
    },
}

impl BrokerConfig {
    pub fn by_ip(ip: Ipv4Addr, port: u16) -> Self {
        Self::ByIp { ip, port }
    }

    /// Authentication is only used when both a username and a password are given.
    pub fn by_host(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let auth = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: bounded(username)?,
                password: bounded(password)?,
            }),
            _ => None,
        };

        Ok(Self::ByHost {
            host: bounded(host)?,
            port,
            auth,
        })
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::ByIp { port, .. } | Self::ByHost { port, .. } => *port,
        }
    }

    pub fn auth(&self) -> Option<&Credentials> {
        match self {
            Self::ByIp { .. } => None,
            Self::ByHost { auth, .. } => auth.as_ref(),
        }
    }
}

impl fmt::Display for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByIp { ip, port } => write!(f, "{ip}:{port}"),
            Self::ByHost { host, port, .. } => write!(f, "{host}:{port}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    Connecting,
    Connected,
    Disconnected,
}

/// MQTT 3.1.1 client.
pub trait BrokerClient {
    type Error: fmt::Debug;

    /// A single connection attempt, bounded by the client's socket timeout.
    fn connect(
        &mut self,
        config: &BrokerConfig,
        client_id: &str,
    ) -> core::result::Result<(), Self::Error>;

    fn connected(&self) -> bool;

    /// Services keep-alive and reads incoming data.
    fn poll(&mut self);

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> core::result::Result<(), Self::Error>;

    fn subscribe(&mut self, topic: &str) -> core::result::Result<(), Self::Error>;
}

/// Keeps a broker session alive, reconnecting in the background without blocking the caller
/// for longer than one connection attempt.
pub struct BrokerSupervisor<C, K> {
    client: C,
    clock: K,

    client_id: String<CLIENT_ID_CAPACITY>,
    config: Option<BrokerConfig>,
    subscription: Option<String<TOPIC_CAPACITY>>,

    state: SessionState,
    retry_wait_ms: Millis,
    last_attempt: Option<Millis>,
}

impl<C: BrokerClient, K: Clock> BrokerSupervisor<C, K> {
    pub fn new(client: C, clock: K, client_id: &str) -> Result<Self> {
        Ok(Self {
            client,
            clock,
            client_id: bounded(client_id)?,
            config: None,
            subscription: None,
            state: SessionState::None,
            retry_wait_ms: DEFAULT_RETRY_WAIT_MS,
            last_attempt: None,
        })
    }

    /// Stores `config` for later reconnects and tries to connect until `timeout_ms` has passed.
    ///
    /// Failing here is not final, [`update`](Self::update) keeps retrying with the stored
    /// configuration.
    pub fn connect(
        &mut self,
        config: BrokerConfig,
        timeout_ms: Millis,
        delay: &mut impl DelayNs,
    ) -> bool {
        info!(
            "Connecting to {} as {} ({})",
            config,
            self.client_id,
            if config.auth().is_some() { "auth" } else { "no-auth" }
        );

        let config = self.config.insert(config);
        self.state = SessionState::Connecting;

        let started = self.clock.now_ms();
        loop {
            let now = self.clock.now_ms();
            self.last_attempt = Some(now);

            match self.client.connect(config, &self.client_id) {
                Ok(()) => {
                    info!("Connected to {}", config);
                    self.on_connected();
                    return true;
                }
                Err(e) => debug!("Connect attempt failed: {:?}", e),
            }

            if elapsed(started, now) >= timeout_ms {
                warn!("Connecting to {} timed out after {} ms", config, timeout_ms);
                self.state = SessionState::Disconnected;
                return false;
            }

            delay.delay_ms(CONNECT_POLL_MS);
        }
    }

    /// Services the session, call on every loop iteration.
    pub fn update(&mut self) {
        self.client.poll();

        if self.client.connected() {
            if self.state != SessionState::Connected {
                info!("Broker session established");
                self.on_connected();
            }
            return;
        }

        if self.state == SessionState::Connected {
            warn!("Lost connection to broker");
            self.state = SessionState::Disconnected;
        }

        let Some(config) = &self.config else {
            return;
        };

        let now = self.clock.now_ms();
        if let Some(last) = self.last_attempt {
            if elapsed(last, now) < self.retry_wait_ms {
                return;
            }
        }

        self.last_attempt = Some(now);
        self.state = SessionState::Connecting;

        match self.client.connect(config, &self.client_id) {
            Ok(()) => {
                info!("Reconnected to {}", config);
                self.on_connected();
            }
            Err(e) => {
                warn!("Reconnect to {} failed: {:?}", config, e);
                self.state = SessionState::Disconnected;
            }
        }
    }

    fn on_connected(&mut self) {
        self.state = SessionState::Connected;

        if let Err(e) = self.client.publish(TOPIC_ALIVE, ALIVE_PAYLOAD, false) {
            warn!("Failed to announce on {}: {:?}", TOPIC_ALIVE, e);
        }

        if let Some(topic) = &self.subscription {
            match self.client.subscribe(topic) {
                Ok(()) => info!("Resubscribed to {}", topic),
                Err(e) => warn!("Failed to resubscribe to {}: {:?}", topic, e),
            }
        }
    }

    /// Publishes `payload` as compact JSON, returns false if it was not sent.
    pub fn publish(&mut self, topic: &str, payload: &impl Serialize, retained: bool) -> bool {
        if !self.client.connected() {
            return false;
        }

        let mut buffer = [0u8; MQTT_BUFFER_SIZE];
        match serde_json_core::to_slice(payload, &mut buffer) {
            Ok(len) => self.publish_raw(topic, &buffer[..len], retained),
            Err(e) => {
                warn!("Failed to serialise payload for {}: {:?}", topic, e);
                false
            }
        }
    }

    pub fn publish_raw(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        if !self.client.connected() {
            return false;
        }

        match self.client.publish(topic, payload, retained) {
            Ok(()) => true,
            Err(e) => {
                debug!("Publish to {} failed: {:?}", topic, e);
                false
            }
        }
    }

    /// Subscribes to `topic` and remembers it so it is restored after a reconnect.
    pub fn subscribe(&mut self, topic: &str) -> bool {
        match bounded(topic) {
            Ok(topic) => self.subscription = Some(topic),
            Err(e) => {
                warn!("Cannot subscribe to {}: {}", topic, e);
                return false;
            }
        }

        if !self.client.connected() {
            return false;
        }

        match self.client.subscribe(topic) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to subscribe to {}: {:?}", topic, e);
                false
            }
        }
    }

    pub fn set_retry_wait(&mut self, retry_wait_ms: Millis) {
        self.retry_wait_ms = retry_wait_ms;
    }

    pub fn connected(&self) -> bool {
        self.client.connected()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&BrokerConfig> {
        self.config.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::Error,
        testing::{ManualClock, ManualDelay, ScriptedBroker},
    };
    use coffee_telemetry_protocol::{Snapshot, TOPIC_STATE};

    fn config() -> BrokerConfig {
        BrokerConfig::by_host(
            "mqtt.example",
            DEFAULT_PORT,
            Some("coffee"),
            Some("secret"),
        )
        .unwrap()
    }

    #[test]
    fn connect_announces_presence() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "IOT-Coffeemaker").unwrap();
        assert_eq!(mqtt.state(), SessionState::None);

        assert!(mqtt.connect(config(), 5000, &mut delay));
        assert_eq!(mqtt.state(), SessionState::Connected);
        assert!(mqtt.connected());

        assert_eq!(broker.attempts(), 1);

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TOPIC_ALIVE);
        assert_eq!(published[0].1, ALIVE_PAYLOAD);
        assert!(!published[0].2);
        assert_eq!(broker.last_client_id().as_deref(), Some("IOT-Coffeemaker"));
    }

    #[test]
    fn connect_gives_up_after_timeout() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        broker.accept(false);
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();

        assert!(!mqtt.connect(config(), 500, &mut delay));
        assert_eq!(mqtt.state(), SessionState::Disconnected);
        assert_eq!(broker.attempts(), 6);
        assert_eq!(clock.now_ms(), 500);

        // Configuration is kept for update to retry with
        assert_eq!(mqtt.config(), Some(&config()));
        mqtt.update();
        assert_eq!(broker.attempts(), 6);

        broker.accept(true);
        clock.set_ms(2500);
        mqtt.update();
        assert_eq!(broker.attempts(), 7);
        assert!(mqtt.connected());
        assert_eq!(broker.published().len(), 1);
    }

    #[test]
    fn reconnect_throttled_after_disconnect() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        assert!(mqtt.connect(config(), 5000, &mut delay));

        clock.set_ms(10_000);
        broker.accept(false);
        broker.drop_connection();
        let before = broker.attempts();

        for _ in 0..100 {
            mqtt.update();
            clock.advance_ms(10);
        }

        assert!(broker.attempts() - before <= 1);
        assert_eq!(mqtt.state(), SessionState::Disconnected);
    }

    #[test]
    fn attempts_spaced_by_retry_wait() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        broker.accept(false);
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        assert!(!mqtt.connect(config(), 0, &mut delay));
        assert_eq!(broker.attempts(), 1);

        for _ in 0..1000 {
            clock.advance_ms(10);
            mqtt.update();
        }

        // Attempts at 2000, 4000, 6000, 8000 and 10000
        assert_eq!(broker.attempts(), 6);
    }

    #[test]
    fn custom_retry_wait() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        broker.accept(false);
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        mqtt.set_retry_wait(500);
        mqtt.connect(config(), 0, &mut delay);

        clock.set_ms(499);
        mqtt.update();
        assert_eq!(broker.attempts(), 1);

        clock.set_ms(500);
        mqtt.update();
        assert_eq!(broker.attempts(), 2);
    }

    #[test]
    fn update_without_config_does_nothing() {
        let clock = ManualClock::default();
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();

        mqtt.update();
        assert_eq!(broker.attempts(), 0);
        assert_eq!(broker.polls(), 1);
        assert_eq!(mqtt.state(), SessionState::None);
    }

    #[test]
    fn lost_connection_detected() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        mqtt.connect(config(), 1000, &mut delay);

        broker.accept(false);
        broker.drop_connection();
        mqtt.update();
        assert_eq!(mqtt.state(), SessionState::Disconnected);
    }

    #[test]
    fn publish_requires_connection() {
        let clock = ManualClock::default();
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();

        assert!(!mqtt.publish(TOPIC_STATE, &Snapshot::default(), false));
        assert!(!mqtt.publish_raw("raw", b"data", false));
        assert!(broker.published().is_empty());
    }

    #[test]
    fn publish_snapshot_as_json() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        mqtt.connect(config(), 1000, &mut delay);

        assert!(mqtt.publish(TOPIC_STATE, &Snapshot::default(), false));

        let published = broker.published();
        let (topic, payload, retained) = published.last().unwrap();
        assert_eq!(topic, TOPIC_STATE);
        assert_eq!(
            std::str::from_utf8(payload).unwrap(),
            r#"{"ButtonCoffeeLeft":false,"ButtonCoffeeRight":false,"SliderPosition":"None","LightLeft":"OFF","LightRight":"OFF","WaterSwitch":false,"Timestamp":""}"#
        );
        assert!(!retained);
    }

    #[test]
    fn subscription_restored_after_reconnect() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();
        mqtt.connect(config(), 1000, &mut delay);

        assert!(mqtt.subscribe("coffee/cmd"));
        assert_eq!(broker.subscriptions(), ["coffee/cmd"]);

        broker.drop_connection();
        clock.set_ms(5000);
        mqtt.update();

        assert!(mqtt.connected());
        assert_eq!(broker.subscriptions(), ["coffee/cmd", "coffee/cmd"]);
        assert_eq!(broker.published().len(), 2);
    }

    #[test]
    fn subscribe_while_disconnected_is_remembered() {
        let clock = ManualClock::default();
        let mut delay = ManualDelay::new(&clock);
        let broker = ScriptedBroker::default();
        let mut mqtt = BrokerSupervisor::new(broker.clone(), &clock, "node").unwrap();

        assert!(!mqtt.subscribe("coffee/cmd"));
        assert!(broker.subscriptions().is_empty());

        mqtt.connect(config(), 1000, &mut delay);
        assert_eq!(broker.subscriptions(), ["coffee/cmd"]);
    }

    #[test]
    fn config_by_ip() {
        let config = BrokerConfig::by_ip(Ipv4Addr::new(192, 168, 178, 21), 1884);
        assert_eq!(config.port(), 1884);
        assert!(config.auth().is_none());
    }

    #[test]
    fn config_auth_needs_both_parts() {
        let config =
            BrokerConfig::by_host("mqtt.example", DEFAULT_PORT, Some("user"), None).unwrap();
        assert!(config.auth().is_none());
        assert_eq!(config.port(), 1883);
    }

    #[test]
    fn config_host_too_long() {
        let host = [b'a'; HOST_CAPACITY + 1];
        let host = core::str::from_utf8(&host).unwrap();
        assert_eq!(
            BrokerConfig::by_host(host, DEFAULT_PORT, None, None),
            Err(Error::Capacity {
                capacity: HOST_CAPACITY
            })
        );
    }
}
