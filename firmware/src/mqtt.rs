use coffee_telemetry_core::network::{mqtt::MQTT_BUFFER_SIZE, BrokerClient, BrokerConfig};
use core::time::Duration;
use esp_idf_svc::{
    mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS},
    sys::EspError,
};
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub(crate) enum BrokerError {
    #[error(transparent)]
    Esp(#[from] EspError),
    #[error("Not connected")]
    NotConnected,
}

/// MQTT client backed by the esp-idf MQTT task.
///
/// The underlying client runs its own connection and keep-alive handling, the connection state is
/// tracked from its event callback.
#[derive(Default)]
pub(crate) struct EspBrokerClient {
    client: Option<EspMqttClient<'static>>,
    target: Option<BrokerConfig>,
    connected: Arc<AtomicBool>,
}

impl EspBrokerClient {
    fn start(&mut self, config: &BrokerConfig, client_id: &str) -> Result<(), BrokerError> {
        // Tears down any previous session
        self.client = None;
        self.connected.store(false, Ordering::Relaxed);

        let url = format!("mqtt://{config}");
        let auth = config.auth();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: auth.map(|a| a.username.as_str()),
            password: auth.map(|a| a.password.as_str()),
            keep_alive_interval: Some(KEEP_ALIVE),
            network_timeout: SOCKET_TIMEOUT,
            buffer_size: MQTT_BUFFER_SIZE,
            out_buffer_size: MQTT_BUFFER_SIZE,
            ..Default::default()
        };

        let connected = self.connected.clone();
        let client = EspMqttClient::new_cb(&url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                info!("MQTT connected");
                connected.store(true, Ordering::Relaxed);
            }
            EventPayload::Disconnected => {
                info!("MQTT disconnected");
                connected.store(false, Ordering::Relaxed);
            }
            EventPayload::Error(e) => warn!("MQTT error: {e:?}"),
            other => debug!("MQTT event: {other:?}"),
        })?;

        self.client = Some(client);
        self.target = Some(config.clone());
        Ok(())
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, BrokerError> {
        match self.client.as_mut() {
            Some(client) if self.connected.load(Ordering::Relaxed) => Ok(client),
            _ => Err(BrokerError::NotConnected),
        }
    }
}

impl BrokerClient for EspBrokerClient {
    type Error = BrokerError;

    fn connect(&mut self, config: &BrokerConfig, client_id: &str) -> Result<(), Self::Error> {
        if self.client.is_none() || self.target.as_ref() != Some(config) {
            self.start(config, client_id)?;
        }

        if self.connected() {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn poll(&mut self) {}

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.client()?.publish(topic, QoS::AtMostOnce, retain, payload)?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client()?.subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }
}
