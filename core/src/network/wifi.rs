use crate::clock::{elapsed, Clock, Millis};
use core::net::Ipv4Addr;
use embedded_hal::delay::DelayNs;
use enumset::{EnumSet, EnumSetType};
use heapless::{String, Vec};
use log::{debug, error, info, warn};

/// Interval at which the association status is polled while connecting.
pub const STATUS_POLL_MS: u32 = 250;

pub const MAX_SCAN_RESULTS: usize = 16;
pub const SSID_CAPACITY: usize = 32;

#[derive(Debug, EnumSetType)]
pub enum PhyProtocol {
    B,
    G,
    N,
}

/// One-time radio stack settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSettings {
    pub country: [u8; 2],
    pub first_channel: u8,
    pub channel_count: u8,
    pub protocols: EnumSet<PhyProtocol>,
    pub power_save: bool,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            country: *b"EU",
            first_channel: 1,
            channel_count: 13,
            protocols: EnumSet::all(),
            power_save: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpConfig {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
}

impl StaticIpConfig {
    /// DNS servers to use, the gateway stands in for any that are not set.
    pub fn dns_servers(&self) -> [Ipv4Addr; 2] {
        [
            self.dns1.unwrap_or(self.gateway),
            self.dns2.unwrap_or(self.gateway),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiConfig<'a> {
    pub ssid: Option<&'a str>,
    pub password: Option<&'a str>,

    /// DHCP is used when not set.
    pub static_ip: Option<StaticIpConfig>,

    /// Requested transmit power, zero leaves the driver default.
    pub tx_power_dbm: i8,

    /// Channel to associate on, zero lets the driver pick.
    pub channel: u8,

    /// Scan before associating and use the channel the SSID was found on.
    pub scan_for_channel: bool,
}

impl Default for WifiConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: None,
            password: None,
            static_ip: None,
            tx_power_dbm: 0,
            channel: 0,
            scan_for_channel: false,
        }
    }
}

/// Transmit power steps supported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPower {
    Dbm8_5,
    Dbm11,
    Dbm15,
    Dbm19_5,
}

impl TxPower {
    /// Rounds down to the nearest supported step, requests below the lowest step get the
    /// lowest step.
    pub fn from_dbm(dbm: i8) -> Self {
        match dbm {
            20.. => Self::Dbm19_5,
            15.. => Self::Dbm15,
            11.. => Self::Dbm11,
            _ => Self::Dbm8_5,
        }
    }

    /// Power in units of 0.25 dBm.
    pub fn quarter_dbm(self) -> i8 {
        match self {
            Self::Dbm8_5 => 34,
            Self::Dbm11 => 44,
            Self::Dbm15 => 60,
            Self::Dbm19_5 => 78,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    NoSsidAvailable,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    Timeout,
    FailedStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String<SSID_CAPACITY>,
    pub channel: u8,
    pub rssi: i8,
}

/// Station mode wireless driver.
pub trait WifiDriver {
    type Error: core::fmt::Debug;

    fn init(&mut self, settings: &RadioSettings) -> Result<(), Self::Error>;

    fn scan(&mut self) -> Result<Vec<AccessPoint, MAX_SCAN_RESULTS>, Self::Error>;

    fn configure_static_ip(
        &mut self,
        config: &StaticIpConfig,
        dns: [Ipv4Addr; 2],
    ) -> Result<(), Self::Error>;

    /// Starts association without waiting for it to complete.
    fn begin(&mut self, ssid: &str, password: &str, channel: Option<u8>)
        -> Result<(), Self::Error>;

    fn set_tx_power(&mut self, power: TxPower) -> Result<(), Self::Error>;

    fn status(&mut self) -> LinkStatus;

    fn local_ip(&self) -> Option<Ipv4Addr>;

    fn rssi(&self) -> Option<i8>;

    /// 802.11 reason code of the most recent disconnection, if the driver reports them.
    fn disconnect_reason(&self) -> Option<u16> {
        None
    }
}

/// Name of a common 802.11 disconnect reason code.
pub fn disconnect_reason_str(reason: u16) -> &'static str {
    match reason {
        1 => "UNSPECIFIED",
        2 => "AUTH_EXPIRE",
        3 => "AUTH_LEAVE",
        4 => "ASSOC_EXPIRE",
        8 => "ASSOC_LEAVE",
        15 => "4WAY_HANDSHAKE_TIMEOUT",
        17 => "AP_NOT_AUTHED",
        201 => "NO_AP_FOUND",
        _ => "?",
    }
}

/// Owns the wireless link and brings it up.
///
/// Reconnection after a loss is left to the driver, the supervisor only reports status.
pub struct NetworkSupervisor<W, K> {
    driver: W,
    clock: K,
    initialised: bool,
}

impl<W: WifiDriver, K: Clock> NetworkSupervisor<W, K> {
    pub fn new(driver: W, clock: K) -> Self {
        Self {
            driver,
            clock,
            initialised: false,
        }
    }

    pub fn begin(&mut self, settings: &RadioSettings) -> bool {
        match self.driver.init(settings) {
            Ok(()) => {
                info!(
                    "WiFi stack initialised ({}{}, channels {}-{}, power save {})",
                    settings.country[0] as char,
                    settings.country[1] as char,
                    settings.first_channel,
                    settings
                        .first_channel
                        .saturating_add(settings.channel_count)
                        .saturating_sub(1),
                    if settings.power_save { "on" } else { "off" }
                );
                self.initialised = true;
            }
            Err(e) => {
                error!("WiFi stack init failed: {:?}", e);
                self.initialised = false;
            }
        }
        self.initialised
    }

    /// Channel of the first scanned network with a matching SSID.
    pub fn scan_for_channel(&mut self, ssid: &str) -> Option<u8> {
        let networks = match self.driver.scan() {
            Ok(networks) => networks,
            Err(e) => {
                warn!("WiFi scan failed: {:?}", e);
                return None;
            }
        };

        info!("Scan done: {} networks", networks.len());
        for ap in &networks {
            debug!("{} ch={} rssi={}", ap.ssid, ap.channel, ap.rssi);
        }

        networks
            .iter()
            .find(|ap| ap.ssid == ssid)
            .map(|ap| ap.channel)
    }

    pub fn connect(
        &mut self,
        config: &WifiConfig,
        timeout_ms: Millis,
        delay: &mut impl DelayNs,
    ) -> ConnectResult {
        let (Some(ssid), Some(password)) = (config.ssid, config.password) else {
            error!("SSID or password not set");
            return ConnectResult::FailedStart;
        };

        if !self.initialised && !self.begin(&RadioSettings::default()) {
            return ConnectResult::FailedStart;
        }

        let configured_channel = (config.channel > 0).then_some(config.channel);
        let channel = if config.scan_for_channel {
            match self.scan_for_channel(ssid) {
                Some(channel) => Some(channel),
                None => {
                    warn!("\"{}\" not found in scan", ssid);
                    configured_channel
                }
            }
        } else {
            configured_channel
        };

        if let Some(static_ip) = &config.static_ip {
            let dns = static_ip.dns_servers();
            info!(
                "Using static IP {}, GW={}, DNS={}",
                static_ip.ip, static_ip.gateway, dns[0]
            );
            if let Err(e) = self.driver.configure_static_ip(static_ip, dns) {
                error!("Failed to apply static IP: {:?}", e);
                return ConnectResult::FailedStart;
            }
        }

        info!("Connecting to \"{}\" (ch={})", ssid, channel.unwrap_or(0));
        if let Err(e) = self.driver.begin(ssid, password, channel) {
            error!("Failed to start association: {:?}", e);
            return ConnectResult::FailedStart;
        }

        if config.tx_power_dbm > 0 {
            let power = TxPower::from_dbm(config.tx_power_dbm);
            match self.driver.set_tx_power(power) {
                Ok(()) => info!("Tx power set to {:?}", power),
                Err(e) => warn!("Failed to set tx power: {:?}", e),
            }
        }

        let started = self.clock.now_ms();
        let mut last = None;

        while elapsed(started, self.clock.now_ms()) < timeout_ms {
            let status = self.driver.status();
            if last != Some(status) {
                self.log_status(status);
                last = Some(status);
            }

            if status == LinkStatus::Connected {
                info!(
                    "Connected: IP={:?} RSSI={:?}",
                    self.driver.local_ip(),
                    self.driver.rssi()
                );
                return ConnectResult::Connected;
            }

            delay.delay_ms(STATUS_POLL_MS);
        }

        error!("Connect timeout after {} ms", timeout_ms);
        ConnectResult::Timeout
    }

    fn log_status(&self, status: LinkStatus) {
        match (status, self.driver.disconnect_reason()) {
            (LinkStatus::Disconnected | LinkStatus::ConnectionLost, Some(reason)) => warn!(
                "status={:?}, reason={} ({})",
                status,
                reason,
                disconnect_reason_str(reason)
            ),
            _ => info!("status={:?}", status),
        }
    }

    pub fn status(&mut self) -> LinkStatus {
        self.driver.status()
    }

    pub fn is_connected(&mut self) -> bool {
        self.status() == LinkStatus::Connected
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.driver.local_ip()
    }

    pub fn rssi(&self) -> Option<i8> {
        self.driver.rssi()
    }
}
