use coffee_telemetry_core::network::{
    wifi::MAX_SCAN_RESULTS, AccessPoint, LinkStatus, PhyProtocol, RadioSettings, StaticIpConfig,
    TxPower, WifiDriver,
};
use core::net::Ipv4Addr;
use esp_idf_svc::{
    ipv4::{self, ClientConfiguration as IpConfiguration, ClientSettings, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration},
    sys::{self, esp, EspError},
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};
use heapless::{String, Vec};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum WifiError {
    #[error(transparent)]
    Esp(#[from] EspError),
    #[error("{0} is too long")]
    TooLong(&'static str),
}

/// Station mode wireless driver on top of the esp-idf wifi stack.
pub(crate) struct EspWifiDriver {
    wifi: EspWifi<'static>,
}

impl EspWifiDriver {
    pub(crate) fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi }
    }
}

impl WifiDriver for EspWifiDriver {
    type Error = WifiError;

    fn init(&mut self, settings: &RadioSettings) -> Result<(), Self::Error> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;

        let [c0, c1] = settings.country;
        let country = sys::wifi_country_t {
            cc: [c0 as _, c1 as _, 0],
            schan: settings.first_channel,
            nchan: settings.channel_count,
            policy: sys::wifi_country_policy_t_WIFI_COUNTRY_POLICY_MANUAL,
            ..Default::default()
        };
        esp!(unsafe { sys::esp_wifi_set_country(&country) })?;

        let protocols = settings
            .protocols
            .iter()
            .map(|protocol| match protocol {
                PhyProtocol::B => sys::WIFI_PROTOCOL_11B,
                PhyProtocol::G => sys::WIFI_PROTOCOL_11G,
                PhyProtocol::N => sys::WIFI_PROTOCOL_11N,
            })
            .fold(0, |mask, bit| mask | bit);
        esp!(unsafe {
            sys::esp_wifi_set_protocol(sys::wifi_interface_t_WIFI_IF_STA, protocols as u8)
        })?;

        let power_save = if settings.power_save {
            sys::wifi_ps_type_t_WIFI_PS_MIN_MODEM
        } else {
            sys::wifi_ps_type_t_WIFI_PS_NONE
        };
        esp!(unsafe { sys::esp_wifi_set_ps(power_save) })?;

        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint, MAX_SCAN_RESULTS>, Self::Error> {
        let found = self.wifi.scan()?;
        debug!("Scan found {} networks", found.len());

        Ok(found
            .iter()
            .filter_map(|ap| {
                Some(AccessPoint {
                    ssid: String::try_from(ap.ssid.as_str()).ok()?,
                    channel: ap.channel,
                    rssi: ap.signal_strength,
                })
            })
            .take(MAX_SCAN_RESULTS)
            .collect())
    }

    fn configure_static_ip(
        &mut self,
        config: &StaticIpConfig,
        dns: [Ipv4Addr; 2],
    ) -> Result<(), Self::Error> {
        let mask = u32::from(config.subnet).count_ones() as u8;

        let netif = EspNetif::new_with_conf(&NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(IpConfiguration::Fixed(
                ClientSettings {
                    ip: config.ip,
                    subnet: Subnet {
                        gateway: config.gateway,
                        mask: Mask(mask),
                    },
                    dns: Some(dns[0]),
                    secondary_dns: Some(dns[1]),
                },
            ))),
            ..NetifConfiguration::wifi_default_client()
        })?;

        self.wifi.swap_netif_sta(netif)?;
        Ok(())
    }

    fn begin(
        &mut self,
        ssid: &str,
        password: &str,
        channel: Option<u8>,
    ) -> Result<(), Self::Error> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| WifiError::TooLong("SSID"))?,
                password: password
                    .try_into()
                    .map_err(|_| WifiError::TooLong("Password"))?,
                channel,
                auth_method,
                ..Default::default()
            }))?;

        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        Ok(())
    }

    fn set_tx_power(&mut self, power: TxPower) -> Result<(), Self::Error> {
        esp!(unsafe { sys::esp_wifi_set_max_tx_power(power.quarter_dbm()) })?;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match (self.wifi.is_connected(), self.wifi.is_up()) {
            (Ok(true), Ok(true)) => LinkStatus::Connected,
            // Associated, waiting for an address
            (Ok(true), _) => LinkStatus::Idle,
            (Ok(false), _) => LinkStatus::Disconnected,
            (Err(_), _) => LinkStatus::ConnectFailed,
        }
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    fn rssi(&self) -> Option<i8> {
        let mut info = sys::wifi_ap_record_t::default();
        esp!(unsafe { sys::esp_wifi_sta_get_ap_info(&mut info) })
            .ok()
            .map(|()| info.rssi)
    }
}
