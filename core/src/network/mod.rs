pub mod mqtt;
pub mod wifi;

pub use self::{
    mqtt::{BrokerClient, BrokerConfig, BrokerSupervisor, Credentials, SessionState},
    wifi::{
        AccessPoint, ConnectResult, LinkStatus, NetworkSupervisor, PhyProtocol, RadioSettings,
        StaticIpConfig, TxPower, WifiConfig, WifiDriver,
    },
};
