use coffee_telemetry_core::time::TimeSource;
use esp_idf_svc::{
    sntp::{EspSntp, SntpConf, SyncStatus},
    sys::EspError,
};
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum TimeError {
    #[error(transparent)]
    Esp(#[from] EspError),
    #[error(transparent)]
    SystemTime(#[from] SystemTimeError),
    #[error("SNTP not started")]
    NotStarted,
    #[error("Not synchronised yet")]
    NotSynchronised,
}

/// Wall clock from the esp-idf SNTP client, which sets the system time in the background.
pub(crate) struct EspTimeSource {
    server: &'static str,
    sntp: Option<EspSntp<'static>>,
    synchronised: bool,
}

impl EspTimeSource {
    pub(crate) fn new(server: &'static str) -> Self {
        Self {
            server,
            sntp: None,
            synchronised: false,
        }
    }
}

impl TimeSource for EspTimeSource {
    type Error = TimeError;

    fn begin(&mut self) -> Result<(), Self::Error> {
        let mut conf = SntpConf::default();
        conf.servers[0] = self.server;

        self.sntp = Some(EspSntp::new(&conf)?);
        Ok(())
    }

    fn query(&mut self) -> Result<u64, Self::Error> {
        let sntp = self.sntp.as_ref().ok_or(TimeError::NotStarted)?;

        // The system time stays valid once set, later syncs only correct drift
        if matches!(sntp.get_sync_status(), SyncStatus::Completed) {
            self.synchronised = true;
        }
        if !self.synchronised {
            return Err(TimeError::NotSynchronised);
        }

        Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
    }
}
