use crate::clock::{elapsed, Millis};
use chrono::{DateTime, Datelike, Timelike};
use coffee_telemetry_protocol::TimestampString;
use core::fmt::Write;
use log::{debug, info, warn};

/// Remote wall clock, typically an NTP server.
pub trait TimeSource {
    type Error: core::fmt::Debug;

    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Current UTC time in seconds since the UNIX epoch.
    fn query(&mut self) -> Result<u64, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncConfig {
    pub update_interval_ms: Millis,

    /// Added to UTC to give local time.
    pub timezone_offset_s: i32,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 60_000,
            timezone_offset_s: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncPoint {
    /// Device uptime at the point when the time was queried.
    uptime_at_sync: Millis,

    /// UTC milliseconds since the UNIX epoch at the point when the time was queried.
    unix_ms_at_sync: u64,
}

impl SyncPoint {
    fn unix_ms(&self, now: Millis) -> u64 {
        self.unix_ms_at_sync + u64::from(self.age(now))
    }

    fn age(&self, now: Millis) -> Millis {
        elapsed(self.uptime_at_sync, now)
    }
}

/// Wall clock kept in step with a [`TimeSource`].
pub struct TimeSynchroniser<S> {
    source: S,
    config: TimeSyncConfig,

    started: bool,
    last_query: Option<Millis>,
    sync: Option<SyncPoint>,
}

impl<S: TimeSource> TimeSynchroniser<S> {
    pub fn new(source: S, config: TimeSyncConfig) -> Self {
        Self {
            source,
            config,
            started: false,
            last_query: None,
            sync: None,
        }
    }

    /// Must be called once before [`update`](Self::update) has any effect.
    pub fn begin(&mut self) -> bool {
        match self.source.begin() {
            Ok(()) => {
                info!("Time sync started");
                self.started = true;
            }
            Err(e) => warn!("Time source init failed: {:?}", e),
        }
        self.started
    }

    pub fn update(&mut self, now: Millis) {
        if !self.started {
            return;
        }

        if let Some(last) = self.last_query {
            if elapsed(last, now) < self.config.update_interval_ms {
                return;
            }
        }
        self.last_query = Some(now);

        match self.source.query() {
            Ok(unix) => {
                if self.sync.is_none() {
                    info!("Time synchronised, UNIX time {}", unix);
                }
                self.sync = Some(SyncPoint {
                    uptime_at_sync: now,
                    unix_ms_at_sync: unix.saturating_mul(1000),
                });
            }
            Err(e) => debug!("Time query failed: {:?}", e),
        }
    }

    pub fn is_synchronised(&self) -> bool {
        self.sync.is_some()
    }

    /// Local time in seconds since the UNIX epoch.
    pub fn epoch_seconds(&self, now: Millis) -> Option<u64> {
        self.sync.map(|sync| {
            (sync.unix_ms(now) / 1000).saturating_add_signed(self.config.timezone_offset_s.into())
        })
    }

    /// Local time as `YYYY-MM-DDTHH:MM:SS`, empty until the first successful sync.
    pub fn formatted_time(&self, now: Millis) -> TimestampString {
        let mut s = TimestampString::new();

        let Some(time) = self
            .epoch_seconds(now)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        else {
            return s;
        };

        if write!(
            s,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            time.year(),
            time.month(),
            time.day(),
            time.hour(),
            time.minute(),
            time.second()
        )
        .is_err()
        {
            s.clear();
        }

        s
    }
}
