use coffee_telemetry_core::{Clock, Millis};
use esp_idf_svc::systime::EspSystemTime;

/// Milliseconds since boot from the esp-idf system timer.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> Millis {
        EspSystemTime.now().as_millis() as Millis
    }
}
