use super::{
    analog::{AdcChannel, AnalogRead},
    button::Edge,
};
use crate::clock::{elapsed, Millis};
use coffee_telemetry_protocol::LightState;
use heapless::Deque;
use log::{info, warn};

/// Edges remembered at most, older ones are dropped first.
pub const EDGE_HISTORY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkConfig {
    /// Raw level at or above which the lamp counts as lit.
    pub mid_threshold: u16,

    /// Sliding window over which edges are counted.
    pub window_ms: Millis,

    /// Edges within the window needed to call the lamp blinking, 1..=[`EDGE_HISTORY`].
    pub edge_count: usize,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            mid_threshold: 10000,
            window_ms: 1500,
            edge_count: 3,
        }
    }
}

/// Classifies a light dependent resistor channel as off, steadily on or blinking.
#[derive(Debug, Clone)]
pub struct BlinkSensor {
    config: BlinkConfig,

    lit: Option<bool>,
    lit_since: Millis,
    /// Time and direction of each lit level change, `Rising` when the lamp came on.
    edges: Deque<(Millis, Edge), EDGE_HISTORY>,

    state: LightState,
}

impl BlinkSensor {
    pub fn new(mut config: BlinkConfig) -> Self {
        let edge_count = config.edge_count.clamp(1, EDGE_HISTORY);
        if edge_count != config.edge_count {
            warn!(
                "Blink edge count {} out of range, using {}",
                config.edge_count, edge_count
            );
            config.edge_count = edge_count;
        }

        Self {
            config,
            lit: None,
            lit_since: 0,
            edges: Deque::new(),
            state: LightState::Off,
        }
    }

    pub fn update(&mut self, sampler: &impl AnalogRead, channel: AdcChannel, now: Millis) {
        self.update_value(sampler.read(channel), now);
    }

    pub fn update_value(&mut self, value: u16, now: Millis) {
        let lit = value >= self.config.mid_threshold;

        match self.lit {
            // The very first sample only establishes the level
            None => {
                self.lit = Some(lit);
                self.lit_since = now;
            }
            Some(previous) if previous != lit => {
                self.record_edge(now, if lit { Edge::Rising } else { Edge::Falling });
                self.lit = Some(lit);
                self.lit_since = now;
            }
            Some(_) => {}
        }

        while let Some(&(at, _)) = self.edges.front() {
            if elapsed(at, now) > self.config.window_ms {
                self.edges.pop_front();
            } else {
                break;
            }
        }

        let state = if self.edges.len() >= self.config.edge_count {
            LightState::Blink
        } else if lit && elapsed(self.lit_since, now) >= self.config.window_ms {
            LightState::On
        } else {
            LightState::Off
        };

        if state != self.state {
            info!("Light {} -> {}", self.state.as_str(), state.as_str());
            self.state = state;
        }
    }

    fn record_edge(&mut self, now: Millis, edge: Edge) {
        if self.edges.is_full() {
            self.edges.pop_front();
        }
        let _ = self.edges.push_back((now, edge));
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    pub fn state_str(&self) -> &'static str {
        self.state.as_str()
    }
}

impl Default for BlinkSensor {
    fn default() -> Self {
        Self::new(BlinkConfig::default())
    }
}
