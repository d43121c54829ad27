use crate::clock::{elapsed, Millis};
use embedded_hal::digital::InputPin;
use log::{debug, warn};

/// Minimum time a new level has to be held before it is accepted.
pub const DEBOUNCE_MS: Millis = 20;

/// How the contact is wired when the button is at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    NormallyOpen,
    NormallyClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    PullUp,
    Floating,
}

/// Logical level change committed by the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// A push button or contact with time based debouncing.
pub struct DebouncedButton<P> {
    pin: P,
    active_high: bool,
    debounce_ms: Millis,

    pressed: bool,
    candidate: Option<(bool, Millis)>,
    edge: Option<Edge>,
}

impl<P: InputPin> DebouncedButton<P> {
    pub fn new(mut pin: P, polarity: Polarity, pull: Pull) -> Self {
        // A closed contact pulls the line low against the pull-up, so with a pull-up a
        // normally closed contact reads high while pressed. Without one the line is pulled
        // towards the supply when the contact closes.
        let active_high = matches!(
            (polarity, pull),
            (Polarity::NormallyClosed, Pull::PullUp) | (Polarity::NormallyOpen, Pull::Floating)
        );

        let pressed = match pin.is_high() {
            Ok(high) => high == active_high,
            Err(e) => {
                warn!("Failed to read initial button level: {:?}", e);
                false
            }
        };

        Self {
            pin,
            active_high,
            debounce_ms: DEBOUNCE_MS,
            pressed,
            candidate: None,
            edge: None,
        }
    }

    pub fn with_debounce(mut self, debounce_ms: Millis) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn update(&mut self, now: Millis) {
        self.edge = None;

        let reading = match self.pin.is_high() {
            Ok(high) => high == self.active_high,
            Err(e) => {
                debug!("Button read failed: {:?}", e);
                return;
            }
        };

        if reading == self.pressed {
            self.candidate = None;
            return;
        }

        match self.candidate {
            Some((level, since)) if level == reading => {
                if elapsed(since, now) >= self.debounce_ms {
                    self.pressed = reading;
                    self.candidate = None;
                    self.edge = Some(if reading { Edge::Rising } else { Edge::Falling });
                }
            }
            _ => self.candidate = Some((reading, now)),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Edge committed by the most recent call to [`update`](Self::update), if any.
    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }

    pub fn rising_edge(&self) -> bool {
        self.edge == Some(Edge::Rising)
    }

    pub fn falling_edge(&self) -> bool {
        self.edge == Some(Edge::Falling)
    }
}
