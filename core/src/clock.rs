/// Milliseconds since boot, wraps after roughly 49.7 days.
pub type Millis = u32;

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> Millis {
        (*self).now_ms()
    }
}

/// Time elapsed from `since` to `now`, correct across a single wrap of the counter.
pub fn elapsed(since: Millis, now: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Measures the time since it was last (re)started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    started: Millis,
}

impl Stopwatch {
    pub fn started_at(now: Millis) -> Self {
        Self { started: now }
    }

    pub fn restart(&mut self, now: Millis) {
        self.started = now;
    }

    pub fn elapsed_ms(&self, now: Millis) -> Millis {
        elapsed(self.started, now)
    }
}
