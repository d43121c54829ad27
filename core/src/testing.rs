//! Test doubles for the hardware and network collaborators.

use crate::{
    clock::{Clock, Millis},
    network::{BrokerClient, BrokerConfig},
    sensors::{AdcChannel, AnalogFrontEnd, Sample},
    time::TimeSource,
};
use core::{cell::Cell, convert::Infallible};
use embedded_hal::{delay::DelayNs, digital::ErrorType};
use enumset::EnumSet;
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    string::{String, ToString},
    vec::Vec,
};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    nanos: Cell<u64>,
}

impl ManualClock {
    pub(crate) fn set_ms(&self, ms: Millis) {
        self.nanos.set(u64::from(ms) * 1_000_000);
    }

    pub(crate) fn advance_ms(&self, ms: Millis) {
        self.advance_ns(u64::from(ms) * 1_000_000);
    }

    fn advance_ns(&self, ns: u64) {
        self.nanos.set(self.nanos.get() + ns);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        (self.nanos.get() / 1_000_000) as Millis
    }
}

/// Delay that advances a [`ManualClock`] instead of waiting.
pub(crate) struct ManualDelay<'a> {
    clock: &'a ManualClock,
}

impl<'a> ManualDelay<'a> {
    pub(crate) fn new(clock: &'a ManualClock) -> Self {
        Self { clock }
    }
}

impl DelayNs for ManualDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance_ns(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(ms);
    }
}

/// Input pin whose level is set by the test.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedPin {
    high: Rc<Cell<bool>>,
}

impl ScriptedPin {
    pub(crate) fn new(high: bool) -> Self {
        Self {
            high: Rc::new(Cell::new(high)),
        }
    }

    pub(crate) fn set(&self, high: bool) {
        self.high.set(high);
    }
}

impl ErrorType for ScriptedPin {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.get())
    }
}

#[derive(Debug, Default)]
struct FrontEndState {
    pending: VecDeque<Sample>,
    channels: Option<EnumSet<AdcChannel>>,
    fail_init: bool,
    fail_reads: bool,
}

/// Analog front end fed with samples by the test.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScriptedFrontEnd(Rc<RefCell<FrontEndState>>);

impl ScriptedFrontEnd {
    pub(crate) fn push(&self, sample: Sample) {
        self.0.borrow_mut().pending.push_back(sample);
    }

    pub(crate) fn fail_init(&self, fail: bool) {
        self.0.borrow_mut().fail_init = fail;
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.0.borrow_mut().fail_reads = fail;
    }

    pub(crate) fn channels(&self) -> Option<EnumSet<AdcChannel>> {
        self.0.borrow().channels
    }
}

impl AnalogFrontEnd for ScriptedFrontEnd {
    type Error = &'static str;

    fn init(&mut self, channels: EnumSet<AdcChannel>) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.fail_init {
            return Err("no ack");
        }
        state.channels = Some(channels);
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Sample>, Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.fail_reads {
            return Err("bus error");
        }
        Ok(state.pending.pop_front())
    }
}

#[derive(Debug)]
struct BrokerState {
    accept: bool,
    connected: bool,
    attempts: usize,
    polls: usize,
    client_id: Option<String>,
    published: Vec<(String, Vec<u8>, bool)>,
    subscriptions: Vec<String>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            accept: true,
            connected: false,
            attempts: 0,
            polls: 0,
            client_id: None,
            published: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}

/// Broker client that records everything sent through it.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScriptedBroker(Rc<RefCell<BrokerState>>);

impl ScriptedBroker {
    /// Whether the next connection attempts succeed.
    pub(crate) fn accept(&self, accept: bool) {
        self.0.borrow_mut().accept = accept;
    }

    pub(crate) fn drop_connection(&self) {
        self.0.borrow_mut().connected = false;
    }

    pub(crate) fn attempts(&self) -> usize {
        self.0.borrow().attempts
    }

    pub(crate) fn polls(&self) -> usize {
        self.0.borrow().polls
    }

    pub(crate) fn last_client_id(&self) -> Option<String> {
        self.0.borrow().client_id.clone()
    }

    pub(crate) fn published(&self) -> Vec<(String, Vec<u8>, bool)> {
        self.0.borrow().published.clone()
    }

    pub(crate) fn subscriptions(&self) -> Vec<String> {
        self.0.borrow().subscriptions.clone()
    }
}

impl BrokerClient for ScriptedBroker {
    type Error = &'static str;

    fn connect(&mut self, _config: &BrokerConfig, client_id: &str) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        state.attempts += 1;
        state.client_id = Some(client_id.to_string());
        if state.accept {
            state.connected = true;
            Ok(())
        } else {
            Err("connection refused")
        }
    }

    fn connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn poll(&mut self) {
        self.0.borrow_mut().polls += 1;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if !state.connected {
            return Err("not connected");
        }
        state
            .published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if !state.connected {
            return Err("not connected");
        }
        state.subscriptions.push(topic.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TimeSourceState {
    response: Option<u64>,
    fail_begin: bool,
    queries: usize,
}

/// Time source answering with whatever the test last set.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScriptedTimeSource(Rc<RefCell<TimeSourceState>>);

impl ScriptedTimeSource {
    /// `None` makes queries fail.
    pub(crate) fn respond(&self, unix: Option<u64>) {
        self.0.borrow_mut().response = unix;
    }

    pub(crate) fn fail_begin(&self, fail: bool) {
        self.0.borrow_mut().fail_begin = fail;
    }

    pub(crate) fn queries(&self) -> usize {
        self.0.borrow().queries
    }
}

impl TimeSource for ScriptedTimeSource {
    type Error = &'static str;

    fn begin(&mut self) -> Result<(), Self::Error> {
        if self.0.borrow().fail_begin {
            Err("socket")
        } else {
            Ok(())
        }
    }

    fn query(&mut self) -> Result<u64, Self::Error> {
        let mut state = self.0.borrow_mut();
        state.queries += 1;
        state.response.ok_or("timeout")
    }
}
