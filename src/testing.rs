//! Test doubles for the actuator outputs and the clock.
//!
//! [`VirtualClock`] never blocks: `sleep` just advances a counter, so timing
//! assertions are exact. [`RecordingPort`] stamps every write with the time of
//! whatever clock it was given.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actuator::{ActuatorError, ActuatorPort, Clock, Output};
use crate::playback::lock;

/// A clock whose time only moves when someone sleeps on it
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    pub fn total_slept(&self) -> Duration {
        lock(&self.sleeps).iter().sum()
    }
}

impl Clock for VirtualClock {
    fn sleep(&self, duration: Duration) {
        *lock(&self.now) += duration;
        lock(&self.sleeps).push(duration);
    }

    fn elapsed(&self) -> Duration {
        *lock(&self.now)
    }
}

/// A single recorded write
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortWrite {
    Brightness(f64),
    Tone(bool),
}

/// A write together with the clock time it happened at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedWrite {
    pub at: Duration,
    pub write: PortWrite,
}

/// Port that records every write, optionally failing after a number of them
pub struct RecordingPort {
    clock: Arc<dyn Clock>,
    writes: Mutex<Vec<StampedWrite>>,
    fail_after: Option<usize>,
    attempts: AtomicUsize,
}

impl RecordingPort {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            writes: Mutex::new(Vec::new()),
            fail_after: None,
            attempts: AtomicUsize::new(0),
        }
    }

    /// A port whose writes start failing once `successful` writes went through.
    pub fn failing_after(clock: Arc<dyn Clock>, successful: usize) -> Self {
        Self {
            fail_after: Some(successful),
            ..Self::new(clock)
        }
    }

    pub fn writes(&self) -> Vec<StampedWrite> {
        lock(&self.writes).clone()
    }

    pub fn clear(&self) {
        lock(&self.writes).clear();
    }

    pub fn brightness_levels(&self) -> Vec<f64> {
        lock(&self.writes)
            .iter()
            .filter_map(|w| match w.write {
                PortWrite::Brightness(level) => Some(level),
                PortWrite::Tone(_) => None,
            })
            .collect()
    }

    /// Number of LOW→HIGH transitions written to the tone output
    pub fn tone_pulses(&self) -> usize {
        lock(&self.writes)
            .iter()
            .filter(|w| w.write == PortWrite::Tone(true))
            .count()
    }

    pub fn last_brightness(&self) -> Option<f64> {
        self.brightness_levels().last().copied()
    }

    pub fn last_tone(&self) -> Option<bool> {
        lock(&self.writes).iter().rev().find_map(|w| match w.write {
            PortWrite::Tone(high) => Some(high),
            PortWrite::Brightness(_) => None,
        })
    }

    fn record(&self, output: Output, write: PortWrite) -> Result<(), ActuatorError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if attempt >= limit {
                return Err(ActuatorError::new(output, "simulated write failure"));
            }
        }
        let at = self.clock.elapsed();
        lock(&self.writes).push(StampedWrite { at, write });
        Ok(())
    }
}

impl ActuatorPort for RecordingPort {
    fn set_brightness(&self, level: f64) -> Result<(), ActuatorError> {
        self.record(Output::Brightness, PortWrite::Brightness(level.clamp(0.0, 1.0)))
    }

    fn set_tone(&self, high: bool) -> Result<(), ActuatorError> {
        self.record(Output::Tone, PortWrite::Tone(high))
    }
}
