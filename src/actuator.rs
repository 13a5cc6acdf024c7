//! # Actuator Ports
//!
//! The two physical outputs the engine drives, and the clock it waits on.
//!
//! ## Outputs
//! - **Brightness** - a continuously-variable output in `[0.0, 1.0]` (a PWM-driven light)
//! - **Tone** - a binary output toggled at audio rate to synthesize square waves
//!
//! Ports take `&self` so one port can be shared by the background pattern
//! thread and a timeline thread. Board-specific bindings implement
//! [`ActuatorPort`]; this crate ships [`LogPort`] for running without hardware
//! and the recording doubles in [`crate::testing`].
//!
//! ## Clock
//! Every wait in the engine goes through [`Clock::sleep`], so tests can swap in
//! a virtual clock and measure timing exactly.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::playback::lock;

/// Which physical output a write targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    Brightness,
    Tone,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Brightness => write!(f, "brightness"),
            Output::Tone => write!(f, "tone"),
        }
    }
}

/// A failed write to a physical output. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{output} write failed: {message}")]
pub struct ActuatorError {
    pub output: Output,
    pub message: String,
}

impl ActuatorError {
    pub fn new(output: Output, message: impl Into<String>) -> Self {
        Self {
            output,
            message: message.into(),
        }
    }
}

/// The light and tone outputs of the controller.
pub trait ActuatorPort: Send + Sync {
    /// Set the light level. Implementations clamp `level` to `[0.0, 1.0]`.
    fn set_brightness(&self, level: f64) -> Result<(), ActuatorError>;

    /// Drive the tone output high or low.
    fn set_tone(&self, high: bool) -> Result<(), ActuatorError>;

    /// Force both outputs to their safe-off state (light dark, tone LOW).
    ///
    /// Both writes are attempted even if the first fails; the first failure
    /// is returned.
    fn safe_off(&self) -> Result<(), ActuatorError> {
        let light = self.set_brightness(0.0);
        let tone = self.set_tone(false);
        light.and(tone)
    }
}

/// Source of waits for the engine.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);

    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Port that writes to the log instead of hardware.
///
/// Brightness changes are logged at `debug`, tone toggles at `trace` (they
/// happen hundreds of times per second).
#[derive(Debug, Default)]
pub struct LogPort {
    levels: Mutex<(f64, bool)>,
}

impl LogPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written (brightness, tone) pair
    pub fn current(&self) -> (f64, bool) {
        *lock(&self.levels)
    }
}

impl ActuatorPort for LogPort {
    fn set_brightness(&self, level: f64) -> Result<(), ActuatorError> {
        let level = level.clamp(0.0, 1.0);
        log::debug!("light -> {:.2}", level);
        lock(&self.levels).0 = level;
        Ok(())
    }

    fn set_tone(&self, high: bool) -> Result<(), ActuatorError> {
        log::trace!("tone -> {}", if high { "HIGH" } else { "LOW" });
        lock(&self.levels).1 = high;
        Ok(())
    }
}
