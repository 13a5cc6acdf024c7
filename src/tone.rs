//! # Tone Generator
//!
//! Software square-wave synthesis on the binary tone output.
//!
//! A tone of `f` Hz lasting `d` seconds is `floor(d * f)` cycles, each one
//! HIGH for half a period and LOW for the other half. The output is always LOW
//! when a call returns. A frequency of zero (or below) is a rest: the call just
//! waits for the duration without touching the output.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lumitone::testing::{RecordingPort, VirtualClock};
//! use lumitone::ToneGenerator;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let port = Arc::new(RecordingPort::new(clock.clone()));
//! let tone = ToneGenerator::new(port.clone(), clock.clone());
//!
//! tone.play_tone(20.0, 0.25).unwrap();
//! assert_eq!(port.tone_pulses(), 5);
//! assert_eq!(port.last_tone(), Some(false));
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::actuator::{ActuatorError, ActuatorPort, Clock};

/// MIDI note number of concert A
const A4_PITCH: f64 = 69.0;
const A4_FREQUENCY_HZ: f64 = 440.0;

/// Equal-tempered frequency of a MIDI pitch: `440 * 2^((pitch - 69) / 12)`
pub fn pitch_to_frequency(pitch: u8) -> f64 {
    A4_FREQUENCY_HZ * 2f64.powf((pitch as f64 - A4_PITCH) / 12.0)
}

/// `seconds` as a `Duration`, saturating at `Duration::MAX`
fn saturating_secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

pub struct ToneGenerator {
    port: Arc<dyn ActuatorPort>,
    clock: Arc<dyn Clock>,
}

impl ToneGenerator {
    pub fn new(port: Arc<dyn ActuatorPort>, clock: Arc<dyn Clock>) -> Self {
        Self { port, clock }
    }

    /// Play a square wave for `duration_s` seconds.
    ///
    /// Negative durations are treated as zero.
    ///
    /// # Errors
    /// Returns the first failed write to the tone output. Nothing is retried.
    pub fn play_tone(&self, frequency_hz: f64, duration_s: f64) -> Result<(), ActuatorError> {
        self.play_tone_while(frequency_hz, duration_s, || true).map(|_| ())
    }

    /// Like [`play_tone`](Self::play_tone), but asks `keep_going` before every
    /// cycle and stops early when it answers `false`.
    ///
    /// Returns `Ok(true)` when the full tone was played. The output is LOW
    /// either way, since every cycle ends LOW.
    pub fn play_tone_while(
        &self,
        frequency_hz: f64,
        duration_s: f64,
        keep_going: impl Fn() -> bool,
    ) -> Result<bool, ActuatorError> {
        let duration_s = if duration_s.is_finite() { duration_s.max(0.0) } else { 0.0 };

        if frequency_hz <= 0.0 || !frequency_hz.is_finite() {
            self.clock.sleep(saturating_secs(duration_s));
            return Ok(true);
        }

        let cycle_count = (duration_s * frequency_hz).floor() as u64;
        if cycle_count == 0 {
            self.port.set_tone(false)?;
            return Ok(true);
        }
        let half_period = saturating_secs(0.5 / frequency_hz);

        for _ in 0..cycle_count {
            if !keep_going() {
                return Ok(false);
            }
            self.port.set_tone(true)?;
            self.clock.sleep(half_period);
            self.port.set_tone(false)?;
            self.clock.sleep(half_period);
        }

        Ok(true)
    }
}
