//! Playback engine
//!
//! Walks a pattern step sequence or a merged timeline, performing waits and
//! actuator writes. Every wait is sliced into `poll_interval` pieces and every
//! write is preceded by [`ControlState::should_continue`], so a stale
//! execution stops within one poll interval and never writes after its ticket
//! went stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::types::{ControlState, EngineOptions, ExecutionTicket, RunOutcome};
use crate::actuator::{ActuatorError, ActuatorPort, Clock};
use crate::error::LumitoneError;
use crate::pattern::PatternStep;
use crate::timeline::{NoteKind, Timeline};
use crate::tone::{pitch_to_frequency, ToneGenerator};

/// Velocity that maps to full brightness
const FULL_BRIGHTNESS_VELOCITY: f64 = 100.0;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct PlaybackEngine {
    port: Arc<dyn ActuatorPort>,
    clock: Arc<dyn Clock>,
    tone: ToneGenerator,
    state: Arc<ControlState>,
    options: EngineOptions,
}

impl PlaybackEngine {
    pub fn new(
        port: Arc<dyn ActuatorPort>,
        clock: Arc<dyn Clock>,
        state: Arc<ControlState>,
        mut options: EngineOptions,
    ) -> Self {
        options.poll_interval = options.poll_interval.max(MIN_POLL_INTERVAL);
        options.idle_brightness = options.idle_brightness.clamp(0.0, 1.0);
        Self {
            tone: ToneGenerator::new(port.clone(), clock.clone()),
            port,
            clock,
            state,
            options,
        }
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn should_continue(&self, ticket: &ExecutionTicket) -> bool {
        self.state.should_continue(ticket)
    }

    /// Force both outputs off, logging (not returning) a failure.
    pub fn release(&self) {
        if let Err(e) = self.port.safe_off() {
            log::error!("could not release outputs: {}", e);
        }
    }

    /// Sleep for `duration` in poll-interval slices. Returns `false` as soon
    /// as `ticket` goes stale.
    fn wait(&self, ticket: &ExecutionTicket, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if !self.should_continue(ticket) {
                return false;
            }
            let slice = remaining.min(self.options.poll_interval);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        self.should_continue(ticket)
    }

    /// Run pattern steps until they run out or `ticket` goes stale.
    ///
    /// Pattern sequences are usually endless, so the normal way out is
    /// [`RunOutcome::Interrupted`].
    ///
    /// # Errors
    /// A failed write ends the run with [`LumitoneError::ActuatorIo`]; the
    /// outputs are released first.
    pub fn run_pattern(
        &self,
        ticket: &ExecutionTicket,
        steps: impl IntoIterator<Item = PatternStep>,
    ) -> Result<RunOutcome, LumitoneError> {
        for step in steps {
            if !self.should_continue(ticket) {
                log::debug!("{} pattern interrupted (generation {})", ticket.mode, ticket.generation);
                return Ok(RunOutcome::Interrupted);
            }
            match step {
                PatternStep::Brightness(level) => {
                    if let Err(e) = self.port.set_brightness(level) {
                        self.release();
                        return Err(e.into());
                    }
                }
                PatternStep::Hold(duration) => {
                    if !self.wait(ticket, duration) {
                        log::debug!("{} pattern interrupted mid-hold", ticket.mode);
                        return Ok(RunOutcome::Interrupted);
                    }
                }
            }
        }
        Ok(RunOutcome::Completed)
    }

    /// Play a timeline: light follows velocity, each note-on gets a tone
    /// burst, and the light dims to idle when the last note ends.
    ///
    /// Both outputs are off when this returns, whatever the outcome.
    ///
    /// # Errors
    /// A failed write ends playback with [`LumitoneError::ActuatorIo`].
    pub fn run_timeline(
        &self,
        ticket: &ExecutionTicket,
        timeline: &Timeline,
    ) -> Result<RunOutcome, LumitoneError> {
        let played = self.play_events(ticket, timeline);
        let released = self.port.safe_off();
        match (played, released) {
            (Err(e), released) => {
                if let Err(release_error) = released {
                    log::error!("could not release outputs: {}", release_error);
                }
                Err(e.into())
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Ok(outcome), Ok(())) => Ok(outcome),
        }
    }

    fn play_events(&self, ticket: &ExecutionTicket, timeline: &Timeline) -> Result<RunOutcome, ActuatorError> {
        let mut active_notes: HashMap<u8, u8> = HashMap::new();
        let mut previous_tick = 0;
        let burst_s = self.options.tone_burst.as_secs_f64();

        for event in timeline.events() {
            let delay = timeline.delay_between(previous_tick, event.tick);
            previous_tick = event.tick;
            if !self.wait(ticket, delay) {
                log::debug!("timeline interrupted at tick {}", event.tick);
                return Ok(RunOutcome::Interrupted);
            }

            match event.kind {
                NoteKind::NoteOn => {
                    active_notes.insert(event.pitch, event.velocity);
                    let level = (event.velocity as f64 / FULL_BRIGHTNESS_VELOCITY).min(1.0);
                    self.port.set_brightness(level)?;
                    let finished = self.tone.play_tone_while(pitch_to_frequency(event.pitch), burst_s, || {
                        self.should_continue(ticket)
                    })?;
                    if !finished {
                        log::debug!("timeline interrupted during tone at tick {}", event.tick);
                        return Ok(RunOutcome::Interrupted);
                    }
                }
                NoteKind::NoteOff => {
                    if active_notes.remove(&event.pitch).is_some() && active_notes.is_empty() {
                        self.port.set_brightness(self.options.idle_brightness)?;
                    }
                }
            }
        }

        Ok(RunOutcome::Completed)
    }
}
