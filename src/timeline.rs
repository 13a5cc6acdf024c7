//! # Timeline
//!
//! One merged, time-ordered stream of note events built from a multi-track
//! [`MidiSource`].
//!
//! ## Merge Order
//! Events from all tracks are sorted by absolute tick. At equal ticks note-offs
//! come before note-ons, so a note ending exactly when another starts never
//! overlaps it; remaining ties keep source track order.
//!
//! ## Tempo
//! Tempo is piecewise constant. Without tempo meta-events it is 500000 µs per
//! beat (120 BPM). A tempo change at tick `t` applies from `t` onward, and the
//! wall-clock length of the gap between two events uses the tempo active at
//! the start of the gap:
//!
//! ```text
//! delay = (tick_delta / ticks_per_beat) * (tempo_us / 1_000_000) seconds
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lumitone::{NoteEvent, NoteKind, Timeline};
//!
//! let timeline = Timeline::new(
//!     480,
//!     vec![
//!         NoteEvent::new(0, NoteKind::NoteOn, 69, 100),
//!         NoteEvent::new(480, NoteKind::NoteOff, 69, 0),
//!     ],
//!     vec![],
//! )?;
//! assert_eq!(timeline.delay_between(0, 480), Duration::from_millis(500));
//! # Ok::<(), lumitone::LumitoneError>(())
//! ```

use serde::Serialize;
use std::time::Duration;

use crate::error::LumitoneError;
use crate::source::{MessageKind, MidiSource};

/// Tempo used until the first tempo change: 120 BPM
pub const DEFAULT_TEMPO_US: u32 = 500_000;

/// Note event kind. The derived order puts `NoteOff` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteKind {
    NoteOff,
    NoteOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Ticks since the start of the song
    pub tick: u64,
    pub kind: NoteKind,
    pub pitch: u8,
    pub velocity: u8,
    /// Index of the source track the event came from
    pub track: usize,
}

impl NoteEvent {
    pub fn new(tick: u64, kind: NoteKind, pitch: u8, velocity: u8) -> Self {
        Self {
            tick,
            kind,
            pitch,
            velocity,
            track: 0,
        }
    }

    pub fn on_track(mut self, track: usize) -> Self {
        self.track = track;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_beat: u32,
}

/// A merged note timeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    ticks_per_beat: u32,
    events: Vec<NoteEvent>,
    tempo_changes: Vec<TempoChange>,
}

impl Timeline {
    /// Build a timeline from already-absolute events, putting them in canonical order.
    ///
    /// # Errors
    /// Returns [`LumitoneError::MalformedSource`] if `ticks_per_beat` is zero.
    pub fn new(
        ticks_per_beat: u32,
        mut events: Vec<NoteEvent>,
        mut tempo_changes: Vec<TempoChange>,
    ) -> Result<Self, LumitoneError> {
        if ticks_per_beat == 0 {
            return Err(LumitoneError::MalformedSource(
                "ticks per beat must be positive".to_string(),
            ));
        }
        events.sort_by_key(|e| (e.tick, e.kind));
        tempo_changes.sort_by_key(|t| t.tick);
        Ok(Self {
            ticks_per_beat,
            events,
            tempo_changes,
        })
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    pub fn tempo_changes(&self) -> &[TempoChange] {
        &self.tempo_changes
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Microseconds per beat in effect at `tick`
    pub fn tempo_at(&self, tick: u64) -> u32 {
        let in_effect = self.tempo_changes.partition_point(|t| t.tick <= tick);
        match in_effect {
            0 => DEFAULT_TEMPO_US,
            n => self.tempo_changes[n - 1].micros_per_beat,
        }
    }

    pub fn bpm_at(&self, tick: u64) -> f64 {
        60_000_000.0 / self.tempo_at(tick) as f64
    }

    /// Wall-clock time between two ticks, at the tempo active at `from`.
    ///
    /// Returns zero if `to` is not after `from`.
    pub fn delay_between(&self, from: u64, to: u64) -> Duration {
        let ticks = to.saturating_sub(from) as u128;
        let nanos = ticks * self.tempo_at(from) as u128 * 1_000 / self.ticks_per_beat as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    /// Wall-clock time from the start of the song to its last event
    pub fn duration(&self) -> Duration {
        let mut previous = 0;
        let mut total = Duration::ZERO;
        for event in &self.events {
            total += self.delay_between(previous, event.tick);
            previous = event.tick;
        }
        total
    }
}

/// Merges the tracks of a [`MidiSource`] into a [`Timeline`].
pub struct TimelineBuilder;

impl TimelineBuilder {
    /// Build the merged timeline for `source`.
    ///
    /// Only note-ons with velocity above zero become `NoteOn`; note-offs and
    /// zero-velocity note-ons become `NoteOff`. Everything else only advances
    /// the track's tick counter.
    ///
    /// # Errors
    /// Returns [`LumitoneError::MalformedSource`] if the source has no tracks
    /// or its ticks per beat is zero.
    pub fn build(source: &MidiSource) -> Result<Timeline, LumitoneError> {
        if source.tracks.is_empty() {
            return Err(LumitoneError::MalformedSource(
                "source declares zero tracks".to_string(),
            ));
        }
        if source.ticks_per_beat == 0 {
            return Err(LumitoneError::MalformedSource(
                "ticks per beat must be positive".to_string(),
            ));
        }

        let mut events = Vec::new();
        let mut tempo_changes = Vec::new();

        for (track_index, track) in source.tracks.iter().enumerate() {
            let mut tick: u64 = 0;
            for message in &track.messages {
                tick += message.delta as u64;
                match message.kind {
                    MessageKind::NoteOn { pitch, velocity } if velocity > 0 => {
                        events.push(NoteEvent::new(tick, NoteKind::NoteOn, pitch, velocity).on_track(track_index));
                    }
                    MessageKind::NoteOn { pitch, velocity } | MessageKind::NoteOff { pitch, velocity } => {
                        events.push(NoteEvent::new(tick, NoteKind::NoteOff, pitch, velocity).on_track(track_index));
                    }
                    MessageKind::Tempo(micros_per_beat) => {
                        tempo_changes.push(TempoChange { tick, micros_per_beat });
                    }
                    MessageKind::Other => {}
                }
            }
        }

        let timeline = Timeline::new(source.ticks_per_beat as u32, events, tempo_changes)?;
        log::debug!(
            "built timeline: {} events, {} tempo changes, {:.1}s",
            timeline.events.len(),
            timeline.tempo_changes.len(),
            timeline.duration().as_secs_f64()
        );
        Ok(timeline)
    }
}
