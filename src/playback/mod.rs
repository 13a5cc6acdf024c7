//! # Playback Module
//!
//! Turns pattern step sequences and merged timelines into timed actuator
//! writes, cooperatively cancellable between any two steps.
//!
//! ## Sub-modules
//! - `types` - Mode, ControlState, ExecutionTicket, RunOutcome, EngineOptions
//! - `engine` - the PlaybackEngine with its two entry points
//!
//! ## Entry Points
//! - [`PlaybackEngine::run_pattern`] - consume pattern steps until the run goes stale
//! - [`PlaybackEngine::run_timeline`] - play a timeline, always ending with both outputs off
//!
//! ## Cancellation Model
//!
//! Every execution starts with an [`ExecutionTicket`] taken from the shared
//! [`ControlState`]. The engine asks [`ControlState::should_continue`] before
//! every write and between every wait slice. A ticket goes stale when:
//! - the cancellation flag is raised,
//! - the generation counter moved past it (a newer execution was handed the outputs),
//! - the mode differs from the one the run started under,
//! - the controller is shutting down.
//!
//! Patterns and timelines never check any of this themselves.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lumitone::playback::{ControlState, EngineOptions, Mode, PlaybackEngine, RunOutcome};
//! use lumitone::testing::{RecordingPort, VirtualClock};
//! use lumitone::{PatternLibrary, Pattern};
//!
//! let clock = Arc::new(VirtualClock::new());
//! let port = Arc::new(RecordingPort::new(clock.clone()));
//! let state = Arc::new(ControlState::new(Mode::Fade));
//! let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());
//!
//! // One period of the fade pattern, run to completion
//! let ticket = state.ticket();
//! let period = PatternLibrary::default().period(Pattern::Fade);
//! let outcome = engine.run_pattern(&ticket, period).unwrap();
//!
//! assert_eq!(outcome, RunOutcome::Completed);
//! assert_eq!(port.brightness_levels().len(), 20);
//! ```
//!
//! ## Related Modules
//! - `pattern` - produces the step sequences
//! - `timeline` - produces merged note timelines
//! - `coordinator` - owns the threads that call into the engine

mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use engine::PlaybackEngine;
pub(crate) use types::lock;
pub use types::{ControlState, EngineOptions, ExecutionTicket, Mode, RunOutcome, Status};
