//! Shared playback state and the types the engine hands around
//!
//! [`ControlState`] is the one object every execution unit shares: the
//! current mode, the cancellation flag, and a generation counter that makes
//! each execution's [`ExecutionTicket`] go stale as soon as a newer one is
//! handed out.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::pattern::Pattern;

/// Operating mode of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Steady,
    Fade,
    Show,
    Morse,
    /// A song is playing (or just finished) on its own thread
    Timeline,
}

impl Mode {
    /// The pattern the background loop runs in this mode, if any
    pub fn pattern(&self) -> Option<Pattern> {
        match self {
            Mode::Steady => Some(Pattern::Steady),
            Mode::Fade => Some(Pattern::Fade),
            Mode::Show => Some(Pattern::Show),
            Mode::Morse => Some(Pattern::Morse),
            Mode::Timeline => None,
        }
    }
}

impl From<Pattern> for Mode {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Steady => Mode::Steady,
            Pattern::Fade => Mode::Fade,
            Pattern::Show => Mode::Show,
            Pattern::Morse => Mode::Morse,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pattern() {
            Some(pattern) => write!(f, "{}", pattern),
            None => write!(f, "timeline"),
        }
    }
}

/// Identity of one running execution: the generation and mode it started under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTicket {
    pub generation: u64,
    pub mode: Mode,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was executed
    Completed,
    /// Cancellation, a mode change, or a newer execution stopped the run early
    Interrupted,
}

/// Timing knobs for [`PlaybackEngine`](super::PlaybackEngine)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Longest uninterrupted sleep; waits are sliced into pieces of this size
    pub poll_interval: Duration,
    /// Light level once the last sounding note ends
    pub idle_brightness: f64,
    /// Length of the tone played for each note-on
    pub tone_burst: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            idle_brightness: 0.05,
            tone_burst: Duration::from_millis(80),
        }
    }
}

/// What the presentation layer may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<String>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mode, cancellation and generation shared by the coordinator and every
/// execution it starts.
#[derive(Debug)]
pub struct ControlState {
    mode: Mutex<Mode>,
    cancelled: AtomicBool,
    shut_down: AtomicBool,
    generation: AtomicU64,
    now_playing: Mutex<Option<String>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(Mode::Steady)
    }
}

impl ControlState {
    pub fn new(initial: Mode) -> Self {
        Self {
            mode: Mutex::new(initial),
            cancelled: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            now_playing: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> Mode {
        *lock(&self.mode)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// A ticket for an execution starting now, in the current mode.
    pub fn ticket(&self) -> ExecutionTicket {
        let mode = lock(&self.mode);
        ExecutionTicket {
            generation: self.generation(),
            mode: *mode,
        }
    }

    /// The single polling predicate every suspension point calls.
    pub fn should_continue(&self, ticket: &ExecutionTicket) -> bool {
        !self.is_cancelled()
            && !self.is_shut_down()
            && self.generation() == ticket.generation
            && self.mode() == ticket.mode
    }

    /// Raise the cancellation flag and invalidate every ticket handed out so far.
    pub fn begin_handoff(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Switch to `mode`, invalidate tickets taken during the grace period,
    /// and lower the cancellation flag. Returns the ticket for the new mode.
    pub fn complete_handoff(&self, mode: Mode) -> ExecutionTicket {
        let mut current = lock(&self.mode);
        *current = mode;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancelled.store(false, Ordering::SeqCst);
        ExecutionTicket { generation, mode }
    }

    pub fn shut_down(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.begin_handoff();
    }

    pub fn now_playing(&self) -> Option<String> {
        lock(&self.now_playing).clone()
    }

    pub fn set_now_playing(&self, name: Option<String>) {
        *lock(&self.now_playing) = name;
    }

    /// Clear the playing song, but only if `ticket` still owns the outputs.
    pub fn finish_playing(&self, ticket: &ExecutionTicket) {
        let mut now_playing = lock(&self.now_playing);
        if self.generation() == ticket.generation {
            *now_playing = None;
        }
    }

    pub fn status(&self) -> Status {
        Status {
            mode: self.mode(),
            now_playing: self.now_playing(),
        }
    }
}
