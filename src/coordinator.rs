//! # Mode Coordinator
//!
//! Owns the operating mode and the threads that drive the outputs:
//! - one long-lived `pattern-loop` thread that runs the pattern for the
//!   current mode, restarting it from its first step whenever it is
//!   interrupted, and idles while a song plays;
//! - one short-lived `timeline` thread per song.
//!
//! Every request goes through the same handoff: invalidate the running
//! execution, wait the grace period, wait for the previous song thread to
//! exit, then switch mode under a fresh generation. Requests are serialized,
//! so at most one execution holds a current ticket at any time.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::actuator::{ActuatorPort, Clock};
use crate::assets::AssetLibrary;
use crate::error::LumitoneError;
use crate::pattern::{Pattern, PatternLibrary};
use crate::playback::{lock, ControlState, ExecutionTicket, Mode, PlaybackEngine, RunOutcome, Status};
use crate::settings::Settings;
use crate::source::MidiSource;
use crate::timeline::{Timeline, TimelineBuilder};

pub struct ModeCoordinator {
    state: Arc<ControlState>,
    engine: Arc<PlaybackEngine>,
    assets: Arc<dyn AssetLibrary>,
    clock: Arc<dyn Clock>,
    grace_period: Duration,
    handoff: Mutex<()>,
    pattern_thread: Mutex<Option<JoinHandle<()>>>,
    timeline_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ModeCoordinator {
    /// Start in [`Mode::Steady`] with the pattern loop already running.
    pub fn start(
        settings: &Settings,
        port: Arc<dyn ActuatorPort>,
        clock: Arc<dyn Clock>,
        assets: Arc<dyn AssetLibrary>,
    ) -> Self {
        let state = Arc::new(ControlState::new(Mode::Steady));
        let engine = Arc::new(PlaybackEngine::new(
            port,
            clock.clone(),
            state.clone(),
            settings.engine_options(),
        ));
        let library = PatternLibrary::new(settings.morse_message.clone());

        let loop_engine = engine.clone();
        let pattern_thread = thread::Builder::new()
            .name("pattern-loop".into())
            .spawn(move || pattern_loop(loop_engine, library))
            .expect("failed to spawn pattern-loop thread");

        log::info!("coordinator started in {} mode", Mode::Steady);
        Self {
            state,
            engine,
            assets,
            clock,
            grace_period: settings.grace_period,
            handoff: Mutex::new(()),
            pattern_thread: Mutex::new(Some(pattern_thread)),
            timeline_thread: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    /// Switch to a pattern mode. Returns once the switch is complete; the
    /// pattern itself runs on the background thread.
    pub fn set_mode(&self, pattern: Pattern) {
        let _guard = lock(&self.handoff);
        if self.state.is_shut_down() {
            log::warn!("ignoring {} request after shutdown", pattern);
            return;
        }
        let ticket = self.handoff_to(pattern.into());
        self.state.set_now_playing(None);
        log::info!("mode is now {} (generation {})", ticket.mode, ticket.generation);
    }

    /// Look up `name`, build its timeline, then hand the outputs to it.
    ///
    /// # Errors
    /// Lookup and decoding failures are returned before anything is
    /// interrupted: [`LumitoneError::AssetNotFound`],
    /// [`LumitoneError::AssetUnreadable`] or [`LumitoneError::MalformedSource`].
    pub fn play_timeline(&self, name: &str) -> Result<(), LumitoneError> {
        let bytes = self.assets.load(name)?;
        let source = MidiSource::parse(&bytes)?;
        let timeline = TimelineBuilder::build(&source)?;
        self.start_timeline(name, timeline);
        Ok(())
    }

    /// Hand the outputs to an already-built timeline, played on its own thread.
    pub fn start_timeline(&self, name: &str, timeline: Timeline) {
        let _guard = lock(&self.handoff);
        if self.state.is_shut_down() {
            log::warn!("ignoring request to play {} after shutdown", name);
            return;
        }
        let ticket = self.handoff_to(Mode::Timeline);
        self.state.set_now_playing(Some(name.to_string()));

        let engine = self.engine.clone();
        let song = name.to_string();
        let handle = thread::Builder::new()
            .name("timeline".into())
            .spawn(move || play_song(engine, ticket, &song, timeline))
            .expect("failed to spawn timeline thread");
        *lock(&self.timeline_thread) = Some(handle);
    }

    /// Stop any song and go back to [`Mode::Steady`].
    pub fn stop_timeline_playback(&self) {
        self.set_mode(Pattern::Steady)
    }

    /// Stop every execution, join both threads and leave the outputs off.
    /// Later requests are ignored. Safe to call more than once.
    pub fn shutdown(&self) {
        let _guard = lock(&self.handoff);
        self.state.shut_down();
        join(&self.timeline_thread, "timeline");
        join(&self.pattern_thread, "pattern-loop");
        self.engine.release();
        log::info!("coordinator shut down");
    }

    fn handoff_to(&self, mode: Mode) -> ExecutionTicket {
        log::debug!("handoff from {} to {}", self.state.mode(), mode);
        self.state.begin_handoff();
        self.clock.sleep(self.grace_period);
        join(&self.timeline_thread, "timeline");
        self.state.complete_handoff(mode)
    }
}

impl Drop for ModeCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join(slot: &Mutex<Option<JoinHandle<()>>>, name: &str) {
    let handle = lock(slot).take();
    if let Some(handle) = handle {
        if handle.join().is_err() {
            log::error!("{} thread panicked", name);
        }
    }
}

fn pattern_loop(engine: Arc<PlaybackEngine>, library: PatternLibrary) {
    let state = engine.state().clone();
    let poll_interval = engine.options().poll_interval;

    while !state.is_shut_down() {
        let ticket = state.ticket();
        let pattern = match ticket.mode.pattern() {
            Some(pattern) if !state.is_cancelled() => pattern,
            _ => {
                engine.clock().sleep(poll_interval);
                continue;
            }
        };

        log::debug!("running {} pattern (generation {})", pattern, ticket.generation);
        if let Err(e) = engine.run_pattern(&ticket, library.steps(pattern)) {
            log::error!("{} pattern stopped: {}", pattern, e);
            engine.clock().sleep(poll_interval);
        }
    }
    log::debug!("pattern loop exiting");
}

fn play_song(engine: Arc<PlaybackEngine>, ticket: ExecutionTicket, name: &str, timeline: Timeline) {
    log::info!(
        "playing {} ({} events, {:.1}s)",
        name,
        timeline.events().len(),
        timeline.duration().as_secs_f64()
    );
    match engine.run_timeline(&ticket, &timeline) {
        Ok(RunOutcome::Completed) => log::info!("finished playing {}", name),
        Ok(RunOutcome::Interrupted) => log::info!("stopped playing {}", name),
        Err(e) => log::error!("playback of {} failed: {}", name, e),
    }
    engine.state().finish_playing(&ticket);
}
