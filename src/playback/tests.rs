use super::*;
use crate::actuator::{ActuatorError, ActuatorPort, Clock, Output};
use crate::error::LumitoneError;
use crate::pattern::{Pattern, PatternLibrary, PatternStep};
use crate::testing::{PortWrite, RecordingPort, VirtualClock};
use crate::timeline::{NoteEvent, NoteKind, Timeline};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Virtual clock that starts a handoff once a given amount of time has passed
struct CancelAt {
    inner: VirtualClock,
    at: Duration,
    state: Arc<ControlState>,
    fired: AtomicBool,
}

impl CancelAt {
    fn new(at: Duration, state: Arc<ControlState>) -> Self {
        Self {
            inner: VirtualClock::new(),
            at,
            state,
            fired: AtomicBool::new(false),
        }
    }
}

impl Clock for CancelAt {
    fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration);
        if self.inner.elapsed() >= self.at && !self.fired.swap(true, Ordering::SeqCst) {
            self.state.begin_handoff();
        }
    }

    fn elapsed(&self) -> Duration {
        self.inner.elapsed()
    }
}

/// Port whose n-th write (counting from zero) fails, all others succeed
struct FailOnce {
    inner: RecordingPort,
    fail_at: usize,
    attempts: AtomicUsize,
}

impl FailOnce {
    fn new(clock: Arc<dyn Clock>, fail_at: usize) -> Self {
        Self {
            inner: RecordingPort::new(clock),
            fail_at,
            attempts: AtomicUsize::new(0),
        }
    }

    fn check(&self, output: Output) -> Result<(), ActuatorError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            Err(ActuatorError::new(output, "bus error"))
        } else {
            Ok(())
        }
    }
}

impl ActuatorPort for FailOnce {
    fn set_brightness(&self, level: f64) -> Result<(), ActuatorError> {
        self.check(Output::Brightness)?;
        self.inner.set_brightness(level)
    }

    fn set_tone(&self, high: bool) -> Result<(), ActuatorError> {
        self.check(Output::Tone)?;
        self.inner.set_tone(high)
    }
}

fn a440_timeline() -> Timeline {
    Timeline::new(
        480,
        vec![
            NoteEvent::new(0, NoteKind::NoteOn, 69, 100),
            NoteEvent::new(480, NoteKind::NoteOff, 69, 0),
        ],
        vec![],
    )
    .unwrap()
}

/// Eight quarter notes at 120 BPM, four seconds in total
fn long_timeline() -> Timeline {
    let mut events = Vec::new();
    for i in 0..8u64 {
        events.push(NoteEvent::new(i * 480, NoteKind::NoteOn, 60 + i as u8, 80));
        events.push(NoteEvent::new(i * 480 + 240, NoteKind::NoteOff, 60 + i as u8, 0));
    }
    Timeline::new(480, events, vec![]).unwrap()
}

fn virtual_rig(mode: Mode) -> (Arc<VirtualClock>, Arc<RecordingPort>, Arc<ControlState>, PlaybackEngine) {
    let clock = Arc::new(VirtualClock::new());
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let state = Arc::new(ControlState::new(mode));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());
    (clock, port, state, engine)
}

#[test]
fn test_single_note_plays_a440_then_waits_half_second() {
    let (clock, port, state, engine) = virtual_rig(Mode::Timeline);
    let ticket = state.ticket();

    let outcome = engine.run_timeline(&ticket, &a440_timeline()).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    // 0.08 s at 440 Hz
    assert_eq!(port.tone_pulses(), 35);
    assert_eq!(port.brightness_levels(), vec![1.0, 0.05, 0.0]);

    let writes = port.writes();
    let dim = writes
        .iter()
        .find(|w| w.write == PortWrite::Brightness(0.05))
        .unwrap();
    let last_low = writes
        .iter()
        .filter(|w| w.write == PortWrite::Tone(false) && w.at < dim.at)
        .last()
        .unwrap();
    let half_period = Duration::from_secs_f64(1.0 / 440.0 / 2.0);
    assert_eq!(dim.at - last_low.at, half_period + Duration::from_millis(500));
    assert_eq!(clock.total_slept(), half_period * 70 + Duration::from_millis(500));
}

#[test]
fn test_timeline_ends_with_outputs_off_when_completed() {
    let (_, port, state, engine) = virtual_rig(Mode::Timeline);
    engine.run_timeline(&state.ticket(), &long_timeline()).unwrap();
    assert_eq!(port.last_brightness(), Some(0.0));
    assert_eq!(port.last_tone(), Some(false));
}

#[test]
fn test_timeline_ends_with_outputs_off_when_cancelled() {
    let state = Arc::new(ControlState::new(Mode::Timeline));
    let clock = Arc::new(CancelAt::new(Duration::from_millis(1300), state.clone()));
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());

    let outcome = engine.run_timeline(&state.ticket(), &long_timeline()).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(port.last_brightness(), Some(0.0));
    assert_eq!(port.last_tone(), Some(false));
    // The first three notes started before the cancel, the fourth never did.
    assert_eq!(port.tone_pulses(), {
        let burst = |pitch: u8| (0.08 * crate::tone::pitch_to_frequency(pitch)).floor() as usize;
        burst(60) + burst(61) + burst(62)
    });
    assert!(clock.elapsed() < Duration::from_millis(1300) + EngineOptions::default().poll_interval);
}

#[test]
fn test_cancel_during_tone_stops_burst() {
    let state = Arc::new(ControlState::new(Mode::Timeline));
    let clock = Arc::new(CancelAt::new(Duration::from_millis(20), state.clone()));
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());

    let outcome = engine.run_timeline(&state.ticket(), &a440_timeline()).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert!(port.tone_pulses() < 35);
    assert!(port.tone_pulses() >= 8);
    assert_eq!(port.brightness_levels(), vec![1.0, 0.0]);
    assert_eq!(port.last_tone(), Some(false));
}

#[test]
fn test_stale_ticket_only_releases() {
    let (_, port, state, engine) = virtual_rig(Mode::Timeline);
    let ticket = state.ticket();
    state.begin_handoff();
    state.complete_handoff(Mode::Timeline);

    let outcome = engine.run_timeline(&ticket, &a440_timeline()).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(
        port.writes().iter().map(|w| w.write).collect::<Vec<_>>(),
        vec![PortWrite::Brightness(0.0), PortWrite::Tone(false)]
    );
}

#[test]
fn test_mode_change_interrupts_timeline() {
    let (_, port, state, engine) = virtual_rig(Mode::Timeline);
    let ticket = state.ticket();
    // A ticket for another mode is stale even without a generation bump.
    let stale = ExecutionTicket { mode: Mode::Fade, ..ticket };
    let outcome = engine.run_timeline(&stale, &a440_timeline()).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(port.tone_pulses(), 0);
}

#[test]
fn test_velocity_sets_brightness() {
    let (_, port, state, engine) = virtual_rig(Mode::Timeline);
    let timeline = Timeline::new(
        480,
        vec![
            NoteEvent::new(0, NoteKind::NoteOn, 60, 50),
            NoteEvent::new(0, NoteKind::NoteOn, 64, 127),
            NoteEvent::new(480, NoteKind::NoteOff, 60, 0),
            NoteEvent::new(480, NoteKind::NoteOff, 64, 0),
        ],
        vec![],
    )
    .unwrap();
    engine.run_timeline(&state.ticket(), &timeline).unwrap();
    assert_eq!(port.brightness_levels(), vec![0.5, 1.0, 0.05, 0.0]);
}

#[test]
fn test_light_dims_only_after_last_note_ends() {
    let (_, port, state, engine) = virtual_rig(Mode::Timeline);
    let timeline = Timeline::new(
        480,
        vec![
            NoteEvent::new(0, NoteKind::NoteOn, 60, 100),
            NoteEvent::new(120, NoteKind::NoteOn, 67, 100),
            NoteEvent::new(240, NoteKind::NoteOff, 60, 0),
            NoteEvent::new(360, NoteKind::NoteOff, 67, 0),
            // ending a note that never started changes nothing
            NoteEvent::new(400, NoteKind::NoteOff, 72, 0),
        ],
        vec![],
    )
    .unwrap();
    engine.run_timeline(&state.ticket(), &timeline).unwrap();

    let writes = port.writes();
    let dim_at: Vec<Duration> = writes
        .iter()
        .filter(|w| w.write == PortWrite::Brightness(0.05))
        .map(|w| w.at)
        .collect();
    assert_eq!(dim_at.len(), 1);
    // 360 ticks at 120 BPM, plus the two 0.08 s bursts played on the way
    let burst = |pitch: u8| {
        let f = crate::tone::pitch_to_frequency(pitch);
        Duration::from_secs_f64(1.0 / f / 2.0) * 2 * (0.08 * f).floor() as u32
    };
    assert_eq!(dim_at[0], Duration::from_millis(375) + burst(60) + burst(67));
}

#[test]
fn test_tempo_change_stretches_gaps() {
    let (clock, _, state, engine) = virtual_rig(Mode::Timeline);
    let timeline = Timeline::new(
        480,
        vec![
            NoteEvent::new(0, NoteKind::NoteOff, 60, 0),
            NoteEvent::new(480, NoteKind::NoteOff, 60, 0),
            NoteEvent::new(960, NoteKind::NoteOff, 60, 0),
        ],
        vec![crate::timeline::TempoChange {
            tick: 480,
            micros_per_beat: 1_000_000,
        }],
    )
    .unwrap();
    engine.run_timeline(&state.ticket(), &timeline).unwrap();
    assert_eq!(clock.total_slept(), Duration::from_millis(1500));
}

#[test]
fn test_pattern_period_runs_to_completion() {
    let (clock, port, state, engine) = virtual_rig(Mode::Show);
    let period = PatternLibrary::default().period(Pattern::Show);
    let outcome = engine.run_pattern(&state.ticket(), period).unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(clock.total_slept(), Duration::from_millis(13600));
    assert_eq!(port.brightness_levels()[..4], [1.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_pattern_hold_abandoned_on_cancel() {
    let state = Arc::new(ControlState::new(Mode::Fade));
    let clock = Arc::new(CancelAt::new(Duration::from_millis(150), state.clone()));
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());

    let library = PatternLibrary::default();
    let outcome = engine.run_pattern(&state.ticket(), library.steps(Pattern::Fade)).unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    // Only the first ramp step got written; its 0.3 s hold was cut short.
    assert_eq!(port.brightness_levels(), vec![0.1]);
    assert_eq!(clock.elapsed(), Duration::from_millis(160));
}

#[test]
fn test_pattern_stops_when_mode_changes() {
    let (_, port, state, engine) = virtual_rig(Mode::Steady);
    let ticket = state.ticket();
    state.complete_handoff(Mode::Morse);
    let outcome = engine
        .run_pattern(&ticket, PatternLibrary::default().steps(Pattern::Steady))
        .unwrap();
    assert_eq!(outcome, RunOutcome::Interrupted);
    assert!(port.writes().is_empty());
}

#[test]
fn test_pattern_restarts_from_first_step() {
    let (_, port, state, engine) = virtual_rig(Mode::Fade);
    let library = PatternLibrary::default();
    let first_steps: Vec<PatternStep> = library.steps(Pattern::Fade).take(5).collect();
    engine.run_pattern(&state.ticket(), first_steps).unwrap();
    port.clear();

    engine
        .run_pattern(&state.ticket(), library.steps(Pattern::Fade).take(1))
        .unwrap();
    assert_eq!(port.brightness_levels(), vec![0.1]);
}

#[test]
fn test_pattern_write_failure_releases_outputs() {
    let state = Arc::new(ControlState::new(Mode::Fade));
    let clock = Arc::new(VirtualClock::new());
    let port = Arc::new(FailOnce::new(clock.clone(), 2));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());

    let result = engine.run_pattern(&state.ticket(), PatternLibrary::default().steps(Pattern::Fade));
    match result {
        Err(LumitoneError::ActuatorIo { output, .. }) => assert_eq!(output, Output::Brightness),
        other => panic!("Expected ActuatorIo but got: {:?}", other),
    }
    assert_eq!(port.inner.brightness_levels(), vec![0.1, 0.2, 0.0]);
    assert_eq!(port.inner.last_tone(), Some(false));
}

#[test]
fn test_timeline_write_failure_releases_outputs() {
    let state = Arc::new(ControlState::new(Mode::Timeline));
    let clock = Arc::new(VirtualClock::new());
    // write 0 is the brightness, write 5 raises the tone for the third time
    let port = Arc::new(FailOnce::new(clock.clone(), 5));
    let engine = PlaybackEngine::new(port.clone(), clock.clone(), state.clone(), EngineOptions::default());

    let result = engine.run_timeline(&state.ticket(), &a440_timeline());
    assert!(matches!(
        result,
        Err(LumitoneError::ActuatorIo { output: Output::Tone, .. })
    ));
    assert_eq!(port.inner.last_brightness(), Some(0.0));
    assert_eq!(port.inner.last_tone(), Some(false));
}

#[test]
fn test_zero_poll_interval_is_raised() {
    let state = Arc::new(ControlState::new(Mode::Fade));
    let clock = Arc::new(VirtualClock::new());
    let port = Arc::new(RecordingPort::new(clock.clone()));
    let options = EngineOptions {
        poll_interval: Duration::ZERO,
        ..EngineOptions::default()
    };
    let engine = PlaybackEngine::new(port, clock.clone(), state.clone(), options);
    engine
        .run_pattern(&state.ticket(), [PatternStep::Hold(Duration::from_millis(3))])
        .unwrap();
    assert_eq!(clock.sleeps().len(), 3);
}

#[test]
fn test_handoff_invalidates_grace_period_tickets() {
    let state = ControlState::new(Mode::Steady);
    let before = state.ticket();
    state.begin_handoff();
    let during = state.ticket();
    assert!(!state.should_continue(&before));
    assert!(!state.should_continue(&during));

    let after = state.complete_handoff(Mode::Fade);
    assert!(state.should_continue(&after));
    assert!(!state.should_continue(&during));
    assert_eq!(state.ticket(), after);
}
