pub mod actuator;
pub mod assets;
pub mod coordinator;
pub mod error;
pub mod pattern;
pub mod playback;
pub mod settings;
pub mod source;
pub mod testing;
pub mod timeline;
pub mod tone;

pub use actuator::{ActuatorError, ActuatorPort, Clock, LogPort, Output, SystemClock};
pub use assets::{AssetLibrary, MemoryAssets, MusicDirectory};
pub use coordinator::ModeCoordinator;
pub use error::*;
pub use pattern::{Pattern, PatternLibrary, PatternStep};
pub use playback::{Mode, PlaybackEngine, Status};
pub use settings::Settings;
pub use source::{MessageKind, MidiSource, SourceFormat, SourceSummary, SourceTrack, TrackMessage, TrackSummary};
pub use timeline::{NoteEvent, NoteKind, TempoChange, Timeline, TimelineBuilder};
pub use tone::{pitch_to_frequency, ToneGenerator};

/// Decode a Standard MIDI File and merge it into one timeline.
/// This is the main entry point for offline use.
pub fn load_timeline(bytes: &[u8]) -> Result<Timeline, LumitoneError> {
    let source = MidiSource::parse(bytes)?;
    TimelineBuilder::build(&source)
}
