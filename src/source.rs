//! # MIDI Source
//!
//! The decoded form of a song file: tracks of delta-timed messages, exactly
//! as the file lays them out. [`TimelineBuilder`](crate::TimelineBuilder)
//! turns this into one merged [`Timeline`](crate::Timeline).
//!
//! Decoding of Standard MIDI Files is done by `midly`; this module only keeps
//! the messages playback cares about (notes and tempo) and a placeholder for
//! everything else so per-track tick counting stays correct.
//!
//! ## Example
//! ```rust
//! use lumitone::{MessageKind, MidiSource, SourceTrack, TrackMessage};
//!
//! let source = MidiSource {
//!     format: lumitone::SourceFormat::SingleTrack,
//!     ticks_per_beat: 480,
//!     tracks: vec![SourceTrack {
//!         name: Some("lead".to_string()),
//!         messages: vec![
//!             TrackMessage::new(0, MessageKind::NoteOn { pitch: 69, velocity: 100 }),
//!             TrackMessage::new(480, MessageKind::NoteOff { pitch: 69, velocity: 0 }),
//!         ],
//!     }],
//! };
//! assert_eq!(source.summary().tracks[0].notes, 1);
//! ```

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Serialize;

use crate::error::LumitoneError;

/// SMF file layout (type 0, 1 or 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    SingleTrack,
    Parallel,
    Sequential,
}

impl SourceFormat {
    /// The SMF type number
    pub fn number(&self) -> u8 {
        match self {
            SourceFormat::SingleTrack => 0,
            SourceFormat::Parallel => 1,
            SourceFormat::Sequential => 2,
        }
    }
}

/// What a track message does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8, velocity: u8 },
    /// Set tempo, in microseconds per beat
    Tempo(u32),
    /// Anything else; only its delta matters
    Other,
}

/// A message and the ticks since the previous message on the same track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMessage {
    pub delta: u32,
    pub kind: MessageKind,
}

impl TrackMessage {
    pub fn new(delta: u32, kind: MessageKind) -> Self {
        Self { delta, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceTrack {
    pub name: Option<String>,
    pub messages: Vec<TrackMessage>,
}

/// A multi-track song, not yet merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiSource {
    pub format: SourceFormat,
    pub ticks_per_beat: u16,
    pub tracks: Vec<SourceTrack>,
}

/// Per-track overview for status and inspection output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub index: usize,
    pub name: Option<String>,
    /// Number of sounding note-ons (velocity above zero)
    pub notes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub format: u8,
    pub ticks_per_beat: u16,
    pub tracks: Vec<TrackSummary>,
}

impl MidiSource {
    /// Decode a Standard MIDI File.
    ///
    /// # Errors
    /// Returns [`LumitoneError::MalformedSource`] if the bytes are not a valid
    /// SMF or use SMPTE timecode timing instead of ticks per beat.
    pub fn parse(bytes: &[u8]) -> Result<Self, LumitoneError> {
        let smf = Smf::parse(bytes)
            .map_err(|e| LumitoneError::MalformedSource(format!("not a standard MIDI file: {}", e)))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(_, _) => {
                return Err(LumitoneError::MalformedSource(
                    "SMPTE timecode timing has no ticks per beat".to_string(),
                ))
            }
        };

        let format = match smf.header.format {
            midly::Format::SingleTrack => SourceFormat::SingleTrack,
            midly::Format::Parallel => SourceFormat::Parallel,
            midly::Format::Sequential => SourceFormat::Sequential,
        };

        let tracks = smf
            .tracks
            .iter()
            .map(|track| {
                let mut name = None;
                let messages = track
                    .iter()
                    .map(|event| {
                        let kind = match event.kind {
                            TrackEventKind::Midi { message, .. } => match message {
                                MidiMessage::NoteOn { key, vel } => MessageKind::NoteOn {
                                    pitch: key.as_int(),
                                    velocity: vel.as_int(),
                                },
                                MidiMessage::NoteOff { key, vel } => MessageKind::NoteOff {
                                    pitch: key.as_int(),
                                    velocity: vel.as_int(),
                                },
                                _ => MessageKind::Other,
                            },
                            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                                MessageKind::Tempo(tempo.as_int())
                            }
                            TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                                if name.is_none() {
                                    name = Some(String::from_utf8_lossy(raw).trim().to_string());
                                }
                                MessageKind::Other
                            }
                            _ => MessageKind::Other,
                        };
                        TrackMessage::new(event.delta.as_int(), kind)
                    })
                    .collect();
                SourceTrack { name, messages }
            })
            .collect();

        Ok(Self {
            format,
            ticks_per_beat,
            tracks,
        })
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            format: self.format.number(),
            ticks_per_beat: self.ticks_per_beat,
            tracks: self
                .tracks
                .iter()
                .enumerate()
                .map(|(index, track)| TrackSummary {
                    index,
                    name: track.name.clone(),
                    notes: track
                        .messages
                        .iter()
                        .filter(|m| matches!(m.kind, MessageKind::NoteOn { velocity, .. } if velocity > 0))
                        .count(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn encode(smf: &Smf) -> Vec<u8> {
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_parse_keeps_notes_tempo_and_deltas() {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(96))));
        smf.tracks.push(vec![
            meta(0, MetaMessage::TrackName(b"melody")),
            meta(0, MetaMessage::Tempo(u24::new(600_000))),
            note_on(10, 60, 90),
            note_on(86, 60, 0),
            meta(0, MetaMessage::EndOfTrack),
        ]);

        let source = MidiSource::parse(&encode(&smf)).unwrap();
        assert_eq!(source.format, SourceFormat::Parallel);
        assert_eq!(source.ticks_per_beat, 96);
        assert_eq!(source.tracks.len(), 1);

        let track = &source.tracks[0];
        assert_eq!(track.name.as_deref(), Some("melody"));
        assert_eq!(
            track.messages,
            vec![
                TrackMessage::new(0, MessageKind::Other),
                TrackMessage::new(0, MessageKind::Tempo(600_000)),
                TrackMessage::new(10, MessageKind::NoteOn { pitch: 60, velocity: 90 }),
                TrackMessage::new(86, MessageKind::NoteOn { pitch: 60, velocity: 0 }),
                TrackMessage::new(0, MessageKind::Other),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = MidiSource::parse(b"definitely not midi");
        assert!(matches!(result, Err(LumitoneError::MalformedSource(_))));
    }

    #[test]
    fn test_parse_rejects_timecode_timing() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Timecode(midly::Fps::Fps25, 40),
        ));
        smf.tracks.push(vec![meta(0, MetaMessage::EndOfTrack)]);
        let result = MidiSource::parse(&encode(&smf));
        if let Err(LumitoneError::MalformedSource(message)) = result {
            assert!(message.contains("timecode"));
        } else {
            panic!("Expected MalformedSource but got: {:?}", result);
        }
    }

    #[test]
    fn test_summary_counts_sounding_notes_per_track() {
        let source = MidiSource {
            format: SourceFormat::Parallel,
            ticks_per_beat: 480,
            tracks: vec![
                SourceTrack {
                    name: None,
                    messages: vec![TrackMessage::new(0, MessageKind::Tempo(500_000))],
                },
                SourceTrack {
                    name: Some("piano".to_string()),
                    messages: vec![
                        TrackMessage::new(0, MessageKind::NoteOn { pitch: 60, velocity: 80 }),
                        TrackMessage::new(0, MessageKind::NoteOn { pitch: 64, velocity: 80 }),
                        TrackMessage::new(240, MessageKind::NoteOn { pitch: 60, velocity: 0 }),
                        TrackMessage::new(0, MessageKind::NoteOff { pitch: 64, velocity: 0 }),
                    ],
                },
            ],
        };
        let summary = source.summary();
        assert_eq!(summary.format, 1);
        assert_eq!(summary.tracks[0].notes, 0);
        assert_eq!(summary.tracks[1].notes, 2);
        assert_eq!(summary.tracks[1].name.as_deref(), Some("piano"));
    }
}
