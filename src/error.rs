//! # Error Types
//!
//! All error types for the lumitone playback core.
//!
//! ## Error Types
//! - `AssetNotFound` / `AssetUnreadable` - a requested song could not be resolved or read
//! - `MalformedSource` - the song has structurally invalid timing metadata
//! - `ActuatorIo` - a physical write to the light or tone output failed
//! - `Config` - the settings file could not be read or parsed
//!
//! Asset and source errors are always reported before any playback starts.
//! Actuator errors end the current execution only; the outputs are forced
//! off before the error is returned.
//!
//! ## Usage
//! ```rust,no_run
//! use lumitone::{LumitoneError, MidiSource};
//!
//! match MidiSource::parse(&[]) {
//!     Ok(source) => println!("{} tracks", source.tracks.len()),
//!     Err(LumitoneError::MalformedSource(reason)) => eprintln!("bad song: {}", reason),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::actuator::{ActuatorError, Output};

#[derive(Error, Debug)]
pub enum LumitoneError {
    /// The asset library has no song with this name.
    ///
    /// # Example
    /// ```
    /// # use lumitone::LumitoneError;
    /// let err = LumitoneError::AssetNotFound { name: "tetris".to_string() };
    /// assert_eq!(err.to_string(), "Asset not found: tetris");
    /// ```
    #[error("Asset not found: {name}")]
    AssetNotFound { name: String },

    /// The song exists but its bytes could not be read.
    #[error("Asset unreadable at {}: {source}", .path.display())]
    AssetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The song declares no tracks, a non-positive ticks-per-beat, or is not
    /// a Standard MIDI File at all.
    ///
    /// # Example
    /// ```
    /// # use lumitone::LumitoneError;
    /// let err = LumitoneError::MalformedSource("source declares zero tracks".to_string());
    /// assert_eq!(err.to_string(), "Malformed source: source declares zero tracks");
    /// ```
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    /// A write to a physical output failed.
    #[error("Actuator I/O error on {output} output: {message}")]
    ActuatorIo { output: Output, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<ActuatorError> for LumitoneError {
    fn from(err: ActuatorError) -> Self {
        LumitoneError::ActuatorIo {
            output: err.output,
            message: err.message,
        }
    }
}
