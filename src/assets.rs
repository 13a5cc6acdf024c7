//! # Song Assets
//!
//! Resolves a song name to the bytes of its MIDI file. The coordinator only
//! talks to the [`AssetLibrary`] trait; [`MusicDirectory`] is the on-disk
//! implementation and [`MemoryAssets`] holds songs in memory.
//!
//! Names are bare file names. `"tetris"` resolves to `tetris`, `tetris.mid`
//! or `tetris.midi` inside the music directory, in that order. Names that
//! try to leave the directory are treated as not found.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::LumitoneError;

const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

/// Looks up song bytes by name
pub trait AssetLibrary: Send + Sync {
    /// # Errors
    /// [`LumitoneError::AssetNotFound`] if there is no such song,
    /// [`LumitoneError::AssetUnreadable`] if it exists but cannot be read.
    fn load(&self, name: &str) -> Result<Vec<u8>, LumitoneError>;
}

/// Songs stored as files in one directory
#[derive(Debug, Clone)]
pub struct MusicDirectory {
    root: PathBuf,
}

impl MusicDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file `name` refers to, if it exists
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let mut components = relative.components();
        let is_plain_file_name =
            matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
        if !is_plain_file_name {
            return None;
        }

        let exact = self.root.join(relative);
        if exact.is_file() {
            return Some(exact);
        }
        MIDI_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
    }
}

impl AssetLibrary for MusicDirectory {
    fn load(&self, name: &str) -> Result<Vec<u8>, LumitoneError> {
        let path = self.resolve(name).ok_or_else(|| LumitoneError::AssetNotFound {
            name: name.to_string(),
        })?;
        std::fs::read(&path).map_err(|source| LumitoneError::AssetUnreadable { path, source })
    }
}

/// Songs held in memory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    songs: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_song(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.songs.insert(name.into(), bytes);
        self
    }
}

impl AssetLibrary for MemoryAssets {
    fn load(&self, name: &str) -> Result<Vec<u8>, LumitoneError> {
        self.songs
            .get(name)
            .cloned()
            .ok_or_else(|| LumitoneError::AssetNotFound {
                name: name.to_string(),
            })
    }
}
