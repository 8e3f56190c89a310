//! Save files.
//!
//! A save is a bincode-encoded [`SaveFile`]: a layout version followed by
//! the core's [`GameSnapshot`]. Files are written to a sibling temporary
//! path and renamed into place so a crash mid-write leaves the previous
//! save intact.

use std::path::Path;

use foundry_core::snapshot::GameSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Save file layout version.
pub const SAVE_VERSION: u32 = 1;

/// On-disk save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFile {
    /// Layout version.
    pub version: u32,
    /// The saved session.
    pub snapshot: GameSnapshot,
}

impl SaveFile {
    /// Wrap a snapshot at the current version.
    #[must_use]
    pub fn new(snapshot: GameSnapshot) -> Self {
        Self {
            version: SAVE_VERSION,
            snapshot,
        }
    }

    /// Encode to bytes.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bytes, rejecting other layout versions.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a save or the version differs.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let save: Self = bincode::deserialize(bytes)?;

        // Version check
        if save.version != SAVE_VERSION {
            return Err(ToolError::SaveVersion {
                expected: SAVE_VERSION,
                found: save.version,
            });
        }

        Ok(save)
    }

    /// Write to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.encode()?;
        let tmp = path.with_extension("tmp");

        std::fs::write(&tmp, bytes).map_err(ToolError::io(&tmp))?;
        std::fs::rename(&tmp, path).map_err(ToolError::io(path))?;

        tracing::debug!(path = %path.display(), "Saved game");
        Ok(())
    }

    /// Load from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(ToolError::io(path))?;
        Self::decode(&bytes)
    }

    /// Load from a file if it exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }
}

/// Delete a save. Returns false if there was nothing to delete.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn delete_save<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ToolError::io(path)(e)),
    }
}
