//! Error types for the latch plugin.

use latch_core::LatchError;
use serde::{Serialize, Serializer};

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lock-screen error (passcode not set, invalid key, storage).
    #[error(transparent)]
    Latch(#[from] LatchError),

    /// Path resolution or other Tauri runtime failure.
    #[error("Tauri error: {0}")]
    Tauri(#[from] tauri::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            // Keep the structured {code, message} form for lock-screen errors
            Error::Latch(err) => err.serialize(serializer),
            _ => serializer.serialize_str(self.to_string().as_ref()),
        }
    }
}
