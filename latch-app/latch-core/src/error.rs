//! Error types for passcode entry and storage.
//!
//! `LatchError` is what fallible operations return to the host.
//! `FailureReason` is the small value handed to the delegate's
//! `passcode_failed` callback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while driving the lock screen.
#[derive(Error, Debug)]
pub enum LatchError {
    /// `authorize()` was called but no passcode has been stored yet.
    /// The host should offer `set_passcode()` instead.
    #[error("Passcode not set")]
    PasscodeNotSet,

    /// The keypad reported a key code outside the digit range.
    #[error("Invalid key code: {0}")]
    InvalidKey(i32),

    /// Typed input that is neither a digit nor a delete key.
    #[error("Invalid keypad input: {0:?}")]
    InvalidInput(char),

    /// The passcode file could not be written or removed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The configuration file is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for latch operations.
pub type LatchResult<T> = std::result::Result<T, LatchError>;

impl LatchError {
    /// Stable error code for programmatic handling by frontends.
    pub fn code(&self) -> &'static str {
        match self {
            LatchError::PasscodeNotSet => "PASSCODE_NOT_SET",
            LatchError::InvalidKey(_) | LatchError::InvalidInput(_) => "INVALID_KEY",
            LatchError::Storage(_) => "STORAGE_ERROR",
            LatchError::Config(_) => "CONFIG_ERROR",
            LatchError::Io(_) => "IO_ERROR",
            LatchError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl Serialize for LatchError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("LatchError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Why a lock-screen flow ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// No passcode is stored, so there is nothing to check against.
    PasscodeNotSet,
    /// A confirmed passcode could not be persisted.
    StorageUnavailable,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PasscodeNotSet => write!(f, "passcode not set"),
            Self::StorageUnavailable => write!(f, "passcode storage unavailable"),
        }
    }
}
