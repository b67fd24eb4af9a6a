//! Data types shared between the controller, its views and hosts.

use serde::{Deserialize, Serialize};

use crate::error::{LatchError, LatchResult};

/// Number of digits in a passcode.
pub const PASSCODE_LENGTH: usize = 4;

/// What the lock screen is currently doing.
///
/// - `Inactive` → `Check` (authorize with a stored passcode)
/// - `Inactive` → `Set` (set passcode)
/// - `Check` / `Set` → `Inactive` (success, cancel, or dismiss)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PasscodeState {
    /// Verifying an entry against the stored passcode.
    Check,
    /// Choosing and confirming a new passcode.
    Set,
    /// Not presented.
    #[default]
    Inactive,
}

impl std::fmt::Display for PasscodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Check => write!(f, "Check"),
            Self::Set => write!(f, "Set"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

/// A keypad press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// 0 through 9. The machine ignores anything larger.
    Digit(u8),
    /// Removes the last digit, or cancels a Set flow when nothing is entered.
    Delete,
}

impl Key {
    /// Decode the keypad's integer callback: 0–9 are digits, any negative
    /// value is the delete/cancel key.
    pub fn from_code(code: i32) -> LatchResult<Self> {
        match code {
            c if c < 0 => Ok(Key::Delete),
            0..=9 => Ok(Key::Digit(code as u8)),
            _ => Err(LatchError::InvalidKey(code)),
        }
    }
}

impl TryFrom<char> for Key {
    type Error = LatchError;

    fn try_from(c: char) -> LatchResult<Self> {
        match c {
            '0'..='9' => Ok(Key::Digit(c as u8 - b'0')),
            '-' | '<' | 'x' | 'X' => Ok(Key::Delete),
            _ => Err(LatchError::InvalidInput(c)),
        }
    }
}

/// Which instruction the view should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Prompt {
    Enter,
    Confirm,
}

/// Style of the logo, instructions and bubbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    Normal,
    /// A rejected entry. Hosts typically shake the bubbles and vibrate.
    Error,
}

/// Label of the bottom-right keypad key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKey {
    Delete,
    Cancel,
}

/// Everything a view needs to draw the lock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    /// Bubbles drawn as filled, 0 through `PASSCODE_LENGTH`.
    pub filled: usize,
    pub feedback: Feedback,
    pub prompt: Prompt,
    pub action_key: ActionKey,
}

impl Screen {
    /// A freshly presented screen.
    pub fn initial(state: PasscodeState) -> Self {
        Self {
            filled: 0,
            feedback: Feedback::Normal,
            prompt: Prompt::Enter,
            action_key: match state {
                PasscodeState::Set => ActionKey::Cancel,
                _ => ActionKey::Delete,
            },
        }
    }
}
