//! Seams between the controller and the host application.
//!
//! A host supplies two collaborators:
//! - a [`PasscodeDelegate`] that learns how a flow ended
//! - a [`PasscodeView`] that shows, redraws and hides the lock screen

use serde::{Deserialize, Serialize};

use crate::error::FailureReason;
use crate::models::{PasscodeState, Screen};

/// How a lock-screen flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "camelCase")]
pub enum Outcome {
    /// The stored passcode was entered.
    Granted,
    /// A new passcode was entered, confirmed and stored.
    Set,
    Failed(FailureReason),
}

impl Outcome {
    /// Invoke the delegate method matching this outcome.
    pub fn deliver(self, delegate: &dyn PasscodeDelegate) {
        match self {
            Outcome::Granted => delegate.passcode_granted(),
            Outcome::Set => delegate.passcode_set(),
            Outcome::Failed(reason) => delegate.passcode_failed(reason),
        }
    }
}

/// Receives the result of `authorize()` and `set_passcode()` flows.
///
/// Callbacks run without the controller lock held, so they may call back
/// into the controller. Effects of such a call are delivered after the
/// current callback returns.
pub trait PasscodeDelegate: Send + Sync {
    fn passcode_granted(&self);
    fn passcode_set(&self);
    fn passcode_failed(&self, reason: FailureReason);
}

/// The lock-screen UI.
pub trait PasscodeView: Send + Sync {
    /// Show the lock screen modally.
    fn present(&self, state: PasscodeState);
    fn render(&self, screen: &Screen);
    /// Hide the lock screen.
    fn dismiss(&self);
}
