//! Payloads exchanged with the frontend.

use latch_core::{FailureReason, LatchConfig, PasscodeState, Prompt, Screen};
use serde::{Deserialize, Serialize};

/// Emitted when the lock screen should be shown.
pub const EVENT_PRESENT: &str = "latch://present";
/// Emitted whenever bubbles, prompt or action key change.
pub const EVENT_RENDER: &str = "latch://render";
/// Emitted when the lock screen should be hidden.
pub const EVENT_DISMISS: &str = "latch://dismiss";
pub const EVENT_GRANTED: &str = "latch://granted";
pub const EVENT_SET: &str = "latch://set";
pub const EVENT_FAILED: &str = "latch://failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentPayload {
    pub state: PasscodeState,
    /// Empty bubbles and the initial action key label.
    pub screen: Screen,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub screen: Screen,
    /// Text for `screen.prompt`, taken from the plugin configuration.
    pub instructions: String,
}

impl RenderPayload {
    pub fn new(screen: Screen, config: &LatchConfig) -> Self {
        Self {
            screen,
            instructions: instructions_for(screen.prompt, config).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPayload {
    pub reason: FailureReason,
    pub message: String,
}

impl From<FailureReason> for FailedPayload {
    fn from(reason: FailureReason) -> Self {
        Self {
            reason,
            message: reason.to_string(),
        }
    }
}

/// Response of the `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatchStatus {
    pub state: PasscodeState,
    pub passcode_set: bool,
    pub screen: Screen,
}

pub(crate) fn instructions_for(prompt: Prompt, config: &LatchConfig) -> &str {
    match prompt {
        Prompt::Enter => &config.instructions,
        Prompt::Confirm => &config.confirm_instructions,
    }
}
