//! Terminal rendering of the lock screen.

use latch_core::{
    ActionKey, FailureReason, Feedback, LatchConfig, Outcome, PasscodeDelegate, PasscodeState,
    PasscodeView, Prompt, Screen, PASSCODE_LENGTH,
};
use tokio::sync::mpsc;

/// What the session loop waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Outcome(Outcome),
    Dismissed,
}

/// Draws the lock screen on stdout and reports outcomes to the session loop.
pub struct TerminalView {
    config: LatchConfig,
    tx: mpsc::UnboundedSender<Signal>,
}

impl TerminalView {
    pub fn new(config: LatchConfig, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { config, tx }
    }

    fn send(&self, signal: Signal) {
        // The receiver is gone once the session loop has returned
        let _ = self.tx.send(signal);
    }

    fn instructions(&self, prompt: Prompt) -> &str {
        match prompt {
            Prompt::Enter => &self.config.instructions,
            Prompt::Confirm => &self.config.confirm_instructions,
        }
    }
}

impl PasscodeView for TerminalView {
    fn present(&self, state: PasscodeState) {
        let hint = match state {
            PasscodeState::Set => "type digits, '-' to delete or cancel",
            _ => "type digits, '-' to delete",
        };
        println!("{} ({})", self.instructions(Prompt::Enter), hint);
    }

    fn render(&self, screen: &Screen) {
        println!(
            "{}  {}  [{}]",
            self.instructions(screen.prompt),
            bubbles(screen),
            action_label(screen.action_key)
        );
    }

    fn dismiss(&self) {
        self.send(Signal::Dismissed);
    }
}

impl PasscodeDelegate for TerminalView {
    fn passcode_granted(&self) {
        self.send(Signal::Outcome(Outcome::Granted));
    }

    fn passcode_set(&self) {
        self.send(Signal::Outcome(Outcome::Set));
    }

    fn passcode_failed(&self, reason: FailureReason) {
        self.send(Signal::Outcome(Outcome::Failed(reason)));
    }
}

/// One glyph per digit slot.
pub fn bubbles(screen: &Screen) -> String {
    (0..PASSCODE_LENGTH)
        .map(|i| match screen.feedback {
            Feedback::Error => "✕",
            Feedback::Normal if i < screen.filled => "●",
            Feedback::Normal => "○",
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn action_label(key: ActionKey) -> &'static str {
    match key {
        ActionKey::Delete => "Delete",
        ActionKey::Cancel => "Cancel",
    }
}
