//! The passcode entry state machine.
//!
//! `PasscodeMachine` is synchronous and owns no timers or callbacks. Every
//! operation returns the list of [`Effect`]s the host must carry out, in
//! order. [`crate::PasscodeController`] is the host used by applications;
//! tests drive the machine directly.

use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::delegate::Outcome;
use crate::error::{FailureReason, LatchError, LatchResult};
use crate::models::{ActionKey, Feedback, Key, PasscodeState, Prompt, Screen, PASSCODE_LENGTH};
use crate::storage::PasscodeStorage;

/// Delayed work requested by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Call [`PasscodeMachine::complete_grant`] after the grant delay.
    Grant,
    /// Call [`PasscodeMachine::clear_feedback`] with the rejection number
    /// after the feedback delay.
    ClearFeedback(u64),
}

/// Something the host has to do as a result of a machine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Show the lock screen in the given mode.
    Present(PasscodeState),
    /// Redraw bubbles, prompt and action key.
    Render(Screen),
    /// Close the lock screen.
    Dismiss,
    Schedule(Timer),
    /// Report to the delegate.
    Outcome(Outcome),
}

pub struct PasscodeMachine {
    storage: PasscodeStorage,
    state: PasscodeState,
    entry: Zeroizing<Vec<u8>>,
    pending: Option<Zeroizing<String>>,
    screen: Screen,
    grant_pending: bool,
    /// Bumped on every rejected entry; only the newest reset timer applies.
    rejections: u64,
}

impl PasscodeMachine {
    pub fn new(storage: PasscodeStorage) -> Self {
        Self {
            storage,
            state: PasscodeState::Inactive,
            entry: Zeroizing::new(Vec::with_capacity(PASSCODE_LENGTH)),
            pending: None,
            screen: Screen::initial(PasscodeState::Inactive),
            grant_pending: false,
            rejections: 0,
        }
    }

    pub fn state(&self) -> PasscodeState {
        self.state
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Digits in the current attempt.
    pub fn entered(&self) -> usize {
        self.entry.len()
    }

    /// Whether a Set flow is waiting for the confirmation entry.
    pub fn has_pending_candidate(&self) -> bool {
        self.pending.is_some()
    }

    pub fn storage(&self) -> &PasscodeStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut PasscodeStorage {
        &mut self.storage
    }

    /// Start a Check flow. Fails without presenting if no passcode is stored.
    pub fn authorize(&mut self) -> LatchResult<Vec<Effect>> {
        if !self.storage.is_set() {
            info!("Authorize requested but no passcode is set");
            return Err(LatchError::PasscodeNotSet);
        }
        Ok(self.start(PasscodeState::Check))
    }

    /// Start a Set flow.
    pub fn set_passcode(&mut self) -> Vec<Effect> {
        self.start(PasscodeState::Set)
    }

    fn start(&mut self, state: PasscodeState) -> Vec<Effect> {
        if self.state != PasscodeState::Inactive {
            debug!("Restarting active {} session as {}", self.state, state);
        }

        self.reset_session();
        self.state = state;
        self.screen = Screen::initial(state);
        info!("Passcode session started: {}", state);

        vec![Effect::Present(state), Effect::Render(self.screen)]
    }

    pub fn key_pressed(&mut self, key: Key) -> Vec<Effect> {
        if self.state == PasscodeState::Inactive {
            debug!("Ignoring key press while inactive");
            return Vec::new();
        }
        if self.grant_pending {
            debug!("Ignoring key press while access is being granted");
            return Vec::new();
        }

        match key {
            Key::Delete if self.entry.is_empty() => {
                if self.state == PasscodeState::Set {
                    info!("Set passcode cancelled");
                    return self.dismiss();
                }
                return Vec::new();
            }
            Key::Delete => {
                if let Some(mut digit) = self.entry.pop() {
                    digit.zeroize();
                }
            }
            Key::Digit(digit) if digit > 9 => {
                warn!("Ignoring out of range digit {}", digit);
                return Vec::new();
            }
            Key::Digit(digit) => self.entry.push(digit),
        }

        self.screen.filled = self.entry.len();
        self.screen.feedback = Feedback::Normal;

        if self.entry.len() == PASSCODE_LENGTH {
            let code = self.take_entry();
            return match self.state {
                PasscodeState::Check => self.check_passcode(&code),
                PasscodeState::Set => self.store_passcode(&code),
                PasscodeState::Inactive => Vec::new(),
            };
        }

        self.screen.action_key = self.action_key();
        vec![Effect::Render(self.screen)]
    }

    /// Finish a successful Check once the grant delay has passed.
    pub fn complete_grant(&mut self) -> Vec<Effect> {
        if !self.grant_pending || self.state != PasscodeState::Check {
            return Vec::new();
        }

        info!("Passcode granted");
        let mut effects = vec![Effect::Outcome(Outcome::Granted)];
        effects.extend(self.dismiss());
        effects
    }

    /// Return to the normal style after rejected entry number `rejection`.
    ///
    /// Ignored if another entry was rejected since, so every error stays
    /// visible for the full delay.
    pub fn clear_feedback(&mut self, rejection: u64) -> Vec<Effect> {
        if self.state == PasscodeState::Inactive || self.screen.feedback == Feedback::Normal {
            return Vec::new();
        }
        if rejection != self.rejections {
            debug!("Keeping error feedback of a newer rejection");
            return Vec::new();
        }

        self.screen.feedback = Feedback::Normal;
        vec![Effect::Render(self.screen)]
    }

    /// Close the lock screen. No effect while inactive.
    pub fn dismiss(&mut self) -> Vec<Effect> {
        if self.state == PasscodeState::Inactive {
            return Vec::new();
        }

        debug!("Dismissing {} session", self.state);
        self.reset_session();
        self.state = PasscodeState::Inactive;
        self.screen = Screen::initial(PasscodeState::Inactive);

        vec![Effect::Dismiss]
    }

    fn check_passcode(&mut self, code: &str) -> Vec<Effect> {
        let matches = self
            .storage
            .read_passcode()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(code.as_bytes())))
            .unwrap_or(false);

        if !matches {
            debug!("Passcode rejected");
            return self.reject();
        }

        self.grant_pending = true;
        self.screen.filled = PASSCODE_LENGTH;
        vec![Effect::Render(self.screen), Effect::Schedule(Timer::Grant)]
    }

    fn store_passcode(&mut self, code: &str) -> Vec<Effect> {
        if self.pending.is_none() {
            debug!("New passcode entered, awaiting confirmation");
            self.pending = Some(Zeroizing::new(code.to_owned()));
            self.screen = Screen {
                filled: 0,
                feedback: Feedback::Normal,
                prompt: Prompt::Confirm,
                action_key: ActionKey::Cancel,
            };
            return vec![Effect::Render(self.screen)];
        }

        let confirmed = self
            .pending
            .as_deref()
            .map(|candidate| bool::from(candidate.as_bytes().ct_eq(code.as_bytes())))
            .unwrap_or(false);

        if !confirmed {
            // The candidate is kept: the user retries the confirmation.
            debug!("Passcode confirmation mismatch");
            return self.reject();
        }

        let outcome = match self.storage.save_passcode(code) {
            Ok(()) => {
                info!("Passcode set");
                Outcome::Set
            }
            Err(e) => {
                error!("Failed to persist passcode: {}", e);
                Outcome::Failed(FailureReason::StorageUnavailable)
            }
        };

        let mut effects = vec![Effect::Outcome(outcome)];
        effects.extend(self.dismiss());
        effects
    }

    fn reject(&mut self) -> Vec<Effect> {
        self.rejections = self.rejections.wrapping_add(1);
        self.screen.filled = 0;
        self.screen.feedback = Feedback::Error;
        self.screen.action_key = self.action_key();
        vec![
            Effect::Render(self.screen),
            Effect::Schedule(Timer::ClearFeedback(self.rejections)),
        ]
    }

    fn action_key(&self) -> ActionKey {
        if self.state == PasscodeState::Set && self.entry.is_empty() {
            ActionKey::Cancel
        } else {
            ActionKey::Delete
        }
    }

    fn take_entry(&mut self) -> Zeroizing<String> {
        let code: String = self.entry.iter().map(|d| char::from(b'0' + d)).collect();
        self.entry.zeroize();
        Zeroizing::new(code)
    }

    fn reset_session(&mut self) {
        self.entry.zeroize();
        self.pending = None;
        self.grant_pending = false;
    }
}

impl std::fmt::Debug for PasscodeMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasscodeMachine")
            .field("state", &self.state)
            .field("entered", &self.entry.len())
            .field("pending", &self.pending.is_some())
            .field("grant_pending", &self.grant_pending)
            .finish()
    }
}
