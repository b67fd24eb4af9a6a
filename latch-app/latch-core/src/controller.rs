//! PasscodeController - drives a [`PasscodeMachine`] for a host application.
//!
//! The controller:
//! - serializes access to the machine behind a mutex
//! - queues effects under that mutex and forwards them to the view and
//!   delegate, in queue order, after the lock is released
//! - runs delayed callbacks on a Tokio runtime, each bound to the
//!   cancellation token of the session that scheduled it
//!
//! Dismissing or restarting a session cancels its token, so a grant that
//! was scheduled for a session the user already left never fires.
//!
//! Only one thread delivers at a time. Effects produced while another
//! thread (or a view/delegate callback re-entering the controller) is
//! delivering are appended to the queue and delivered by that thread, so
//! hosts observe effects in the order the machine produced them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LatchConfig;
use crate::delegate::{Outcome, PasscodeDelegate, PasscodeView};
use crate::error::{FailureReason, LatchError, LatchResult};
use crate::machine::{Effect, PasscodeMachine, Timer};
use crate::models::{Key, PasscodeState, Screen};
use crate::storage::{PasscodeStorage, StoragePaths};

/// Cheap to clone; clones share the same lock screen.
#[derive(Clone)]
pub struct PasscodeController {
    inner: Arc<Shared>,
}

struct Shared {
    session: Mutex<Session>,
    view: Arc<dyn PasscodeView>,
    delegate: Arc<dyn PasscodeDelegate>,
    runtime: Handle,
    grant_delay: Duration,
    feedback_reset_delay: Duration,
}

struct Session {
    machine: PasscodeMachine,
    cancel: CancellationToken,
    /// Effects not yet delivered, with the token of the session that
    /// produced them.
    outbox: VecDeque<(Effect, CancellationToken)>,
    delivering: bool,
}

impl Session {
    /// Replace the token whenever a session begins or ends.
    fn rotate_token(&mut self, effects: &[Effect]) {
        let boundary = effects
            .iter()
            .any(|e| matches!(e, Effect::Present(_) | Effect::Dismiss));
        if boundary {
            self.cancel.cancel();
            self.cancel = CancellationToken::new();
        }
    }
}

impl PasscodeController {
    /// Open the passcode store at `paths` and build a controller around it.
    ///
    /// Delayed callbacks are spawned on `runtime`.
    pub fn new(
        config: &LatchConfig,
        paths: &StoragePaths,
        view: Arc<dyn PasscodeView>,
        delegate: Arc<dyn PasscodeDelegate>,
        runtime: Handle,
    ) -> Self {
        let storage = PasscodeStorage::open(paths, config.history_limit);
        Self::with_machine(PasscodeMachine::new(storage), config, view, delegate, runtime)
    }

    pub fn with_machine(
        machine: PasscodeMachine,
        config: &LatchConfig,
        view: Arc<dyn PasscodeView>,
        delegate: Arc<dyn PasscodeDelegate>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                session: Mutex::new(Session {
                    machine,
                    cancel: CancellationToken::new(),
                    outbox: VecDeque::new(),
                    delivering: false,
                }),
                view,
                delegate,
                runtime,
                grant_delay: config.grant_delay(),
                feedback_reset_delay: config.feedback_reset_delay(),
            }),
        }
    }

    /// Ask the user for the stored passcode.
    ///
    /// Without a stored passcode nothing is presented: the delegate gets
    /// `passcode_failed(PasscodeNotSet)` and the same error is returned.
    pub fn authorize(&self) -> LatchResult<()> {
        let mut result = Ok(());
        self.run(None, |machine| match machine.authorize() {
            Ok(effects) => effects,
            Err(e) => {
                let effects = match &e {
                    LatchError::PasscodeNotSet => vec![Effect::Outcome(Outcome::Failed(
                        FailureReason::PasscodeNotSet,
                    ))],
                    _ => Vec::new(),
                };
                result = Err(e);
                effects
            }
        });
        result
    }

    /// Ask the user to choose and confirm a new passcode.
    pub fn set_passcode(&self) {
        self.run(None, PasscodeMachine::set_passcode);
    }

    pub fn key_pressed(&self, key: Key) {
        self.run(None, |machine| machine.key_pressed(key));
    }

    /// Feed the keypad's integer callback: 0–9 are digits, negative is delete.
    pub fn key_code(&self, code: i32) -> LatchResult<()> {
        let key = Key::from_code(code)?;
        self.key_pressed(key);
        Ok(())
    }

    /// Close the lock screen if it is showing.
    pub fn dismiss(&self) {
        self.run(None, PasscodeMachine::dismiss);
    }

    pub fn state(&self) -> PasscodeState {
        self.lock().machine.state()
    }

    pub fn screen(&self) -> Screen {
        self.lock().machine.screen()
    }

    pub fn is_passcode_set(&self) -> bool {
        self.lock().machine.storage().is_set()
    }

    /// Forget the stored passcode, closing any active session first.
    pub fn clear_passcode(&self) -> LatchResult<()> {
        self.dismiss();
        self.lock().machine.storage_mut().clear()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a machine operation and carry out its effects.
    ///
    /// With `guard`, the operation is skipped if that token was cancelled
    /// before the lock was taken.
    fn run<F>(&self, guard: Option<&CancellationToken>, op: F)
    where
        F: FnOnce(&mut PasscodeMachine) -> Vec<Effect>,
    {
        {
            let mut session = self.lock();
            if guard.is_some_and(CancellationToken::is_cancelled) {
                debug!("Skipping callback for a finished session");
                return;
            }
            let effects = op(&mut session.machine);
            session.rotate_token(&effects);
            let token = session.cancel.clone();
            session
                .outbox
                .extend(effects.into_iter().map(|effect| (effect, token.clone())));

            if session.delivering {
                return;
            }
            session.delivering = true;
        }

        self.deliver_queued();
    }

    /// Drain the outbox, releasing the lock around every callback.
    fn deliver_queued(&self) {
        let _reset = DeliveryReset(self);
        while let Some((effect, token)) = self.next_queued() {
            match effect {
                Effect::Present(state) => self.inner.view.present(state),
                Effect::Render(screen) => self.inner.view.render(&screen),
                Effect::Dismiss => self.inner.view.dismiss(),
                Effect::Schedule(timer) => self.schedule(timer, token),
                Effect::Outcome(outcome) => outcome.deliver(self.inner.delegate.as_ref()),
            }
        }
    }

    /// Pop the next effect, or hand delivery back once the outbox is empty.
    fn next_queued(&self) -> Option<(Effect, CancellationToken)> {
        let mut session = self.lock();
        let next = session.outbox.pop_front();
        if next.is_none() {
            session.delivering = false;
        }
        next
    }

    fn schedule(&self, timer: Timer, token: CancellationToken) {
        let delay = match timer {
            Timer::Grant => self.inner.grant_delay,
            Timer::ClearFeedback(_) => self.inner.feedback_reset_delay,
        };
        let controller = self.clone();

        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("{:?} callback cancelled", timer);
                }
                _ = tokio::time::sleep(delay) => {
                    controller.run(Some(&token), |machine| match timer {
                        Timer::Grant => machine.complete_grant(),
                        Timer::ClearFeedback(rejection) => machine.clear_feedback(rejection),
                    });
                }
            }
        });
    }
}

/// Lets the next caller resume delivery if a view or delegate callback
/// panicked mid-drain.
struct DeliveryReset<'a>(&'a PasscodeController);

impl Drop for DeliveryReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().delivering = false;
        }
    }
}

impl std::fmt::Debug for PasscodeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasscodeController")
            .field("machine", &self.lock().machine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feedback;
    use std::sync::OnceLock;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events().iter().filter(|e| *e == event).count()
        }
    }

    impl PasscodeView for Recorder {
        fn present(&self, state: PasscodeState) {
            self.push(format!("present:{}", state));
        }
        fn render(&self, screen: &Screen) {
            self.push(format!("render:{}:{:?}", screen.filled, screen.feedback));
        }
        fn dismiss(&self) {
            self.push("dismiss");
        }
    }

    impl PasscodeDelegate for Recorder {
        fn passcode_granted(&self) {
            self.push("granted");
        }
        fn passcode_set(&self) {
            self.push("set");
        }
        fn passcode_failed(&self, reason: FailureReason) {
            self.push(format!("failed:{}", reason));
        }
    }

    fn controller(dir: &tempfile::TempDir) -> (PasscodeController, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let controller = PasscodeController::new(
            &LatchConfig::default(),
            &StoragePaths::new(dir.path(), "latch.json"),
            recorder.clone(),
            recorder.clone(),
            Handle::current(),
        );
        (controller, recorder)
    }

    /// Starts a Check session from inside `passcode_set`.
    struct RelockAfterSet {
        recorder: Arc<Recorder>,
        controller: OnceLock<PasscodeController>,
    }

    impl PasscodeDelegate for RelockAfterSet {
        fn passcode_granted(&self) {
            self.recorder.passcode_granted();
        }
        fn passcode_set(&self) {
            self.recorder.passcode_set();
            if let Some(controller) = self.controller.get() {
                controller.authorize().unwrap();
            }
        }
        fn passcode_failed(&self, reason: FailureReason) {
            self.recorder.passcode_failed(reason);
        }
    }

    fn enter(controller: &PasscodeController, code: &str) {
        for c in code.chars() {
            controller.key_pressed(Key::try_from(c).unwrap());
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorize_without_passcode() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);

        assert!(matches!(controller.authorize(), Err(LatchError::PasscodeNotSet)));
        assert_eq!(recorder.events(), vec!["failed:passcode not set"]);
        assert_eq!(controller.state(), PasscodeState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_authorize() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);

        controller.set_passcode();
        enter(&controller, "1357");
        enter(&controller, "1357");

        assert_eq!(recorder.count("set"), 1);
        assert_eq!(recorder.count("dismiss"), 1);
        assert!(controller.is_passcode_set());
        assert_eq!(controller.state(), PasscodeState::Inactive);

        controller.authorize().unwrap();
        enter(&controller, "1357");

        // Granted only after the delay.
        assert_eq!(recorder.count("granted"), 0);
        settle().await;
        assert_eq!(recorder.count("granted"), 1);
        assert_eq!(recorder.count("dismiss"), 2);
        assert_eq!(controller.state(), PasscodeState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_passcode_resets_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);
        controller.set_passcode();
        enter(&controller, "1357");
        enter(&controller, "1357");

        controller.authorize().unwrap();
        enter(&controller, "0000");
        assert_eq!(controller.screen().feedback, Feedback::Error);

        settle().await;
        assert_eq!(controller.screen().feedback, Feedback::Normal);
        assert_eq!(recorder.count("granted"), 0);
        assert_eq!(controller.state(), PasscodeState::Check);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_cancels_pending_grant() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);
        controller.set_passcode();
        enter(&controller, "2468");
        enter(&controller, "2468");

        controller.authorize().unwrap();
        enter(&controller, "2468");
        controller.dismiss();
        settle().await;

        assert_eq!(recorder.count("granted"), 0);
        assert_eq!(controller.state(), PasscodeState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_grant_does_not_leak_into_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);
        controller.set_passcode();
        enter(&controller, "2468");
        enter(&controller, "2468");

        controller.authorize().unwrap();
        enter(&controller, "2468");
        controller.authorize().unwrap();
        settle().await;

        assert_eq!(recorder.count("granted"), 0);
        assert_eq!(controller.state(), PasscodeState::Check);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_set_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = controller(&dir);

        controller.set_passcode();
        controller.key_code(-1).unwrap();

        assert_eq!(recorder.events(), vec!["present:Set", "render:0:Normal", "dismiss"]);
        assert!(!controller.is_passcode_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_key_code() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _recorder) = controller(&dir);
        controller.set_passcode();

        assert!(matches!(controller.key_code(11), Err(LatchError::InvalidKey(11))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_passcode() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _recorder) = controller(&dir);
        controller.set_passcode();
        enter(&controller, "1111");
        enter(&controller, "1111");

        controller.clear_passcode().unwrap();
        assert!(!controller.is_passcode_set());
        assert!(controller.authorize().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_rejection_keeps_error_for_full_delay() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _recorder) = controller(&dir);
        controller.set_passcode();
        enter(&controller, "1111");
        enter(&controller, "2222");
        assert_eq!(controller.screen().feedback, Feedback::Error);

        tokio::time::sleep(Duration::from_millis(150)).await;
        enter(&controller, "3333");
        assert_eq!(controller.screen().feedback, Feedback::Error);

        // The first reset is due now but belongs to the older rejection.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(controller.screen().feedback, Feedback::Error);

        settle().await;
        assert_eq!(controller.screen().feedback, Feedback::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentrant_delegate_sees_effects_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let delegate = Arc::new(RelockAfterSet {
            recorder: recorder.clone(),
            controller: OnceLock::new(),
        });
        let controller = PasscodeController::new(
            &LatchConfig::default(),
            &StoragePaths::new(dir.path(), "latch.json"),
            recorder.clone(),
            delegate.clone(),
            Handle::current(),
        );
        delegate.controller.set(controller.clone()).unwrap();

        controller.set_passcode();
        enter(&controller, "8642");
        enter(&controller, "8642");

        let events = recorder.events();
        assert_eq!(
            events[events.len() - 4..],
            ["set", "dismiss", "present:Check", "render:0:Normal"]
        );
        assert_eq!(controller.state(), PasscodeState::Check);

        // Delivery was handed back: later operations still reach the view.
        enter(&controller, "8642");
        settle().await;
        assert_eq!(recorder.count("granted"), 1);
        assert_eq!(recorder.events().last().map(String::as_str), Some("dismiss"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwritable_store_fails_set() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("data");
        std::fs::write(&not_a_dir, b"").unwrap();
        let recorder = Arc::new(Recorder::default());
        let controller = PasscodeController::new(
            &LatchConfig::default(),
            &StoragePaths::new(&not_a_dir, "latch.json"),
            recorder.clone(),
            recorder.clone(),
            Handle::current(),
        );

        controller.set_passcode();
        enter(&controller, "1357");
        enter(&controller, "1357");

        let events = recorder.events();
        assert_eq!(
            events[events.len() - 2..],
            ["failed:passcode storage unavailable", "dismiss"]
        );
        assert_eq!(recorder.count("set"), 0);
        assert!(!controller.is_passcode_set());
        assert_eq!(controller.state(), PasscodeState::Inactive);
    }
}
