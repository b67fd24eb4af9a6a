//! Numeric passcode lock screen.
//!
//! This crate holds everything about the lock screen except drawing it:
//! - the entry state machine (Check / Set / Inactive) in [`machine`]
//! - the passcode file in [`storage`]
//! - [`PasscodeController`], which connects the machine to a host's view,
//!   delegate and async runtime
//!
//! Hosts implement [`PasscodeView`] to draw the keypad and bubbles and
//! [`PasscodeDelegate`] to learn whether access was granted.

pub mod config;
pub mod controller;
pub mod delegate;
pub mod error;
pub mod machine;
pub mod models;
pub mod storage;

pub use config::{load_config, save_config, LatchConfig};
pub use controller::PasscodeController;
pub use delegate::{Outcome, PasscodeDelegate, PasscodeView};
pub use error::{FailureReason, LatchError, LatchResult};
pub use machine::{Effect, PasscodeMachine, Timer};
pub use models::{ActionKey, Feedback, Key, PasscodeState, Prompt, Screen, PASSCODE_LENGTH};
pub use storage::{PasscodeStorage, StoragePaths};
