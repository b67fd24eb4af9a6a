//! Tauri command handlers for the latch plugin.

use tauri::{command, AppHandle, Runtime};

use crate::models::LatchStatus;
use crate::LatchExt;
use crate::Result;

/// Show the lock screen and ask for the stored passcode.
///
/// Returns the `PASSCODE_NOT_SET` error without presenting anything when
/// no passcode has been configured.
#[command]
pub(crate) async fn authorize<R: Runtime>(app: AppHandle<R>) -> Result<()> {
    app.latch().authorize()
}

/// Show the lock screen and ask for a new passcode, then its confirmation.
#[command]
pub(crate) async fn set_passcode<R: Runtime>(app: AppHandle<R>) -> Result<()> {
    app.latch().set_passcode();
    Ok(())
}

/// Forward a keypad press.
///
/// `key` is 0–9 for digits; any negative value is the delete/cancel key.
#[command]
pub(crate) async fn key_pressed<R: Runtime>(app: AppHandle<R>, key: i32) -> Result<()> {
    app.latch().key_pressed(key)
}

/// Close the lock screen without an outcome.
#[command]
pub(crate) async fn dismiss<R: Runtime>(app: AppHandle<R>) -> Result<()> {
    app.latch().dismiss();
    Ok(())
}

#[command]
pub(crate) async fn status<R: Runtime>(app: AppHandle<R>) -> Result<LatchStatus> {
    Ok(app.latch().status())
}
