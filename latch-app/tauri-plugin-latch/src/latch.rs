//! Lock screen hosted by a Tauri application.
//!
//! The webview draws the keypad and bubbles. Rust owns the passcode state
//! and tells the webview what to show through `latch://` events; key
//! presses come back through the plugin commands.

use std::sync::Arc;

use latch_core::{
    FailureReason, LatchConfig, PasscodeController, PasscodeDelegate, PasscodeState,
    PasscodeView, Screen, StoragePaths,
};
use tauri::{
    path::BaseDirectory, plugin::PluginApi, AppHandle, Emitter, Manager, Runtime,
};
use tracing::{debug, info, warn};

use crate::models::*;

/// Bundled default passcode list, resolved against the app's resources.
const SEED_RESOURCE: &str = "latch/seed.json";

/// Initialize the lock screen for this app.
pub fn init<R: Runtime>(
    app: &AppHandle<R>,
    api: PluginApi<R, Option<LatchConfig>>,
) -> crate::Result<Latch> {
    let config = api.config().clone().unwrap_or_default();
    config.validate()?;

    let data_dir = app.path().app_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let mut paths = StoragePaths::new(&data_dir, &config.storage_file);
    match app.path().resolve(SEED_RESOURCE, BaseDirectory::Resource) {
        Ok(seed) => paths = paths.with_seed(seed),
        Err(e) => debug!("No passcode seed resource: {}", e),
    }

    let events = Arc::new(WebviewEvents {
        app: app.clone(),
        config: config.clone(),
    });
    let controller = PasscodeController::new(
        &config,
        &paths,
        events.clone(),
        events,
        tauri::async_runtime::handle().inner().clone(),
    );

    info!("Latch initialized, passcode file: {:?}", paths.file);
    Ok(Latch { controller })
}

/// Access to the lock screen APIs.
pub struct Latch {
    controller: PasscodeController,
}

impl Latch {
    /// Present the lock screen in Check mode.
    ///
    /// Fails with `PasscodeNotSet` (and emits `latch://failed`) when no
    /// passcode has been stored yet.
    pub fn authorize(&self) -> crate::Result<()> {
        Ok(self.controller.authorize()?)
    }

    /// Present the lock screen in Set mode.
    pub fn set_passcode(&self) {
        self.controller.set_passcode();
    }

    /// Forward a keypad press: 0–9 for digits, negative for delete/cancel.
    pub fn key_pressed(&self, key: i32) -> crate::Result<()> {
        Ok(self.controller.key_code(key)?)
    }

    pub fn dismiss(&self) {
        self.controller.dismiss();
    }

    pub fn status(&self) -> LatchStatus {
        LatchStatus {
            state: self.controller.state(),
            passcode_set: self.controller.is_passcode_set(),
            screen: self.controller.screen(),
        }
    }

    /// The underlying controller, for hosts that drive it from Rust.
    pub fn controller(&self) -> &PasscodeController {
        &self.controller
    }
}

/// Forwards view updates and outcomes to the webview as events.
struct WebviewEvents<R: Runtime> {
    app: AppHandle<R>,
    config: LatchConfig,
}

impl<R: Runtime> WebviewEvents<R> {
    fn emit<S: serde::Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            warn!("Failed to emit {}: {}", event, e);
        }
    }
}

impl<R: Runtime> PasscodeView for WebviewEvents<R> {
    fn present(&self, state: PasscodeState) {
        let screen = Screen::initial(state);
        self.emit(
            EVENT_PRESENT,
            PresentPayload {
                state,
                screen,
                instructions: instructions_for(screen.prompt, &self.config).to_string(),
            },
        );
    }

    fn render(&self, screen: &Screen) {
        self.emit(EVENT_RENDER, RenderPayload::new(*screen, &self.config));
    }

    fn dismiss(&self) {
        self.emit(EVENT_DISMISS, ());
    }
}

impl<R: Runtime> PasscodeDelegate for WebviewEvents<R> {
    fn passcode_granted(&self) {
        self.emit(EVENT_GRANTED, ());
    }

    fn passcode_set(&self) {
        self.emit(EVENT_SET, ());
    }

    fn passcode_failed(&self, reason: FailureReason) {
        self.emit(EVENT_FAILED, FailedPayload::from(reason));
    }
}
