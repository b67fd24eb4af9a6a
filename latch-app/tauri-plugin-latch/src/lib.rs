use tauri::{
  plugin::{Builder, TauriPlugin},
  Manager, Runtime,
};

pub use latch_core::{FailureReason, LatchConfig, LatchError, PasscodeState};
pub use models::*;

mod commands;
mod error;
mod latch;
mod models;

pub use error::{Error, Result};
pub use latch::Latch;

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the lock screen APIs.
pub trait LatchExt<R: Runtime> {
  fn latch(&self) -> &Latch;
}

impl<R: Runtime, T: Manager<R>> crate::LatchExt<R> for T {
  fn latch(&self) -> &Latch {
    self.state::<Latch>().inner()
  }
}

/// Initializes the plugin.
///
/// Configuration is read from `plugins.latch` in `tauri.conf.json`; every
/// field is optional.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<LatchConfig>> {
  Builder::<R, Option<LatchConfig>>::new("latch")
    .invoke_handler(tauri::generate_handler![
      commands::authorize,
      commands::set_passcode,
      commands::key_pressed,
      commands::dismiss,
      commands::status,
    ])
    .setup(|app, api| {
      let latch = latch::init(app, api)?;
      app.manage(latch);
      Ok(())
    })
    .on_event(|app, event| {
      if let tauri::RunEvent::Exit = event {
        if let Some(latch) = app.try_state::<Latch>() {
          latch.dismiss();
        }
      }
    })
    .build()
}
