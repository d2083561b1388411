use std::sync::{Mutex, MutexGuard};

pub mod autostart;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod launch;
pub mod lifecycle;
pub mod navigation;
pub mod schedule;
pub mod updater;
pub mod window_state;

#[cfg(feature = "desktop")]
mod desktop;

pub use autostart::{Platform, StartupIntent, StartupReconciler};
pub use commands::{Command, Dispatcher, Reply};
pub use config::{AppProfile, ConfigHandle, ConfigRecord, ConfigStore};
pub use error::{Error, Result};
pub use launch::LaunchArgs;
pub use lifecycle::{CloseDecision, LifecycleController, LifecycleDeps, Phase};
pub use updater::{HttpUpdateService, UpdateGate, UpdateOutcome, UpdateService};
pub use window_state::{Bounds, WindowStateStore};

#[cfg(feature = "desktop")]
pub use desktop::run;

/// Locks `m`, recovering the data if a previous holder panicked. Shell state
/// stays usable after a panicking event handler.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
