//! Capabilities the shell consumes from the windowing host.
//!
//! The lifecycle controller only talks to these traits, so it can be driven
//! by the Tauri host in the app and by the recording fakes in [`mock`] in
//! tests.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::window_state::Bounds;

/// Events the host forwards to the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ReadyToShow,
    Resized,
    Maximized,
    Unmaximized,
    /// The content failed to load (offline, DNS, TLS).
    LoadFailed,
    /// The content process died without navigating away.
    ContentCrashed,
    /// Key pressed while the content view has focus (`"F5"`, `"F12"`).
    KeyDown { key: String },
    /// Another launch was redirected to this instance.
    SecondInstance,
    Tray(TrayAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Open,
    Restart,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    pub title: String,
    pub url: Url,
    /// `None` lets the host center a default-sized window.
    pub bounds: Option<Bounds>,
    pub default_size: (u32, u32),
    pub min_size: (u32, u32),
    pub browser_args: Vec<String>,
}

pub trait Host: Send + Sync {
    fn create_tray(&self, tooltip: &str) -> Result<()>;
    /// Creates the main window hidden; the controller decides when to show it.
    fn create_window(&self, options: &WindowOptions) -> Result<Arc<dyn HostWindow>>;
    /// Starts a new copy of the app with `args`. The caller exits afterwards.
    fn relaunch(&self, args: &[String]) -> Result<()>;
    fn exit(&self, code: i32);
    fn open_external(&self, url: &Url) -> Result<()>;
}

pub trait HostWindow: Send + Sync {
    fn show(&self) -> Result<()>;
    fn hide(&self) -> Result<()>;
    /// Destroys the window without asking the controller again.
    fn close(&self) -> Result<()>;
    fn focus(&self) -> Result<()>;
    fn move_top(&self) -> Result<()>;
    fn minimize(&self) -> Result<()>;
    fn is_minimized(&self) -> Result<bool>;
    fn restore(&self) -> Result<()>;
    fn maximize(&self) -> Result<()>;
    fn unmaximize(&self) -> Result<()>;
    fn is_maximized(&self) -> Result<bool>;
    fn bounds(&self) -> Result<Bounds>;
    fn url(&self) -> Result<Url>;
    fn navigate(&self, url: &Url) -> Result<()>;
    fn load_fallback(&self) -> Result<()>;
    fn reload(&self) -> Result<()>;
    fn open_devtools(&self);
    fn set_content_protection(&self, enabled: bool) -> Result<()>;
    fn flush_storage(&self) -> Result<()>;
}

/// Called with the combo string whenever a registered shortcut fires.
pub type KeybindNotifier = Arc<dyn Fn(&str) + Send + Sync>;

pub trait ShortcutRegistry: Send + Sync {
    fn unregister_all(&self) -> Result<()>;
    fn register(&self, combo: &str, notify: KeybindNotifier) -> Result<()>;
}

/// A screen or window that can be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
    /// PNG bytes; empty when the host has no preview.
    pub thumbnail: Vec<u8>,
    pub app_icon: Option<Vec<u8>>,
}

#[async_trait]
pub trait CaptureSources: Send + Sync {
    async fn sources(&self) -> Result<Vec<CaptureSource>>;
}
