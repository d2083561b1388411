//! Commands the web content can send to the shell.
//!
//! On the wire a command is `{"command": "<name>", "payload": <value>}`, with
//! `payload` omitted for commands that take nothing. Replies are plain JSON:
//! `null` for commands without a result.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::autostart::StartupIntent;
use crate::error::Result;
use crate::host::{CaptureSource, CaptureSources, KeybindNotifier, ShortcutRegistry};
use crate::lifecycle::LifecycleController;
use crate::schedule::TaskHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "camelCase")]
pub enum Command {
    // Window
    Close,
    Maximize,
    Minimize,
    MoveTop,
    SetContentProtection(bool),
    FlushStorageData,

    // App
    Restart,
    Quit,
    CheckForUpdates,

    // Startup
    GetStartupSettings,
    SetStartupSettings(StartupIntent),

    // Global shortcuts
    ResetKeybinds,
    SetKeybinds(Vec<String>),

    // Capture
    GetSources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    None,
    Sources(Vec<SourceInfo>),
    StartupSettings(StartupIntent),
    /// Combos that could not be registered; the rest are active.
    Keybinds { failed: Vec<String> },
}

/// A capture source as the content sees it, images as data URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub app_icon: Option<String>,
}

impl From<CaptureSource> for SourceInfo {
    fn from(source: CaptureSource) -> Self {
        Self {
            id: source.id,
            name: source.name,
            thumbnail: png_data_url(&source.thumbnail),
            app_icon: source.app_icon.as_deref().map(png_data_url),
        }
    }
}

fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// A command together with where its reply and keybind events go.
pub struct Request {
    pub command: Command,
    /// Receives the combo whenever a shortcut registered by this request fires.
    pub notify: KeybindNotifier,
    pub reply: oneshot::Sender<std::result::Result<Reply, String>>,
}

#[derive(Clone)]
pub struct Dispatcher {
    controller: Arc<LifecycleController>,
    shortcuts: Arc<dyn ShortcutRegistry>,
    captures: Arc<dyn CaptureSources>,
}

impl Dispatcher {
    pub fn new(
        controller: Arc<LifecycleController>,
        shortcuts: Arc<dyn ShortcutRegistry>,
        captures: Arc<dyn CaptureSources>,
    ) -> Self {
        Self {
            controller,
            shortcuts,
            captures,
        }
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    pub async fn dispatch(&self, command: Command, notify: KeybindNotifier) -> Result<Reply> {
        debug!("dispatching {:?}", command);
        let c = &self.controller;
        match command {
            Command::Close => c.close()?,
            Command::Maximize => c.toggle_maximize()?,
            Command::Minimize => c.minimize()?,
            Command::MoveTop => c.move_top()?,
            Command::SetContentProtection(enabled) => c.set_content_protection(enabled)?,
            Command::FlushStorageData => c.flush_storage()?,
            Command::Restart => c.restart()?,
            Command::Quit => c.quit(),
            Command::CheckForUpdates => c.check_for_updates().await,
            Command::GetStartupSettings => return Ok(Reply::StartupSettings(c.startup_settings()?)),
            Command::SetStartupSettings(intent) => c.set_startup_settings(intent)?,
            Command::ResetKeybinds => self.shortcuts.unregister_all()?,
            Command::SetKeybinds(combos) => return Ok(self.set_keybinds(&combos, notify)),
            Command::GetSources => {
                let sources = self.captures.sources().await?;
                return Ok(Reply::Sources(sources.into_iter().map(SourceInfo::from).collect()));
            }
        }
        Ok(Reply::None)
    }

    /// Replaces every registered shortcut with `combos`. A combo that fails
    /// to register is reported and skipped.
    fn set_keybinds(&self, combos: &[String], notify: KeybindNotifier) -> Reply {
        if let Err(e) = self.shortcuts.unregister_all() {
            warn!("failed to clear shortcuts: {}", e);
        }

        let mut failed = Vec::new();
        for combo in combos {
            if let Err(e) = self.shortcuts.register(combo, notify.clone()) {
                warn!("skipping shortcut {}: {}", combo, e);
                failed.push(combo.clone());
            }
        }
        Reply::Keybinds { failed }
    }

    /// Handles requests from `rx` until it closes. Each request runs on its
    /// own task so a slow command never holds up the next one.
    pub fn serve(self, mut rx: mpsc::Receiver<Request>) -> TaskHandle {
        TaskHandle::spawn(async move {
            while let Some(request) = rx.recv().await {
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    let reply = dispatcher
                        .dispatch(request.command, request.notify)
                        .await
                        .map_err(|e| e.to_string());
                    if request.reply.send(reply).is_err() {
                        debug!("command caller went away");
                    }
                });
            }
            debug!("command channel closed");
        })
    }
}
