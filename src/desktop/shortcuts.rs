use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::host::{KeybindNotifier, ShortcutRegistry};
use crate::lock;

struct Binding {
    hotkey: HotKey,
    combo: String,
    notify: KeybindNotifier,
}

/// System-wide shortcuts through `global-hotkey`. Combos use accelerator
/// syntax (`"CmdOrCtrl+Shift+M"`).
pub struct GlobalShortcuts {
    manager: Mutex<GlobalHotKeyManager>,
    bindings: Mutex<HashMap<u32, Binding>>,
}

impl GlobalShortcuts {
    /// Creates the manager and starts the thread that delivers presses.
    pub fn start() -> anyhow::Result<Arc<Self>> {
        let manager = GlobalHotKeyManager::new()?;
        let shortcuts = Arc::new(Self {
            manager: Mutex::new(manager),
            bindings: Mutex::new(HashMap::new()),
        });

        let weak = Arc::downgrade(&shortcuts);
        thread::spawn(move || {
            info!("starting global shortcut listener thread");
            let receiver = GlobalHotKeyEvent::receiver();
            while let Ok(event) = receiver.recv() {
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                let Some(shortcuts) = weak.upgrade() else {
                    break;
                };
                shortcuts.fire(event.id);
            }
            debug!("global shortcut listener stopped");
        });

        Ok(shortcuts)
    }

    fn fire(&self, id: u32) {
        let target = lock(&self.bindings)
            .get(&id)
            .map(|b| (b.combo.clone(), b.notify.clone()));
        if let Some((combo, notify)) = target {
            debug!("shortcut {} pressed", combo);
            notify(&combo);
        }
    }
}

impl ShortcutRegistry for GlobalShortcuts {
    fn unregister_all(&self) -> Result<()> {
        let hotkeys: Vec<HotKey> = lock(&self.bindings)
            .drain()
            .map(|(_, b)| b.hotkey)
            .collect();
        if hotkeys.is_empty() {
            return Ok(());
        }
        lock(&self.manager)
            .unregister_all(&hotkeys)
            .map_err(|e| Error::Host(format!("failed to unregister shortcuts: {e}")))
    }

    fn register(&self, combo: &str, notify: KeybindNotifier) -> Result<()> {
        let hotkey: HotKey = combo.parse().map_err(|e| Error::Keybind {
            combo: combo.to_string(),
            reason: format!("{e}"),
        })?;
        lock(&self.manager)
            .register(hotkey)
            .map_err(|e| Error::Keybind {
                combo: combo.to_string(),
                reason: e.to_string(),
            })?;

        info!("registered shortcut {}", combo);
        lock(&self.bindings).insert(
            hotkey.id(),
            Binding {
                hotkey,
                combo: combo.to_string(),
                notify,
            },
        );
        Ok(())
    }
}

impl Drop for GlobalShortcuts {
    fn drop(&mut self) {
        if let Err(e) = self.unregister_all() {
            warn!("{}", e);
        }
    }
}
