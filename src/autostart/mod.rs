mod native;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigHandle;
use crate::error::Result;
use crate::launch::LaunchArgs;

pub use native::{for_current_platform, AutoLaunchItems, LoginItemStatus, LoginItems};

#[cfg(test)]
pub use native::mock;

/// Passed by the OS login item so a launch can tell it was automatic.
pub const AUTOSTART_FLAG: &str = "--autostart";
/// Stored in `autostartArgs` when autostart launches should stay in the tray.
pub const MINIMIZED_FLAG: &str = "--minimized";
/// Added by hidden launch agents.
pub const HIDDEN_FLAG: &str = "--hidden";

/// Launch-at-login preference, independent of how the OS stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartupIntent {
    pub enabled: bool,
    pub minimized: bool,
}

impl StartupIntent {
    /// Applied once on a fresh install.
    pub const FIRST_RUN: Self = Self {
        enabled: true,
        minimized: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Generic,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Generic
        }
    }
}

pub trait PlatformAutostartAdapter: Send + Sync {
    fn get(&self) -> Result<StartupIntent>;
    fn set(&self, intent: StartupIntent) -> Result<()>;
    /// Whether this launch should start with the window hidden.
    fn launched_hidden(&self, launch: &LaunchArgs) -> bool;
}

/// The OS only knows on/off; "minimized" lives in the config's
/// `autostartArgs`.
pub struct WindowsLike {
    items: Box<dyn LoginItems>,
    config: ConfigHandle,
}

impl WindowsLike {
    pub fn new(items: Box<dyn LoginItems>, config: ConfigHandle) -> Self {
        Self { items, config }
    }
}

impl PlatformAutostartAdapter for WindowsLike {
    fn get(&self) -> Result<StartupIntent> {
        let status = self.items.status()?;
        Ok(StartupIntent {
            enabled: status.open_at_login,
            minimized: self.config.snapshot().starts_minimized(),
        })
    }

    fn set(&self, intent: StartupIntent) -> Result<()> {
        self.config.update(|c| {
            c.autostart_args = if intent.minimized {
                vec![MINIMIZED_FLAG.to_string()]
            } else {
                Vec::new()
            };
        })?;

        if intent.enabled {
            self.items.register(&[AUTOSTART_FLAG], false)
        } else {
            self.items.unregister()
        }
    }

    fn launched_hidden(&self, launch: &LaunchArgs) -> bool {
        launch.autostart && self.config.snapshot().starts_minimized()
    }
}

/// Hidden launch is a native property of the login item.
pub struct MacLike {
    items: Box<dyn LoginItems>,
}

impl MacLike {
    pub fn new(items: Box<dyn LoginItems>) -> Self {
        Self { items }
    }
}

impl PlatformAutostartAdapter for MacLike {
    fn get(&self) -> Result<StartupIntent> {
        let status = self.items.status()?;
        Ok(StartupIntent {
            enabled: status.open_at_login,
            minimized: status.open_as_hidden,
        })
    }

    fn set(&self, intent: StartupIntent) -> Result<()> {
        if intent.enabled {
            self.items.register(&[AUTOSTART_FLAG], intent.minimized)
        } else {
            self.items.unregister()
        }
    }

    fn launched_hidden(&self, launch: &LaunchArgs) -> bool {
        launch.hidden
    }
}

/// Only on/off is representable.
pub struct GenericLike {
    items: Box<dyn LoginItems>,
}

impl GenericLike {
    pub fn new(items: Box<dyn LoginItems>) -> Self {
        Self { items }
    }
}

impl PlatformAutostartAdapter for GenericLike {
    fn get(&self) -> Result<StartupIntent> {
        Ok(StartupIntent {
            enabled: self.items.status()?.open_at_login,
            minimized: false,
        })
    }

    fn set(&self, intent: StartupIntent) -> Result<()> {
        if intent.enabled {
            self.items.register(&[AUTOSTART_FLAG], false)
        } else {
            self.items.unregister()
        }
    }

    fn launched_hidden(&self, _launch: &LaunchArgs) -> bool {
        false
    }
}

pub struct StartupReconciler {
    adapter: Box<dyn PlatformAutostartAdapter>,
}

impl StartupReconciler {
    pub fn new(adapter: Box<dyn PlatformAutostartAdapter>) -> Self {
        Self { adapter }
    }

    pub fn for_platform(platform: Platform, items: Box<dyn LoginItems>, config: ConfigHandle) -> Self {
        let adapter: Box<dyn PlatformAutostartAdapter> = match platform {
            Platform::Windows => Box::new(WindowsLike::new(items, config)),
            Platform::MacOs => Box::new(MacLike::new(items)),
            Platform::Generic => Box::new(GenericLike::new(items)),
        };
        Self::new(adapter)
    }

    pub fn get(&self) -> Result<StartupIntent> {
        self.adapter.get()
    }

    pub fn set(&self, intent: StartupIntent) -> Result<()> {
        info!(enabled = intent.enabled, minimized = intent.minimized, "applying startup settings");
        self.adapter.set(intent)
    }

    pub fn launched_hidden(&self, launch: &LaunchArgs) -> bool {
        self.adapter.launched_hidden(launch)
    }

    /// Registers launch-at-login for a new install. Failure only costs the
    /// convenience, so it is logged and reported as `false`.
    pub fn apply_first_run(&self) -> bool {
        match self.set(StartupIntent::FIRST_RUN) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not register autostart on first run: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MemoryLoginItems;
    use super::*;
    use crate::config::ConfigStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reconciler(platform: Platform) -> (StartupReconciler, Arc<MemoryLoginItems>, ConfigHandle, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = ConfigHandle::load(ConfigStore::in_dir(dir.path()));
        let items = Arc::new(MemoryLoginItems::default());
        let reconciler = StartupReconciler::for_platform(platform, Box::new(items.clone()), config.clone());
        (reconciler, items, config, dir)
    }

    #[test]
    fn set_twice_is_idempotent_on_every_platform() {
        for platform in [Platform::Windows, Platform::MacOs, Platform::Generic] {
            let (reconciler, _items, _config, _dir) = reconciler(platform);
            let intent = StartupIntent {
                enabled: true,
                minimized: true,
            };

            reconciler.set(intent).unwrap();
            let first = reconciler.get().unwrap();
            reconciler.set(intent).unwrap();
            let second = reconciler.get().unwrap();

            assert_eq!(first, second, "{platform:?}");
            assert!(first.enabled, "{platform:?}");
        }
    }

    #[test]
    fn windows_keeps_minimized_in_config() {
        let (reconciler, items, config, dir) = reconciler(Platform::Windows);

        reconciler
            .set(StartupIntent {
                enabled: true,
                minimized: false,
            })
            .unwrap();
        assert_eq!(items.registered_args(), Some(vec!["--autostart".to_string()]));
        assert!(config.snapshot().autostart_args.is_empty());
        // written through to disk
        assert!(ConfigStore::in_dir(dir.path()).load().autostart_args.is_empty());

        reconciler.set(StartupIntent::FIRST_RUN).unwrap();
        assert_eq!(reconciler.get().unwrap(), StartupIntent::FIRST_RUN);
        assert_eq!(config.snapshot().autostart_args, vec!["--minimized".to_string()]);

        reconciler
            .set(StartupIntent {
                enabled: false,
                minimized: true,
            })
            .unwrap();
        assert_eq!(items.registered_args(), None);
        assert_eq!(
            reconciler.get().unwrap(),
            StartupIntent {
                enabled: false,
                minimized: true
            }
        );
    }

    #[test]
    fn mac_uses_native_hidden_flag_and_leaves_config_alone() {
        let (reconciler, _items, _config, dir) = reconciler(Platform::MacOs);

        reconciler.set(StartupIntent::FIRST_RUN).unwrap();
        assert_eq!(reconciler.get().unwrap(), StartupIntent::FIRST_RUN);
        assert!(!ConfigStore::in_dir(dir.path()).exists());

        reconciler
            .set(StartupIntent {
                enabled: true,
                minimized: false,
            })
            .unwrap();
        assert!(!reconciler.get().unwrap().minimized);
    }

    #[test]
    fn generic_never_reports_minimized() {
        let (reconciler, _items, _config, _dir) = reconciler(Platform::Generic);

        reconciler.set(StartupIntent::FIRST_RUN).unwrap();
        assert_eq!(
            reconciler.get().unwrap(),
            StartupIntent {
                enabled: true,
                minimized: false
            }
        );
        assert!(!reconciler.launched_hidden(&LaunchArgs {
            autostart: true,
            hidden: true,
            ..Default::default()
        }));
    }

    #[test]
    fn hidden_launch_rules() {
        let autostart = LaunchArgs {
            autostart: true,
            ..Default::default()
        };

        let (windows, _, config, _dir) = reconciler(Platform::Windows);
        assert!(windows.launched_hidden(&autostart));
        assert!(!windows.launched_hidden(&LaunchArgs::default()));
        config.update(|c| c.autostart_args.clear()).unwrap();
        assert!(!windows.launched_hidden(&autostart));

        let (mac, _, _, _dir) = reconciler(Platform::MacOs);
        assert!(!mac.launched_hidden(&autostart));
        assert!(mac.launched_hidden(&LaunchArgs {
            hidden: true,
            ..Default::default()
        }));
    }

    #[test]
    fn first_run_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let config = ConfigHandle::load(ConfigStore::in_dir(dir.path()));
        let reconciler = StartupReconciler::for_platform(
            Platform::Generic,
            Box::new(MemoryLoginItems::failing()),
            config,
        );

        assert!(!reconciler.apply_first_run());
    }
}
