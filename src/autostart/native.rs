//! OS login-item registration.
//!
//! The real backend goes through `auto-launch`: an XDG autostart entry on
//! Linux, a launch agent on macOS and the `Run` registry key on Windows.

use std::path::{Path, PathBuf};

use auto_launch::{AutoLaunch, AutoLaunchBuilder};
use tracing::{debug, info};

use crate::config::AppProfile;
use crate::error::{Error, Result};

use super::HIDDEN_FLAG;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginItemStatus {
    pub open_at_login: bool,
    pub open_as_hidden: bool,
}

pub trait LoginItems: Send + Sync {
    fn status(&self) -> Result<LoginItemStatus>;
    /// Registers (or rewrites) the login item so the app is launched with
    /// `args`. `open_as_hidden` is dropped by backends without a hidden mode.
    fn register(&self, args: &[&str], open_as_hidden: bool) -> Result<()>;
    fn unregister(&self) -> Result<()>;
}

impl<T: LoginItems + ?Sized> LoginItems for std::sync::Arc<T> {
    fn status(&self) -> Result<LoginItemStatus> {
        (**self).status()
    }

    fn register(&self, args: &[&str], open_as_hidden: bool) -> Result<()> {
        (**self).register(args, open_as_hidden)
    }

    fn unregister(&self) -> Result<()> {
        (**self).unregister()
    }
}

pub fn for_current_platform(profile: &AppProfile, data_dir: &Path) -> Result<Box<dyn LoginItems>> {
    let exe = std::env::current_exe().map_err(|e| Error::io("current_exe", e))?;
    Ok(Box::new(AutoLaunchItems::new(&profile.name, &exe, data_dir)))
}

fn login_err(e: auto_launch::Error) -> Error {
    Error::LoginItem(e.to_string())
}

/// Login item managed by `auto-launch`.
///
/// The OS entry cannot be read back for its arguments, so a hidden
/// registration also drops a marker file next to the config.
#[derive(Debug, Clone)]
pub struct AutoLaunchItems {
    name: String,
    exe: String,
    hidden_marker: PathBuf,
}

impl AutoLaunchItems {
    pub fn new(name: &str, exe: &Path, data_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            exe: exe.to_string_lossy().into_owned(),
            hidden_marker: data_dir.join("login-item-hidden"),
        }
    }

    fn launcher(&self, args: &[&str]) -> Result<AutoLaunch> {
        let mut builder = AutoLaunchBuilder::new();
        builder
            .set_app_name(&self.name)
            .set_app_path(&self.exe)
            .set_args(args);
        #[cfg(target_os = "macos")]
        builder.set_use_launch_agent(true);
        builder.build().map_err(login_err)
    }

    fn registered_hidden(&self) -> bool {
        self.hidden_marker.exists()
    }

    fn mark_hidden(&self, hidden: bool) -> Result<()> {
        if hidden {
            if let Some(parent) = self.hidden_marker.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            std::fs::write(&self.hidden_marker, HIDDEN_FLAG)
                .map_err(|e| Error::io(&self.hidden_marker, e))
        } else {
            match std::fs::remove_file(&self.hidden_marker) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::io(&self.hidden_marker, e)),
            }
        }
    }
}

/// Arguments the login item launches with.
fn launch_args<'a>(args: &[&'a str], open_as_hidden: bool) -> Vec<&'a str> {
    let mut all = args.to_vec();
    if open_as_hidden && !all.contains(&HIDDEN_FLAG) {
        all.push(HIDDEN_FLAG);
    }
    all
}

impl LoginItems for AutoLaunchItems {
    fn status(&self) -> Result<LoginItemStatus> {
        let open_at_login = self.launcher(&[])?.is_enabled().map_err(login_err)?;
        Ok(LoginItemStatus {
            open_at_login,
            open_as_hidden: open_at_login && self.registered_hidden(),
        })
    }

    fn register(&self, args: &[&str], open_as_hidden: bool) -> Result<()> {
        let launcher = self.launcher(&launch_args(args, open_as_hidden))?;
        launcher.enable().map_err(login_err)?;
        self.mark_hidden(open_as_hidden)?;
        info!("registered login item {} (hidden: {})", self.name, open_as_hidden);
        Ok(())
    }

    fn unregister(&self) -> Result<()> {
        let launcher = self.launcher(&[])?;
        if launcher.is_enabled().map_err(login_err)? {
            launcher.disable().map_err(login_err)?;
            debug!("removed login item {}", self.name);
        }
        self.mark_hidden(false)
    }
}
