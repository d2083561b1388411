use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const STATE_FILE: &str = "state.json";

pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 800;
pub const MIN_WIDTH: u32 = 900;
pub const MIN_HEIGHT: u32 = 600;

/// Outer window rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// What the window looked like at the moment it was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub bounds: Bounds,
    pub maximized: bool,
}

/// Partial view of `state.json`. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WindowStateRecord {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub maximized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePlan {
    /// Nothing usable on disk.
    Default,
    Bounds(Bounds),
    /// Bounds on disk are stale; maximize once the window is ready.
    Maximize,
}

impl WindowStateRecord {
    pub fn restore_plan(&self) -> RestorePlan {
        if self.maximized {
            return RestorePlan::Maximize;
        }
        match (self.x, self.y, self.width, self.height) {
            (Some(x), Some(y), Some(width), Some(height)) => RestorePlan::Bounds(Bounds {
                x,
                y,
                width: width.max(MIN_WIDTH),
                height: height.max(MIN_HEIGHT),
            }),
            _ => RestorePlan::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowStateStore {
    path: PathBuf,
}

impl WindowStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort: anything unreadable restores nothing.
    pub fn load(&self) -> WindowStateRecord {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!("no window state at {:?}: {}", self.path, e);
                return WindowStateRecord::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring window state at {:?}: {}", self.path, e);
            WindowStateRecord::default()
        })
    }

    /// Merges the snapshot onto whatever object is on disk so keys written by
    /// other code survive. Bounds are only written when not maximized, which
    /// keeps the last restored size around for unmaximize.
    pub fn save(&self, snapshot: &WindowSnapshot) -> Result<()> {
        let mut state = self.read_object();

        state.insert("maximized".to_string(), Value::Bool(snapshot.maximized));
        if !snapshot.maximized {
            let b = snapshot.bounds;
            state.insert("x".to_string(), b.x.into());
            state.insert("y".to_string(), b.y.into());
            state.insert("width".to_string(), b.width.into());
            state.insert("height".to_string(), b.height.into());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let content = serde_json::to_string(&Value::Object(state))?;
        std::fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;

        debug!(
            maximized = snapshot.maximized,
            x = snapshot.bounds.x,
            y = snapshot.bounds.y,
            width = snapshot.bounds.width,
            height = snapshot.bounds.height,
            "saved window state"
        );
        Ok(())
    }

    fn read_object(&self) -> Map<String, Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|c| serde_json::from_str::<Value>(&c).ok())
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }
}
