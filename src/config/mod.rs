use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::autostart::MINIMIZED_FLAG;
use crate::error::{Error, Result};
use crate::lock;

pub const CONFIG_FILE: &str = "config.json";

const DISABLED_FEATURES: &[&str] = &[
    "HardwareMediaKeyHandling",
    "MediaCapabilitiesQueryGpuFactories",
    "SpareRendererForSitePerProcess",
    "WebRtcHideLocalIpsWithMdns",
];

const ENABLED_FEATURES: &[&str] = &[
    "TurnOffStreamingMediaCachingOnBattery",
    "VaapiVideoDecoder",
    "VaapiVideoEncoder",
    "PlatformHEVCDecoderSupport",
    "PlatformHEVCEncoderSupport",
    "MediaFoundationD3D11VideoCapture",
    "MediaFoundationD3D11VideoCaptureZeroCopy",
    "AllowWgcScreenCapturer",
    "AllowWgcWindowCapturer",
    "AllowWgcZeroHz",
];

/// Persisted shell preferences (`config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub v: u32,
    pub autostart_args: Vec<String>,
    pub enabled_features: BTreeSet<String>,
    pub disabled_features: BTreeSet<String>,
    /// Keys this version does not know about. Carried through saves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            v: 0,
            autostart_args: vec![MINIMIZED_FLAG.to_string()],
            enabled_features: BTreeSet::new(),
            disabled_features: BTreeSet::new(),
            extra: Map::new(),
        }
    }
}

impl ConfigRecord {
    /// Shallow-merges a parsed document onto the defaults. Top-level keys in
    /// `loaded` replace the default value for that key wholesale.
    pub fn merged_onto_defaults(loaded: Value) -> Result<Self> {
        let Value::Object(loaded) = loaded else {
            return Err(Error::Json(serde::de::Error::custom(
                "config root is not an object",
            )));
        };

        let mut merged = match serde_json::to_value(Self::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(loaded);

        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    pub fn starts_minimized(&self) -> bool {
        self.autostart_args.iter().any(|a| a == MINIMIZED_FLAG)
    }

    /// Webview switches derived from the built-in feature lists and the
    /// user's overrides. A feature named in both user sets is disabled.
    pub fn browser_args(&self) -> Vec<String> {
        let mut enable: Vec<&str> = ENABLED_FEATURES
            .iter()
            .copied()
            .filter(|f| !self.disabled_features.contains(*f))
            .collect();
        enable.extend(
            self.enabled_features
                .iter()
                .map(String::as_str)
                .filter(|f| !ENABLED_FEATURES.contains(f) && !self.disabled_features.contains(*f)),
        );

        let mut disable: Vec<&str> = DISABLED_FEATURES
            .iter()
            .copied()
            .filter(|f| !self.enabled_features.contains(*f) || self.disabled_features.contains(*f))
            .collect();
        disable.extend(
            self.disabled_features
                .iter()
                .map(String::as_str)
                .filter(|f| !DISABLED_FEATURES.contains(f)),
        );

        let mut args = Vec::new();
        if !disable.is_empty() {
            args.push(format!("--disable-features={}", disable.join(",")));
        }
        if !enable.is_empty() {
            args.push(format!("--enable-features={}", enable.join(",")));
        }
        args
    }
}

/// Reads and writes the config file at a fixed path. A single process owns
/// the file, so there is no locking.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Never fails: a missing or unreadable file yields the defaults.
    pub fn load(&self) -> ConfigRecord {
        match self.try_load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no config at {:?}, using defaults", self.path);
                ConfigRecord::default()
            }
            Err(e) => {
                warn!("ignoring config at {:?}: {}", self.path, e);
                ConfigRecord::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<ConfigRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let value: Value = serde_json::from_str(&content)?;
        ConfigRecord::merged_onto_defaults(value).map(Some)
    }

    pub fn save(&self, record: &ConfigRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;
        debug!("saved config to {:?}", self.path);

        Ok(())
    }
}

/// In-memory config shared by the reconciler and the lifecycle controller.
/// Every mutation is written through to disk.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    store: Arc<ConfigStore>,
    record: Arc<Mutex<ConfigRecord>>,
}

impl ConfigHandle {
    pub fn load(store: ConfigStore) -> Self {
        let record = store.load();
        Self {
            store: Arc::new(store),
            record: Arc::new(Mutex::new(record)),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn snapshot(&self) -> ConfigRecord {
        lock(&self.record).clone()
    }

    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ConfigRecord),
    {
        let mut record = lock(&self.record);
        f(&mut record);
        self.store.save(&record)
    }

    pub fn persist(&self) -> Result<()> {
        self.store.save(&lock(&self.record))
    }
}

/// Build flavour: which backend the shell points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppProfile {
    pub name: String,
    pub app_id: String,
    pub base_url: Url,
    /// Block in-app navigation away from `base_url`.
    pub enforce_origin: bool,
}

impl AppProfile {
    pub fn release() -> Self {
        Self {
            name: "Hyalus".to_string(),
            app_id: "app.hyalus".to_string(),
            base_url: Url::parse("https://hyalus.app").expect("static base url"),
            enforce_origin: true,
        }
    }

    pub fn dev() -> Self {
        Self {
            name: "HyalusDev".to_string(),
            app_id: "app.hyalus.dev".to_string(),
            base_url: Url::parse("https://dev.atriplex.co").expect("static base url"),
            enforce_origin: false,
        }
    }

    pub fn from_env() -> Self {
        match std::env::var("HYALUS_PROFILE").as_deref() {
            Ok("dev") => Self::dev(),
            _ => Self::release(),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("app", "hyalus", &self.name).ok_or(Error::NoDataDir)?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn update_feed(&self) -> Url {
        if let Some(feed) = std::env::var("HYALUS_UPDATE_FEED")
            .ok()
            .and_then(|s| Url::parse(&s).ok())
        {
            return feed;
        }
        self.base_url
            .join("/desktop/latest.json")
            .unwrap_or_else(|_| self.base_url.clone())
    }

    pub fn tooltip(&self) -> String {
        format!("{} {}", self.name, env!("CARGO_PKG_VERSION"))
    }
}
