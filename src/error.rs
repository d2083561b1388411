use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login item registration failed: {0}")]
    LoginItem(String),

    #[error("invalid keybind {combo:?}: {reason}")]
    Keybind { combo: String, reason: String },

    #[error("host error: {0}")]
    Host(String),

    #[error("no main window")]
    NoWindow,

    #[error("update failed: {0}")]
    Update(String),

    #[error("could not determine data directory")]
    NoDataDir,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
