use tracing::warn;
use url::Url;

use crate::config::AppProfile;

/// Page shipped with the app and shown when the remote app cannot load.
pub const FALLBACK_PAGE: &str = "error.html";

/// Where the window goes first: the resume URL when it belongs to our
/// origin, otherwise `<base>/app`.
pub fn resolve_start_url(profile: &AppProfile, resume: Option<&str>) -> Url {
    if let Some(resume) = resume {
        match Url::parse(resume) {
            Ok(url) if url.origin() == profile.base_url.origin() => return url,
            Ok(url) => warn!("refusing to resume into foreign origin {}", url.origin().ascii_serialization()),
            Err(e) => warn!("ignoring malformed resume url: {}", e),
        }
    }
    app_url(profile)
}

pub fn app_url(profile: &AppProfile) -> Url {
    profile
        .base_url
        .join("/app")
        .unwrap_or_else(|_| profile.base_url.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// The content view itself is navigating.
    InPlace,
    /// The content asked for a new window (target=_blank, window.open).
    NewWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block,
    OpenExternal,
}

/// New windows always go to the OS handler. In-place navigation is limited
/// to the base origin and local pages when the profile enforces it.
pub fn decide(profile: &AppProfile, url: &Url, kind: NavigationKind) -> Decision {
    match kind {
        NavigationKind::NewWindow => Decision::OpenExternal,
        NavigationKind::InPlace => {
            if !profile.enforce_origin || is_local(url) || url.origin() == profile.base_url.origin() {
                Decision::Allow
            } else {
                Decision::Block
            }
        }
    }
}

fn is_local(url: &Url) -> bool {
    match url.scheme() {
        "tauri" | "asset" | "about" | "data" => true,
        "http" | "https" => url.host_str() == Some("tauri.localhost"),
        _ => false,
    }
}
