use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: String,
    pub installer: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    NotAvailable,
    /// Ready to install; the app should quit and hand over to the installer.
    Downloaded(UpdateInfo),
    Failed(String),
}

#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Checks for and downloads a newer build. Never errors: failures come
    /// back as [`UpdateOutcome::Failed`].
    async fn check(&self) -> UpdateOutcome;
    fn quit_and_install(&self, update: &UpdateInfo) -> Result<()>;
}

/// Open until the startup update check finishes, then open for good.
/// Every outcome settles it, so waiters never hang on a failed check.
#[derive(Debug, Clone)]
pub struct UpdateGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for UpdateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn settled() -> Self {
        let gate = Self::new();
        gate.settle();
        gate
    }

    pub fn settle(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_settled(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so this only returns once settled
        let _ = rx.wait_for(|settled| *settled).await;
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: String,
    /// `<os>-<arch>` to installer URL.
    #[serde(default)]
    platforms: HashMap<String, String>,
}

/// Polls a JSON manifest (`{"version": "1.2.3", "platforms": {"windows-x86_64": "<url>"}}`)
/// and downloads the installer for this platform when the version is newer.
pub struct HttpUpdateService {
    client: reqwest::Client,
    feed: Url,
    current: String,
    download_dir: PathBuf,
}

impl HttpUpdateService {
    pub fn new(feed: Url, download_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed,
            current: env!("CARGO_PKG_VERSION").to_string(),
            download_dir,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_current_version(mut self, version: &str) -> Self {
        self.current = version.to_string();
        self
    }

    async fn try_check(&self) -> Result<Option<UpdateInfo>> {
        let manifest: Manifest = self
            .client
            .get(self.feed.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Update(format!("failed to fetch manifest: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Update(format!("invalid manifest: {e}")))?;

        if !is_newer(&manifest.version, &self.current)? {
            info!("up to date ({}, latest {})", self.current, manifest.version);
            return Ok(None);
        }

        let key = platform_key();
        let installer_url = manifest
            .platforms
            .get(&key)
            .ok_or_else(|| Error::Update(format!("no installer for {key}")))?;
        let installer_url = Url::parse(installer_url)
            .map_err(|e| Error::Update(format!("bad installer url: {e}")))?;

        info!("downloading update {} from {}", manifest.version, installer_url);
        let bytes = self
            .client
            .get(installer_url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Update(format!("download failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| Error::Update(format!("download failed: {e}")))?;

        let file_name = installer_url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("hyalus-setup-{}", manifest.version));
        let installer = self.download_dir.join(file_name);

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| Error::io(&self.download_dir, e))?;
        tokio::fs::write(&installer, &bytes)
            .await
            .map_err(|e| Error::io(&installer, e))?;

        Ok(Some(UpdateInfo {
            version: manifest.version,
            installer,
        }))
    }
}

#[async_trait]
impl UpdateService for HttpUpdateService {
    async fn check(&self) -> UpdateOutcome {
        match self.try_check().await {
            Ok(None) => UpdateOutcome::NotAvailable,
            Ok(Some(update)) => UpdateOutcome::Downloaded(update),
            Err(e) => {
                warn!("update check failed: {}", e);
                UpdateOutcome::Failed(e.to_string())
            }
        }
    }

    fn quit_and_install(&self, update: &UpdateInfo) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&update.installer, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| Error::io(&update.installer, e))?;
        }

        info!("launching installer {:?}", update.installer);
        std::process::Command::new(&update.installer)
            .spawn()
            .map_err(|e| Error::io(&update.installer, e))?;
        Ok(())
    }
}

fn platform_key() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Semver precedence: a pre-release is older than its release and build
/// metadata is ignored.
fn is_newer(candidate: &str, current: &str) -> Result<bool> {
    let precedence = |v: &str| {
        Version::parse(v.trim_start_matches('v'))
            .map(|v| (v.major, v.minor, v.patch, v.pre))
            .map_err(|e| Error::Update(format!("bad version {v:?}: {e}")))
    };
    Ok(precedence(candidate)? > precedence(current)?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{addr}/latest.json")).unwrap()
    }

    fn service(feed: Url, dir: &tempfile::TempDir) -> HttpUpdateService {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpUpdateService::new(feed, dir.path().to_path_buf()).with_client(client)
    }

    #[test]
    fn version_ordering() {
        assert!(is_newer("1.2.4", "1.2.3").unwrap());
        assert!(is_newer("1.10.0", "1.9.9").unwrap());
        assert!(is_newer("v2.0.0", "1.99.99").unwrap());
        assert!(!is_newer("1.2.3", "1.2.3").unwrap());
        assert!(!is_newer("1.2.3-beta.1", "1.2.3").unwrap());
        assert!(!is_newer("1.2.3+build.7", "1.2.3").unwrap());
    }

    #[test]
    fn final_release_supersedes_its_prerelease() {
        assert!(is_newer("1.2.3", "1.2.3-beta.1").unwrap());
        assert!(is_newer("1.2.3-beta.2", "1.2.3-beta.1").unwrap());
        assert!(is_newer("1.2.3-rc.1", "1.2.3-beta.9").unwrap());
    }

    #[test]
    fn malformed_versions_are_errors() {
        assert!(is_newer("1.2", "1.2.0").is_err());
        assert!(is_newer("1.2.0", "latest").is_err());
    }

    #[tokio::test]
    async fn gate_wakes_waiters_on_settle() {
        let gate = UpdateGate::new();
        assert!(!gate.is_settled());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.settle();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // late waiters return immediately
        tokio::time::timeout(Duration::from_millis(10), gate.wait()).await.unwrap();
        assert!(UpdateGate::settled().is_settled());
    }

    #[tokio::test]
    async fn same_version_is_not_available() {
        let feed = serve_once(r#"{"version": "0.1.0", "platforms": {}}"#).await;
        let dir = tempfile::TempDir::new().unwrap();
        let service = service(feed, &dir).with_current_version("0.1.0");

        assert_eq!(service.check().await, UpdateOutcome::NotAvailable);
    }

    #[tokio::test]
    async fn prerelease_build_sees_final_release() {
        let feed = serve_once(r#"{"version": "0.2.0", "platforms": {}}"#).await;
        let dir = tempfile::TempDir::new().unwrap();
        let service = service(feed, &dir).with_current_version("0.2.0-beta.3");

        // newer, so it gets as far as looking for an installer
        match service.check().await {
            UpdateOutcome::Failed(reason) => assert!(reason.contains("no installer"), "{reason}"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_manifest_version_is_a_failure() {
        let feed = serve_once(r#"{"version": "soon", "platforms": {}}"#).await;
        let dir = tempfile::TempDir::new().unwrap();
        let service = service(feed, &dir).with_current_version("0.1.0");

        assert!(matches!(service.check().await, UpdateOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn missing_installer_is_a_failure() {
        let feed = serve_once(r#"{"version": "9.0.0", "platforms": {}}"#).await;
        let dir = tempfile::TempDir::new().unwrap();
        let service = service(feed, &dir).with_current_version("0.1.0");

        assert!(matches!(service.check().await, UpdateOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn unreachable_feed_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::TempDir::new().unwrap();
        let feed = Url::parse(&format!("http://{addr}/latest.json")).unwrap();
        let service = service(feed, &dir);

        assert!(matches!(service.check().await, UpdateOutcome::Failed(_)));
    }
}
