//! Main-window lifecycle.
//!
//! Owns the window, the quitting flag and the update gate, and reacts to
//! [`HostEvent`]s. Phases move `Starting -> CheckingUpdate -> Ready ->
//! Hidden | Visible`, back and forth between the last two, and end in
//! `Closing -> Quitting`. Once quitting has begun no earlier phase is
//! entered again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::autostart::{StartupIntent, StartupReconciler};
use crate::config::{AppProfile, ConfigHandle};
use crate::error::Result;
use crate::host::{Host, HostEvent, HostWindow, TrayAction, WindowOptions};
use crate::launch::LaunchArgs;
use crate::lock;
use crate::navigation::{self, Decision, NavigationKind};
use crate::schedule::{spawn_periodic, Debouncer, TaskHandle};
use crate::updater::{UpdateGate, UpdateInfo, UpdateOutcome, UpdateService};
use crate::window_state::{
    RestorePlan, WindowSnapshot, WindowStateStore, DEFAULT_HEIGHT, DEFAULT_WIDTH, MIN_HEIGHT,
    MIN_WIDTH,
};

pub const RESIZE_SAVE_DELAY: Duration = Duration::from_millis(1000);
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    CheckingUpdate,
    Ready,
    Hidden,
    Visible,
    Closing,
    Quitting,
}

/// What the host should do with a window close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Cancel the close; the window has been hidden instead.
    Hide,
    Close,
}

/// Everything the controller is built from.
pub struct LifecycleDeps {
    pub profile: AppProfile,
    pub launch: LaunchArgs,
    pub config: ConfigHandle,
    pub window_state: WindowStateStore,
    pub reconciler: StartupReconciler,
    pub host: Arc<dyn Host>,
    pub updates: Arc<dyn UpdateService>,
}

pub struct LifecycleController {
    profile: AppProfile,
    launch: LaunchArgs,
    config: ConfigHandle,
    window_state: Arc<WindowStateStore>,
    reconciler: StartupReconciler,
    host: Arc<dyn Host>,
    updates: Arc<dyn UpdateService>,
    /// No config file existed when the controller was built.
    first_run: bool,
    gate: UpdateGate,
    phase: Mutex<Phase>,
    window: Mutex<Option<Arc<dyn HostWindow>>>,
    quitting: AtomicBool,
    start_hidden: AtomicBool,
    restore_maximized: AtomicBool,
    shown_once: AtomicBool,
    resize_save: Mutex<Debouncer>,
    update_timer: Mutex<Option<TaskHandle>>,
}

impl LifecycleController {
    /// Must be called from within a tokio runtime; debounced saves are
    /// spawned onto it.
    pub fn new(deps: LifecycleDeps) -> Arc<Self> {
        let first_run = !deps.config.store().exists();
        Arc::new(Self {
            profile: deps.profile,
            launch: deps.launch,
            config: deps.config,
            window_state: Arc::new(deps.window_state),
            reconciler: deps.reconciler,
            host: deps.host,
            updates: deps.updates,
            first_run,
            gate: UpdateGate::new(),
            phase: Mutex::new(Phase::Starting),
            window: Mutex::new(None),
            quitting: AtomicBool::new(false),
            start_hidden: AtomicBool::new(false),
            restore_maximized: AtomicBool::new(false),
            shown_once: AtomicBool::new(false),
            resize_save: Mutex::new(Debouncer::new(RESIZE_SAVE_DELAY)),
            update_timer: Mutex::new(None),
        })
    }

    pub fn profile(&self) -> &AppProfile {
        &self.profile
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    pub fn update_gate(&self) -> &UpdateGate {
        &self.gate
    }

    fn window(&self) -> Option<Arc<dyn HostWindow>> {
        lock(&self.window).clone()
    }

    fn set_phase(&self, next: Phase) {
        let mut phase = lock(&self.phase);
        if self.is_quitting() && !matches!(next, Phase::Closing | Phase::Quitting) {
            debug!("ignoring {:?} while quitting", next);
            return;
        }
        if *phase != next {
            info!("lifecycle {:?} -> {:?}", *phase, next);
            *phase = next;
        }
    }

    /// Runs startup: kicks off the update check, then creates the tray and
    /// the window. The window does not wait for the check; a downloaded
    /// update quits the app wherever startup has got to.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        info!(
            "starting {} (first run: {}, launch: {:?})",
            self.profile.tooltip(),
            self.first_run,
            self.launch
        );

        self.set_phase(Phase::CheckingUpdate);
        if self.launch.updated {
            info!("relaunched after update, skipping startup check");
            self.gate.settle();
        } else {
            let this = self.clone();
            tokio::spawn(async move {
                this.run_update_check().await;
            });
        }

        self.ready()?;
        self.schedule_update_checks();
        Ok(())
    }

    fn ready(&self) -> Result<()> {
        if self.is_quitting() {
            return Ok(());
        }
        self.set_phase(Phase::Ready);

        if let Err(e) = self.host.create_tray(&self.profile.tooltip()) {
            warn!("failed to create tray: {}", e);
        }

        if self.first_run {
            self.reconciler.apply_first_run();
            self.config.persist()?;
        }

        let plan = self.window_state.load().restore_plan();
        self.restore_maximized
            .store(plan == RestorePlan::Maximize, Ordering::SeqCst);
        self.start_hidden
            .store(self.reconciler.launched_hidden(&self.launch), Ordering::SeqCst);

        let options = WindowOptions {
            title: self.profile.name.clone(),
            url: navigation::resolve_start_url(&self.profile, self.launch.resume.as_deref()),
            bounds: match plan {
                RestorePlan::Bounds(bounds) => Some(bounds),
                _ => None,
            },
            default_size: (DEFAULT_WIDTH, DEFAULT_HEIGHT),
            min_size: (MIN_WIDTH, MIN_HEIGHT),
            browser_args: self.config.snapshot().browser_args(),
        };
        info!("opening {} ({:?})", options.url, plan);

        let window = self.host.create_window(&options)?;
        *lock(&self.window) = Some(window);
        Ok(())
    }

    fn schedule_update_checks(self: &Arc<Self>) {
        if self.is_quitting() {
            return;
        }
        let weak = Arc::downgrade(self);
        let task = spawn_periodic(UPDATE_CHECK_INTERVAL, move || {
            let this = weak.upgrade();
            async move {
                if let Some(this) = this {
                    this.run_update_check().await;
                }
            }
        });
        if let Some(old) = lock(&self.update_timer).replace(task) {
            old.cancel();
        }
    }

    async fn run_update_check(&self) -> UpdateOutcome {
        let outcome = self.updates.check().await;
        match &outcome {
            UpdateOutcome::NotAvailable => debug!("no update available"),
            UpdateOutcome::Failed(e) => warn!("update check failed: {}", e),
            UpdateOutcome::Downloaded(update) => self.install_update(update),
        }
        self.gate.settle();
        outcome
    }

    fn install_update(&self, update: &UpdateInfo) {
        info!("update {} downloaded, installing", update.version);
        match self.updates.quit_and_install(update) {
            Ok(()) => self.quit(),
            Err(e) => warn!("failed to start update installer: {}", e),
        }
    }

    pub fn handle_event(&self, event: HostEvent) {
        debug!("host event {:?}", event);
        match event {
            HostEvent::ReadyToShow => self.on_ready_to_show(),
            HostEvent::Resized => self.schedule_state_save(),
            HostEvent::Maximized | HostEvent::Unmaximized => self.save_state_now(),
            HostEvent::LoadFailed => {
                if let Some(window) = self.window() {
                    warn!("content failed to load, showing fallback page");
                    log_failure("load fallback page", window.load_fallback());
                }
            }
            HostEvent::ContentCrashed => {
                if let Some(window) = self.window() {
                    warn!("content process crashed, reloading");
                    log_failure("reload", window.reload());
                }
            }
            HostEvent::KeyDown { key } => self.on_key_down(&key),
            HostEvent::SecondInstance | HostEvent::Tray(TrayAction::Open) => self.show_window(),
            HostEvent::Tray(TrayAction::Restart) => log_failure("restart", self.restart()),
            HostEvent::Tray(TrayAction::Quit) => self.quit(),
        }
    }

    fn on_ready_to_show(&self) {
        if self.shown_once.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(window) = self.window() else {
            return;
        };

        if self.start_hidden.load(Ordering::SeqCst) {
            info!("launched hidden, staying in tray");
            self.set_phase(Phase::Hidden);
            return;
        }

        if self.restore_maximized.load(Ordering::SeqCst) {
            log_failure("maximize", window.maximize());
        }
        log_failure("show", window.show());
        self.set_phase(Phase::Visible);
    }

    fn on_key_down(&self, key: &str) {
        let Some(window) = self.window() else {
            return;
        };
        match key {
            "F5" => log_failure("reload", window.reload()),
            "F6" => log_failure("restart", self.restart()),
            "F12" => window.open_devtools(),
            _ => {}
        }
    }

    /// Shows, restores and focuses the window.
    pub fn show_window(&self) {
        let Some(window) = self.window() else {
            return;
        };
        log_failure("show", window.show());
        if window.is_minimized().unwrap_or(false) {
            log_failure("restore", window.restore());
        }
        log_failure("focus", window.focus());
        self.set_phase(Phase::Visible);
    }

    /// Decides a navigation the content is about to make. Returns whether
    /// the view may follow it.
    pub fn on_navigation(&self, url: &Url, kind: NavigationKind) -> bool {
        match navigation::decide(&self.profile, url, kind) {
            Decision::Allow => true,
            Decision::Block => {
                warn!("blocked navigation to {}", url.origin().ascii_serialization());
                false
            }
            Decision::OpenExternal => {
                log_failure("open external link", self.host.open_external(url));
                false
            }
        }
    }

    /// Window close request from the OS or the title bar. Until quitting,
    /// closing only hides the window.
    pub fn on_close_requested(&self) -> CloseDecision {
        if self.is_quitting() {
            return CloseDecision::Close;
        }
        if let Some(window) = self.window() {
            self.save_window(window.as_ref());
            log_failure("hide", window.hide());
        }
        self.set_phase(Phase::Hidden);
        CloseDecision::Hide
    }

    /// Marks the app as quitting when the host begins an exit on its own.
    pub fn on_exit_requested(&self) {
        if !self.quitting.swap(true, Ordering::SeqCst) {
            info!("host is exiting");
            self.set_phase(Phase::Closing);
        }
    }

    pub fn close(&self) -> Result<()> {
        match self.on_close_requested() {
            CloseDecision::Hide => Ok(()),
            CloseDecision::Close => match self.window() {
                Some(window) => window.close(),
                None => Ok(()),
            },
        }
    }

    pub fn toggle_maximize(&self) -> Result<()> {
        let Some(window) = self.window() else {
            return Ok(());
        };
        if window.is_maximized()? {
            window.unmaximize()
        } else {
            window.maximize()
        }
    }

    pub fn minimize(&self) -> Result<()> {
        match self.window() {
            Some(window) => window.minimize(),
            None => Ok(()),
        }
    }

    /// Relaunches into the current in-app location, then quits.
    pub fn restart(&self) -> Result<()> {
        let args = match self.window().map(|w| w.url()) {
            Some(Ok(url)) => LaunchArgs::resume_args(url.as_str()),
            Some(Err(e)) => {
                warn!("restarting without resume url: {}", e);
                Vec::new()
            }
            None => Vec::new(),
        };
        info!("restarting with {:?}", args);
        self.host.relaunch(&args)?;
        self.quit();
        Ok(())
    }

    /// Irreversible: saves state, closes the window and exits.
    pub fn quit(&self) {
        self.quitting.store(true, Ordering::SeqCst);
        self.set_phase(Phase::Closing);

        lock(&self.resize_save).cancel();
        if let Some(timer) = lock(&self.update_timer).take() {
            timer.cancel();
        }
        if let Some(window) = self.window() {
            self.save_window(window.as_ref());
            log_failure("close", window.close());
        }

        self.set_phase(Phase::Quitting);
        info!("quitting");
        self.host.exit(0);
    }

    pub fn move_top(&self) -> Result<()> {
        let Some(window) = self.window() else {
            return Ok(());
        };
        if window.is_minimized()? {
            window.restore()?;
        }
        window.focus()?;
        window.move_top()
    }

    pub fn set_content_protection(&self, enabled: bool) -> Result<()> {
        match self.window() {
            Some(window) => window.set_content_protection(enabled),
            None => Ok(()),
        }
    }

    pub fn flush_storage(&self) -> Result<()> {
        match self.window() {
            Some(window) => window.flush_storage(),
            None => Ok(()),
        }
    }

    /// Resolves once the startup update check has finished, whatever its
    /// outcome.
    pub async fn check_for_updates(&self) {
        self.gate.wait().await;
    }

    pub fn startup_settings(&self) -> Result<StartupIntent> {
        self.reconciler.get()
    }

    pub fn set_startup_settings(&self, intent: StartupIntent) -> Result<()> {
        self.reconciler.set(intent)
    }

    fn schedule_state_save(&self) {
        let Some(window) = self.window() else {
            return;
        };
        let store = self.window_state.clone();
        lock(&self.resize_save).schedule(move || async move {
            save_snapshot(&store, window.as_ref());
        });
    }

    /// Writes the current window state without touching a pending resize
    /// save; that one still fires when its quiet period ends.
    pub fn save_state_now(&self) {
        if let Some(window) = self.window() {
            self.save_window(window.as_ref());
        }
    }

    fn save_window(&self, window: &dyn HostWindow) {
        save_snapshot(&self.window_state, window);
    }
}

fn save_snapshot(store: &WindowStateStore, window: &dyn HostWindow) {
    let snapshot = window.bounds().and_then(|bounds| {
        Ok(WindowSnapshot {
            bounds,
            maximized: window.is_maximized()?,
        })
    });
    if let Err(e) = snapshot.and_then(|s| store.save(&s)) {
        warn!("failed to save window state: {}", e);
    }
}

fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("{} failed: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autostart::mock::MemoryLoginItems;
    use crate::autostart::Platform;
    use crate::config::ConfigStore;
    use crate::host::mock::MockHost;
    use crate::updater::mock::ScriptedUpdates;
    use crate::window_state::Bounds;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    struct Fixture {
        controller: Arc<LifecycleController>,
        host: Arc<MockHost>,
        updates: Arc<ScriptedUpdates>,
        items: Arc<MemoryLoginItems>,
        dir: TempDir,
    }

    impl Fixture {
        fn state_file(&self) -> PathBuf {
            self.dir.path().join("state.json")
        }

        fn state(&self) -> serde_json::Value {
            let content = std::fs::read_to_string(self.state_file()).unwrap();
            serde_json::from_str(&content).unwrap()
        }
    }

    fn build(dir: TempDir, launch: LaunchArgs, platform: Platform, updates: ScriptedUpdates) -> Fixture {
        let config = ConfigHandle::load(ConfigStore::in_dir(dir.path()));
        let items = Arc::new(MemoryLoginItems::default());
        let host = Arc::new(MockHost::default());
        let updates = Arc::new(updates);
        let controller = LifecycleController::new(LifecycleDeps {
            profile: AppProfile::release(),
            launch,
            config: config.clone(),
            window_state: WindowStateStore::in_dir(dir.path()),
            reconciler: StartupReconciler::for_platform(platform, Box::new(items.clone()), config),
            host: host.clone(),
            updates: updates.clone(),
        });
        Fixture {
            controller,
            host,
            updates,
            items,
            dir,
        }
    }

    fn fixture(launch: LaunchArgs) -> Fixture {
        build(
            TempDir::new().unwrap(),
            launch,
            Platform::Generic,
            ScriptedUpdates::new(UpdateOutcome::NotAvailable),
        )
    }

    async fn started(launch: LaunchArgs) -> Fixture {
        let f = fixture(launch);
        f.controller.start().await.unwrap();
        f
    }

    #[tokio::test]
    async fn first_run_registers_autostart_and_writes_config() {
        let f = fixture(LaunchArgs::default());
        assert!(f.controller.is_first_run());

        f.controller.start().await.unwrap();

        assert_eq!(f.items.registered_args(), Some(vec!["--autostart".to_string()]));
        assert!(ConfigStore::in_dir(f.dir.path()).exists());
        assert_eq!(f.controller.phase(), Phase::Ready);

        let calls = f.host.calls();
        assert!(calls[0].starts_with("create_tray:Hyalus "));
        assert_eq!(calls[1], "create_window");
    }

    #[tokio::test]
    async fn existing_config_skips_first_run() {
        let dir = TempDir::new().unwrap();
        ConfigStore::in_dir(dir.path())
            .save(&Default::default())
            .unwrap();
        let f = build(
            dir,
            LaunchArgs::default(),
            Platform::Generic,
            ScriptedUpdates::new(UpdateOutcome::NotAvailable),
        );

        f.controller.start().await.unwrap();

        assert!(!f.controller.is_first_run());
        assert_eq!(f.items.registered_args(), None);
    }

    #[tokio::test]
    async fn ready_to_show_reveals_the_window_once() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();
        assert!(!window.model().visible);

        f.controller.handle_event(HostEvent::ReadyToShow);
        assert!(window.model().visible);
        assert_eq!(f.controller.phase(), Phase::Visible);

        window.hide().unwrap();
        f.controller.handle_event(HostEvent::ReadyToShow);
        assert!(!window.model().visible);
    }

    #[tokio::test]
    async fn autostart_with_minimized_intent_stays_hidden() {
        let f = build(
            TempDir::new().unwrap(),
            LaunchArgs {
                autostart: true,
                ..Default::default()
            },
            Platform::Windows,
            ScriptedUpdates::new(UpdateOutcome::NotAvailable),
        );
        f.controller.start().await.unwrap();

        f.controller.handle_event(HostEvent::ReadyToShow);

        assert!(!f.host.window().model().visible);
        assert_eq!(f.controller.phase(), Phase::Hidden);
    }

    #[tokio::test]
    async fn restores_saved_bounds() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("state.json"),
            r#"{"x": 40, "y": 50, "width": 1000, "height": 700, "maximized": false}"#,
        )
        .unwrap();
        let f = build(
            dir,
            LaunchArgs::default(),
            Platform::Generic,
            ScriptedUpdates::new(UpdateOutcome::NotAvailable),
        );
        f.controller.start().await.unwrap();

        let options = lock(&f.host.created_with).clone().unwrap();
        assert_eq!(
            options.bounds,
            Some(Bounds {
                x: 40,
                y: 50,
                width: 1000,
                height: 700
            })
        );
        assert_eq!(options.min_size, (900, 600));
    }

    #[tokio::test]
    async fn maximized_state_ignores_bounds_and_maximizes_on_ready() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("state.json"),
            r#"{"x": 40, "y": 50, "width": 1000, "height": 700, "maximized": true}"#,
        )
        .unwrap();
        let f = build(
            dir,
            LaunchArgs::default(),
            Platform::Generic,
            ScriptedUpdates::new(UpdateOutcome::NotAvailable),
        );
        f.controller.start().await.unwrap();

        assert_eq!(lock(&f.host.created_with).clone().unwrap().bounds, None);

        f.controller.handle_event(HostEvent::ReadyToShow);
        let model = f.host.window().model();
        assert!(model.maximized);
        assert!(model.visible);
    }

    #[tokio::test]
    async fn foreign_resume_url_opens_the_app() {
        let f = started(LaunchArgs {
            resume: Some("https://evil.example/x".to_string()),
            ..Default::default()
        })
        .await;

        let options = lock(&f.host.created_with).clone().unwrap();
        assert_eq!(options.url.as_str(), "https://hyalus.app/app");
    }

    #[tokio::test]
    async fn close_hides_until_quitting() {
        let f = started(LaunchArgs::default()).await;
        f.controller.handle_event(HostEvent::ReadyToShow);
        let window = f.host.window();

        f.controller.close().unwrap();
        assert!(!window.model().visible);
        assert!(!window.model().closed);
        assert_eq!(f.controller.phase(), Phase::Hidden);
        assert!(f.state_file().exists());

        f.controller.handle_event(HostEvent::SecondInstance);
        assert!(window.model().visible);

        f.controller.handle_event(HostEvent::Tray(TrayAction::Quit));
        assert!(window.model().closed);
        assert_eq!(f.host.exited(), Some(0));
        assert_eq!(f.controller.phase(), Phase::Quitting);

        assert_eq!(f.controller.on_close_requested(), CloseDecision::Close);
        // quitting is terminal
        f.controller.handle_event(HostEvent::SecondInstance);
        assert_eq!(f.controller.phase(), Phase::Quitting);
    }

    #[tokio::test]
    async fn restart_relaunches_into_current_url() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();
        window
            .navigate(&Url::parse("https://hyalus.app/app/channels/7").unwrap())
            .unwrap();

        f.controller.restart().unwrap();

        assert_eq!(
            lock(&f.host.relaunched_with).clone(),
            Some(vec!["--resume=https://hyalus.app/app/channels/7".to_string()])
        );
        assert!(f.controller.is_quitting());
        assert_eq!(f.host.exited(), Some(0));
        let calls = f.host.calls();
        let relaunch = calls.iter().position(|c| c == "relaunch").unwrap();
        let exit = calls.iter().position(|c| c == "exit").unwrap();
        assert!(relaunch < exit);
    }

    #[tokio::test]
    async fn content_failures_recover() {
        let f = started(LaunchArgs::default()).await;

        f.controller.handle_event(HostEvent::ContentCrashed);
        f.controller.handle_event(HostEvent::LoadFailed);
        f.controller.handle_event(HostEvent::KeyDown { key: "F5".to_string() });
        f.controller.handle_event(HostEvent::KeyDown { key: "F12".to_string() });
        f.controller.handle_event(HostEvent::KeyDown { key: "A".to_string() });

        assert_eq!(
            f.host.window().calls(),
            vec!["reload", "load_fallback", "reload", "open_devtools"]
        );
        assert!(!f.host.window().model().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn resize_burst_saves_once_after_quiet_period() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();

        for i in 0..10 {
            window.set_bounds(Bounds {
                x: i,
                y: i,
                width: 1000 + i as u32,
                height: 700,
            });
            f.controller.handle_event(HostEvent::Resized);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!f.state_file().exists());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let state = f.state();
        assert_eq!(state["width"], 1009);
        assert_eq!(state["maximized"], false);

        // nothing else was queued behind that single write
        std::fs::remove_file(f.state_file()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!f.state_file().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn maximize_saves_immediately_mid_debounce() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();

        f.controller.handle_event(HostEvent::Resized);
        tokio::time::sleep(Duration::from_millis(200)).await;

        window.maximize().unwrap();
        f.controller.handle_event(HostEvent::Maximized);
        assert_eq!(f.state()["maximized"], true);

        // the pending resize save still runs on its own schedule
        std::fs::remove_file(f.state_file()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!f.state_file().exists());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(f.state()["maximized"], true);

        std::fs::remove_file(f.state_file()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!f.state_file().exists());
    }

    #[tokio::test]
    async fn toggle_maximize_flips_state() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();

        f.controller.toggle_maximize().unwrap();
        assert!(window.model().maximized);
        f.controller.toggle_maximize().unwrap();
        assert!(!window.model().maximized);
    }

    #[tokio::test]
    async fn move_top_restores_minimized_window() {
        let f = started(LaunchArgs::default()).await;
        let window = f.host.window();
        f.controller.minimize().unwrap();

        f.controller.move_top().unwrap();

        assert!(!window.model().minimized);
        assert_eq!(window.calls(), vec!["minimize", "restore", "focus", "move_top"]);
    }

    #[tokio::test]
    async fn new_window_links_open_externally() {
        let f = started(LaunchArgs::default()).await;
        let link = Url::parse("https://example.com/docs").unwrap();

        assert!(!f.controller.on_navigation(&link, NavigationKind::NewWindow));
        assert!(!f.controller.on_navigation(&link, NavigationKind::InPlace));
        assert_eq!(lock(&f.host.opened).clone(), vec![link]);

        let own = Url::parse("https://hyalus.app/app/settings").unwrap();
        assert!(f.controller.on_navigation(&own, NavigationKind::InPlace));
    }

    #[tokio::test]
    async fn check_for_updates_resolves_for_every_outcome() {
        let update = UpdateInfo {
            version: "9.9.9".to_string(),
            installer: PathBuf::from("/tmp/hyalus-setup"),
        };
        for outcome in [
            UpdateOutcome::NotAvailable,
            UpdateOutcome::Failed("offline".to_string()),
            UpdateOutcome::Downloaded(update.clone()),
        ] {
            let release = Arc::new(Notify::new());
            let f = build(
                TempDir::new().unwrap(),
                LaunchArgs::default(),
                Platform::Generic,
                ScriptedUpdates::held(outcome.clone(), release.clone()),
            );
            f.controller.start().await.unwrap();
            assert!(!f.controller.update_gate().is_settled());

            let waiter = {
                let controller = f.controller.clone();
                tokio::spawn(async move { controller.check_for_updates().await })
            };
            release.notify_one();
            tokio::time::timeout(Duration::from_secs(2), waiter)
                .await
                .unwrap()
                .unwrap();

            let downloaded = matches!(outcome, UpdateOutcome::Downloaded(_));
            assert_eq!(f.controller.is_quitting(), downloaded, "{outcome:?}");
            assert_eq!(f.updates.installed().is_some(), downloaded, "{outcome:?}");
        }
    }

    #[tokio::test]
    async fn updated_launch_skips_the_startup_check() {
        let f = started(LaunchArgs {
            updated: true,
            ..Default::default()
        })
        .await;

        assert!(f.controller.update_gate().is_settled());
        tokio::time::timeout(Duration::from_millis(100), f.controller.check_for_updates())
            .await
            .unwrap();
        assert_eq!(f.updates.checks(), 0);
    }

    #[tokio::test]
    async fn startup_settings_round_trip_through_reconciler() {
        let f = started(LaunchArgs::default()).await;
        let intent = StartupIntent {
            enabled: false,
            minimized: false,
        };

        f.controller.set_startup_settings(intent).unwrap();

        assert_eq!(f.controller.startup_settings().unwrap(), intent);
        assert_eq!(f.items.registered_args(), None);
    }
}
