use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::webview::{NewWindowResponse, PageLoadEvent};
use tauri::{
    AppHandle, LogicalPosition, LogicalSize, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder,
};
use tauri_plugin_shell::ShellExt;
use tracing::{debug, info, warn};
use url::Url;

use super::Shell;
use crate::error::{Error, Result};
use crate::host::{Host, HostEvent, HostWindow, TrayAction, WindowOptions};
use crate::navigation::{NavigationKind, FALLBACK_PAGE};
use crate::window_state::Bounds;

pub const MAIN_WINDOW: &str = "main";

/// Forwards key presses the shell handles itself; the page never sees them.
const KEY_SCRIPT: &str = r#"
window.addEventListener("keydown", (e) => {
  if (["F5", "F6", "F12"].includes(e.key)) {
    e.preventDefault();
    window.__TAURI_INTERNALS__.invoke("key_down", { key: e.key });
  }
}, true);
"#;

fn host_err(e: tauri::Error) -> Error {
    Error::Host(e.to_string())
}

/// Forwards `event` to the controller once it is managed.
pub(crate) fn forward(app: &AppHandle, event: HostEvent) {
    match app.try_state::<Shell>() {
        Some(shell) => shell.controller.handle_event(event),
        None => debug!("dropping {:?} before startup", event),
    }
}

fn fallback_url() -> Url {
    let base = if cfg!(windows) {
        "http://tauri.localhost/"
    } else {
        "tauri://localhost/"
    };
    Url::parse(base)
        .and_then(|b| b.join(FALLBACK_PAGE))
        .unwrap_or_else(|_| Url::parse("about:blank").expect("static url"))
}

pub struct TauriHost {
    app: AppHandle,
}

impl TauriHost {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn build_tray(&self, tooltip: &str) -> tauri::Result<()> {
        let open_i = MenuItem::with_id(&self.app, "open", "Open", true, None::<&str>)?;
        let restart_i = MenuItem::with_id(&self.app, "restart", "Restart", true, None::<&str>)?;
        let separator = PredefinedMenuItem::separator(&self.app)?;
        let quit_i = MenuItem::with_id(&self.app, "quit", "Quit", true, None::<&str>)?;
        let menu = Menu::with_items(&self.app, &[&open_i, &restart_i, &separator, &quit_i])?;

        let mut builder = TrayIconBuilder::with_id("main")
            .menu(&menu)
            .tooltip(tooltip)
            .on_menu_event(|app, event| {
                let action = match event.id.as_ref() {
                    "open" => TrayAction::Open,
                    "restart" => TrayAction::Restart,
                    "quit" => TrayAction::Quit,
                    _ => return,
                };
                info!("tray {:?}", action);
                forward(app, HostEvent::Tray(action));
            })
            .on_tray_icon_event(|tray, event| {
                if let TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Up,
                    ..
                } = event
                {
                    forward(tray.app_handle(), HostEvent::Tray(TrayAction::Open));
                }
            });
        if let Some(icon) = self.app.default_window_icon() {
            builder = builder.icon(icon.clone());
        }
        builder.build(&self.app)?;
        Ok(())
    }
}

impl Host for TauriHost {
    fn create_tray(&self, tooltip: &str) -> Result<()> {
        self.build_tray(tooltip).map_err(host_err)
    }

    fn create_window(&self, options: &WindowOptions) -> Result<Arc<dyn HostWindow>> {
        let nav_app = self.app.clone();
        let load_app = self.app.clone();
        let popup_app = self.app.clone();
        let probe_client = reqwest::Client::new();

        let mut builder = WebviewWindowBuilder::new(
            &self.app,
            MAIN_WINDOW,
            WebviewUrl::External(options.url.clone()),
        )
        .title(&options.title)
        .visible(false)
        .inner_size(options.default_size.0 as f64, options.default_size.1 as f64)
        .min_inner_size(options.min_size.0 as f64, options.min_size.1 as f64)
        .initialization_script(KEY_SCRIPT)
        .on_navigation(move |url| match nav_app.try_state::<Shell>() {
            Some(shell) => shell.controller.on_navigation(url, NavigationKind::InPlace),
            None => true,
        })
        .on_new_window(move |url, _features| {
            if let Some(shell) = popup_app.try_state::<Shell>() {
                shell.controller.on_navigation(&url, NavigationKind::NewWindow);
            }
            NewWindowResponse::Deny
        })
        .on_page_load(move |_window, payload| {
            let url = payload.url().clone();
            match payload.event() {
                PageLoadEvent::Started => {
                    if matches!(url.scheme(), "http" | "https") && url.host_str() != Some("tauri.localhost") {
                        probe(load_app.clone(), probe_client.clone(), url);
                    }
                }
                PageLoadEvent::Finished => {
                    debug!("loaded {}", url);
                    forward(&load_app, HostEvent::ReadyToShow);
                }
            }
        });

        match options.bounds {
            Some(b) => {
                builder = builder
                    .position(b.x as f64, b.y as f64)
                    .inner_size(b.width as f64, b.height as f64);
            }
            None => builder = builder.center(),
        }

        #[cfg(windows)]
        {
            builder = builder.additional_browser_args(&options.browser_args.join(" "));
        }
        #[cfg(not(windows))]
        if !options.browser_args.is_empty() {
            debug!("browser switches only apply on windows: {:?}", options.browser_args);
        }

        let window = builder.build().map_err(host_err)?;
        Ok(Arc::new(TauriWindow { window }))
    }

    fn relaunch(&self, args: &[String]) -> Result<()> {
        let exe = std::env::current_exe().map_err(|e| Error::io("current_exe", e))?;
        std::process::Command::new(&exe)
            .args(args)
            .spawn()
            .map_err(|e| Error::io(&exe, e))?;
        Ok(())
    }

    fn exit(&self, code: i32) {
        self.app.exit(code);
    }

    fn open_external(&self, url: &Url) -> Result<()> {
        #[allow(deprecated)]
        let opened = self.app.shell().open(url.as_str(), None);
        opened.map_err(|e| Error::Host(e.to_string()))
    }
}

/// Reports `LoadFailed` when `url` cannot be reached at all. The webview
/// itself does not surface network errors.
fn probe(app: AppHandle, client: reqwest::Client, url: Url) {
    tauri::async_runtime::spawn(async move {
        if let Err(e) = client.head(url.clone()).send().await {
            warn!("cannot reach {}: {}", url.origin().ascii_serialization(), e);
            forward(&app, HostEvent::LoadFailed);
        }
    });
}

pub struct TauriWindow {
    window: WebviewWindow,
}

/// Tauri reports maximize as a plain resize. Compares against the last
/// state seen to tell them apart.
pub fn classify_resize(window: &tauri::Window, last_maximized: &AtomicBool) -> HostEvent {
    let now = window.is_maximized().unwrap_or(false);
    match (last_maximized.swap(now, Ordering::SeqCst), now) {
        (false, true) => HostEvent::Maximized,
        (true, false) => HostEvent::Unmaximized,
        _ => HostEvent::Resized,
    }
}

impl HostWindow for TauriWindow {
    fn show(&self) -> Result<()> {
        self.window.show().map_err(host_err)
    }

    fn hide(&self) -> Result<()> {
        self.window.hide().map_err(host_err)
    }

    fn close(&self) -> Result<()> {
        self.window.destroy().map_err(host_err)
    }

    fn focus(&self) -> Result<()> {
        self.window.set_focus().map_err(host_err)
    }

    fn move_top(&self) -> Result<()> {
        self.window.set_always_on_top(true).map_err(host_err)?;
        self.window.set_always_on_top(false).map_err(host_err)
    }

    fn minimize(&self) -> Result<()> {
        self.window.minimize().map_err(host_err)
    }

    fn is_minimized(&self) -> Result<bool> {
        self.window.is_minimized().map_err(host_err)
    }

    fn restore(&self) -> Result<()> {
        self.window.unminimize().map_err(host_err)
    }

    fn maximize(&self) -> Result<()> {
        self.window.maximize().map_err(host_err)
    }

    fn unmaximize(&self) -> Result<()> {
        self.window.unmaximize().map_err(host_err)
    }

    fn is_maximized(&self) -> Result<bool> {
        self.window.is_maximized().map_err(host_err)
    }

    fn bounds(&self) -> Result<Bounds> {
        let scale = self.window.scale_factor().map_err(host_err)?;
        let position: LogicalPosition<i32> = self.window.outer_position().map_err(host_err)?.to_logical(scale);
        let size: LogicalSize<u32> = self.window.inner_size().map_err(host_err)?.to_logical(scale);
        Ok(Bounds {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        })
    }

    fn url(&self) -> Result<Url> {
        self.window.url().map_err(host_err)
    }

    fn navigate(&self, url: &Url) -> Result<()> {
        self.window.navigate(url.clone()).map_err(host_err)
    }

    fn load_fallback(&self) -> Result<()> {
        self.navigate(&fallback_url())
    }

    fn reload(&self) -> Result<()> {
        self.window.eval("window.location.reload()").map_err(host_err)
    }

    fn open_devtools(&self) {
        #[cfg(debug_assertions)]
        self.window.open_devtools();
        #[cfg(not(debug_assertions))]
        debug!("devtools are not available in release builds");
    }

    fn set_content_protection(&self, enabled: bool) -> Result<()> {
        self.window.set_content_protected(enabled).map_err(host_err)
    }

    fn flush_storage(&self) -> Result<()> {
        // no webview API to force a flush; storage is written back on its own schedule
        warn!("flushStorageData is not supported by this webview, ignoring");
        Ok(())
    }
}
