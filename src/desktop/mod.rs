//! Tauri-backed desktop host and application entry point.

mod capture;
mod shortcuts;
mod window;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use tauri::{Emitter, Manager, RunEvent, State, WebviewWindow, WindowEvent};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::autostart::{self, Platform, StartupReconciler};
use crate::commands::{Command, Dispatcher, Reply};
use crate::config::{AppProfile, ConfigHandle, ConfigStore};
use crate::host::{HostEvent, KeybindNotifier};
use crate::launch::LaunchArgs;
use crate::lifecycle::{CloseDecision, LifecycleController, LifecycleDeps};
use crate::updater::HttpUpdateService;
use crate::window_state::WindowStateStore;

use capture::ScreenSources;
use shortcuts::GlobalShortcuts;
use window::{classify_resize, TauriHost, MAIN_WINDOW};

/// Managed app state.
pub(crate) struct Shell {
    pub(crate) controller: Arc<LifecycleController>,
    dispatcher: Dispatcher,
    main_maximized: AtomicBool,
}

#[tauri::command]
async fn dispatch(
    window: WebviewWindow,
    shell: State<'_, Shell>,
    request: Command,
) -> Result<Reply, String> {
    let label = window.label().to_string();
    let notify: KeybindNotifier = Arc::new(move |combo: &str| {
        if let Err(e) = window.emit_to(label.as_str(), "keybind", combo) {
            error!("failed to deliver keybind {}: {}", combo, e);
        }
    });
    shell
        .dispatcher
        .dispatch(request, notify)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn key_down(shell: State<'_, Shell>, key: String) {
    shell.controller.handle_event(HostEvent::KeyDown { key });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hyalus_desktop=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn run() -> anyhow::Result<()> {
    init_tracing();

    let launch = LaunchArgs::from_env();
    let profile = AppProfile::from_env();
    info!("starting {} v{}", profile.name, env!("CARGO_PKG_VERSION"));

    let data_dir = profile.data_dir()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    tauri::async_runtime::set(runtime.handle().clone());
    let _guard = runtime.enter();

    let config = ConfigHandle::load(ConfigStore::in_dir(&data_dir));
    let items = autostart::for_current_platform(&profile, &data_dir)?;
    let reconciler = StartupReconciler::for_platform(Platform::current(), items, config.clone());
    let updates = Arc::new(HttpUpdateService::new(
        profile.update_feed(),
        data_dir.join("updates"),
    ));

    let mut builder = tauri::Builder::default();
    if launch.single_instance() {
        // a later launch exits inside this plugin and wakes us instead
        builder = builder.plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            info!("another launch was redirected here");
            window::forward(app, HostEvent::SecondInstance);
        }));
    } else {
        info!("--dupe given, not enforcing a single instance");
    }

    let app = builder
        .plugin(tauri_plugin_shell::init())
        .invoke_handler(tauri::generate_handler![dispatch, key_down])
        .setup(move |app| {
            let handle = app.handle().clone();
            let controller = LifecycleController::new(LifecycleDeps {
                profile,
                launch,
                config,
                window_state: WindowStateStore::in_dir(&data_dir),
                reconciler,
                host: Arc::new(TauriHost::new(handle.clone())),
                updates,
            });
            let shortcuts = GlobalShortcuts::start()?;
            let dispatcher = Dispatcher::new(
                controller.clone(),
                shortcuts,
                Arc::new(ScreenSources),
            );
            app.manage(Shell {
                controller: controller.clone(),
                dispatcher,
                main_maximized: AtomicBool::new(false),
            });

            tauri::async_runtime::block_on(controller.start())?;
            Ok(())
        })
        .on_window_event(|window, event| {
            if window.label() != MAIN_WINDOW {
                return;
            }
            let Some(shell) = window.app_handle().try_state::<Shell>() else {
                return;
            };
            match event {
                WindowEvent::CloseRequested { api, .. } => {
                    if shell.controller.on_close_requested() == CloseDecision::Hide {
                        api.prevent_close();
                    }
                }
                WindowEvent::Resized(_) => {
                    let event = classify_resize(window, &shell.main_maximized);
                    shell.controller.handle_event(event);
                }
                WindowEvent::Moved(_) => shell.controller.handle_event(HostEvent::Resized),
                _ => {}
            }
        })
        .build(tauri::generate_context!())
        .context("failed to build tauri application")?;

    app.run(|app, event| {
        if let RunEvent::ExitRequested { api, code, .. } = event {
            let Some(shell) = app.try_state::<Shell>() else {
                return;
            };
            if code.is_none() && !shell.controller.is_quitting() {
                // keep running in the tray
                api.prevent_exit();
            } else {
                shell.controller.on_exit_requested();
            }
        }
    });
    Ok(())
}
