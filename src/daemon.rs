//! The lum-o-ring process: store, control loop, in-process surfaces, bridge

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::SettingsStore;
use crate::environment::DisplayEnvironment;
use crate::ipc::{session, BridgeServer};
use crate::lifecycle::QuitTrigger;
use crate::surface::{spawn_surface, MenuSurface, RingSurface, SettingsPanel, SurfaceKind, Viewport};
use crate::sync::{BrokerHandle, Command, ControlLoop};

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub settings_path: PathBuf,
    pub socket_path: PathBuf,
    pub debounce: Duration,
    pub viewport: Viewport,
}

/// Run until a quit completes, then exit the process
pub fn run_daemon(options: DaemonOptions) -> Result<()> {
    let environment = DisplayEnvironment::from_env();
    environment.log_summary();

    // Bind first so a second instance fails before touching the settings file
    let server = BridgeServer::bind_to(options.socket_path.clone())?;

    let store = SettingsStore::load(options.settings_path.clone(), options.debounce);
    info!(
        path = %store.path().display(),
        debounce_ms = options.debounce.as_millis() as u64,
        "Settings loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build control runtime")?;

    let viewport = options.viewport;
    let report = runtime.block_on(async move {
        let (control, handle) = ControlLoop::new(store);
        let control = tokio::spawn(control.run());

        spawn_local_surfaces(&handle, viewport).await?;
        handle.send(Command::Started)?;

        session::spawn_listener(server, handle.clone());
        spawn_signal_listener(handle)?;

        let report = control.await.context("Control loop task failed")?;
        anyhow::Ok(report)
    })?;

    info!(
        trigger = ?report.trigger,
        saves = report.saves,
        is_on = report.settings.is_on,
        "lum-o-ring exiting"
    );

    // The listener thread owns the server; exit skips its Drop
    if let Err(e) = std::fs::remove_file(&options.socket_path) {
        warn!(path = %options.socket_path.display(), error = ?e, "Failed to remove bridge socket");
    }
    std::process::exit(0)
}

/// Construct the in-process surfaces: ring (primary), gear, then the hidden panel
async fn spawn_local_surfaces(handle: &BrokerHandle, viewport: Viewport) -> Result<()> {
    let ring = handle.attach(SurfaceKind::Ring, true).await?;
    let ring_surface = RingSurface::new(ring.settings, viewport);
    info!(surface = %ring.id, style = ?ring_surface.style(), "Ring surface created");
    spawn_surface(ring_surface, ring.events);

    let gear = handle.attach(SurfaceKind::Gear, true).await?;
    spawn_surface(MenuSurface::new(gear.settings, handle.for_surface(gear.id)), gear.events);

    let panel = handle.attach(SurfaceKind::SettingsPanel, false).await?;
    spawn_surface(SettingsPanel::new(panel.settings, handle.for_surface(panel.id)), panel.events);

    Ok(())
}

fn spawn_signal_listener(handle: BrokerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::spawn(move || {
        for signal in signals.forever() {
            info!(signal, "Received termination signal");
            if handle.quit(QuitTrigger::HostSignal).is_err() {
                break;
            }
        }
    });
    Ok(())
}
