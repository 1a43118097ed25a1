//! One-shot commands against a running lum-o-ring
//!
//! Every command except `get` drives the same surface controllers the daemon
//! uses in-process, with a bridge connection as their intent sink.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{SettingsPatch, SettingsRecord};
use crate::ipc::{BridgeClient, BridgeRequest, BridgeResponse};
use crate::surface::{
    MenuAction, MenuEntry, MenuSurface, RingStyle, RingSurface, SettingsPanel, Surface, SurfaceKind,
    Viewport,
};

pub fn connect(socket: &Path) -> Result<BridgeClient> {
    BridgeClient::connect_to(socket)
}

/// Edits requested by `set`
#[derive(Debug, Clone, Default)]
pub struct SetRequest {
    pub patch: SettingsPatch,
    pub preset: Option<usize>,
}

impl SetRequest {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.preset.is_none()
    }
}

fn load(client: &mut BridgeClient) -> Result<SettingsRecord> {
    match client.request(BridgeRequest::LoadSettings)? {
        Some(BridgeResponse::Settings(settings)) => Ok(settings),
        other => bail!("Unexpected reply to LoadSettings: {other:?}"),
    }
}

fn attach(client: &mut BridgeClient, kind: SurfaceKind) -> Result<SettingsRecord> {
    match client.request(BridgeRequest::Attach(kind))? {
        Some(BridgeResponse::Attached { surface, settings }) => {
            debug!(surface = %surface, kind = ?kind, "Attached to lum-o-ring");
            Ok(settings)
        }
        other => bail!("Unexpected reply to Attach: {other:?}"),
    }
}

/// Print the authoritative settings as JSON
pub fn get(mut client: BridgeClient, out: &mut impl Write) -> Result<()> {
    let settings = load(&mut client)?;
    let json = serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
    writeln!(out, "{json}").context("Failed to write settings")?;
    Ok(())
}

/// Apply edits through the settings panel controls and save them.
/// Prints the panel's value labels and returns the resulting settings.
pub fn set(mut client: BridgeClient, request: SetRequest, out: &mut impl Write) -> Result<SettingsRecord> {
    if request.is_empty() {
        bail!("Nothing to set");
    }

    let settings = attach(&mut client, SurfaceKind::SettingsPanel)?;
    let mut panel = SettingsPanel::new(settings, client);

    let edits = request.patch;
    if let Some(index) = request.preset {
        panel.pick_preset(index)?;
    }
    if let Some(size) = edits.size {
        panel.set_size(size)?;
    }
    if let Some(thickness) = edits.thickness {
        panel.set_thickness(thickness)?;
    }
    if let Some(brightness) = edits.brightness {
        panel.set_brightness(brightness)?;
    }
    if let Some(blur) = edits.blur {
        panel.set_blur(blur)?;
    }
    if let Some(color) = edits.color {
        panel.set_color(color)?;
    }
    if let Some(custom_color) = edits.custom_color {
        panel.set_custom_color(custom_color)?;
    }

    let mut pending_saves = 0;
    if let Some(on) = edits.is_on {
        panel.set_power(on)?;
        pending_saves += 1;
    }
    if panel.save()? {
        pending_saves += 1;
    }

    let settings = panel.snapshot().clone();
    let labels = panel.labels();
    let mut client = panel.into_sink();
    while pending_saves > 0 {
        match client.recv_response()? {
            BridgeResponse::SaveResult(result) => {
                pending_saves -= 1;
                if !result.success {
                    bail!(
                        "lum-o-ring failed to save settings: {}",
                        result.error.unwrap_or_else(|| "unknown error".to_string())
                    );
                }
            }
            BridgeResponse::Error(message) => bail!("lum-o-ring rejected request: {message}"),
            other => debug!(frame = ?other, "Ignoring frame while waiting for save"),
        }
    }

    info!(settings = ?settings, "Settings saved");
    writeln!(out, "{labels}").context("Failed to write settings")?;
    Ok(settings)
}

/// Flip the ring on/off the way the menu does. Returns the new state.
pub fn toggle(mut client: BridgeClient) -> Result<bool> {
    let settings = load(&mut client)?;
    let mut menu = MenuSurface::new(settings, client);
    menu.activate(MenuAction::ToggleRing)?;

    // Same connection, so this is answered after the toggle was applied
    let mut client = menu.into_sink();
    Ok(load(&mut client)?.is_on)
}

/// Open the gear menu as a remote gear surface. Lists the entries, or
/// activates one by index.
pub fn menu(mut client: BridgeClient, activate: Option<usize>, out: &mut impl Write) -> Result<()> {
    let settings = attach(&mut client, SurfaceKind::Gear)?;
    let mut gear = MenuSurface::new(settings, client);
    gear.request_menu()?;

    // The reply and the pushed menu event travel separately; wait for both
    let mut replied = false;
    while !replied || gear.open_menu().is_none() {
        match gear.sink_mut().recv_response()? {
            BridgeResponse::Event(event) => {
                if !gear.handle_event(event) {
                    bail!("Gear closed by lum-o-ring before the menu opened");
                }
            }
            BridgeResponse::Menu(_) => replied = true,
            BridgeResponse::Error(message) => bail!("lum-o-ring rejected request: {message}"),
            other => debug!(frame = ?other, "Ignoring frame while waiting for menu"),
        }
    }
    let entries: Vec<MenuEntry> = gear.open_menu().map(<[MenuEntry]>::to_vec).unwrap_or_default();

    match activate {
        None => {
            for (index, entry) in entries.iter().enumerate() {
                writeln!(out, "{index}: {}", entry.label).context("Failed to write menu")?;
            }
        }
        Some(index) => {
            let entry = entries
                .get(index)
                .with_context(|| format!("No menu entry at index {index}"))?;
            gear.activate(entry.action)?;
            writeln!(out, "{}", entry.label).context("Failed to write menu")?;
        }
    }
    Ok(())
}

/// Show the settings panel, as the menu entry does
pub fn open_settings(mut client: BridgeClient) -> Result<()> {
    let settings = load(&mut client)?;
    MenuSurface::new(settings, client).activate(MenuAction::OpenSettings)
}

/// Hide the settings panel, as its close button does
pub fn close_settings(mut client: BridgeClient) -> Result<()> {
    let settings = load(&mut client)?;
    SettingsPanel::new(settings, client).close()
}

/// Quit lum-o-ring, as the panel's quit button does
pub fn quit(mut client: BridgeClient) -> Result<()> {
    let settings = load(&mut client)?;
    SettingsPanel::new(settings, client).quit()
}

/// Attach as a ring and report every rendered style until closed.
/// Returns the number of renders.
pub fn watch(
    mut client: BridgeClient,
    viewport: Viewport,
    on_style: impl FnMut(&RingStyle) + Send + 'static,
) -> Result<u64> {
    let settings = attach(&mut client, SurfaceKind::Ring)?;
    let mut ring = RingSurface::new(settings, viewport).with_render_hook(on_style);

    loop {
        let frame = match client.recv_response() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = ?e, "Bridge connection closed");
                break;
            }
        };
        match frame {
            BridgeResponse::Event(event) => {
                if !ring.handle_event(event) {
                    info!("Ring closed by lum-o-ring");
                    break;
                }
            }
            other => debug!(frame = ?other, "Ignoring frame"),
        }
    }
    Ok(ring.render_count())
}

/// One line per rendered style
pub fn format_style(style: &RingStyle, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string(style).context("Failed to serialize ring style");
    }
    if !style.visible {
        return Ok("off".to_string());
    }
    Ok(format!(
        "diameter={}px stroke={}px opacity={} color={} box-shadow: {}",
        style.diameter_px,
        style.stroke_px,
        style.opacity,
        style.color,
        style.box_shadow()
    ))
}
