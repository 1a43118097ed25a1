//! Surfaces: independent views (ring overlay, settings panel, gear/tray menu)
//!
//! Each surface keeps a local snapshot of the settings, renders from it, and
//! turns user input into requests for the control loop. Snapshots are only
//! ever replaced wholesale by broadcasts from the broker.

pub mod menu;
pub mod panel;
pub mod ring;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SettingsRecord;
use crate::ipc::BridgeRequest;

pub use menu::{MenuAction, MenuEntry, MenuSurface};
pub use panel::SettingsPanel;
pub use ring::{RingStyle, RingSurface, Viewport};

/// Broker-assigned handle for a subscribed surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// The overlay itself
    Ring,
    /// Appearance controls
    SettingsPanel,
    /// Floating gear icon / tray menu
    Gear,
}

/// Pushed from the broker to a surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    /// Post-merge authoritative settings
    Settings(SettingsRecord),
    Show,
    Hide,
    /// Entries for a context menu requested by this surface
    ContextMenu(Vec<MenuEntry>),
    /// The surface is being destroyed
    Close,
}

/// Where a surface sends its requests (in-process handle or socket client)
pub trait IntentSink {
    fn emit(&mut self, request: BridgeRequest) -> Result<()>;
}

pub trait Surface: Send {
    fn kind(&self) -> SurfaceKind;

    fn snapshot(&self) -> &SettingsRecord;

    /// Replace the local snapshot and re-render
    fn apply_settings(&mut self, settings: SettingsRecord);

    fn set_visible(&mut self, _visible: bool) {}

    fn show_menu(&mut self, _entries: Vec<MenuEntry>) {}

    /// Handle one broker event. Returns false once the surface is closed.
    fn handle_event(&mut self, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::Settings(settings) => self.apply_settings(settings),
            SurfaceEvent::Show => self.set_visible(true),
            SurfaceEvent::Hide => self.set_visible(false),
            SurfaceEvent::ContextMenu(entries) => self.show_menu(entries),
            SurfaceEvent::Close => return false,
        }
        true
    }
}

/// Drive an in-process surface from its event channel on the control runtime
pub fn spawn_surface<S>(mut surface: S, mut events: UnboundedReceiver<SurfaceEvent>) -> JoinHandle<()>
where
    S: Surface + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !surface.handle_event(event) {
                break;
            }
        }
        debug!(kind = ?surface.kind(), "Surface closed");
    })
}

#[cfg(test)]
impl IntentSink for Vec<BridgeRequest> {
    fn emit(&mut self, request: BridgeRequest) -> Result<()> {
        self.push(request);
        Ok(())
    }
}
