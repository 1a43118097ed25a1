//! Bridge message types for surface ↔ control loop communication

use serde::{Deserialize, Serialize};

use crate::config::{SettingsPatch, SettingsRecord};
use crate::surface::{MenuEntry, SurfaceEvent, SurfaceId, SurfaceKind};
use crate::sync::SaveResult;

/// Requests sent from a surface (or a one-shot client) to the control loop
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Become a surface: receive broadcasts until the connection closes
    Attach(SurfaceKind),

    /// Current authoritative settings
    LoadSettings,

    /// Merge and persist immediately, reply with the save result
    SaveSettings(SettingsPatch),

    /// Merge and broadcast; persisted after the debounce window
    UpdateRing(SettingsPatch),

    /// Flip the ring on/off (menu action)
    ToggleRing,

    QuitApp,

    OpenSettings,

    CloseSettings,

    /// The requesting surface's window was closed by the user
    CloseSurface,

    /// Ask for the gear/tray menu entries
    ShowContextMenu,
}

impl BridgeRequest {
    /// Whether the control loop writes exactly one reply for this request
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            BridgeRequest::Attach(_)
                | BridgeRequest::LoadSettings
                | BridgeRequest::SaveSettings(_)
                | BridgeRequest::ShowContextMenu
        )
    }
}

/// Frames sent from the control loop to a connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BridgeResponse {
    /// Reply to Attach
    Attached {
        surface: SurfaceId,
        settings: SettingsRecord,
    },

    /// Reply to LoadSettings
    Settings(SettingsRecord),

    /// Reply to SaveSettings
    SaveResult(SaveResult),

    /// Reply to ShowContextMenu
    Menu(Vec<MenuEntry>),

    /// Unsolicited push to an attached surface
    Event(SurfaceEvent),

    /// Request could not be handled
    Error(String),
}
