//! Gear icon / tray menu surface
//!
//! Offers three fixed actions and emits discrete intents only.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SettingsRecord;
use crate::ipc::BridgeRequest;
use crate::surface::{IntentSink, Surface, SurfaceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MenuAction {
    ToggleRing,
    OpenSettings,
    Quit,
}

impl MenuAction {
    pub fn request(self) -> BridgeRequest {
        match self {
            MenuAction::ToggleRing => BridgeRequest::ToggleRing,
            MenuAction::OpenSettings => BridgeRequest::OpenSettings,
            MenuAction::Quit => BridgeRequest::QuitApp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub action: MenuAction,
    pub label: String,
}

/// Menu entries for the given state; the toggle label follows `is_on`
pub fn entries_for(settings: &SettingsRecord) -> Vec<MenuEntry> {
    let toggle_label = if settings.is_on {
        "Turn Ring Off"
    } else {
        "Turn Ring On"
    };
    vec![
        MenuEntry {
            action: MenuAction::ToggleRing,
            label: toggle_label.to_string(),
        },
        MenuEntry {
            action: MenuAction::OpenSettings,
            label: "Settings…".to_string(),
        },
        MenuEntry {
            action: MenuAction::Quit,
            label: "Quit".to_string(),
        },
    ]
}

pub struct MenuSurface<S: IntentSink> {
    snapshot: SettingsRecord,
    sink: S,
    open_menu: Option<Vec<MenuEntry>>,
}

impl<S: IntentSink> MenuSurface<S> {
    pub fn new(settings: SettingsRecord, sink: S) -> Self {
        Self {
            snapshot: settings,
            sink,
            open_menu: None,
        }
    }

    /// Entries as this surface would show them right now
    pub fn entries(&self) -> Vec<MenuEntry> {
        entries_for(&self.snapshot)
    }

    /// The menu most recently pushed by the broker, if still open
    pub fn open_menu(&self) -> Option<&[MenuEntry]> {
        self.open_menu.as_deref()
    }

    /// Right-click on the gear: ask the control loop for the menu
    pub fn request_menu(&mut self) -> Result<()> {
        self.sink.emit(BridgeRequest::ShowContextMenu)
    }

    pub fn activate(&mut self, action: MenuAction) -> Result<()> {
        info!(action = ?action, "Menu action");
        self.open_menu = None;
        self.sink.emit(action.request())
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: IntentSink + Send> Surface for MenuSurface<S> {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Gear
    }

    fn snapshot(&self) -> &SettingsRecord {
        &self.snapshot
    }

    fn apply_settings(&mut self, settings: SettingsRecord) {
        self.snapshot = settings;
        // An open menu would show a stale toggle label
        if self.open_menu.is_some() {
            self.open_menu = Some(self.entries());
        }
        debug!(is_on = self.snapshot.is_on, "Menu state updated");
    }

    fn show_menu(&mut self, entries: Vec<MenuEntry>) {
        self.open_menu = Some(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceEvent;

    #[test]
    fn test_toggle_label_follows_state() {
        let on = entries_for(&SettingsRecord::default());
        assert_eq!(on.len(), 3);
        assert_eq!(on[0].label, "Turn Ring Off");

        let off = entries_for(&SettingsRecord {
            is_on: false,
            ..SettingsRecord::default()
        });
        assert_eq!(off[0].label, "Turn Ring On");
        assert_eq!(off[2].action, MenuAction::Quit);
    }

    #[test]
    fn test_actions_emit_discrete_requests() {
        let mut menu = MenuSurface::new(SettingsRecord::default(), Vec::new());
        menu.request_menu().unwrap();
        menu.activate(MenuAction::ToggleRing).unwrap();
        menu.activate(MenuAction::OpenSettings).unwrap();
        menu.activate(MenuAction::Quit).unwrap();
        assert_eq!(
            menu.into_sink(),
            vec![
                BridgeRequest::ShowContextMenu,
                BridgeRequest::ToggleRing,
                BridgeRequest::OpenSettings,
                BridgeRequest::QuitApp,
            ]
        );
    }

    #[test]
    fn test_open_menu_relabels_on_broadcast() {
        let mut menu = MenuSurface::new(SettingsRecord::default(), Vec::new());
        menu.handle_event(SurfaceEvent::ContextMenu(menu.entries()));
        assert_eq!(menu.open_menu().unwrap()[0].label, "Turn Ring Off");

        menu.handle_event(SurfaceEvent::Settings(SettingsRecord {
            is_on: false,
            ..SettingsRecord::default()
        }));
        assert_eq!(menu.open_menu().unwrap()[0].label, "Turn Ring On");
    }

    #[test]
    fn test_activate_closes_menu() {
        let mut menu = MenuSurface::new(SettingsRecord::default(), Vec::new());
        menu.show_menu(menu.entries());
        menu.activate(MenuAction::OpenSettings).unwrap();
        assert!(menu.open_menu().is_none());
    }
}
