//! Process lifecycle: which surfaces exist, hide-vs-quit policy, teardown
//!
//! Starting -> Running -> Quitting -> Terminated. The quitting flag is set
//! before any surface is destroyed so close handlers can tell "hide" from
//! "terminate". Quit and destroy are both idempotent.

use tracing::{debug, info, warn};

use crate::surface::{SurfaceId, SurfaceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    Starting,
    Running,
    Quitting,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitTrigger {
    /// The primary ring surface was closed
    PrimaryClosed,
    /// Quit chosen from a menu or the settings panel
    QuitAction,
    /// The last live surface went away
    AllSurfacesClosed,
    /// SIGINT/SIGTERM from the host
    HostSignal,
}

/// What to do with a surface whose close was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Secondary surface while running: keep it alive but hidden
    Hide,
    /// Closing this surface ends the process
    Quit(QuitTrigger),
    /// Already quitting: let it be destroyed
    Destroy,
    /// Unknown or already destroyed surface
    Ignore,
}

#[derive(Debug, Clone)]
struct SurfaceEntry {
    id: SurfaceId,
    kind: SurfaceKind,
    visible: bool,
    live: bool,
}

/// Surfaces to destroy, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownPlan {
    pub trigger: QuitTrigger,
    pub order: Vec<SurfaceId>,
}

pub struct LifecycleController {
    phase: AppPhase,
    surfaces: Vec<SurfaceEntry>,
    primary: Option<SurfaceId>,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            phase: AppPhase::Starting,
            surfaces: Vec::new(),
            primary: None,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> AppPhase {
        self.phase
    }

    pub fn is_quitting(&self) -> bool {
        matches!(self.phase, AppPhase::Quitting | AppPhase::Terminated)
    }

    #[cfg(test)]
    pub fn primary(&self) -> Option<SurfaceId> {
        self.primary
    }

    /// Record a surface in construction order. The first ring is primary.
    pub fn register(&mut self, id: SurfaceId, kind: SurfaceKind, visible: bool) {
        if self.is_quitting() {
            warn!(surface = %id, "Surface registered while quitting");
        }
        if kind == SurfaceKind::Ring && self.primary.is_none() {
            info!(surface = %id, "Primary ring surface registered");
            self.primary = Some(id);
        }
        self.surfaces.push(SurfaceEntry {
            id,
            kind,
            visible,
            live: true,
        });
    }

    pub fn mark_running(&mut self) {
        if self.phase == AppPhase::Starting {
            self.phase = AppPhase::Running;
            info!(surfaces = self.live_count(), "Lifecycle running");
        }
    }

    #[cfg(test)]
    pub fn is_live(&self, id: SurfaceId) -> bool {
        self.entry(id).is_some_and(|e| e.live)
    }

    #[cfg(test)]
    pub fn is_visible(&self, id: SurfaceId) -> bool {
        self.entry(id).is_some_and(|e| e.live && e.visible)
    }

    pub fn live_count(&self) -> usize {
        self.surfaces.iter().filter(|e| e.live).count()
    }

    /// Live surfaces of one kind, in construction order
    pub fn live_of_kind(&self, kind: SurfaceKind) -> Vec<SurfaceId> {
        self.surfaces
            .iter()
            .filter(|e| e.live && e.kind == kind)
            .map(|e| e.id)
            .collect()
    }

    /// Mark a surface shown/hidden. Returns true if visibility changed.
    pub fn set_visible(&mut self, id: SurfaceId, visible: bool) -> bool {
        match self.entry_mut(id) {
            Some(entry) if entry.live && entry.visible != visible => {
                entry.visible = visible;
                true
            }
            _ => false,
        }
    }

    pub fn on_close_requested(&self, id: SurfaceId) -> CloseDecision {
        let Some(entry) = self.entry(id).filter(|e| e.live) else {
            return CloseDecision::Ignore;
        };
        if self.is_quitting() {
            return CloseDecision::Destroy;
        }
        if Some(entry.id) == self.primary {
            CloseDecision::Quit(QuitTrigger::PrimaryClosed)
        } else {
            CloseDecision::Hide
        }
    }

    /// A surface went away on its own (e.g. its connection dropped).
    /// Returns a quit trigger if that ends the process.
    pub fn on_surface_gone(&mut self, id: SurfaceId) -> Option<QuitTrigger> {
        if !self.destroy(id) || self.is_quitting() {
            return None;
        }
        if Some(id) == self.primary {
            Some(QuitTrigger::PrimaryClosed)
        } else if self.phase == AppPhase::Running && self.live_count() == 0 {
            Some(QuitTrigger::AllSurfacesClosed)
        } else {
            None
        }
    }

    /// Enter Quitting. Returns the teardown plan the first time only.
    pub fn begin_quit(&mut self, trigger: QuitTrigger) -> Option<TeardownPlan> {
        if self.is_quitting() {
            debug!(trigger = ?trigger, phase = ?self.phase, "Quit already in progress");
            return None;
        }
        self.phase = AppPhase::Quitting;
        info!(trigger = ?trigger, "Quitting");

        // Reverse construction order: secondary surfaces first, primary ring last
        let order = self
            .surfaces
            .iter()
            .rev()
            .filter(|e| e.live)
            .map(|e| e.id)
            .collect();
        Some(TeardownPlan { trigger, order })
    }

    /// Mark a surface destroyed. False if it was unknown or already destroyed.
    pub fn destroy(&mut self, id: SurfaceId) -> bool {
        match self.entry_mut(id) {
            Some(entry) if entry.live => {
                entry.live = false;
                entry.visible = false;
                debug!(surface = %id, "Surface destroyed");
                true
            }
            _ => false,
        }
    }

    pub fn finish(&mut self) {
        if self.phase != AppPhase::Terminated {
            self.phase = AppPhase::Terminated;
            info!(remaining = self.live_count(), "Lifecycle terminated");
        }
    }

    fn entry(&self, id: SurfaceId) -> Option<&SurfaceEntry> {
        self.surfaces.iter().find(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: SurfaceId) -> Option<&mut SurfaceEntry> {
        self.surfaces.iter_mut().find(|e| e.id == id)
    }
}
