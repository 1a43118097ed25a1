//! Settings panel surface
//!
//! Edits are applied to the local snapshot first for immediate feedback, then
//! sent to the control loop. Continuous controls use `UpdateRing` (debounced
//! persist); the power switch saves immediately.

use anyhow::{bail, Result};
use std::fmt;
use tracing::debug;

use crate::config::{SettingsPatch, SettingsRecord};
use crate::constants::presets;
use crate::ipc::BridgeRequest;
use crate::surface::{IntentSink, Surface, SurfaceKind};

/// Text shown next to each control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLabels {
    pub power: &'static str,
    pub size: String,
    pub thickness: String,
    pub brightness: String,
    pub blur: String,
    pub color: String,
}

impl fmt::Display for PanelLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ring {}, size {}, thickness {}, brightness {}, blur {}, color {}",
            self.power, self.size, self.thickness, self.brightness, self.blur, self.color
        )
    }
}

pub struct SettingsPanel<S: IntentSink> {
    snapshot: SettingsRecord,
    sink: S,
    visible: bool,
    /// Fields edited here since the last explicit save
    dirty: SettingsPatch,
}

impl<S: IntentSink> SettingsPanel<S> {
    pub fn new(settings: SettingsRecord, sink: S) -> Self {
        Self {
            snapshot: settings,
            sink,
            visible: false,
            dirty: SettingsPatch::default(),
        }
    }

    #[cfg(test)]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_unsaved_edits(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn set_size(&mut self, size: i32) -> Result<()> {
        self.edit(SettingsPatch {
            size: Some(size),
            ..Default::default()
        })
    }

    pub fn set_thickness(&mut self, thickness: i32) -> Result<()> {
        self.edit(SettingsPatch {
            thickness: Some(thickness),
            ..Default::default()
        })
    }

    pub fn set_brightness(&mut self, brightness: i32) -> Result<()> {
        self.edit(SettingsPatch {
            brightness: Some(brightness),
            ..Default::default()
        })
    }

    pub fn set_blur(&mut self, blur: i32) -> Result<()> {
        self.edit(SettingsPatch {
            blur: Some(blur),
            ..Default::default()
        })
    }

    pub fn set_color(&mut self, color: impl Into<String>) -> Result<()> {
        self.edit(SettingsPatch {
            color: Some(color.into()),
            ..Default::default()
        })
    }

    pub fn set_custom_color(&mut self, color: impl Into<String>) -> Result<()> {
        self.edit(SettingsPatch {
            custom_color: Some(color.into()),
            ..Default::default()
        })
    }

    /// Use one of the preset swatches as the ring color
    pub fn pick_preset(&mut self, index: usize) -> Result<()> {
        let Some((name, hex)) = presets::COLORS.get(index) else {
            bail!("No color preset at index {index}");
        };
        debug!(preset = %name, "Preset color picked");
        self.set_color(*hex)
    }

    fn edit(&mut self, patch: SettingsPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.snapshot.apply(&patch);
        self.dirty.absorb(patch.clone());
        self.sink.emit(BridgeRequest::UpdateRing(patch))
    }

    /// Power switch: discrete, saved immediately
    pub fn set_power(&mut self, on: bool) -> Result<()> {
        let patch = SettingsPatch {
            is_on: Some(on),
            ..Default::default()
        };
        self.snapshot.apply(&patch);
        self.dirty.is_on = None;
        self.sink.emit(BridgeRequest::SaveSettings(patch))
    }

    /// Persist the fields edited here now. Returns false if nothing was pending.
    pub fn save(&mut self) -> Result<bool> {
        if self.dirty.is_empty() {
            return Ok(false);
        }
        let patch = std::mem::take(&mut self.dirty);
        self.sink.emit(BridgeRequest::SaveSettings(patch))?;
        Ok(true)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.has_unsaved_edits() {
            debug!(dirty = ?self.dirty, "Closing settings panel with unsaved edits");
        }
        self.sink.emit(BridgeRequest::CloseSettings)
    }

    pub fn quit(&mut self) -> Result<()> {
        self.sink.emit(BridgeRequest::QuitApp)
    }

    pub fn labels(&self) -> PanelLabels {
        PanelLabels {
            power: if self.snapshot.is_on { "On" } else { "Off" },
            size: format!("{}%", self.snapshot.size),
            thickness: format!("{}px", self.snapshot.thickness),
            brightness: format!("{}%", self.snapshot.brightness),
            blur: format!("{}px", self.snapshot.blur),
            color: self.snapshot.color.clone(),
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Forget dirty fields that another surface has since changed
fn prune_overridden(dirty: &mut SettingsPatch, settings: &SettingsRecord) {
    fn prune<T: PartialEq>(field: &mut Option<T>, current: &T) {
        if field.as_ref().is_some_and(|value| value != current) {
            *field = None;
        }
    }
    prune(&mut dirty.is_on, &settings.is_on);
    prune(&mut dirty.size, &settings.size);
    prune(&mut dirty.thickness, &settings.thickness);
    prune(&mut dirty.brightness, &settings.brightness);
    prune(&mut dirty.blur, &settings.blur);
    prune(&mut dirty.color, &settings.color);
    if dirty.custom_color.is_some() && dirty.custom_color != settings.custom_color {
        dirty.custom_color = None;
    }
}

impl<S: IntentSink + Send> Surface for SettingsPanel<S> {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::SettingsPanel
    }

    fn snapshot(&self) -> &SettingsRecord {
        &self.snapshot
    }

    fn apply_settings(&mut self, settings: SettingsRecord) {
        prune_overridden(&mut self.dirty, &settings);
        self.snapshot = settings;
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            debug!(visible, "Settings panel visibility changed");
        }
        self.visible = visible;
    }
}
