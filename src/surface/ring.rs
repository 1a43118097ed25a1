//! Ring overlay surface
//!
//! Read-only with respect to persistence: it renders whatever the broker
//! last broadcast and never emits change intents.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color::{alpha_byte, HexColor};
use crate::config::SettingsRecord;
use crate::constants::{defaults, ring};
use crate::surface::{Surface, SurfaceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn short_edge(&self) -> u32 {
        self.width.min(self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ring::DEFAULT_VIEWPORT_WIDTH, ring::DEFAULT_VIEWPORT_HEIGHT)
    }
}

/// Resolved visual parameters for one frame of the ring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingStyle {
    pub visible: bool,
    pub diameter_px: f32,
    pub stroke_px: f32,
    pub opacity: f32,
    pub glow_blur_px: f32,
    pub glow_spread_px: f32,
    pub color: String,
    /// Ring color with the opacity folded into an alpha byte
    pub glow_color: String,
}

impl RingStyle {
    /// Deterministic mapping from settings to style.
    /// Out-of-range values are clamped here, never in the stored record.
    pub fn from_settings(settings: &SettingsRecord, viewport: Viewport) -> Self {
        let color = HexColor::parse(&settings.color).unwrap_or_else(|| {
            warn!(color = %settings.color, "Invalid ring color, rendering default");
            HexColor::parse(defaults::COLOR).unwrap_or(HexColor::new(0xFF, 0xFF, 0xFF))
        });

        let opacity = (settings.brightness as f32 / 100.0).clamp(0.0, 1.0);
        let blur = settings.blur.max(0) as f32;

        Self {
            visible: settings.is_on,
            diameter_px: viewport.short_edge() as f32 * settings.size.max(0) as f32 / 100.0,
            stroke_px: settings.thickness.max(0) as f32,
            opacity,
            glow_blur_px: blur,
            glow_spread_px: blur * ring::GLOW_SPREAD_FACTOR,
            color: color.to_hex(),
            glow_color: color.to_hex_with_alpha(alpha_byte(opacity)),
        }
    }

    /// CSS-style box-shadow describing the glow
    pub fn box_shadow(&self) -> String {
        format!(
            "0 0 {}px {}px {}",
            self.glow_blur_px, self.glow_spread_px, self.glow_color
        )
    }
}

type RenderHook = Box<dyn FnMut(&RingStyle) + Send>;

pub struct RingSurface {
    snapshot: SettingsRecord,
    viewport: Viewport,
    style: RingStyle,
    renders: u64,
    on_render: Option<RenderHook>,
}

impl RingSurface {
    pub fn new(settings: SettingsRecord, viewport: Viewport) -> Self {
        let style = RingStyle::from_settings(&settings, viewport);
        Self {
            snapshot: settings,
            viewport,
            style,
            renders: 1,
            on_render: None,
        }
    }

    /// Call `hook` with every rendered style, starting with the current one
    pub fn with_render_hook(mut self, mut hook: impl FnMut(&RingStyle) + Send + 'static) -> Self {
        hook(&self.style);
        self.on_render = Some(Box::new(hook));
        self
    }

    pub fn style(&self) -> &RingStyle {
        &self.style
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    fn render(&mut self) {
        self.style = RingStyle::from_settings(&self.snapshot, self.viewport);
        self.renders += 1;
        debug!(style = ?self.style, "Ring rendered");
        if let Some(hook) = self.on_render.as_mut() {
            hook(&self.style);
        }
    }
}

impl Surface for RingSurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Ring
    }

    fn snapshot(&self) -> &SettingsRecord {
        &self.snapshot
    }

    fn apply_settings(&mut self, settings: SettingsRecord) {
        self.snapshot = settings;
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceEvent;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_default_style() {
        let style = RingStyle::from_settings(&SettingsRecord::default(), Viewport::new(1920, 1080));
        assert!(style.visible);
        assert_eq!(style.diameter_px, 864.0);
        assert_eq!(style.stroke_px, 25.0);
        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.glow_blur_px, 40.0);
        assert_eq!(style.glow_spread_px, 20.0);
        assert_eq!(style.color, "#fff5cc");
        assert_eq!(style.box_shadow(), "0 0 40px 20px #fff5ccff");
    }

    #[test]
    fn test_brightness_maps_linearly_to_opacity() {
        let settings = SettingsRecord {
            brightness: 25,
            ..SettingsRecord::default()
        };
        let style = RingStyle::from_settings(&settings, Viewport::default());
        assert_eq!(style.opacity, 0.25);
        assert_eq!(style.glow_color, "#fff5cc40");
    }

    #[test]
    fn test_off_ring_is_invisible() {
        let settings = SettingsRecord {
            is_on: false,
            ..SettingsRecord::default()
        };
        assert!(!RingStyle::from_settings(&settings, Viewport::default()).visible);
    }

    #[test]
    fn test_out_of_range_values_render_without_fault() {
        let settings = SettingsRecord {
            size: -10,
            thickness: -5,
            brightness: 400,
            blur: i32::MIN,
            ..SettingsRecord::default()
        };
        let style = RingStyle::from_settings(&settings, Viewport::default());
        assert_eq!(style.diameter_px, 0.0);
        assert_eq!(style.stroke_px, 0.0);
        assert_eq!(style.opacity, 1.0);
        assert_eq!(style.glow_blur_px, 0.0);

        let huge = SettingsRecord {
            thickness: i32::MAX,
            ..SettingsRecord::default()
        };
        let style = RingStyle::from_settings(&huge, Viewport::default());
        assert!(style.stroke_px.is_finite());
    }

    #[test]
    fn test_malformed_color_falls_back_to_default() {
        let settings = SettingsRecord {
            color: "not-a-color".to_string(),
            ..SettingsRecord::default()
        };
        let style = RingStyle::from_settings(&settings, Viewport::default());
        assert_eq!(style.color, "#fff5cc");
    }

    #[test]
    fn test_broadcast_replaces_snapshot_and_rerenders() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut ring = RingSurface::new(SettingsRecord::default(), Viewport::new(1000, 800))
            .with_render_hook(move |style| sink.lock().unwrap().push(style.stroke_px));

        let update = SettingsRecord {
            thickness: 40,
            ..SettingsRecord::default()
        };
        assert!(ring.handle_event(SurfaceEvent::Settings(update.clone())));
        assert_eq!(ring.snapshot(), &update);
        assert_eq!(ring.style().stroke_px, 40.0);
        assert_eq!(ring.render_count(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![25.0, 40.0]);

        assert!(!ring.handle_event(SurfaceEvent::Close));
    }
}
