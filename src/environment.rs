//! Display-server environment inspection
//!
//! Consulted once at startup. Transparent overlays are unreliable on native
//! Wayland, so renderers are steered to X11 (XWayland) unless the user already
//! picked a GDK backend.

use tracing::info;

use crate::constants::display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendPreference {
    /// Leave backend selection to the toolkit
    Native,
    /// Wayland session with no explicit backend: ask renderers for X11
    ForceX11,
    /// User already set GDK_BACKEND; respect it
    UserSelected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayEnvironment {
    pub wayland_display: Option<String>,
    pub gdk_backend: Option<String>,
    pub x11_display: Option<String>,
    pub session_type: Option<String>,
}

impl DisplayEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            wayland_display: get(display::WAYLAND_DISPLAY),
            gdk_backend: get(display::GDK_BACKEND),
            x11_display: get(display::X11_DISPLAY),
            session_type: get(display::XDG_SESSION_TYPE),
        }
    }

    pub fn backend_preference(&self) -> BackendPreference {
        match (&self.wayland_display, &self.gdk_backend) {
            (_, Some(_)) => BackendPreference::UserSelected,
            (Some(_), None) => BackendPreference::ForceX11,
            (None, None) => BackendPreference::Native,
        }
    }

    /// Value renderers should use for GDK_BACKEND, if any
    pub fn gdk_backend_hint(&self) -> Option<&str> {
        match self.backend_preference() {
            BackendPreference::ForceX11 => Some("x11"),
            BackendPreference::UserSelected => self.gdk_backend.as_deref(),
            BackendPreference::Native => None,
        }
    }

    pub fn log_summary(&self) {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "not set".to_string());
        info!(
            wayland_display = %show(&self.wayland_display),
            gdk_backend = %show(&self.gdk_backend),
            display = %show(&self.x11_display),
            session_type = %show(&self.session_type),
            "Display environment"
        );
        if self.backend_preference() == BackendPreference::ForceX11 {
            info!("Wayland detected without GDK_BACKEND, renderers should use the X11 backend for transparency");
        }
        if let Some(hint) = self.gdk_backend_hint() {
            info!(gdk_backend = hint, preference = ?self.backend_preference(), "Renderer backend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> DisplayEnvironment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DisplayEnvironment::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_wayland_without_backend_forces_x11() {
        let env = env_of(&[("WAYLAND_DISPLAY", "wayland-0")]);
        assert_eq!(env.backend_preference(), BackendPreference::ForceX11);
        assert_eq!(env.gdk_backend_hint(), Some("x11"));
    }

    #[test]
    fn test_user_backend_is_respected() {
        let env = env_of(&[("WAYLAND_DISPLAY", "wayland-0"), ("GDK_BACKEND", "wayland")]);
        assert_eq!(env.backend_preference(), BackendPreference::UserSelected);
        assert_eq!(env.gdk_backend_hint(), Some("wayland"));
    }

    #[test]
    fn test_plain_x11_session() {
        let env = env_of(&[("DISPLAY", ":0"), ("XDG_SESSION_TYPE", "x11")]);
        assert_eq!(env.backend_preference(), BackendPreference::Native);
        assert_eq!(env.gdk_backend_hint(), None);
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let env = env_of(&[("WAYLAND_DISPLAY", ""), ("GDK_BACKEND", "")]);
        assert_eq!(env.wayland_display, None);
        assert_eq!(env.backend_preference(), BackendPreference::Native);
    }
}
