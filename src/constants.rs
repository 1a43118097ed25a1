//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Settings file location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "lum-o-ring";

    /// Settings file name
    pub const FILENAME: &str = "lum-o-ring.json";

    /// Environment variable overriding the settings file path
    pub const SETTINGS_PATH_ENV: &str = "LUM_O_RING_SETTINGS";

    /// Environment variable selecting the log level
    pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
}

/// Built-in ring defaults (warm white, 80% of the short screen edge)
pub mod defaults {
    pub const IS_ON: bool = true;
    pub const SIZE: i32 = 80;
    pub const THICKNESS: i32 = 25;
    pub const BRIGHTNESS: i32 = 100;
    pub const BLUR: i32 = 40;
    pub const COLOR: &str = "#fff5cc";
}

/// Documented ranges for each numeric field.
/// Values outside these ranges are accepted but logged.
pub mod ranges {
    pub const SIZE: (i32, i32) = (1, 100);
    pub const THICKNESS: (i32, i32) = (1, 100);
    pub const BRIGHTNESS: (i32, i32) = (0, 100);
    pub const BLUR: (i32, i32) = (0, 100);
}

/// Persistence timing
pub mod persistence {
    /// Quiet period before a burst of continuous edits is written to disk
    pub const DEBOUNCE_MS: u64 = 500;
}

/// Inter-surface bridge
pub mod bridge {
    /// Socket directory under XDG_RUNTIME_DIR (or the cache dir)
    pub const SOCKET_DIR: &str = "lum-o-ring";

    /// Socket file name
    pub const SOCKET_NAME: &str = "bridge.sock";

    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// A surface that stops reading for this long is disconnected
    pub const WRITE_TIMEOUT_MS: u64 = 5000;
}

/// Ring rendering
pub mod ring {
    /// Glow spread as a fraction of the blur radius
    pub const GLOW_SPREAD_FACTOR: f32 = 0.5;

    /// Viewport used when none is given on the command line
    pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
    pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;
}

/// Preset ring colors offered by the settings panel
pub mod presets {
    pub const COLORS: &[(&str, &str)] = &[
        ("Warm White", "#fff5cc"),
        ("Daylight", "#ffffff"),
        ("Cool", "#d6ecff"),
        ("Amber", "#ffb347"),
        ("Rose", "#ffc0cb"),
    ];
}

/// Display-server environment variables consulted at startup
pub mod display {
    pub const WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";
    pub const GDK_BACKEND: &str = "GDK_BACKEND";
    pub const X11_DISPLAY: &str = "DISPLAY";
    pub const XDG_SESSION_TYPE: &str = "XDG_SESSION_TYPE";
}
