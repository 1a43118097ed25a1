//! Configuration management for Lum-o-ring
//!
//! - **settings**: the shared ring settings record and partial patches
//! - **store**: the authoritative in-memory copy and its JSON file

pub mod settings;
pub mod store;

// Re-export commonly used types
pub use settings::{SettingsPatch, SettingsRecord};
pub use store::SettingsStore;
