//! Change intents emitted by surfaces and the structured save result

use serde::{Deserialize, Serialize};

use crate::config::SettingsPatch;

/// A requested settings change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeIntent {
    /// High-frequency edit (slider drag, color picker). Persisted after the debounce window.
    Continuous(SettingsPatch),
    /// Explicit save. Persisted immediately, result reported to the caller.
    Commit(SettingsPatch),
    /// Flip the ring on/off from a menu action. Persisted immediately.
    ToggleRing,
}

impl ChangeIntent {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, ChangeIntent::Continuous(_))
    }
}

/// Outcome of a save, returned over the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: &anyhow::Error) -> Self {
        Self {
            success: false,
            error: Some(format!("{error:#}")),
        }
    }
}

impl From<&anyhow::Result<()>> for SaveResult {
    fn from(result: &anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => SaveResult::ok(),
            Err(e) => SaveResult::failed(e),
        }
    }
}
