//! Settings store: the authoritative record and its durable JSON copy
//!
//! Loading fails soft (defaults on any read/parse problem). Writing always
//! replaces the whole file with a full snapshot. Continuous edits are
//! coalesced by a debounced persist owned by the store.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::settings::{SettingsPatch, SettingsRecord};
use crate::constants;
use crate::debounce::Debouncer;

pub struct SettingsStore {
    path: PathBuf,
    current: SettingsRecord,
    pending: Debouncer,
    saves: u64,
}

impl SettingsStore {
    /// `$XDG_CONFIG_HOME/lum-o-ring/lum-o-ring.json` unless overridden by env
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(constants::config::SETTINGS_PATH_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }

        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::FILENAME);
        path
    }

    /// Load the persisted record merged over defaults. Never fails.
    pub fn load(path: PathBuf, debounce: Duration) -> Self {
        let current = match read_record(&path) {
            Ok(Some(record)) => {
                info!(path = %path.display(), settings = ?record, "Settings loaded");
                record
            }
            Ok(None) => {
                info!(path = %path.display(), "No settings file, using defaults");
                SettingsRecord::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "Failed to load settings, using defaults");
                SettingsRecord::default()
            }
        };
        current.warn_out_of_range();

        Self {
            path,
            current,
            pending: Debouncer::new(debounce),
            saves: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &SettingsRecord {
        &self.current
    }

    /// Shallow-overlay `patch` onto the authoritative record.
    /// Returns true if any field changed.
    pub fn merge(&mut self, patch: &SettingsPatch) -> bool {
        let changed = self.current.apply(patch);
        if changed {
            debug!(patch = ?patch, "Merged settings patch");
            self.current.warn_out_of_range();
        }
        changed
    }

    /// Write the full record now, cancelling any pending debounced write
    pub fn persist(&mut self) -> Result<()> {
        self.pending.cancel();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self.current)
            .context("Failed to serialize settings to JSON")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings to {:?}", self.path))?;

        self.saves += 1;
        info!(path = %self.path.display(), settings = ?self.current, "Settings saved");
        Ok(())
    }

    /// Start (or restart) the quiet period before the next write
    pub fn schedule_persist(&mut self, now: Instant) {
        self.pending.schedule(now);
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }

    pub fn has_pending_persist(&self) -> bool {
        self.pending.is_pending()
    }

    /// Persist if the debounce window has elapsed
    pub fn persist_if_due(&mut self, now: Instant) -> Option<Result<()>> {
        if self.pending.take_due(now) {
            Some(self.persist())
        } else {
            None
        }
    }

    /// Persist immediately if a debounced write is pending
    pub fn flush(&mut self) -> Option<Result<()>> {
        if self.has_pending_persist() {
            debug!("Flushing pending settings write");
            Some(self.persist())
        } else {
            None
        }
    }

    /// Number of completed writes since load
    pub fn save_count(&self) -> u64 {
        self.saves
    }
}

/// Ok(None) when the file does not exist
fn read_record(path: &Path) -> Result<Option<SettingsRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {:?}", path))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings JSON from {:?}", path))?;
    let object = value
        .as_object()
        .with_context(|| format!("Settings in {:?} are not a JSON object", path))?;
    Ok(Some(SettingsRecord::from_patch(&SettingsPatch::from_stored(object))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::load(dir.path().join("lum-o-ring.json"), DEBOUNCE)
    }

    fn read_back(store: &SettingsStore) -> serde_json::Value {
        let contents = fs::read_to_string(store.path()).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.current(), &SettingsRecord::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lum-o-ring.json"), "").unwrap();
        let store = store_in(&dir);
        assert_eq!(store.current(), &SettingsRecord::default());
    }

    #[test]
    fn test_partial_file_overlays_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lum-o-ring.json"), r#"{"brightness": 50}"#).unwrap();
        let store = store_in(&dir);
        assert_eq!(
            store.current(),
            &SettingsRecord {
                brightness: 50,
                ..SettingsRecord::default()
            }
        );
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lum-o-ring.json"), "{ not json").unwrap();
        assert_eq!(store_in(&dir).current(), &SettingsRecord::default());

        fs::write(dir.path().join("lum-o-ring.json"), "[1, 2, 3]").unwrap();
        assert_eq!(store_in(&dir).current(), &SettingsRecord::default());
    }

    #[test]
    fn test_bad_typed_field_keeps_the_others() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lum-o-ring.json"),
            r##"{"isOn": false, "size": "big", "thickness": 20, "color": "#00ff00"}"##,
        )
        .unwrap();
        assert_eq!(
            store_in(&dir).current(),
            &SettingsRecord {
                is_on: false,
                thickness: 20,
                color: "#00ff00".to_string(),
                ..SettingsRecord::default()
            }
        );
    }

    #[test]
    fn test_file_with_both_size_and_radius_keeps_every_field() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lum-o-ring.json"),
            r##"{"isOn":false,"size":80,"radius":45,"thickness":20,"brightness":60,"blur":30,"color":"#00ff00"}"##,
        )
        .unwrap();
        assert_eq!(
            store_in(&dir).current(),
            &SettingsRecord {
                is_on: false,
                size: 80,
                thickness: 20,
                brightness: 60,
                blur: 30,
                color: "#00ff00".to_string(),
                custom_color: None,
            }
        );
    }

    #[test]
    fn test_legacy_radius_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lum-o-ring.json"), r#"{"radius": 45, "thickness": 20}"#).unwrap();
        let store = store_in(&dir);
        assert_eq!(store.current().size, 45);
        assert_eq!(store.current().thickness, 20);
    }

    #[test]
    fn test_persist_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.merge(&SettingsPatch {
            is_on: Some(false),
            size: Some(55),
            color: Some("#00ff88".to_string()),
            custom_color: Some("#112233".to_string()),
            ..Default::default()
        });
        store.persist().unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.current(), store.current());
    }

    #[test]
    fn test_persist_overwrites_whole_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lum-o-ring.json"),
            r#"{"thickness": 10, "legacyField": 1}"#,
        )
        .unwrap();
        let mut store = store_in(&dir);
        store.persist().unwrap();

        let written = read_back(&store);
        assert!(written.get("legacyField").is_none());
        assert_eq!(written["thickness"], 10);
        assert_eq!(written["color"], "#fff5cc");
    }

    #[test]
    fn test_persist_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/lum-o-ring.json");
        let mut store = SettingsStore::load(path.clone(), DEBOUNCE);
        store.persist().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file, so the write cannot succeed
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let mut store = SettingsStore::load(blocker.join("lum-o-ring.json"), DEBOUNCE);
        assert!(store.persist().is_err());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_debounced_persist_coalesces() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let start = Instant::now();

        for (i, thickness) in [30, 35, 40, 45, 50].into_iter().enumerate() {
            let now = start + Duration::from_millis(100 * i as u64);
            store.merge(&SettingsPatch {
                thickness: Some(thickness),
                ..Default::default()
            });
            store.schedule_persist(now);
            assert!(store.persist_if_due(now).is_none());
        }

        // 499ms after the last edit: still quiet
        assert!(store.persist_if_due(start + Duration::from_millis(899)).is_none());
        let result = store.persist_if_due(start + Duration::from_millis(900));
        assert!(matches!(result, Some(Ok(()))));
        assert_eq!(store.save_count(), 1);
        assert_eq!(read_back(&store)["thickness"], 50);

        // Nothing left to write
        assert!(store.persist_if_due(start + Duration::from_secs(5)).is_none());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_flush_writes_pending_only() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.flush().is_none());

        store.merge(&SettingsPatch {
            blur: Some(12),
            ..Default::default()
        });
        store.schedule_persist(Instant::now());
        assert!(matches!(store.flush(), Some(Ok(()))));
        assert!(!store.has_pending_persist());
        assert_eq!(read_back(&store)["blur"], 12);
    }

    #[test]
    fn test_immediate_persist_cancels_pending() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let now = Instant::now();
        store.schedule_persist(now);
        store.persist().unwrap();
        assert!(store.persist_if_due(now + Duration::from_secs(1)).is_none());
        assert_eq!(store.save_count(), 1);
    }
}
