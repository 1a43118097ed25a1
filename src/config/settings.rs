//! The shared ring settings record and partial updates to it
//!
//! On disk the record is a flat camelCase JSON object. There is no version
//! tag: every field falls back to its built-in default on its own, and the
//! legacy `radius` key is read as `size`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::color::HexColor;
use crate::constants::{defaults, ranges};

/// Authoritative ring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    /// Whether the ring is rendered at all
    pub is_on: bool,
    /// Ring diameter, percent of the smaller screen dimension
    pub size: i32,
    /// Stroke width in pixels
    pub thickness: i32,
    /// Opacity percent
    pub brightness: i32,
    /// Glow spread in pixels
    pub blur: i32,
    /// `#RRGGBB`
    pub color: String,
    /// User-picked secondary color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            is_on: defaults::IS_ON,
            size: defaults::SIZE,
            thickness: defaults::THICKNESS,
            brightness: defaults::BRIGHTNESS,
            blur: defaults::BLUR,
            color: defaults::COLOR.to_string(),
            custom_color: None,
        }
    }
}

/// A partial record; absent fields are left untouched when applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,
    #[serde(default, alias = "radius", skip_serializing_if = "Option::is_none")]
    pub size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
}

impl SettingsPatch {
    /// Read a stored settings object key by key. A key with the wrong type is
    /// skipped on its own; `size` wins over the legacy `radius`.
    pub fn from_stored(object: &Map<String, Value>) -> Self {
        Self {
            is_on: stored_field(object, "isOn"),
            size: stored_field(object, "size").or_else(|| stored_field(object, "radius")),
            thickness: stored_field(object, "thickness"),
            brightness: stored_field(object, "brightness"),
            blur: stored_field(object, "blur"),
            color: stored_field(object, "color"),
            custom_color: stored_field(object, "customColor"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a later patch into this one; later fields win
    pub fn absorb(&mut self, later: SettingsPatch) {
        if later.is_on.is_some() {
            self.is_on = later.is_on;
        }
        if later.size.is_some() {
            self.size = later.size;
        }
        if later.thickness.is_some() {
            self.thickness = later.thickness;
        }
        if later.brightness.is_some() {
            self.brightness = later.brightness;
        }
        if later.blur.is_some() {
            self.blur = later.blur;
        }
        if later.color.is_some() {
            self.color = later.color;
        }
        if later.custom_color.is_some() {
            self.custom_color = later.custom_color;
        }
    }
}

fn stored_field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    let value = object.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, value = %value, error = %e, "Ignoring stored setting with wrong type");
            None
        }
    }
}

impl From<&SettingsRecord> for SettingsPatch {
    fn from(record: &SettingsRecord) -> Self {
        Self {
            is_on: Some(record.is_on),
            size: Some(record.size),
            thickness: Some(record.thickness),
            brightness: Some(record.brightness),
            blur: Some(record.blur),
            color: Some(record.color.clone()),
            custom_color: record.custom_color.clone(),
        }
    }
}

impl SettingsRecord {
    /// Overlay the fields present in `patch`. Returns true if anything changed.
    /// No range or format validation is applied.
    pub fn apply(&mut self, patch: &SettingsPatch) -> bool {
        let before = self.clone();

        if let Some(is_on) = patch.is_on {
            self.is_on = is_on;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(thickness) = patch.thickness {
            self.thickness = thickness;
        }
        if let Some(brightness) = patch.brightness {
            self.brightness = brightness;
        }
        if let Some(blur) = patch.blur {
            self.blur = blur;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(custom_color) = &patch.custom_color {
            self.custom_color = Some(custom_color.clone());
        }

        *self != before
    }

    /// Defaults overlaid with `patch`
    pub fn from_patch(patch: &SettingsPatch) -> Self {
        let mut record = Self::default();
        record.apply(patch);
        record
    }

    /// Human-readable notes for values outside the documented ranges
    pub fn out_of_range(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut check = |name: &str, value: i32, (min, max): (i32, i32)| {
            if value < min || value > max {
                issues.push(format!("{name}={value} outside {min}..={max}"));
            }
        };
        check("size", self.size, ranges::SIZE);
        check("thickness", self.thickness, ranges::THICKNESS);
        check("brightness", self.brightness, ranges::BRIGHTNESS);
        check("blur", self.blur, ranges::BLUR);

        if !HexColor::is_well_formed(&self.color) {
            issues.push(format!("color={:?} is not #RRGGBB", self.color));
        }
        if let Some(custom) = &self.custom_color
            && !HexColor::is_well_formed(custom)
        {
            issues.push(format!("customColor={custom:?} is not #RRGGBB"));
        }
        issues
    }

    /// Log (but keep) any out-of-range values
    pub fn warn_out_of_range(&self) {
        for issue in self.out_of_range() {
            warn!(issue = %issue, "Accepting out-of-range ring setting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let record = SettingsRecord::default();
        assert!(record.is_on);
        assert_eq!(record.size, 80);
        assert_eq!(record.thickness, 25);
        assert_eq!(record.brightness, 100);
        assert_eq!(record.blur, 40);
        assert_eq!(record.color, "#fff5cc");
        assert_eq!(record.custom_color, None);
        assert!(record.out_of_range().is_empty());
    }

    #[test]
    fn test_apply_touches_only_present_fields() {
        let mut record = SettingsRecord::default();
        let changed = record.apply(&SettingsPatch {
            thickness: Some(40),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(
            record,
            SettingsRecord {
                thickness: 40,
                ..SettingsRecord::default()
            }
        );
    }

    #[test]
    fn test_apply_same_value_reports_unchanged() {
        let mut record = SettingsRecord::default();
        let changed = record.apply(&SettingsPatch {
            size: Some(80),
            ..Default::default()
        });
        assert!(!changed);
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let json = serde_json::to_value(SettingsRecord::default()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.get("isOn"), Some(&serde_json::json!(true)));
        assert!(object.contains_key("brightness"));
        // Unset custom color is omitted entirely
        assert!(!object.contains_key("customColor"));
        assert_eq!(object.len(), 6);
    }

    #[test]
    fn test_patch_accepts_legacy_radius_key() {
        let patch: SettingsPatch = serde_json::from_str(r#"{"radius": 45}"#).unwrap();
        assert_eq!(patch.size, Some(45));
    }

    fn stored(json: &str) -> SettingsPatch {
        let value: Value = serde_json::from_str(json).unwrap();
        SettingsPatch::from_stored(value.as_object().unwrap())
    }

    #[test]
    fn test_stored_size_wins_over_radius() {
        let patch = stored(r#"{"isOn": false, "size": 80, "radius": 45, "thickness": 20}"#);
        assert_eq!(patch.is_on, Some(false));
        assert_eq!(patch.size, Some(80));
        assert_eq!(patch.thickness, Some(20));

        assert_eq!(stored(r#"{"radius": 45}"#).size, Some(45));
        assert_eq!(stored(r#"{"size": "big", "radius": 45}"#).size, Some(45));
    }

    #[test]
    fn test_stored_wrong_type_skips_only_that_key() {
        let patch = stored(r#"{"brightness": "bright", "blur": 12, "customColor": null}"#);
        assert_eq!(
            patch,
            SettingsPatch {
                blur: Some(12),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_patch_ignores_unknown_keys() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"brightness": 50, "theme": "dark"}"#).unwrap();
        assert_eq!(
            patch,
            SettingsPatch {
                brightness: Some(50),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_absorb_later_wins() {
        let mut patch = SettingsPatch {
            size: Some(10),
            blur: Some(5),
            ..Default::default()
        };
        patch.absorb(SettingsPatch {
            size: Some(20),
            color: Some("#000000".to_string()),
            ..Default::default()
        });
        assert_eq!(patch.size, Some(20));
        assert_eq!(patch.blur, Some(5));
        assert_eq!(patch.color.as_deref(), Some("#000000"));
    }

    #[test]
    fn test_out_of_range_values_are_accepted_and_reported() {
        let mut record = SettingsRecord::default();
        record.apply(&SettingsPatch {
            thickness: Some(-5),
            brightness: Some(1000),
            color: Some("orange".to_string()),
            ..Default::default()
        });
        assert_eq!(record.thickness, -5);
        assert_eq!(record.brightness, 1000);
        assert_eq!(record.out_of_range().len(), 3);
    }

    #[test]
    fn test_patch_from_record_roundtrips_through_apply() {
        let source = SettingsRecord {
            is_on: false,
            size: 33,
            thickness: 7,
            brightness: 12,
            blur: 0,
            color: "#123456".to_string(),
            custom_color: Some("#abcdef".to_string()),
        };
        assert_eq!(SettingsRecord::from_patch(&SettingsPatch::from(&source)), source);
    }
}
