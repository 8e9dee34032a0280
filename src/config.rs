//! # Configuration
//!
//! Everything a caller can tune, as plain serde structs. JSON uses camelCase
//! keys; every field has a default so `{}` is a valid configuration.
//!
//! Presets are named partial configurations. Resolving one deep-merges the
//! caller's explicit JSON on top of the preset before deserializing, so an
//! explicit option always wins over the preset's.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::FitError;
use crate::style::{FitParameter, MinLineWidth, ParamBound};
use crate::text::Replacement;

/// Full configuration for one typeset run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitConfig {
    pub tighten: TightenOptions,
    pub widows: WidowOptions,
    pub reflow: ReflowOptions,
    /// Skip fitting entirely and keep whatever state was last applied.
    pub disabled: bool,
}

impl FitConfig {
    pub fn from_json(json: &str) -> Result<Self, FitError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options for the tighten pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TightenOptions {
    pub enabled: bool,
    /// Optimizer rounds per parameter search.
    pub max_iterations: u32,
    pub min_scale: ParamBound,
    pub min_letter_spacing: ParamBound,
    pub min_word_spacing: ParamBound,
    /// Significant digits the host can resolve style values to.
    pub precision: Option<u32>,
}

impl Default for TightenOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 5,
            min_scale: ParamBound::Fixed(0.97),
            min_letter_spacing: ParamBound::Offset(-0.02),
            min_word_spacing: ParamBound::Offset(-0.02),
            precision: Some(6),
        }
    }
}

impl TightenOptions {
    pub fn min_bound(&self, param: FitParameter) -> &ParamBound {
        match param {
            FitParameter::Scale => &self.min_scale,
            FitParameter::LetterSpacing => &self.min_letter_spacing,
            FitParameter::WordSpacing => &self.min_word_spacing,
        }
    }
}

/// Options for the widow pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidowOptions {
    pub enabled: bool,
    pub max_substitutions: usize,
    pub min_line_width: MinLineWidth,
    pub replacement: Replacement,
}

impl Default for WidowOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_substitutions: 3,
            min_line_width: MinLineWidth::default(),
            replacement: Replacement::default(),
        }
    }
}

/// What causes a reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReflowTrigger {
    /// Reflow on mount, content changes, geometry changes and font loads.
    #[default]
    Auto,
    /// Geometry changes are ignored; the caller reflows by changing a key.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflowOptions {
    pub trigger: ReflowTrigger,
    /// Debounce before a scheduled reflow runs. `None` runs on the next frame.
    pub timeout_ms: Option<u64>,
}

/// Named partial configurations.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct PresetFile {
    #[serde(default)]
    presets: Map<String, Value>,
}

impl PresetRegistry {
    /// Load `{ "presets": { "<name>": { ...FitConfig JSON... } } }`.
    ///
    /// Every preset is validated eagerly so a typo surfaces at load time
    /// rather than on first use.
    pub fn from_json(json: &str) -> Result<Self, FitError> {
        let file: PresetFile = serde_json::from_str(json)?;
        let mut presets = HashMap::with_capacity(file.presets.len());
        for (name, value) in file.presets {
            FitConfig::deserialize(&value)?;
            presets.insert(name, value);
        }
        Ok(Self { presets })
    }

    pub fn insert(&mut self, name: impl Into<String>, preset: Value) {
        self.presets.insert(name.into(), preset);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Resolve `name` with `overrides` merged on top. `Value::Null` means no
    /// overrides.
    pub fn resolve(&self, name: &str, overrides: &Value) -> Result<FitConfig, FitError> {
        let preset = self
            .presets
            .get(name)
            .ok_or_else(|| FitError::UnknownPreset(name.to_string()))?;
        let mut merged = preset.clone();
        merge(&mut merged, overrides);
        Ok(FitConfig::deserialize(&merged)?)
    }
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// in the overlay replaces the base value. Nulls in the overlay are ignored.
fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None if value.is_null() => {}
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_gives_defaults() {
        let config = FitConfig::from_json("{}").unwrap();
        assert_eq!(config.tighten.max_iterations, 5);
        assert!(matches!(config.tighten.min_scale, ParamBound::Fixed(v) if v == 0.97));
        assert!(matches!(config.tighten.min_word_spacing, ParamBound::Offset(v) if v == -0.02));
        assert_eq!(config.widows.max_substitutions, 3);
        assert!(matches!(config.widows.min_line_width, MinLineWidth::Css(ref s) if s == "15%"));
        assert_eq!(config.reflow.trigger, ReflowTrigger::Auto);
        assert!(!config.disabled);
    }

    #[test]
    fn parses_camel_case_fields() {
        let config = FitConfig::from_json(
            r#"{
                "tighten": { "maxIterations": 8, "minScale": 0.95, "minLetterSpacing": { "offset": -0.01 } },
                "widows": { "maxSubstitutions": 1, "minLineWidth": 120, "replacement": "~" },
                "reflow": { "trigger": "manual", "timeoutMs": 50 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tighten.max_iterations, 8);
        assert!(matches!(config.widows.min_line_width, MinLineWidth::Fixed(v) if v == 120.0));
        assert!(matches!(config.widows.replacement, Replacement::Text(ref t) if t == "~"));
        assert_eq!(config.reflow.trigger, ReflowTrigger::Manual);
        assert_eq!(config.reflow.timeout_ms, Some(50));
    }

    #[test]
    fn wrong_types_are_parse_errors() {
        let err = FitConfig::from_json(r#"{ "widows": { "maxSubstitutions": "three" } }"#);
        assert!(matches!(err, Err(FitError::ParseError { .. })));
    }

    #[test]
    fn overrides_win_over_presets() {
        let registry = PresetRegistry::from_json(
            r#"{ "presets": {
                "headline": { "tighten": { "minScale": 0.9, "maxIterations": 7 }, "widows": { "enabled": false } }
            } }"#,
        )
        .unwrap();
        let config = registry
            .resolve("headline", &json!({ "tighten": { "maxIterations": 2 } }))
            .unwrap();
        assert_eq!(config.tighten.max_iterations, 2);
        assert!(matches!(config.tighten.min_scale, ParamBound::Fixed(v) if v == 0.9));
        assert!(!config.widows.enabled);
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let registry = PresetRegistry::default();
        let err = registry.resolve("nope", &Value::Null).unwrap_err();
        assert!(matches!(err, FitError::UnknownPreset(ref n) if n == "nope"));
    }

    #[test]
    fn invalid_presets_fail_at_load() {
        let err = PresetRegistry::from_json(r#"{ "presets": { "bad": { "disabled": "yes" } } }"#);
        assert!(err.is_err());
    }

    #[test]
    fn merge_replaces_scalars_and_keeps_siblings() {
        let mut base = json!({ "a": { "b": 1, "c": 2 }, "d": [1] });
        merge(&mut base, &json!({ "a": { "b": 3 }, "d": [2, 3], "e": null }));
        assert_eq!(base, json!({ "a": { "b": 3, "c": 2 }, "d": [2, 3] }));
    }
}
