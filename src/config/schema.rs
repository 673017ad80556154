//! Typed model of a validated driver configuration.
//!
//! These structs are only ever produced by [`crate::config::validate`]; the
//! raw document is re-parsed on every invocation and never cached. Settings
//! are an explicit sum type: a `type: enum` spec becomes
//! [`SettingSpec::Enum`], anything else becomes [`SettingSpec::Range`] and is
//! normalized to `type: range` on output, so no unrecognized type string
//! survives past validation.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::{Number, Value};

/// One driver's validated configuration section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverConfig {
    /// The tunable application this driver operates on.
    pub application: ApplicationConfig,
    /// Command the driver runs to exercise the application (opaque here).
    pub command: String,
    /// Expected command duration in seconds, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<f64>,
    /// Named metrics scraped from command output.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, MetricSpec>,
}

/// The `application` section: components plus opaque pass-through metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationConfig {
    /// Named components, each with at least one setting.
    pub components: BTreeMap<String, ComponentConfig>,
    /// Every other key under `application`, passed through untouched
    /// (annotations and similar).
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

/// A single component: a non-empty set of named settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentConfig {
    pub settings: BTreeMap<String, SettingSpec>,
}

/// A tunable setting, selected by the `type` field of its spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingSpec {
    /// Enumerated setting: one of an ordered list of acceptable values.
    Enum(EnumSetting),
    /// Numeric setting on a stepped range.
    Range(RangeSetting),
}

impl SettingSpec {
    /// The design-time default for this setting, as a document value.
    pub fn default_value(&self) -> Value {
        match self {
            SettingSpec::Enum(e) => e.default.clone(),
            SettingSpec::Range(r) => Value::Number(r.default.clone()),
        }
    }
}

/// An enumerated setting spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Ordered list of acceptable values.
    pub values: Vec<Value>,
    pub default: Value,
}

/// A numeric range setting spec.
///
/// Invariants enforced at validation time: `min <= max`, and when
/// `min != max`, `step > 0` and `(max - min) / step` is an integer within
/// 1/1024, so a value at `max` is reachable from `min` in whole steps.
///
/// Bounds are kept as [`Number`] rather than `f64` so integer-typed YAML
/// scalars round-trip as integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub min: Number,
    pub max: Number,
    pub step: Number,
    pub default: Number,
}

/// A named metric scraped from command output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    /// Pattern applied to command output; compiled (and thereby checked)
    /// during validation, stored as source text.
    pub output_regex: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_spec() -> SettingSpec {
        SettingSpec::Range(RangeSetting {
            unit: None,
            min: Number::from(0),
            max: Number::from(1024),
            step: Number::from(64),
            default: Number::from(256),
        })
    }

    #[test]
    fn test_range_spec_serializes_with_type_tag() {
        let yaml = serde_yaml::to_string(&range_spec()).unwrap();
        assert!(yaml.contains("type: range"));
        assert!(yaml.contains("min: 0"));
        assert!(yaml.contains("max: 1024"));
        // No unit key when unset.
        assert!(!yaml.contains("unit"));
    }

    #[test]
    fn test_enum_spec_serializes_with_type_tag() {
        let spec = SettingSpec::Enum(EnumSetting {
            unit: Some("mode".to_string()),
            values: vec![Value::from("serial"), Value::from("parallel")],
            default: Value::from("serial"),
        });
        let yaml = serde_yaml::to_string(&spec).unwrap();
        assert!(yaml.contains("type: enum"));
        assert!(yaml.contains("unit: mode"));
        assert!(yaml.contains("- parallel"));
    }

    #[test]
    fn test_default_value_preserves_integer_representation() {
        let v = range_spec().default_value();
        assert_eq!(v, Value::Number(Number::from(256)));
        assert_eq!(serde_yaml::to_string(&v).unwrap().trim(), "256");
    }
}
