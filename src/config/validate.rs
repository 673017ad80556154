//! Schema validation for driver configuration documents.
//!
//! [`validate`] walks a parsed YAML document and either produces a fully
//! typed [`DriverConfig`] or fails with the first violation it encounters.
//! There is no partial repair: a config that validates is usable in its
//! entirety, a config that does not is rejected whole.
//!
//! Check order is fixed (document shape, driver section, top-level keys,
//! application, components, command, expected_duration, metrics, then each
//! component and setting) so the same broken config always produces the same
//! error message.

use std::collections::BTreeMap;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::config::schema::{
    ApplicationConfig, ComponentConfig, DriverConfig, EnumSetting, MetricSpec, RangeSetting,
    SettingSpec,
};
use crate::{Error, Result};

/// Allowed top-level keys of a driver section.
const DRIVER_KEYS: &[&str] = &["application", "command", "expected_duration", "metrics"];
/// Allowed keys of an enum setting spec.
const ENUM_KEYS: &[&str] = &["type", "unit", "values", "default"];
/// Allowed keys of a range setting spec.
const RANGE_KEYS: &[&str] = &["type", "unit", "min", "max", "step", "default"];

/// `(max - min) / step` may miss an integer by at most this much.
const STEP_TOLERANCE: f64 = 1.0 / 1024.0;

/// Validate the `driver` section of a parsed config document.
///
/// Fail-fast: returns the first violation found, never a partially
/// validated config.
pub fn validate(doc: &Value, driver: &str) -> Result<DriverConfig> {
    let root = doc.as_mapping().ok_or(Error::MalformedDocument)?;

    let section = field(root, driver).ok_or_else(|| Error::MissingSection {
        driver: driver.to_string(),
    })?;
    let section = section
        .as_mapping()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::MalformedSection {
            driver: driver.to_string(),
        })?;

    reject_unknown_keys(section, DRIVER_KEYS, format!("`{driver}` section"))?;

    let app = field(section, "application")
        .and_then(Value::as_mapping)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::MissingApplication {
            driver: driver.to_string(),
        })?;

    let comps = field(app, "components")
        .and_then(Value::as_mapping)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::MissingComponents {
            driver: driver.to_string(),
        })?;

    let command = match field(section, "command") {
        Some(Value::String(s)) => s.clone(),
        other => {
            return Err(Error::InvalidType {
                context: format!("the `command` attribute in `{driver}` section"),
                expected: "a string",
                found: found_of(other),
            });
        }
    };

    let expected_duration = match field(section, "expected_duration") {
        None => None,
        Some(v) => match v.as_f64() {
            Some(d) if d > 0.0 => Some(d),
            _ => {
                return Err(Error::InvalidValue {
                    context: format!("the `expected_duration` attribute in `{driver}` section"),
                    found: describe(v),
                });
            }
        },
    };

    let metrics = match field(section, "metrics") {
        None => BTreeMap::new(),
        Some(v) => validate_metrics(v, driver)?,
    };

    let mut components = BTreeMap::new();
    for (c_key, c_value) in comps {
        let c_name = key_name(c_key);
        components.insert(c_name.clone(), validate_component(&c_name, c_value)?);
    }

    let mut metadata = BTreeMap::new();
    for (key, value) in app {
        let key = key_name(key);
        if key != "components" {
            metadata.insert(key, value.clone());
        }
    }

    Ok(DriverConfig {
        application: ApplicationConfig {
            components,
            metadata,
        },
        command,
        expected_duration,
        metrics,
    })
}

fn validate_metrics(value: &Value, driver: &str) -> Result<BTreeMap<String, MetricSpec>> {
    let map = value.as_mapping().ok_or_else(|| Error::InvalidType {
        context: format!("the `metrics` attribute in `{driver}` section"),
        expected: "a mapping",
        found: describe(value),
    })?;

    let mut metrics = BTreeMap::new();
    for (m_key, m_value) in map {
        let m_name = key_name(m_key);
        let m_map = m_value.as_mapping().ok_or_else(|| Error::InvalidType {
            context: format!("metric `{m_name}` in `{driver}` section"),
            expected: "a mapping",
            found: describe(m_value),
        })?;

        let pattern = match field(m_map, "output_regex") {
            Some(Value::String(s)) => s.clone(),
            other => {
                return Err(Error::InvalidType {
                    context: format!(
                        "the `output_regex` attribute of metric `{m_name}` in `{driver}` section"
                    ),
                    expected: "a string",
                    found: found_of(other),
                });
            }
        };

        Regex::new(&pattern).map_err(|e| Error::InvalidPattern {
            metric: m_name.clone(),
            source: e,
        })?;

        metrics.insert(
            m_name,
            MetricSpec {
                output_regex: pattern,
            },
        );
    }
    Ok(metrics)
}

fn validate_component(component: &str, value: &Value) -> Result<ComponentConfig> {
    let malformed = || Error::MalformedComponent {
        component: component.to_string(),
    };

    let c_map = value.as_mapping().ok_or_else(malformed)?;
    let settings_map = field(c_map, "settings")
        .and_then(Value::as_mapping)
        .filter(|m| !m.is_empty())
        .ok_or_else(malformed)?;

    let mut settings = BTreeMap::new();
    for (s_key, s_value) in settings_map {
        let s_name = key_name(s_key);
        settings.insert(
            s_name.clone(),
            validate_setting(component, &s_name, s_value)?,
        );
    }
    Ok(ComponentConfig { settings })
}

fn validate_setting(component: &str, setting: &str, value: &Value) -> Result<SettingSpec> {
    let s_map = value.as_mapping().ok_or_else(|| Error::InvalidType {
        context: format!("component `{component}`: setting `{setting}`"),
        expected: "a mapping",
        found: describe(value),
    })?;

    for required in ["default", "type"] {
        if field(s_map, required).is_none() {
            return Err(missing_field(component, setting, required));
        }
    }

    // Present per the required-field check above.
    let kind_value = field(s_map, "type").cloned().unwrap_or(Value::Null);
    let kind = kind_value.as_str().ok_or_else(|| Error::InvalidType {
        context: format!("component `{component}`: setting `{setting}` `type`"),
        expected: "a string",
        found: describe(&kind_value),
    })?;

    // Explicit dispatch: `enum` is one variant, every other type string is a
    // numeric range and gets normalized to `range` from here on.
    if kind == "enum" {
        validate_enum_setting(component, setting, s_map)
    } else {
        validate_range_setting(component, setting, s_map)
    }
}

fn validate_enum_setting(component: &str, setting: &str, s_map: &Mapping) -> Result<SettingSpec> {
    reject_unknown_keys(
        s_map,
        ENUM_KEYS,
        format!("component `{component}`: enum setting `{setting}`"),
    )?;

    let unit = unit_field(component, setting, s_map)?;

    let values = match field(s_map, "values") {
        None => return Err(missing_field(component, setting, "values")),
        Some(Value::Sequence(seq)) => seq.clone(),
        Some(other) => {
            return Err(Error::InvalidType {
                context: format!(
                    "component `{component}`: enum setting `{setting}` `values`"
                ),
                expected: "a sequence of acceptable values",
                found: describe(other),
            });
        }
    };

    // Checked present above; any scalar or structured value is acceptable.
    let default = field(s_map, "default").cloned().unwrap_or(Value::Null);

    Ok(SettingSpec::Enum(EnumSetting {
        unit,
        values,
        default,
    }))
}

fn validate_range_setting(component: &str, setting: &str, s_map: &Mapping) -> Result<SettingSpec> {
    reject_unknown_keys(
        s_map,
        RANGE_KEYS,
        format!("component `{component}`: range setting `{setting}`"),
    )?;

    let unit = unit_field(component, setting, s_map)?;

    // Order matters for reproducible errors: min, then max, then step.
    let (min, min_f) = number_field(component, setting, s_map, "min")?;
    let (max, max_f) = number_field(component, setting, s_map, "max")?;
    let (step, step_f) = number_field(component, setting, s_map, "step")?;
    let (default, _) = number_field(component, setting, s_map, "default")?;

    if min_f > max_f {
        return Err(Error::InvalidRange {
            component: component.to_string(),
            setting: setting.to_string(),
        });
    }

    if min_f != max_f {
        if step_f <= 0.0 {
            return Err(Error::InvalidStep {
                component: component.to_string(),
                setting: setting.to_string(),
            });
        }

        let steps = (max_f - min_f) / step_f;
        if (steps - steps.round()).abs() > STEP_TOLERANCE {
            return Err(Error::InconsistentStep {
                component: component.to_string(),
                setting: setting.to_string(),
                min: min_f,
                max: max_f,
                step: step_f,
            });
        }
    }

    Ok(SettingSpec::Range(RangeSetting {
        unit,
        min,
        max,
        step,
        default,
    }))
}

/// Extract an optional `unit` field, which must be a string when present.
fn unit_field(component: &str, setting: &str, s_map: &Mapping) -> Result<Option<String>> {
    match field(s_map, "unit") {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::InvalidType {
            context: format!("component `{component}`: setting `{setting}` `unit`"),
            expected: "a string",
            found: describe(other),
        }),
    }
}

/// Extract a required numeric field, keeping both the exact YAML number and
/// its `f64` projection for invariant checks.
fn number_field(
    component: &str,
    setting: &str,
    s_map: &Mapping,
    name: &str,
) -> Result<(serde_yaml::Number, f64)> {
    match field(s_map, name) {
        None => Err(missing_field(component, setting, name)),
        Some(Value::Number(n)) => {
            let f = Value::Number(n.clone()).as_f64().ok_or_else(|| {
                Error::InvalidType {
                    context: format!(
                        "component `{component}`: range setting `{setting}` `{name}`"
                    ),
                    expected: "a number",
                    found: format!("number `{n}`"),
                }
            })?;
            Ok((n.clone(), f))
        }
        Some(other) => Err(Error::InvalidType {
            context: format!("component `{component}`: range setting `{setting}` `{name}`"),
            expected: "a number",
            found: describe(other),
        }),
    }
}

fn missing_field(component: &str, setting: &str, name: &str) -> Error {
    Error::MissingField {
        component: component.to_string(),
        setting: setting.to_string(),
        field: name.to_string(),
    }
}

/// String-keyed lookup compatible with every serde_yaml 0.9 release.
fn field<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::from(key))
}

/// Fail on any key outside `allowed`, listing offenders sorted for stable
/// messages.
fn reject_unknown_keys(map: &Mapping, allowed: &[&str], context: String) -> Result<()> {
    let mut bad: Vec<String> = map
        .keys()
        .filter_map(|k| match k.as_str() {
            Some(s) if allowed.contains(&s) => None,
            _ => Some(key_name(k)),
        })
        .collect();
    if bad.is_empty() {
        return Ok(());
    }
    bad.sort();
    Err(Error::UnknownKey {
        context,
        keys: bad.join(", "),
    })
}

/// Mapping keys are almost always strings; anything else is shown debug-style.
fn key_name(key: &Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => format!("{key:?}"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Describe a value for error messages: type, plus the scalar itself when
/// short enough to be useful.
fn describe(value: &Value) -> String {
    match value {
        Value::Bool(b) => format!("bool `{b}`"),
        Value::Number(n) => format!("number `{n}`"),
        Value::String(s) => format!("string `{s}`"),
        other => type_name(other).to_string(),
    }
}

/// Describe a possibly-absent value.
fn found_of(value: Option<&Value>) -> String {
    match value {
        Some(v) => describe(v),
        None => "nothing".to_string(),
    }
}
