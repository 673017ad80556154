//! State overlay: from validated defaults to the effective configuration.
//!
//! [`reconcile`] layers persisted [`State`] values onto a validated
//! [`DriverConfig`]. Every setting in the result carries a `value` - the
//! recorded state value when one exists at that exact path, the design-time
//! default otherwise - and never a `default` key, so downstream drivers
//! cannot conflate "current value" with "nominal default". Pass-through
//! application keys are overridden the same way.
//!
//! A lookup miss at any level (empty state, unknown component, unknown
//! setting) means "no override", never an error.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::{Number, Value};

use crate::config::{DriverConfig, SettingSpec};
use crate::state::{State, StateStore};

/// The configuration view after state overlay, shaped
/// `{ application: ... }` for driver consumption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub application: EffectiveApplication,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveApplication {
    pub components: BTreeMap<String, EffectiveComponent>,
    /// Pass-through keys, state-overridden where recorded.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveComponent {
    pub settings: BTreeMap<String, EffectiveSetting>,
}

/// A setting spec with `default` replaced by the effective `value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EffectiveSetting {
    Enum(EffectiveEnum),
    Range(EffectiveRange),
}

impl EffectiveSetting {
    pub fn value(&self) -> &Value {
        match self {
            EffectiveSetting::Enum(e) => &e.value,
            EffectiveSetting::Range(r) => &r.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveEnum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub values: Vec<Value>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub min: Number,
    pub max: Number,
    pub step: Number,
    pub value: Value,
}

/// Overlay `state` onto `config`, producing the effective view.
///
/// Pure and infallible: the same config and state always reconcile to the
/// same result.
pub fn reconcile(config: &DriverConfig, state: &State) -> EffectiveConfig {
    let app = &config.application;

    let mut metadata = BTreeMap::new();
    for (key, value) in &app.metadata {
        let effective = state.passthrough(key).unwrap_or(value).clone();
        metadata.insert(key.clone(), effective);
    }

    let mut components = BTreeMap::new();
    for (c_name, component) in &app.components {
        let mut settings = BTreeMap::new();
        for (s_name, spec) in &component.settings {
            let value = state
                .setting_value(c_name, s_name)
                .cloned()
                .unwrap_or_else(|| spec.default_value());
            settings.insert(s_name.clone(), effective_setting(spec, value));
        }
        components.insert(c_name.clone(), EffectiveComponent { settings });
    }

    EffectiveConfig {
        application: EffectiveApplication {
            components,
            metadata,
        },
    }
}

/// Load state through `store` and reconcile in one call.
///
/// This is the query entry point drivers use: absent or broken state simply
/// means every setting reports its default.
pub fn query(config: &DriverConfig, store: &StateStore) -> EffectiveConfig {
    reconcile(config, &store.load_state())
}

fn effective_setting(spec: &SettingSpec, value: Value) -> EffectiveSetting {
    match spec {
        SettingSpec::Enum(e) => EffectiveSetting::Enum(EffectiveEnum {
            unit: e.unit.clone(),
            values: e.values.clone(),
            value,
        }),
        SettingSpec::Range(r) => EffectiveSetting::Range(EffectiveRange {
            unit: r.unit.clone(),
            min: r.min.clone(),
            max: r.max.clone(),
            step: r.step.clone(),
            value,
        }),
    }
}
