//! Setpoint - schema validation and state reconciliation for tunable
//! application configs.
//!
//! A "tunable application" is described by a YAML document: named components,
//! each with named settings of type enum or numeric range. This library
//! provides the three pieces a driver needs before it can adjust anything:
//!
//! - [`config`] - the typed data model and the validator that turns a raw
//!   parsed document into a [`config::DriverConfig`] or a descriptive error.
//! - [`state`] - a [`state::StateStore`] that loads and atomically persists
//!   the flat record of previously chosen setting values, tolerant of a
//!   missing or corrupt state file.
//! - [`reconcile`] - the overlay algorithm that layers persisted values onto
//!   validated defaults, producing the effective view drivers consume.
//!
//! Executing adjustments or measurements is out of scope; downstream drivers
//! read `value` fields from the effective config and write new values back
//! through the state store.

pub mod config;
pub mod reconcile;
pub mod state;

/// Library-level error type for Setpoint operations.
///
/// Validation errors identify the offending driver, component, or setting so
/// the message alone is enough to locate the problem in the config file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config document was malformed; top-level data type must be a mapping")]
    MalformedDocument,

    #[error("config document is missing `{driver}` configuration section")]
    MissingSection { driver: String },

    #[error("config document was malformed; must provide non-empty `{driver}` mapping")]
    MalformedSection { driver: String },

    #[error("unknown key(s) in {context}: {keys}")]
    UnknownKey { context: String, keys: String },

    #[error("`{driver}` section must include a non-empty `application` mapping")]
    MissingApplication { driver: String },

    #[error("`application` in `{driver}` section must include a non-empty `components` mapping")]
    MissingComponents { driver: String },

    #[error("{context} must be {expected}, found {found}")]
    InvalidType {
        context: String,
        expected: &'static str,
        found: String,
    },

    #[error("{context} must be a numeric type greater than zero, found {found}")]
    InvalidValue { context: String, found: String },

    #[error("failed to compile the `output_regex` of metric `{metric}`")]
    InvalidPattern {
        metric: String,
        #[source]
        source: regex::Error,
    },

    #[error("component `{component}` must be a mapping with a non-empty `settings` mapping")]
    MalformedComponent { component: String },

    #[error("component `{component}`: setting `{setting}` is missing required key `{field}`")]
    MissingField {
        component: String,
        setting: String,
        field: String,
    },

    #[error("component `{component}`: range setting `{setting}` supplied min higher than max")]
    InvalidRange { component: String, setting: String },

    #[error(
        "component `{component}`: range setting `{setting}` step must be a positive number when min != max"
    )]
    InvalidStep { component: String, setting: String },

    #[error(
        "component `{component}`: range setting `{setting}` step must allow to get from {min} to {max} in equal steps of {step}"
    )]
    InconsistentStep {
        component: String,
        setting: String,
        min: f64,
        max: f64,
        step: f64,
    },

    #[error("syntax error in {path}: {source}")]
    Syntax {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Setpoint operations.
pub type Result<T> = std::result::Result<T, Error>;
