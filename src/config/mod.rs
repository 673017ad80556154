//! Configuration model and validation.
//!
//! A config file addresses one or more drivers by name at the top level:
//!
//! ```yaml
//! tuner:
//!   command: "run-load-test"
//!   expected_duration: 120
//!   application:
//!     annotations:
//!       owner: perf-team
//!     components:
//!       web:
//!         settings:
//!           cpu:
//!             type: range
//!             min: 0
//!             max: 1024
//!             step: 64
//!             default: 256
//!           gc:
//!             type: enum
//!             values: [serial, parallel, g1]
//!             default: g1
//!   metrics:
//!     throughput:
//!       output_regex: 'rps=(\d+)'
//! ```
//!
//! Only the driver section named by the caller is validated; everything else
//! in the document is ignored. Validation is fail-fast: the first violation
//! aborts with an error naming the offending driver, component, or setting.

pub mod schema;
pub mod validate;

pub use schema::{
    ApplicationConfig, ComponentConfig, DriverConfig, EnumSetting, MetricSpec, RangeSetting,
    SettingSpec,
};
pub use validate::validate;

use std::fs;
use std::path::Path;

use crate::Result;

/// Read a config file, parse it as YAML, and validate the named driver
/// section.
///
/// A YAML syntax error is reported with the offending path; structural and
/// semantic violations are reported per [`validate`].
pub fn parse_config(path: &Path, driver: &str) -> Result<DriverConfig> {
    let raw = fs::read_to_string(path)?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|e| crate::Error::Syntax {
        path: path.display().to_string(),
        source: e,
    })?;
    validate(&doc, driver)
}
