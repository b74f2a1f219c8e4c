// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing the configuration model and its transformations.
//!
//! Everything here works on in-memory trees: key paths, values, merging,
//! contextual markers, reference interpolation and templates. Reading files
//! and orchestrating imports live in the adapters and the service layer.

pub mod access;
pub mod config_key;
pub mod config_value;
pub mod errors;
pub mod interpolation;
pub mod marker;
pub mod template;

// Re-export commonly used types
pub use access::ConfigAccess;
pub use config_key::ConfigKey;
pub use config_value::{ConfigTree, ConfigValue, FlattenOptions, DOC_KEY};
pub use errors::{ConfigError, Result};
pub use interpolation::{interpolate, InterpolationMode};
pub use marker::{MarkerPass, ReplacementTable};
pub use template::{Template, TemplateRegistry};
