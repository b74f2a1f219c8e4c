// SPDX-License-Identifier: MIT OR Apache-2.0

//! A layered configuration loader.
//!
//! This crate reads configuration files (YAML, TOML, JSON, or trees built in code
//! by registered scripts), stitches them together through imports, and resolves a
//! small configuration language on top of the plain data:
//!
//! - **Imports**: `pre.imports` are merged underneath a file, `post.imports` on
//!   top of it after its own references were resolved.
//! - **Contextual markers**: `$this_dir`, `${this_filename}` and friends are
//!   replaced by values derived from the file's path; the lazy form
//!   `$[this_file]` waits for the top-level file of an import chain.
//! - **Regex commands**: `${this_filename_stem:::s/_ft//}` rewrites a marker's
//!   value before it is spliced in.
//! - **References**: `${database.host}` points at another value of the tree.
//! - **Templates**: a top-level key `shape(x, y)` defines a fragment that
//!   `${shape(1, 2)}` instantiates.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: the tree model and its passes (`ConfigTree`, markers,
//!   interpolation, templates, errors)
//! - **Ports**: trait definitions (`ConfigParser`, `ConfigScript`)
//! - **Adapters**: one parser per format plus the file reader
//! - **Service**: the `ConfigLoader` that runs the pipeline and builds the
//!   requested representation
//!
//! # Feature Flags
//!
//! - `yaml`: Enable YAML file support (default)
//! - `toml`: Enable TOML file support (default)
//! - `json`: Enable JSON file support (default)
//! - `full`: Enable all features
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stratacfg::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let cfg = stratacfg::parse("config/app.toml", TargetKind::Attr)?;
//! let port = cfg.get(&ConfigKey::from("server.port"))?.to_i64("server.port")?;
//! println!("listening on {}", port);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

use std::path::Path;

/// Parses `input` with a default [`ConfigLoader`](service::ConfigLoader)
/// rooted at the current directory.
pub fn parse(
    input: impl Into<service::ConfigInput>,
    kind: service::TargetKind,
) -> domain::Result<service::Representation> {
    service::ConfigLoader::new()?.parse(input, kind)
}

/// Loads and fully resolves `path` with a default loader.
pub fn load(path: impl AsRef<Path>) -> domain::Result<domain::ConfigTree> {
    service::ConfigLoader::new()?.load(path)
}

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{
        ConfigAccess, ConfigError, ConfigKey, ConfigTree, ConfigValue, FlattenOptions, Result,
    };
    pub use crate::ports::{ConfigParser, ConfigScript, PostHook};
    pub use crate::service::{
        AttrConfig, ConfigInput, ConfigLoader, ConfigLoaderBuilder, RefConfig, Representation,
        TargetKind,
    };

    // Re-export adapters based on feature flags
    #[cfg(feature = "json")]
    pub use crate::adapters::JsonParser;
    #[cfg(feature = "toml")]
    pub use crate::adapters::TomlParser;
    #[cfg(feature = "yaml")]
    pub use crate::adapters::YamlParser;
}
