// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing the format readers.
//!
//! This module contains concrete implementations of the traits defined in the
//! ports layer: one [`ConfigParser`](crate::ports::ConfigParser) per data format,
//! the registry backing the script format, and the file reader that dispatches
//! on extension.

#[cfg(feature = "json")]
pub mod json;
pub mod reader;
pub mod script;
#[cfg(feature = "toml")]
pub mod toml;
#[cfg(feature = "yaml")]
pub mod yaml;

// Re-export adapters based on feature flags
#[cfg(feature = "json")]
pub use self::json::JsonParser;
pub use reader::{FileReader, Format, LoadedFile, DEFAULT_MAX_FILE_SIZE};
pub use script::ScriptRegistry;
#[cfg(feature = "toml")]
pub use self::toml::TomlParser;
#[cfg(feature = "yaml")]
pub use self::yaml::YamlParser;
