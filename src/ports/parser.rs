// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration parser trait definition.
//!
//! This module defines the `ConfigParser` trait, which provides an interface for
//! decoding configuration text in one file format (YAML, TOML, JSON) into a
//! generic [`ConfigTree`].

use crate::domain::{ConfigTree, Result};

/// A trait for parsing configuration text.
///
/// Parsers keep the nesting of the source document: mappings become nested
/// trees, sequences stay sequences and scalars keep their type.
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::{ConfigTree, Result};
/// use stratacfg::ports::ConfigParser;
///
/// struct KeyValueParser;
///
/// impl ConfigParser for KeyValueParser {
///     fn parse(&self, content: &str) -> Result<ConfigTree> {
///         Ok(content
///             .lines()
///             .filter_map(|line| line.split_once('='))
///             .map(|(k, v)| (k.trim().to_string(), v.trim().into()))
///             .collect())
///     }
///
///     fn supported_extensions(&self) -> &[&str] {
///         &["kv"]
///     }
/// }
///
/// let tree = KeyValueParser.parse("host = localhost").unwrap();
/// assert_eq!(tree["host"], "localhost");
/// ```
pub trait ConfigParser {
    /// Parses configuration text into a tree.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the text is not valid for the format, or
    /// when its top level is not a mapping.
    fn parse(&self, content: &str) -> Result<ConfigTree>;

    /// Returns the file extensions handled by this parser, without the leading dot.
    fn supported_extensions(&self) -> &[&str];
}
