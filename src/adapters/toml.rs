// SPDX-License-Identifier: MIT OR Apache-2.0

//! TOML format reader.

use crate::domain::{ConfigError, ConfigTree, ConfigValue, Result};
use crate::ports::ConfigParser;
use ::toml::{Table, Value};

/// TOML parser implementation.
///
/// Datetimes are kept as their RFC 3339 text.
///
/// # Examples
///
/// ```rust
/// use stratacfg::adapters::TomlParser;
/// use stratacfg::ports::ConfigParser;
///
/// let tree = TomlParser::new().parse("[my]\nmother = 1").unwrap();
/// assert_eq!(tree["my"]["mother"], 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlParser;

impl TomlParser {
    /// Creates a new TOML parser.
    pub fn new() -> Self {
        TomlParser
    }

    fn convert(value: Value) -> ConfigValue {
        match value {
            Value::String(s) => ConfigValue::String(s),
            Value::Integer(i) => ConfigValue::Integer(i),
            Value::Float(f) => ConfigValue::Float(f),
            Value::Boolean(b) => ConfigValue::Bool(b),
            Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
            Value::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(Self::convert).collect())
            }
            Value::Table(table) => ConfigValue::Tree(Self::convert_table(table)),
        }
    }

    fn convert_table(table: Table) -> ConfigTree {
        table
            .into_iter()
            .map(|(k, v)| (k, Self::convert(v)))
            .collect()
    }
}

impl ConfigParser for TomlParser {
    fn parse(&self, content: &str) -> Result<ConfigTree> {
        let table: Table = toml::from_str(content)
            .map_err(|e| ConfigError::parse_error(format!("Failed to parse TOML: {}", e), e))?;
        Ok(Self::convert_table(table))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["toml"]
    }
}
