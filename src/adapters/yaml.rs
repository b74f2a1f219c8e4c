// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML format reader.
//!
//! Anchors, aliases and `<<` merge keys are expanded before conversion.

use crate::domain::{ConfigError, ConfigTree, ConfigValue, Result};
use crate::ports::ConfigParser;
use serde_yaml::Value;

/// YAML parser implementation.
///
/// # Examples
///
/// ```rust
/// use stratacfg::adapters::YamlParser;
/// use stratacfg::ports::ConfigParser;
///
/// let parser = YamlParser::new();
/// let yaml_content = "database:\n  host: localhost\n  port: 5432";
/// let tree = parser.parse(yaml_content).unwrap();
/// assert_eq!(tree["database"]["host"], "localhost");
/// assert_eq!(tree["database"]["port"], 5432);
/// ```
#[derive(Debug, Clone)]
pub struct YamlParser;

impl YamlParser {
    /// Creates a new YAML parser.
    pub fn new() -> Self {
        YamlParser
    }

    fn convert(value: Value) -> ConfigValue {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ConfigValue::String(s),
            Value::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(Self::convert).collect())
            }
            Value::Mapping(map) => ConfigValue::Tree(
                map.into_iter()
                    .map(|(k, v)| (Self::key_text(k), Self::convert(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::convert(tagged.value),
        }
    }

    /// Non-string keys are kept by their textual form.
    fn key_text(key: Value) -> String {
        match key {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => "null".to_string(),
            other => serde_yaml::to_string(&other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        }
    }
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser for YamlParser {
    fn parse(&self, content: &str) -> Result<ConfigTree> {
        let mut value: Value = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse_error(format!("Failed to parse YAML: {}", e), e))?;
        value
            .apply_merge()
            .map_err(|e| ConfigError::parse_error(format!("Failed to apply YAML merge keys: {}", e), e))?;

        match Self::convert(value) {
            ConfigValue::Null => Ok(ConfigTree::new()),
            ConfigValue::Tree(tree) => Ok(tree),
            _ => Err(ConfigError::ParseError {
                message: "YAML document must be a mapping at the top level".to_string(),
                source: None,
            }),
        }
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}
