// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON format reader.

use crate::domain::{ConfigError, ConfigTree, ConfigValue, Result};
use crate::ports::ConfigParser;
use serde_json::Value;

/// JSON parser implementation.
///
/// Object key order is preserved.
///
/// # Examples
///
/// ```rust
/// use stratacfg::adapters::JsonParser;
/// use stratacfg::ports::ConfigParser;
///
/// let tree = JsonParser::new().parse(r#"{"my": {"mother": 1}}"#).unwrap();
/// assert_eq!(tree["my"]["mother"], 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonParser;

impl JsonParser {
    /// Creates a new JSON parser.
    pub fn new() -> Self {
        JsonParser
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
            Value::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(Self::convert).collect())
            }
            Value::Object(map) => ConfigValue::Tree(
                map.into_iter()
                    .map(|(k, v)| (k, Self::convert(v)))
                    .collect(),
            ),
        }
    }
}

impl ConfigParser for JsonParser {
    fn parse(&self, content: &str) -> Result<ConfigTree> {
        if content.trim().is_empty() {
            return Ok(ConfigTree::new());
        }
        let value: Value = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse_error(format!("Failed to parse JSON: {}", e), e))?;
        match Self::convert(value) {
            ConfigValue::Tree(tree) => Ok(tree),
            _ => Err(ConfigError::ParseError {
                message: "JSON document must be an object at the top level".to_string(),
                source: None,
            }),
        }
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_parser_nested() {
        let json = r#"{"database": {"host": "localhost", "port": 5432, "replicas": [1, 2]}}"#;
        let tree = JsonParser::new().parse(json).unwrap();
        assert_eq!(tree["database"]["host"], "localhost");
        assert_eq!(tree["database"]["port"], 5432);
        assert_eq!(tree["database"]["replicas"][1], 2);
    }

    #[test]
    fn test_json_parser_scalar_types() {
        let tree = JsonParser::new()
            .parse(r#"{"f": 2.5, "b": true, "n": null}"#)
            .unwrap();
        assert_eq!(tree["f"], 2.5);
        assert_eq!(tree["b"], true);
        assert!(tree["n"].is_null());
    }

    #[test]
    fn test_json_parser_keeps_key_order() {
        let tree = JsonParser::new().parse(r#"{"z": 1, "a": 2}"#).unwrap();
        let keys: Vec<_> = tree.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_json_parser_rejects_non_object() {
        let err = JsonParser::new().parse("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_json_parser_invalid() {
        assert!(JsonParser::new().parse("{\"a\": ").is_err());
    }
}
