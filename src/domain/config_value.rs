// SPDX-License-Identifier: MIT OR Apache-2.0

//! The generic configuration tree.
//!
//! Every format reader decodes into a [`ConfigTree`]: an insertion-ordered map
//! from string keys to [`ConfigValue`]s. Imports, interpolation and templates
//! all operate on this structure, and every output representation is built
//! from it.

use crate::domain::config_key::ConfigKey;
use crate::domain::errors::{ConfigError, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// The reserved leaf key holding documentation for its parent path.
pub const DOC_KEY: &str = "_doc_";

static NULL: ConfigValue = ConfigValue::Null;

/// A node of a configuration tree.
///
/// `Unresolved` holds the raw text of a string whose `${...}` references could
/// not be resolved yet. It only exists between the two reference passes of a
/// parse; a fully loaded configuration never contains one.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::config_value::{ConfigTree, ConfigValue};
///
/// let tree = ConfigTree::new().with("port", 8080).with("host", "localhost");
/// let value = ConfigValue::from(tree);
/// assert_eq!(value["port"], 8080);
/// assert_eq!(value["host"], "localhost");
/// assert!(value["missing"].is_null());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// An explicit null / absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string, possibly holding markers or references.
    String(String),
    /// An ordered sequence of values.
    Sequence(Vec<ConfigValue>),
    /// A nested tree.
    Tree(ConfigTree),
    /// A string whose references are still waiting for a later pass.
    Unresolved(String),
}

impl ConfigValue {
    /// Returns `true` for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Returns `true` for nested trees.
    pub fn is_tree(&self) -> bool {
        matches!(self, ConfigValue::Tree(_))
    }

    /// Returns `true` if this value is an unresolved string.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ConfigValue::Unresolved(_))
    }

    /// Returns `true` if this value or any nested value is unresolved.
    pub fn contains_unresolved(&self) -> bool {
        match self {
            ConfigValue::Unresolved(_) => true,
            ConfigValue::Sequence(items) => items.iter().any(ConfigValue::contains_unresolved),
            ConfigValue::Tree(tree) => tree.contains_unresolved(),
            _ => false,
        }
    }

    /// Returns the string content of `String` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value of `Integer` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value of `Float` and `Integer` values as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the value of `Bool` values.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested tree of `Tree` values.
    pub fn as_tree(&self) -> Option<&ConfigTree> {
        match self {
            ConfigValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Returns the items of `Sequence` values.
    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value to an `i64`, parsing string content if necessary.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::ConfigValue;
    ///
    /// assert_eq!(ConfigValue::from("42").to_i64("test.key").unwrap(), 42);
    /// assert_eq!(ConfigValue::from(7).to_i64("test.key").unwrap(), 7);
    /// ```
    pub fn to_i64(&self, key: &str) -> Result<i64> {
        match self {
            ConfigValue::Integer(n) => Ok(*n),
            other => other
                .to_string()
                .parse::<i64>()
                .map_err(|e| ConfigError::from_parse_int_error(key.to_string(), e)),
        }
    }

    /// Converts the value to an `f64`, parsing string content if necessary.
    pub fn to_f64(&self, key: &str) -> Result<f64> {
        match self.as_f64() {
            Some(f) => Ok(f),
            None => self
                .to_string()
                .parse::<f64>()
                .map_err(|e| ConfigError::from_parse_float_error(key.to_string(), e)),
        }
    }

    /// Converts the value to a boolean.
    ///
    /// Besides real booleans, the strings "true", "yes", "1", "on" and
    /// "false", "no", "0", "off" are recognized (case-insensitive).
    pub fn to_bool(&self, key: &str) -> Result<bool> {
        if let ConfigValue::Bool(b) = self {
            return Ok(*b);
        }
        let text = self.to_string();
        match text.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => text
                .parse::<bool>()
                .map_err(|e| ConfigError::from_parse_bool_error(key.to_string(), e)),
        }
    }

    /// Parses the textual form of the value into any type that implements `FromStr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::ConfigValue;
    /// use std::net::IpAddr;
    ///
    /// let value = ConfigValue::from("127.0.0.1");
    /// let ip: IpAddr = value.parse("test.key").unwrap();
    /// assert_eq!(ip.to_string(), "127.0.0.1");
    /// ```
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.to_string()
            .parse::<T>()
            .map_err(|e| ConfigError::TypeConversionError {
                key: key.to_string(),
                target_type: std::any::type_name::<T>().to_string(),
                source: Box::new(e),
            })
    }

    /// Returns the child addressed by one key segment.
    ///
    /// Trees are indexed by key, sequences by a numeric segment.
    pub fn child(&self, segment: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Tree(tree) => tree.get(segment),
            ConfigValue::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut ConfigValue> {
        match self {
            ConfigValue::Tree(tree) => tree.get_mut(segment),
            ConfigValue::Sequence(items) => match segment.parse::<usize>() {
                Ok(i) => items.get_mut(i),
                Err(_) => None,
            },
            _ => None,
        }
    }

    /// Visits the text of every `String` and `Unresolved` value, depth first.
    pub fn visit_strings_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut String) -> Result<()>,
    {
        match self {
            ConfigValue::String(s) | ConfigValue::Unresolved(s) => f(s),
            ConfigValue::Sequence(items) => {
                for item in items.iter_mut() {
                    item.visit_strings_mut(f)?;
                }
                Ok(())
            }
            ConfigValue::Tree(tree) => tree.visit_strings_mut(f),
            _ => Ok(()),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => write!(f, "null"),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(n) => write!(f, "{}", n),
            ConfigValue::Float(x) => write!(f, "{}", format_float(*x)),
            ConfigValue::String(s) | ConfigValue::Unresolved(s) => write!(f, "{}", s),
            ConfigValue::Sequence(_) | ConfigValue::Tree(_) => {
                let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", text)
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Integer(n)
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Integer(n.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<ConfigTree> for ConfigValue {
    fn from(tree: ConfigTree) -> Self {
        ConfigValue::Tree(tree)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<ConfigValue>) -> Self {
        ConfigValue::Sequence(items)
    }
}

impl PartialEq<i64> for ConfigValue {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

impl PartialEq<f64> for ConfigValue {
    fn eq(&self, other: &f64) -> bool {
        matches!(self, ConfigValue::Float(f) if f == other)
    }
}

impl PartialEq<bool> for ConfigValue {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<str> for ConfigValue {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for ConfigValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl Index<&str> for ConfigValue {
    type Output = ConfigValue;

    fn index(&self, key: &str) -> &ConfigValue {
        match self {
            ConfigValue::Tree(tree) => &tree[key],
            _ => &NULL,
        }
    }
}

impl Index<usize> for ConfigValue {
    type Output = ConfigValue;

    fn index(&self, index: usize) -> &ConfigValue {
        match self {
            ConfigValue::Sequence(items) => items.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

/// An insertion-ordered map of configuration keys to values.
///
/// Equality ignores key order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigTree(IndexMap<String, ConfigValue>);

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        ConfigTree(IndexMap::new())
    }

    /// Builder-style insertion, convenient for constructing trees in code.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::ConfigTree;
    ///
    /// let tree = ConfigTree::new()
    ///     .with("my", ConfigTree::new().with("mother", 1));
    /// assert_eq!(tree["my"]["mother"], 1);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the value stored under a top-level key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Returns a mutable reference to the value stored under a top-level key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.0.get_mut(key)
    }

    /// Inserts a value, returning the previous one. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a top-level key, preserving the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.shift_remove(key)
    }

    /// Returns `true` if the top-level key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over top-level entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ConfigValue> {
        self.0.iter()
    }

    /// Iterates over top-level keys in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, ConfigValue> {
        self.0.keys()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the tree has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if any value in the tree is unresolved.
    pub fn contains_unresolved(&self) -> bool {
        self.0.values().any(ConfigValue::contains_unresolved)
    }

    /// Deep-merges `other` into this tree.
    ///
    /// Nested trees are merged key by key; every other value from `other`
    /// replaces the existing one entirely, sequences included.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::ConfigTree;
    ///
    /// let mut base = ConfigTree::new()
    ///     .with("db", ConfigTree::new().with("host", "localhost").with("port", 5432));
    /// let overlay = ConfigTree::new()
    ///     .with("db", ConfigTree::new().with("port", 6432));
    /// base.merge(overlay);
    /// assert_eq!(base["db"]["host"], "localhost");
    /// assert_eq!(base["db"]["port"], 6432);
    /// ```
    pub fn merge(&mut self, other: ConfigTree) {
        for (key, value) in other.0 {
            match value {
                ConfigValue::Tree(incoming) => {
                    if let Some(ConfigValue::Tree(existing)) = self.0.get_mut(&key) {
                        existing.merge(incoming);
                        continue;
                    }
                    self.0.insert(key, ConfigValue::Tree(incoming));
                }
                value => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    /// Consuming variant of [`ConfigTree::merge`].
    pub fn merged(mut self, other: ConfigTree) -> ConfigTree {
        self.merge(other);
        self
    }

    /// Looks up a value by dotted key.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_key::ConfigKey;
    /// use stratacfg::domain::config_value::{ConfigTree, ConfigValue};
    ///
    /// let tree = ConfigTree::new().with(
    ///     "servers",
    ///     vec![ConfigValue::from(ConfigTree::new().with("name", "alpha"))],
    /// );
    /// let name = tree.select(&ConfigKey::from("servers.0.name")).unwrap();
    /// assert_eq!(name, "alpha");
    /// ```
    pub fn select(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        let mut segments = key.segments();
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Mutable variant of [`ConfigTree::select`].
    pub fn select_mut(&mut self, key: &ConfigKey) -> Option<&mut ConfigValue> {
        let mut segments = key.segments();
        let mut current = self.0.get_mut(segments.next()?)?;
        for segment in segments {
            current = current.child_mut(segment)?;
        }
        Some(current)
    }

    /// Stores a value under a dotted key, creating intermediate trees.
    ///
    /// Intermediate values that are neither trees nor indexable sequences are
    /// replaced by trees.
    pub fn set(&mut self, key: &ConfigKey, value: impl Into<ConfigValue>) -> Result<()> {
        if !key.is_well_formed() {
            return Err(ConfigError::InvalidReference {
                expression: key.to_string(),
                message: "malformed key".to_string(),
            });
        }
        let segments: Vec<&str> = key.segments().collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::ConfigKeyNotFound {
                key: key.to_string(),
            })?;

        let mut current = self;
        for segment in parents {
            let entry = current
                .0
                .entry(segment.to_string())
                .or_insert_with(|| ConfigValue::Tree(ConfigTree::new()));
            current = entry.descend_for_set();
        }
        current.0.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Flattens the tree into dotted keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::{ConfigTree, FlattenOptions};
    ///
    /// let tree = ConfigTree::new()
    ///     .with("_doc_", "root docs")
    ///     .with("db", ConfigTree::new().with("_doc_", "database").with("port", 5432));
    ///
    /// let all = tree.flatten(&FlattenOptions::new());
    /// assert!(all.contains_key("db.port"));
    ///
    /// let docs = tree.flatten(&FlattenOptions::docs());
    /// assert_eq!(docs[""], "root docs");
    /// assert_eq!(docs["db"], "database");
    /// assert_eq!(docs.len(), 2);
    /// ```
    pub fn flatten(&self, options: &FlattenOptions) -> IndexMap<String, ConfigValue> {
        let mut out = IndexMap::new();
        self.flatten_into(&ConfigKey::from(options.prefix.as_str()), options, &mut out);
        out
    }

    fn flatten_into(
        &self,
        prefix: &ConfigKey,
        options: &FlattenOptions,
        out: &mut IndexMap<String, ConfigValue>,
    ) {
        for (key, value) in &self.0 {
            let path = prefix.child(key);
            match value {
                ConfigValue::Tree(tree) => tree.flatten_into(&path, options, out),
                leaf if options.filter.is_empty() => {
                    out.insert(path.into_string(), leaf.clone());
                }
                leaf if options.filter.iter().any(|f| f == key) => {
                    let reported = if options.use_parent_key_for_filter {
                        prefix.clone()
                    } else {
                        path
                    };
                    out.insert(reported.into_string(), leaf.clone());
                }
                _ => {}
            }
        }
    }

    /// Visits the text of every `String` and `Unresolved` value, depth first.
    pub fn visit_strings_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut String) -> Result<()>,
    {
        for value in self.0.values_mut() {
            value.visit_strings_mut(f)?;
        }
        Ok(())
    }
}

impl ConfigValue {
    fn descend_for_set(&mut self) -> &mut ConfigTree {
        if !self.is_tree() {
            *self = ConfigValue::Tree(ConfigTree::new());
        }
        match self {
            ConfigValue::Tree(tree) => tree,
            _ => unreachable!("value was just replaced by a tree"),
        }
    }
}

impl Index<&str> for ConfigTree {
    type Output = ConfigValue;

    fn index(&self, key: &str) -> &ConfigValue {
        self.0.get(key).unwrap_or(&NULL)
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        ConfigTree(iter.into_iter().collect())
    }
}

impl IntoIterator for ConfigTree {
    type Item = (String, ConfigValue);
    type IntoIter = indexmap::map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigTree {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = indexmap::map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Options for [`ConfigTree::flatten`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Prefix prepended to every reported key.
    pub prefix: String,
    /// When non-empty, only leaves whose own key is listed are reported.
    pub filter: Vec<String>,
    /// Report the parent path of a matching leaf instead of its full path.
    pub use_parent_key_for_filter: bool,
}

impl FlattenOptions {
    /// Reports every leaf under its full dotted path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `_doc_` leaves under the path they document.
    pub fn docs() -> Self {
        Self {
            prefix: String::new(),
            filter: vec![DOC_KEY.to_string()],
            use_parent_key_for_filter: true,
        }
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Restricts the output to leaves with the given key names.
    pub fn with_filter<I, S>(mut self, keys: I, use_parent_key: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = keys.into_iter().map(Into::into).collect();
        self.use_parent_key_for_filter = use_parent_key;
        self
    }
}
