// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dotted configuration key paths.
//!
//! A `ConfigKey` addresses a node of a configuration tree with dot notation,
//! e.g. `database.connection.host`. Numeric segments index into sequences, so
//! `servers.0.name` addresses the `name` of the first entry of `servers`.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A type-safe wrapper for dotted configuration key paths.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::config_key::ConfigKey;
///
/// let key = ConfigKey::from("database.host");
/// assert_eq!(key.as_str(), "database.host");
/// assert_eq!(key.segments().collect::<Vec<_>>(), vec!["database", "host"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Creates a new `ConfigKey` from a `String`.
    pub fn new(key: String) -> Self {
        ConfigKey(key)
    }

    /// The empty key, addressing the root of a tree.
    pub fn root() -> Self {
        ConfigKey(String::new())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the `ConfigKey` into its inner `String`.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns `true` for the root key.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the dot-separated segments of the key.
    ///
    /// The root key has no segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let empty = self.0.is_empty();
        self.0.split('.').filter(move |_| !empty)
    }

    /// Returns `true` if every segment is non-empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_key::ConfigKey;
    ///
    /// assert!(ConfigKey::from("a.b").is_well_formed());
    /// assert!(!ConfigKey::from("a..b").is_well_formed());
    /// ```
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.split('.').all(|s| !s.is_empty())
    }

    /// Appends a segment, returning the child key.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_key::ConfigKey;
    ///
    /// let key = ConfigKey::root().child("app").child("name");
    /// assert_eq!(key.as_str(), "app.name");
    /// ```
    pub fn child(&self, segment: &str) -> ConfigKey {
        if self.0.is_empty() {
            ConfigKey(segment.to_string())
        } else {
            ConfigKey(format!("{}.{}", self.0, segment))
        }
    }

    /// Returns the parent key, or `None` for the root key.
    ///
    /// A single-segment key has the root as its parent.
    pub fn parent(&self) -> Option<ConfigKey> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rsplit_once('.') {
            Some((parent, _)) => Some(ConfigKey(parent.to_string())),
            None => Some(ConfigKey::root()),
        }
    }

    /// Returns the last segment of the key.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or("")
    }
}

impl From<String> for ConfigKey {
    fn from(s: String) -> Self {
        ConfigKey(s)
    }
}

impl From<&str> for ConfigKey {
    fn from(s: &str) -> Self {
        ConfigKey(s.to_string())
    }
}

impl From<ConfigKey> for String {
    fn from(key: ConfigKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Hash for ConfigKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
