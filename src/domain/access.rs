// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to a loaded configuration.
//!
//! Every output representation exposes the same lookup API through
//! [`ConfigAccess`], so callers can query values by dotted key without caring
//! which representation they hold.

use crate::domain::{ConfigError, ConfigKey, ConfigTree, ConfigValue, Result};

/// Dotted-key lookups over a loaded configuration.
///
/// Implementors only provide [`ConfigAccess::tree`]; every other method has a
/// default implementation on top of it.
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::{ConfigAccess, ConfigKey, ConfigTree};
///
/// let tree = ConfigTree::new().with("database", ConfigTree::new().with("host", "localhost"));
/// assert_eq!(tree.get_str(&ConfigKey::from("database.host")).unwrap(), "localhost");
/// assert!(!tree.has(&ConfigKey::from("database.port")));
/// ```
pub trait ConfigAccess {
    /// The underlying tree.
    fn tree(&self) -> &ConfigTree;

    /// Retrieves the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ConfigKeyNotFound`] if nothing is stored there.
    fn get(&self, key: &ConfigKey) -> Result<&ConfigValue> {
        self.tree()
            .select(key)
            .ok_or_else(|| ConfigError::ConfigKeyNotFound {
                key: key.to_string(),
            })
    }

    /// Retrieves the textual form of the value stored under `key`.
    fn get_str(&self, key: &ConfigKey) -> Result<String> {
        self.get(key).map(ToString::to_string)
    }

    /// Retrieves a value, falling back to `default` when the key is absent.
    ///
    /// ```rust
    /// use stratacfg::domain::{ConfigAccess, ConfigKey, ConfigTree, ConfigValue};
    ///
    /// let tree = ConfigTree::new();
    /// let value = tree.get_or(&ConfigKey::from("app.workers"), ConfigValue::from(4));
    /// assert_eq!(value, 4);
    /// ```
    fn get_or(&self, key: &ConfigKey, default: ConfigValue) -> ConfigValue {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Checks whether a value is stored under `key`.
    fn has(&self, key: &ConfigKey) -> bool {
        self.tree().select(key).is_some()
    }
}

impl ConfigAccess for ConfigTree {
    fn tree(&self) -> &ConfigTree {
        self
    }
}
