// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script configuration trait definition.
//!
//! A `.script` file does not hold data itself. Its file stem names a
//! [`ConfigScript`] registered on the loader, which receives the file text and
//! builds the tree in code. A script may also hand back a post-hook that runs on
//! the fully resolved configuration.

use crate::domain::ConfigTree;
use std::fmt;
use std::sync::Arc;

/// A callback run on the final configuration tree.
pub type PostHook = Arc<dyn Fn(&mut ConfigTree) + Send + Sync>;

/// A configuration defined in code.
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::ConfigTree;
/// use stratacfg::ports::ConfigScript;
///
/// struct Defaults;
///
/// impl ConfigScript for Defaults {
///     fn config(&self, _source: &str) -> Option<ConfigTree> {
///         Some(ConfigTree::new().with("workers", 4))
///     }
/// }
///
/// assert_eq!(Defaults.config("").unwrap()["workers"], 4);
/// assert!(Defaults.post_hook().is_none());
/// ```
pub trait ConfigScript: Send + Sync {
    /// Builds the configuration tree from the script file's text.
    ///
    /// Returning `None` means the script defines no configuration, which the
    /// loader reports as `MissingConfigVariable`.
    fn config(&self, source: &str) -> Option<ConfigTree>;

    /// An optional hook run once the top-level parse has finished.
    fn post_hook(&self) -> Option<PostHook> {
        None
    }
}

impl<F> ConfigScript for F
where
    F: Fn(&str) -> Option<ConfigTree> + Send + Sync,
{
    fn config(&self, source: &str) -> Option<ConfigTree> {
        self(source)
    }
}

impl fmt::Debug for dyn ConfigScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigScript")
    }
}
