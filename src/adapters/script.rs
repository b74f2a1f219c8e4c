// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script format adapter.
//!
//! Keeps the [`ConfigScript`]s registered on a loader and evaluates the one a
//! `.script` file selects by its file stem.

use crate::adapters::reader::LoadedFile;
use crate::domain::{ConfigError, Result};
use crate::ports::ConfigScript;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Named scripts available to `.script` files.
///
/// # Examples
///
/// ```rust
/// use stratacfg::adapters::ScriptRegistry;
/// use stratacfg::domain::ConfigTree;
/// use std::path::Path;
///
/// let mut scripts = ScriptRegistry::new();
/// scripts.register("defaults", |_: &str| Some(ConfigTree::new().with("workers", 4)));
///
/// let loaded = scripts.evaluate(Path::new("conf/defaults.script"), "").unwrap();
/// assert_eq!(loaded.tree["workers"], 4);
/// ```
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: IndexMap<String, Arc<dyn ConfigScript>>,
}

impl ScriptRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script under `name`, replacing any previous one.
    pub fn register<S>(&mut self, name: impl Into<String>, script: S)
    where
        S: ConfigScript + 'static,
    {
        self.scripts.insert(name.into(), Arc::new(script));
    }

    /// Looks up a script by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ConfigScript>> {
        self.scripts.get(name)
    }

    /// Returns `true` if no script is registered.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Runs the script selected by `path` on the file's text.
    ///
    /// # Errors
    ///
    /// - `ScriptNotRegistered` if no script matches the file stem
    /// - `MissingConfigVariable` if the script produces no tree
    pub fn evaluate(&self, path: &Path, source: &str) -> Result<LoadedFile> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let script = self
            .get(&name)
            .ok_or_else(|| ConfigError::ScriptNotRegistered {
                path: path.to_path_buf(),
                name: name.clone(),
            })?;

        tracing::debug!(script = %name, path = %path.display(), "evaluating script config");
        let tree = script
            .config(source)
            .ok_or_else(|| ConfigError::MissingConfigVariable {
                path: path.to_path_buf(),
            })?;
        Ok(LoadedFile {
            tree,
            post_hook: script.post_hook(),
        })
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}
