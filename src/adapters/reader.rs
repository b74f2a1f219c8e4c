// SPDX-License-Identifier: MIT OR Apache-2.0

//! Format detection and file reading.
//!
//! The format of a configuration file is decided by its extension alone,
//! compared case-insensitively. Reading a file checks that it exists, that it
//! stays below the size limit, and then hands its text to the matching parser
//! or script.

use crate::adapters::script::ScriptRegistry;
use crate::domain::{ConfigError, ConfigTree, Result};
use crate::ports::{ConfigParser, PostHook};
use std::fmt;
use std::fs;
use std::path::Path;

/// Default maximum size of a configuration file (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// The supported configuration formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// `.yaml` / `.yml`
    #[cfg(feature = "yaml")]
    Yaml,
    /// `.toml`
    #[cfg(feature = "toml")]
    Toml,
    /// `.json`
    #[cfg(feature = "json")]
    Json,
    /// `.script`, evaluated by a registered [`ConfigScript`](crate::ports::ConfigScript)
    Script,
}

impl Format {
    /// Maps a file extension to a format, ignoring case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stratacfg::adapters::Format;
    ///
    /// assert_eq!(Format::from_extension("script"), Some(Format::Script));
    /// assert_eq!(Format::from_extension("ini"), None);
    /// ```
    pub fn from_extension(extension: &str) -> Option<Format> {
        match extension.to_ascii_lowercase().as_str() {
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(Format::Yaml),
            #[cfg(feature = "toml")]
            "toml" => Some(Format::Toml),
            #[cfg(feature = "json")]
            "json" => Some(Format::Json),
            "script" => Some(Format::Script),
            _ => None,
        }
    }

    /// Detects the format of `path`.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` when the extension is missing or unknown.
    pub fn from_path(path: &Path) -> Result<Format> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_extension(&extension).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        })
    }

    /// The parser for data formats; `None` for scripts.
    pub fn parser(self) -> Option<Box<dyn ConfigParser>> {
        match self {
            #[cfg(feature = "yaml")]
            Format::Yaml => Some(Box::new(crate::adapters::YamlParser::new())),
            #[cfg(feature = "toml")]
            Format::Toml => Some(Box::new(crate::adapters::TomlParser::new())),
            #[cfg(feature = "json")]
            Format::Json => Some(Box::new(crate::adapters::JsonParser::new())),
            Format::Script => None,
        }
    }
}

/// The outcome of reading one file.
#[derive(Clone)]
pub struct LoadedFile {
    /// The decoded tree, before any marker or import processing.
    pub tree: ConfigTree,
    /// A hook supplied by script files.
    pub post_hook: Option<PostHook>,
}

impl LoadedFile {
    /// Wraps a tree without a hook.
    pub fn from_tree(tree: ConfigTree) -> Self {
        Self {
            tree,
            post_hook: None,
        }
    }
}

impl fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFile")
            .field("tree", &self.tree)
            .field("post_hook", &self.post_hook.is_some())
            .finish()
    }
}

/// Reads configuration files of every supported format.
#[derive(Clone, Debug)]
pub struct FileReader {
    scripts: ScriptRegistry,
    max_file_size: u64,
}

impl FileReader {
    /// Creates a reader with the given scripts and size limit.
    pub fn new(scripts: ScriptRegistry, max_file_size: u64) -> Self {
        Self {
            scripts,
            max_file_size,
        }
    }

    /// The size limit in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Reads and decodes `path`.
    ///
    /// # Errors
    ///
    /// - `PathNotFound` if the file does not exist (checked before the format)
    /// - `UnsupportedFormat` for unknown extensions
    /// - `FileTooLarge` above the size limit
    /// - `ParseError`, `ScriptNotRegistered` or `MissingConfigVariable` from decoding
    pub fn read(&self, path: &Path) -> Result<LoadedFile> {
        if !path.exists() {
            return Err(ConfigError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let format = Format::from_path(path)?;

        let metadata = fs::metadata(path)?;
        if metadata.len() > self.max_file_size {
            return Err(ConfigError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max: self.max_file_size,
            });
        }

        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), ?format, bytes = content.len(), "read configuration file");

        match format.parser() {
            Some(parser) => parser.parse(&content).map(LoadedFile::from_tree).map_err(|e| match e {
                ConfigError::ParseError { message, source } => ConfigError::ParseError {
                    message: format!("{}: {}", path.display(), message),
                    source,
                },
                other => other,
            }),
            None => self.scripts.evaluate(path, &content),
        }
    }
}

impl Default for FileReader {
    fn default() -> Self {
        Self::new(ScriptRegistry::new(), DEFAULT_MAX_FILE_SIZE)
    }
}
