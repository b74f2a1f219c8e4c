// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration loader.
//!
//! Every failure while reading, importing or interpolating a configuration is
//! fatal. Each variant carries the offending path, marker or key so the fault
//! can be located in the source file.

use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;
use std::str::ParseBoolError;
use thiserror::Error;

/// The main error type for configuration operations.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::errors::ConfigError;
///
/// fn get_config_value() -> Result<String, ConfigError> {
///     Err(ConfigError::ConfigKeyNotFound {
///         key: "database.host".to_string(),
///     })
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The requested configuration key was not found in the tree.
    #[error("Configuration key not found: {key}")]
    ConfigKeyNotFound {
        /// The key that was not found
        key: String,
    },

    /// Failed to convert a configuration value to the requested type.
    #[error(
        "Failed to convert configuration value for key '{key}' to type {target_type}: {source}"
    )]
    TypeConversionError {
        /// The key being converted
        key: String,
        /// The target type name
        target_type: String,
        /// The underlying conversion error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", path.display())]
    PathNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// The file extension does not map to any supported format.
    #[error("Unsupported configuration format '{extension}' for {}", path.display())]
    UnsupportedFormat {
        /// The offending file
        path: PathBuf,
        /// The extension as found on the file name
        extension: String,
    },

    /// A script did not produce a `config` tree.
    #[error("Script {} does not define a `config` tree", path.display())]
    MissingConfigVariable {
        /// The script file
        path: PathBuf,
    },

    /// A script file names a script that was never registered on the loader.
    #[error("No script named '{name}' is registered (needed by {})", path.display())]
    ScriptNotRegistered {
        /// The script file
        path: PathBuf,
        /// The script name derived from the file stem
        name: String,
    },

    /// The configuration file exceeds the configured size limit.
    #[error("Configuration file too large: {} is {size} bytes (max {max} bytes)", path.display())]
    FileTooLarge {
        /// The offending file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Maximum size in bytes
        max: u64,
    },

    /// Failed to parse a configuration file or value.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A file lists itself in its own imports.
    #[error("Import path cannot be the same as the current file: {}", path.display())]
    SelfImport {
        /// The file importing itself
        path: PathBuf,
    },

    /// A chain of imports leads back to a file that is still being resolved.
    #[error("Import cycle detected: {chain}")]
    ImportCycle {
        /// The chain of files, joined with ` -> `
        chain: String,
    },

    /// The import chain is deeper than the configured maximum.
    #[error("Import depth limit of {max} exceeded while importing {}", path.display())]
    ImportDepthExceeded {
        /// The import that would exceed the limit
        path: PathBuf,
        /// The configured limit
        max: usize,
    },

    /// A `pre` or `post` section is malformed.
    #[error("Invalid imports in {}: {message}", path.display())]
    InvalidImports {
        /// The file holding the section
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// A contextual marker names a variable that does not exist.
    #[error("Unknown variable '{name}' in marker; known variables: {known}")]
    UnknownVariable {
        /// The variable name
        name: String,
        /// The known variable names, comma separated
        known: String,
    },

    /// A marker body could not be parsed.
    #[error("Invalid marker '{marker}': {message}")]
    InvalidMarker {
        /// The marker text
        marker: String,
        /// What is wrong with it
        message: String,
    },

    /// A regex command carries a flag that maps to no regex option.
    #[error("Unknown regex flag '{flag}' in marker '{marker}'")]
    UnknownRegexFlag {
        /// The flag letter
        flag: char,
        /// The marker text
        marker: String,
    },

    /// A marker body holds a command other than `s`.
    #[error("Unsupported interpolation command '{command}' in marker '{marker}'")]
    UnsupportedInterpolationCommand {
        /// The command keyword
        command: String,
        /// The marker text
        marker: String,
    },

    /// A regex command pattern does not compile.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The pattern
        pattern: String,
        /// The regex compilation error
        #[source]
        source: regex::Error,
    },

    /// A `${...}` reference expression is malformed or cannot be applied.
    #[error("Invalid reference '{expression}': {message}")]
    InvalidReference {
        /// The expression text
        expression: String,
        /// What is wrong with it
        message: String,
    },

    /// A reference could not be resolved after the final interpolation pass.
    #[error("Unresolved reference in '{key}': {expression}")]
    UnresolvedReference {
        /// The key holding the value
        key: String,
        /// The raw value
        expression: String,
    },

    /// References form a cycle.
    #[error("Reference cycle detected at '{key}'")]
    ReferenceCycle {
        /// The key reached twice
        key: String,
    },

    /// A parameterized section key is malformed.
    #[error("Invalid template '{key}': {message}")]
    InvalidTemplate {
        /// The section key
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// A template was called with the wrong number of arguments.
    #[error("Template '{name}' expects {expected} argument(s), got {found}")]
    ArgumentCountMismatch {
        /// The template name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// A target representation name is not recognized.
    #[error("Unknown target kind '{name}' (expected one of: {expected})")]
    UnknownTargetKind {
        /// The name as given
        name: String,
        /// The accepted names, comma separated
        expected: String,
    },

    /// The caller's target type rejected the resolved tree.
    #[error(transparent)]
    Construction(#[from] serde_json::Error),

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Creates a TypeConversionError from a ParseIntError.
    pub fn from_parse_int_error(key: String, err: ParseIntError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "integer".to_string(),
            source: Box::new(err),
        }
    }

    /// Creates a TypeConversionError from a ParseFloatError.
    pub fn from_parse_float_error(key: String, err: ParseFloatError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "float".to_string(),
            source: Box::new(err),
        }
    }

    /// Creates a TypeConversionError from a ParseBoolError.
    pub fn from_parse_bool_error(key: String, err: ParseBoolError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "boolean".to_string(),
            source: Box::new(err),
        }
    }

    pub(crate) fn parse_error<E>(message: String, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::ParseError {
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key_not_found_error() {
        let error = ConfigError::ConfigKeyNotFound {
            key: "test.key".to_string(),
        };
        assert_eq!(error.to_string(), "Configuration key not found: test.key");
    }

    #[test]
    fn test_path_not_found_carries_path() {
        let error = ConfigError::PathNotFound {
            path: PathBuf::from("/etc/app/missing.yaml"),
        };
        assert!(error.to_string().contains("/etc/app/missing.yaml"));
    }

    #[test]
    fn test_unsupported_format_message() {
        let error = ConfigError::UnsupportedFormat {
            path: PathBuf::from("app.ini"),
            extension: "ini".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unsupported configuration format 'ini' for app.ini"
        );
    }

    #[test]
    fn test_unknown_variable_lists_known_keys() {
        let error = ConfigError::UnknownVariable {
            name: "this_fil".to_string(),
            known: "this_file, this_dir".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("this_fil"));
        assert!(message.contains("this_file, this_dir"));
    }

    #[test]
    fn test_argument_count_mismatch_message() {
        let error = ConfigError::ArgumentCountMismatch {
            name: "shape".to_string(),
            expected: 2,
            found: 3,
        };
        assert_eq!(
            error.to_string(),
            "Template 'shape' expects 2 argument(s), got 3"
        );
    }

    #[test]
    fn test_parse_error() {
        let error = ConfigError::ParseError {
            message: "Invalid YAML".to_string(),
            source: None,
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration: Invalid YAML"
        );
    }

    #[test]
    fn test_construction_error_is_transparent() {
        let json_err = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let expected = json_err.to_string();
        let error = ConfigError::from(json_err);
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = ConfigError::from(io_error);
        assert!(matches!(error, ConfigError::IoError(_)));
    }

    #[test]
    fn test_from_parse_int_error() {
        let parse_err = "not_a_number".parse::<i32>().unwrap_err();
        let error = ConfigError::from_parse_int_error("test.key".to_string(), parse_err);
        assert!(matches!(error, ConfigError::TypeConversionError { .. }));
        assert!(error.to_string().contains("integer"));
    }

    #[test]
    fn test_from_parse_bool_error() {
        let parse_err = "not_a_bool".parse::<bool>().unwrap_err();
        let error = ConfigError::from_parse_bool_error("test.key".to_string(), parse_err);
        assert!(error.to_string().contains("boolean"));
    }
}
