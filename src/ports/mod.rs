// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that define the interfaces
//! for the pluggable parts of the loader: format parsers and script
//! configurations. They are implemented in the adapters layer or by the caller.

pub mod parser;
pub mod script;

// Re-export commonly used types
pub use parser::ConfigParser;
pub use script::{ConfigScript, PostHook};
