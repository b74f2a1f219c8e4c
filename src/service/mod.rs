// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer containing the loader and its output representations.
//!
//! [`ConfigLoader`] orchestrates the format readers and the domain passes;
//! [`Representation`] is what a parse hands back.

pub mod loader;
pub mod representation;

// Re-export commonly used types
pub use loader::{ConfigInput, ConfigLoader, ConfigLoaderBuilder};
pub use representation::{AttrConfig, RefConfig, Representation, TargetKind};
