// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output representations of a loaded configuration.
//!
//! The loader always produces a [`ConfigTree`]; the caller picks how it is
//! handed back with a [`TargetKind`]. Typed records are built through serde with
//! [`ConfigLoader::parse_into`](crate::service::ConfigLoader::parse_into).

use crate::domain::interpolation::{interpolate, InterpolationMode};
use crate::domain::{ConfigAccess, ConfigError, ConfigKey, ConfigTree, ConfigValue, Result, TemplateRegistry};
use serde::Serialize;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// The representation requested from a parse.
///
/// # Examples
///
/// ```rust
/// use stratacfg::service::TargetKind;
///
/// assert_eq!("dict".parse::<TargetKind>().unwrap(), TargetKind::Tree);
/// assert_eq!("attr".parse::<TargetKind>().unwrap(), TargetKind::Attr);
/// assert_eq!("ref".parse::<TargetKind>().unwrap(), TargetKind::Reference);
/// assert!("yaml".parse::<TargetKind>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A plain [`ConfigTree`].
    Tree,
    /// An [`AttrConfig`] with chained index access.
    #[default]
    Attr,
    /// A [`RefConfig`] that keeps the template registry.
    Reference,
}

impl TargetKind {
    const NAMES: &'static str = "tree, dict, d, attr, a, reference, ref, r";
}

impl FromStr for TargetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" | "dict" | "d" => Ok(TargetKind::Tree),
            "attr" | "a" => Ok(TargetKind::Attr),
            "reference" | "ref" | "r" => Ok(TargetKind::Reference),
            _ => Err(ConfigError::UnknownTargetKind {
                name: s.to_string(),
                expected: Self::NAMES.to_string(),
            }),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Tree => "tree",
            TargetKind::Attr => "attr",
            TargetKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// A loaded configuration in the requested representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Representation {
    /// See [`TargetKind::Tree`].
    Tree(ConfigTree),
    /// See [`TargetKind::Attr`].
    Attr(AttrConfig),
    /// See [`TargetKind::Reference`].
    Reference(RefConfig),
}

impl Representation {
    /// Wraps `tree` as `kind`.
    pub fn build(kind: TargetKind, tree: ConfigTree, templates: TemplateRegistry) -> Self {
        match kind {
            TargetKind::Tree => Representation::Tree(tree),
            TargetKind::Attr => Representation::Attr(AttrConfig::new(tree)),
            TargetKind::Reference => Representation::Reference(RefConfig::new(tree, templates)),
        }
    }

    /// The kind this representation was built as.
    pub fn kind(&self) -> TargetKind {
        match self {
            Representation::Tree(_) => TargetKind::Tree,
            Representation::Attr(_) => TargetKind::Attr,
            Representation::Reference(_) => TargetKind::Reference,
        }
    }

    /// Unwraps into the plain tree.
    pub fn into_tree(self) -> ConfigTree {
        match self {
            Representation::Tree(tree) => tree,
            Representation::Attr(attr) => attr.into_tree(),
            Representation::Reference(reference) => reference.into_tree(),
        }
    }

    /// Returns the attribute representation, if that is what was built.
    pub fn into_attr(self) -> Option<AttrConfig> {
        match self {
            Representation::Attr(attr) => Some(attr),
            _ => None,
        }
    }

    /// Returns the reference representation, if that is what was built.
    pub fn into_reference(self) -> Option<RefConfig> {
        match self {
            Representation::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

impl ConfigAccess for Representation {
    fn tree(&self) -> &ConfigTree {
        match self {
            Representation::Tree(tree) => tree,
            Representation::Attr(attr) => attr.tree(),
            Representation::Reference(reference) => reference.tree(),
        }
    }
}

/// Attribute-style access: `cfg["my"]["mother"]`.
///
/// Missing keys index to `Null` instead of panicking; use
/// [`AttrConfig::attr`] for a checked lookup.
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::ConfigTree;
/// use stratacfg::service::AttrConfig;
///
/// let cfg = AttrConfig::new(ConfigTree::new().with("my", ConfigTree::new().with("mother", 1)));
/// assert_eq!(cfg["my"]["mother"], 1);
/// assert!(cfg["your"].is_null());
/// assert!(cfg.attr("your").is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttrConfig {
    tree: ConfigTree,
}

impl AttrConfig {
    /// Wraps a tree.
    pub fn new(tree: ConfigTree) -> Self {
        Self { tree }
    }

    /// Checked lookup of a top-level attribute.
    pub fn attr(&self, name: &str) -> Result<&ConfigValue> {
        self.tree
            .get(name)
            .ok_or_else(|| ConfigError::ConfigKeyNotFound {
                key: name.to_string(),
            })
    }

    /// Iterates over the top-level attribute names.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.tree.keys().map(String::as_str)
    }

    /// Unwraps the tree.
    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }
}

impl ConfigAccess for AttrConfig {
    fn tree(&self) -> &ConfigTree {
        &self.tree
    }
}

impl Index<&str> for AttrConfig {
    type Output = ConfigValue;

    fn index(&self, key: &str) -> &ConfigValue {
        &self.tree[key]
    }
}

/// A configuration that keeps its templates and can be edited and re-resolved.
///
/// Equality compares the trees structurally and ignores the templates.
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::{ConfigKey, ConfigTree, TemplateRegistry};
/// use stratacfg::service::RefConfig;
///
/// let mut cfg = RefConfig::new(ConfigTree::new().with("host", "localhost"), TemplateRegistry::new());
/// cfg.set(&ConfigKey::from("url"), "http://${host}").unwrap();
/// let resolved = cfg.resolve().unwrap();
/// assert_eq!(resolved["url"], "http://localhost");
/// ```
#[derive(Clone, Debug, Default)]
pub struct RefConfig {
    tree: ConfigTree,
    templates: TemplateRegistry,
}

impl RefConfig {
    /// Wraps a tree with the templates it may call.
    pub fn new(tree: ConfigTree, templates: TemplateRegistry) -> Self {
        Self { tree, templates }
    }

    /// The templates registered during the parse.
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Mutable access to the templates.
    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    /// Looks up a value by dotted key.
    pub fn select(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        self.tree.select(key)
    }

    /// Stores a value under a dotted key.
    pub fn set(&mut self, key: &ConfigKey, value: impl Into<ConfigValue>) -> Result<()> {
        self.tree.set(key, value)
    }

    /// Deep-merges `other` on top of this configuration.
    pub fn merge(&mut self, other: ConfigTree) {
        self.tree.merge(other);
    }

    /// Resolves every reference against the current tree without modifying it.
    ///
    /// # Errors
    ///
    /// `UnresolvedReference`, `ReferenceCycle` and the other interpolation errors.
    pub fn resolve(&self) -> Result<ConfigTree> {
        interpolate(&self.tree, &self.templates, InterpolationMode::Strict)
    }

    /// Resolves every reference and stores the result.
    pub fn resolve_in_place(&mut self) -> Result<()> {
        self.tree = self.resolve()?;
        Ok(())
    }

    /// Unwraps the tree.
    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }
}

impl ConfigAccess for RefConfig {
    fn tree(&self) -> &ConfigTree {
        &self.tree
    }
}

impl PartialEq for RefConfig {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl PartialEq<ConfigTree> for RefConfig {
    fn eq(&self, other: &ConfigTree) -> bool {
        &self.tree == other
    }
}

impl Index<&str> for RefConfig {
    type Output = ConfigValue;

    fn index(&self, key: &str) -> &ConfigValue {
        &self.tree[key]
    }
}
