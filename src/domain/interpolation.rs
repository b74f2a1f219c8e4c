// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference interpolation.
//!
//! Strings may refer to other values of the same tree with `${dotted.key}` or
//! call a registered template with `${name(arg1, arg2)}`. Interpolation runs in
//! two passes during a parse:
//!
//! - [`InterpolationMode::Lenient`] resolves what it can and marks everything
//!   else [`ConfigValue::Unresolved`], so a later merge may still supply it.
//! - [`InterpolationMode::Strict`] runs on the final tree; anything left
//!   unresolved is an error.
//!
//! A string that consists of exactly one reference takes the referenced value
//! with its type, trees included. References embedded in surrounding text are
//! rendered as text.

use crate::domain::config_key::ConfigKey;
use crate::domain::config_value::{ConfigTree, ConfigValue};
use crate::domain::errors::{ConfigError, Result};
use crate::domain::template::{argument_value, TemplateRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)$").expect("call regex is valid")
});

const OPEN: &str = "${";

/// How unresolvable references are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Leave them in place as [`ConfigValue::Unresolved`].
    Lenient,
    /// Fail with [`ConfigError::UnresolvedReference`].
    Strict,
}

/// Resolves the references of `tree` against itself.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::config_value::ConfigTree;
/// use stratacfg::domain::interpolation::{interpolate, InterpolationMode};
/// use stratacfg::domain::template::TemplateRegistry;
///
/// let tree = ConfigTree::new()
///     .with("db", ConfigTree::new().with("host", "localhost").with("port", 5432))
///     .with("url", "pg://${db.host}:${db.port}")
///     .with("port", "${db.port}");
///
/// let out = interpolate(&tree, &TemplateRegistry::new(), InterpolationMode::Strict).unwrap();
/// assert_eq!(out["url"], "pg://localhost:5432");
/// assert_eq!(out["port"], 5432);
/// ```
pub fn interpolate(tree: &ConfigTree, templates: &TemplateRegistry, mode: InterpolationMode) -> Result<ConfigTree> {
    let mut resolver = Resolver::new(tree, templates);
    let mut out = ConfigTree::new();
    for (key, raw) in tree.iter() {
        let value = match resolver.lookup(&ConfigKey::from(key.as_str()))? {
            Some(value) => value,
            None => raw.clone(),
        };
        out.insert(key.clone(), value);
    }

    if mode == InterpolationMode::Strict {
        if let Some((key, expression)) = first_unresolved(&out) {
            return Err(ConfigError::UnresolvedReference { key, expression });
        }
    } else if out.contains_unresolved() {
        tracing::trace!("references deferred to a later pass");
    }
    Ok(out)
}

/// Returns `true` if `text` holds a `${` opener.
pub fn has_reference(text: &str) -> bool {
    text.contains(OPEN)
}

/// Finds the first unresolved value, returning its dotted key and raw text.
pub fn first_unresolved(tree: &ConfigTree) -> Option<(String, String)> {
    fn walk(value: &ConfigValue, key: ConfigKey) -> Option<(String, String)> {
        match value {
            ConfigValue::Unresolved(text) => Some((key.into_string(), text.clone())),
            ConfigValue::Sequence(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| walk(item, key.child(&i.to_string()))),
            ConfigValue::Tree(tree) => tree
                .iter()
                .find_map(|(k, v)| walk(v, key.child(k))),
            _ => None,
        }
    }
    tree.iter()
        .find_map(|(k, v)| walk(v, ConfigKey::root().child(k)))
}

/// A piece of a string: literal text or the body of a `${...}` reference.
#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Reference(&'a str),
}

/// Splits `text` into literal and reference pieces.
///
/// Braces nest, so `${outer(${inner})}` is one reference.
fn split_references(text: &str) -> Result<Vec<Piece<'_>>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            pieces.push(Piece::Text(&rest[..start]));
        }
        let body = &rest[start + OPEN.len()..];
        let mut depth = 1usize;
        let mut end = None;
        for (i, c) in body.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| ConfigError::InvalidReference {
            expression: rest[start..].to_string(),
            message: "missing closing '}'".to_string(),
        })?;
        pieces.push(Piece::Reference(&body[..end]));
        rest = &body[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// Splits a template argument list at top-level commas.
fn split_arguments(list: &str) -> Vec<&str> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                args.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&list[start..]);
    args
}

struct Resolver<'a> {
    root: &'a ConfigTree,
    templates: &'a TemplateRegistry,
    visiting: Vec<String>,
    cache: HashMap<String, ConfigValue>,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a ConfigTree, templates: &'a TemplateRegistry) -> Self {
        Self {
            root,
            templates,
            visiting: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Resolves the node at `key`. `None` means the key does not exist (yet).
    fn lookup(&mut self, key: &ConfigKey) -> Result<Option<ConfigValue>> {
        if let Some(hit) = self.cache.get(key.as_str()) {
            return Ok(Some(hit.clone()));
        }
        if self.visiting.iter().any(|k| k == key.as_str()) {
            return Err(ConfigError::ReferenceCycle {
                key: key.to_string(),
            });
        }

        let root = self.root;
        let resolved = match root.select(key) {
            Some(raw) => {
                self.visiting.push(key.to_string());
                let resolved = self.resolve_node(raw, key);
                self.visiting.pop();
                resolved?
            }
            // The key may live behind an alias, e.g. `alias: ${real}`.
            None => match key.parent() {
                Some(parent) if !parent.is_root() => match self.lookup(&parent)? {
                    Some(value) if !value.contains_unresolved() => {
                        match value.child(key.last_segment()) {
                            Some(child) => child.clone(),
                            None => return Ok(None),
                        }
                    }
                    _ => return Ok(None),
                },
                _ => return Ok(None),
            },
        };

        self.cache.insert(key.to_string(), resolved.clone());
        Ok(Some(resolved))
    }

    /// Resolves a node of the root tree; children go through the cache.
    fn resolve_node(&mut self, raw: &ConfigValue, key: &ConfigKey) -> Result<ConfigValue> {
        match raw {
            ConfigValue::String(text) | ConfigValue::Unresolved(text) => self.resolve_text(text, key),
            ConfigValue::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let child = key.child(&i.to_string());
                    out.push(match self.lookup(&child)? {
                        Some(value) => value,
                        None => item.clone(),
                    });
                }
                Ok(ConfigValue::Sequence(out))
            }
            ConfigValue::Tree(tree) => {
                let mut out = ConfigTree::new();
                for (k, item) in tree.iter() {
                    let child = key.child(k);
                    let value = match self.lookup(&child)? {
                        Some(value) => value,
                        None => item.clone(),
                    };
                    out.insert(k.clone(), value);
                }
                Ok(ConfigValue::Tree(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves a value that is not part of the root tree, such as a template body.
    fn resolve_detached(&mut self, value: ConfigValue, context: &ConfigKey) -> Result<ConfigValue> {
        match value {
            ConfigValue::String(text) | ConfigValue::Unresolved(text) => self.resolve_text(&text, context),
            ConfigValue::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_detached(item, context)?);
                }
                Ok(ConfigValue::Sequence(out))
            }
            ConfigValue::Tree(tree) => {
                let mut out = ConfigTree::new();
                for (k, item) in tree {
                    let value = self.resolve_detached(item, context)?;
                    out.insert(k, value);
                }
                Ok(ConfigValue::Tree(out))
            }
            other => Ok(other),
        }
    }

    fn resolve_text(&mut self, text: &str, key: &ConfigKey) -> Result<ConfigValue> {
        if !has_reference(text) {
            return Ok(ConfigValue::String(text.to_string()));
        }
        let pieces = split_references(text)?;

        if let [Piece::Reference(expression)] = pieces.as_slice() {
            return Ok(match self.evaluate(expression, key)? {
                Some(value) => value,
                None => ConfigValue::Unresolved(text.to_string()),
            });
        }

        let mut out = String::with_capacity(text.len());
        for piece in pieces {
            match piece {
                Piece::Text(literal) => out.push_str(literal),
                Piece::Reference(expression) => match self.evaluate(expression, key)? {
                    Some(ConfigValue::Tree(_)) | Some(ConfigValue::Sequence(_)) => {
                        return Err(ConfigError::InvalidReference {
                            expression: format!("${{{}}}", expression),
                            message: format!("'{}' cannot embed a tree or sequence in text", key),
                        })
                    }
                    Some(value) => out.push_str(&value.to_string()),
                    None => return Ok(ConfigValue::Unresolved(text.to_string())),
                },
            }
        }
        Ok(ConfigValue::String(out))
    }

    /// Evaluates one reference body. `None` means it cannot be resolved yet.
    fn evaluate(&mut self, expression: &str, key: &ConfigKey) -> Result<Option<ConfigValue>> {
        let mut expression = expression.trim().to_string();
        if let Some(caps) = CALL.captures(&expression) {
            let name = caps[1].to_string();
            let list = caps[2].to_string();
            return self.call(&name, &list, &expression, key);
        }

        // A key assembled from other references, e.g. `${servers.${active}}`.
        if has_reference(&expression) {
            match self.resolve_text(&expression, key)? {
                ConfigValue::String(inner) => expression = inner.trim().to_string(),
                _ => return Ok(None),
            }
        }

        let target = ConfigKey::from(expression.as_str());
        if !target.is_well_formed() || expression.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidReference {
                expression: format!("${{{}}}", expression),
                message: format!("not a dotted key (referenced from '{}')", key),
            });
        }
        match self.lookup(&target)? {
            Some(value) if !value.contains_unresolved() => {
                tracing::trace!(reference = %target, from = %key, "resolved reference");
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    fn call(&mut self, name: &str, list: &str, expression: &str, key: &ConfigKey) -> Result<Option<ConfigValue>> {
        let templates = self.templates;
        let Some(template) = templates.get(name) else {
            return Ok(None);
        };
        let mut args = Vec::new();
        for raw in split_arguments(list) {
            match self.argument(raw, key)? {
                Some(arg) => args.push(arg),
                None => return Ok(None),
            }
        }
        let body = template.invoke(&args)?;

        let marker = format!("{}()", expression);
        if self.visiting.contains(&marker) {
            return Err(ConfigError::ReferenceCycle {
                key: expression.to_string(),
            });
        }
        self.visiting.push(marker);
        let resolved = self.resolve_detached(body, key);
        self.visiting.pop();

        let resolved = resolved?;
        if resolved.contains_unresolved() {
            return Ok(None);
        }
        tracing::trace!(template = %name, from = %key, "expanded template call");
        Ok(Some(resolved))
    }

    /// Resolves one call argument. `None` means a reference in it cannot be resolved yet.
    ///
    /// An argument that is exactly `${ref}` takes the referenced value with its
    /// type; quoted text stays a string; other literals are typed.
    fn argument(&mut self, raw: &str, key: &ConfigKey) -> Result<Option<ConfigValue>> {
        let text = raw.trim();
        if !has_reference(text) {
            return Ok(Some(argument_value(text)));
        }
        let quoted = text.len() >= 2
            && ['"', '\''].iter().any(|&q| text.starts_with(q) && text.ends_with(q));
        let inner = if quoted { &text[1..text.len() - 1] } else { text };

        let whole = matches!(split_references(inner)?.as_slice(), [Piece::Reference(_)]);
        let value = self.resolve_text(inner, key)?;
        if value.contains_unresolved() {
            return Ok(None);
        }
        Ok(Some(match value {
            value if quoted => ConfigValue::String(value.to_string()),
            value if whole => value,
            value => argument_value(&value.to_string()),
        }))
    }
}
