// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parameterized templates.
//!
//! A top-level key shaped like `name(p1, p2)` declares a template. The section
//! is removed from the tree and registered under `name`; references elsewhere
//! call it as `${name(a1, a2)}`. A call substitutes only `${p1}` and `${p2}`
//! in a fresh copy of the template body. Any other `${...}` stays in place for
//! the regular reference pass.

use crate::domain::config_value::{ConfigTree, ConfigValue};
use crate::domain::errors::{ConfigError, Result};
use crate::domain::marker::{substitute_value, MarkerPass, ReplacementTable};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TEMPLATE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*$").expect("template key regex is valid")
});

static PARAM_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("parameter reference regex is valid")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// A named, reusable configuration fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    name: String,
    params: Vec<String>,
    body: ConfigValue,
}

impl Template {
    /// Creates a template.
    pub fn new(name: impl Into<String>, params: Vec<String>, body: impl Into<ConfigValue>) -> Self {
        Self {
            name: name.into(),
            params,
            body: body.into(),
        }
    }

    /// Parses a section key like `shape(x, y)` into its name and parameters.
    ///
    /// Returns `Ok(None)` for keys that are not shaped like a template.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::template::Template;
    ///
    /// let (name, params) = Template::parse_key("shape(x, y)").unwrap().unwrap();
    /// assert_eq!(name, "shape");
    /// assert_eq!(params, vec!["x", "y"]);
    /// assert!(Template::parse_key("shape").unwrap().is_none());
    /// ```
    pub fn parse_key(key: &str) -> Result<Option<(String, Vec<String>)>> {
        let Some(caps) = TEMPLATE_KEY.captures(key) else {
            return Ok(None);
        };
        let name = caps[1].to_string();
        let list = caps[2].trim();
        if list.is_empty() {
            return Ok(Some((name, Vec::new())));
        }

        let mut params: Vec<String> = Vec::new();
        for param in list.split(',').map(str::trim) {
            if !IDENTIFIER.is_match(param) {
                return Err(ConfigError::InvalidTemplate {
                    key: key.to_string(),
                    message: format!("'{}' is not a valid parameter name", param),
                });
            }
            if params.iter().any(|p| p == param) {
                return Err(ConfigError::InvalidTemplate {
                    key: key.to_string(),
                    message: format!("parameter '{}' is declared twice", param),
                });
            }
            params.push(param.to_string());
        }
        Ok(Some((name, params)))
    }

    /// The template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter names.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The unsubstituted body.
    pub fn body(&self) -> &ConfigValue {
        &self.body
    }

    /// Applies contextual markers to the body.
    ///
    /// Markers named like one of the parameters are left for [`Template::invoke`].
    pub fn substitute_markers(&mut self, table: &ReplacementTable, pass: MarkerPass) -> Result<()> {
        let mut table = table.clone();
        for param in &self.params {
            table.remove(param);
        }
        substitute_value(&mut self.body, &table, pass)
    }

    /// Instantiates the template.
    ///
    /// A string that is exactly `${param}` takes the argument with its type;
    /// occurrences embedded in text take its textual form.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratacfg::domain::config_value::{ConfigTree, ConfigValue};
    /// use stratacfg::domain::template::Template;
    ///
    /// let body = ConfigTree::new().with("a", "${x}-${y}").with("b", "${global}");
    /// let shape = Template::new("shape", vec!["x".into(), "y".into()], body);
    /// let out = shape.invoke(&[ConfigValue::from(1), ConfigValue::from(2)]).unwrap();
    /// assert_eq!(out["a"], "1-2");
    /// assert_eq!(out["b"], "${global}");
    /// ```
    pub fn invoke(&self, args: &[ConfigValue]) -> Result<ConfigValue> {
        if args.len() != self.params.len() {
            return Err(ConfigError::ArgumentCountMismatch {
                name: self.name.clone(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        let bindings: IndexMap<&str, &ConfigValue> = self
            .params
            .iter()
            .map(String::as_str)
            .zip(args.iter())
            .collect();

        let mut out = self.body.clone();
        bind_params(&mut out, &bindings);
        Ok(out)
    }
}

fn bind_params(value: &mut ConfigValue, bindings: &IndexMap<&str, &ConfigValue>) {
    match value {
        ConfigValue::String(text) | ConfigValue::Unresolved(text) => {
            if let Some(arg) = whole_param(text, bindings) {
                *value = arg.clone();
                return;
            }
            let replaced = PARAM_REF.replace_all(text, |caps: &Captures<'_>| {
                match bindings.get(&caps[1]) {
                    Some(arg) => arg.to_string(),
                    None => caps[0].to_string(),
                }
            });
            if let std::borrow::Cow::Owned(replaced) = replaced {
                *text = replaced;
            }
        }
        ConfigValue::Sequence(items) => {
            for item in items.iter_mut() {
                bind_params(item, bindings);
            }
        }
        ConfigValue::Tree(tree) => {
            let entries = std::mem::take(tree);
            *tree = entries
                .into_iter()
                .map(|(key, mut value)| {
                    bind_params(&mut value, bindings);
                    (key, value)
                })
                .collect();
        }
        _ => {}
    }
}

fn whole_param<'a>(text: &str, bindings: &IndexMap<&str, &'a ConfigValue>) -> Option<&'a ConfigValue> {
    let caps = PARAM_REF.captures(text)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != text.len() {
        return None;
    }
    bindings.get(&caps[1]).copied()
}

/// Converts the text of a call argument into a typed value.
///
/// Quoted text stays a string; otherwise `null`, booleans, integers and floats
/// are recognized.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::config_value::ConfigValue;
/// use stratacfg::domain::template::argument_value;
///
/// assert_eq!(argument_value("1"), ConfigValue::Integer(1));
/// assert_eq!(argument_value("'1'"), ConfigValue::from("1"));
/// assert_eq!(argument_value(" red "), ConfigValue::from("red"));
/// ```
pub fn argument_value(text: &str) -> ConfigValue {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return ConfigValue::String(text[1..text.len() - 1].to_string());
        }
    }
    match text {
        "null" | "~" => return ConfigValue::Null,
        "true" | "True" | "TRUE" => return ConfigValue::Bool(true),
        "false" | "False" | "FALSE" => return ConfigValue::Bool(false),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return ConfigValue::Integer(n);
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = text.parse::<f64>() {
            return ConfigValue::Float(f);
        }
    }
    ConfigValue::String(text.to_string())
}

/// Removes the top-level template sections from `tree` and returns them.
///
/// Nested keys are never treated as templates.
pub fn extract_templates(tree: &mut ConfigTree) -> Result<Vec<Template>> {
    let mut found = Vec::new();
    for key in tree.keys() {
        if let Some((name, params)) = Template::parse_key(key)? {
            found.push((key.clone(), name, params));
        }
    }

    let mut templates = Vec::with_capacity(found.len());
    for (key, name, params) in found {
        if let Some(body) = tree.remove(&key) {
            templates.push(Template::new(name, params, body));
        }
    }
    Ok(templates)
}

/// The templates visible to one top-level parse.
///
/// Registering a name twice replaces the earlier template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Template>,
}

impl TemplateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template, returning the one it replaces.
    pub fn register(&mut self, template: Template) -> Option<Template> {
        let name = template.name().to_string();
        let previous = self.templates.insert(name.clone(), template);
        if previous.is_some() {
            tracing::debug!(template = %name, "template redefined");
        } else {
            tracing::debug!(template = %name, "template registered");
        }
        previous
    }

    /// Looks up a template by name.
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Returns `true` if a template with that name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Iterates over the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Applies contextual markers to every registered body.
    pub fn substitute_markers(&mut self, table: &ReplacementTable, pass: MarkerPass) -> Result<()> {
        for template in self.templates.values_mut() {
            template.substitute_markers(table, pass)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_key_variants() {
        assert_eq!(
            Template::parse_key("f()").unwrap(),
            Some(("f".to_string(), vec![]))
        );
        assert_eq!(
            Template::parse_key(" pair ( a ,b ) ").unwrap(),
            Some(("pair".to_string(), vec!["a".to_string(), "b".to_string()]))
        );
        assert!(Template::parse_key("plain_key").unwrap().is_none());
        assert!(Template::parse_key("broken(x").unwrap().is_none());
    }

    #[test]
    fn test_parse_key_rejects_bad_params() {
        assert!(matches!(
            Template::parse_key("f(a,,b)"),
            Err(ConfigError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            Template::parse_key("f(a, a)"),
            Err(ConfigError::InvalidTemplate { .. })
        ));
        assert!(matches!(
            Template::parse_key("f(1x)"),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_extract_only_top_level() {
        let mut tree = ConfigTree::new()
            .with("shape(x, y)", ConfigTree::new().with("a", "${x}"))
            .with("nested", ConfigTree::new().with("inner(z)", 1))
            .with("plain", 2);
        let templates = extract_templates(&mut tree).unwrap();

        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "shape");
        assert!(!tree.contains_key("shape(x, y)"));
        assert!(tree["nested"].as_tree().unwrap().contains_key("inner(z)"));
        assert_eq!(tree["plain"], 2);
    }

    #[test]
    fn test_invoke_typed_whole_param() {
        let body = ConfigTree::new().with("n", "${x}").with("s", "n=${x}");
        let t = Template::new("t", vec!["x".to_string()], body);
        let out = t.invoke(&[ConfigValue::from(5)]).unwrap();
        assert_eq!(out["n"], 5);
        assert_eq!(out["s"], "n=5");
    }

    #[test]
    fn test_invoke_leaves_other_references() {
        let body = ConfigTree::new().with("a", "${x}-${y}").with("b", "${global}");
        let t = Template::new("shape", vec!["x".to_string(), "y".to_string()], body);
        let out = t.invoke(&[ConfigValue::from(1), ConfigValue::from(2)]).unwrap();
        assert_eq!(out["a"], "1-2");
        assert_eq!(out["b"], "${global}");
    }

    #[test]
    fn test_invoke_inside_sequences() {
        let body = ConfigValue::from(vec![ConfigValue::from("${x}"), ConfigValue::from("${x}!")]);
        let t = Template::new("t", vec!["x".to_string()], body);
        let out = t.invoke(&[ConfigValue::from("hey")]).unwrap();
        assert_eq!(out[0], "hey");
        assert_eq!(out[1], "hey!");
    }

    #[test]
    fn test_invoke_argument_count_mismatch() {
        let t = Template::new("shape", vec!["x".to_string(), "y".to_string()], ConfigValue::Null);
        let err = t.invoke(&[ConfigValue::from(1)]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ArgumentCountMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_invoke_does_not_mutate_template() {
        let t = Template::new("t", vec!["x".to_string()], ConfigTree::new().with("a", "${x}"));
        let _ = t.invoke(&[ConfigValue::from(1)]).unwrap();
        assert_eq!(t.body()["a"], "${x}");
    }

    #[test]
    fn test_registry_last_write_wins() {
        let mut registry = TemplateRegistry::new();
        assert!(registry
            .register(Template::new("t", vec![], ConfigValue::from(1)))
            .is_none());
        let previous = registry.register(Template::new("t", vec![], ConfigValue::from(2)));
        assert_eq!(previous.unwrap().body(), &ConfigValue::from(1));
        assert_eq!(registry.get("t").unwrap().body(), &ConfigValue::from(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_markers_skip_parameter_names() {
        let table = ReplacementTable::for_file(Path::new("/etc/app/main.yaml"), Path::new("/work"));
        let mut t = Template::new(
            "t",
            vec!["cwd".to_string()],
            ConfigTree::new()
                .with("v", "${cwd}")
                .with("dir", "$this_dir")
                .with("name", "$[this_filename]"),
        );
        t.substitute_markers(&table, MarkerPass::Immediate).unwrap();
        assert_eq!(t.body()["v"], "${cwd}");
        assert_eq!(t.body()["dir"], "/etc/app");
        assert_eq!(t.body()["name"], "$[this_filename]");

        let out = t.invoke(&[ConfigValue::from("here")]).unwrap();
        assert_eq!(out["v"], "here");
    }

    #[test]
    fn test_registry_lazy_markers() {
        let table = ReplacementTable::for_file(Path::new("/etc/app/main.yaml"), Path::new("/work"));
        let mut registry = TemplateRegistry::new();
        registry.register(Template::new(
            "t",
            vec![],
            ConfigTree::new().with("name", "$[this_filename]"),
        ));
        registry.substitute_markers(&table, MarkerPass::Lazy).unwrap();
        assert_eq!(registry.get("t").unwrap().body()["name"], "main.yaml");
    }

    #[test]
    fn test_argument_value_types() {
        assert_eq!(argument_value("2.5"), ConfigValue::Float(2.5));
        assert_eq!(argument_value("true"), ConfigValue::Bool(true));
        assert_eq!(argument_value("null"), ConfigValue::Null);
        assert_eq!(argument_value("\"a, b\""), ConfigValue::from("a, b"));
        assert_eq!(argument_value("nan"), ConfigValue::from("nan"));
    }
}
