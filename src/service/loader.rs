// SPDX-License-Identifier: MIT OR Apache-2.0

//! The configuration loader.
//!
//! [`ConfigLoader`] runs the per-file pipeline:
//!
//! 1. template extraction, then immediate markers over every string (import
//!    paths also get lazy markers, template parameters are never markers)
//! 2. `pre.imports`, merged left to right with the file on top
//! 3. template registration and a lenient reference pass
//! 4. `post.imports`, merged on top of the file
//! 5. for the top-level file only: lazy markers over the tree and every
//!    template body, then a strict reference pass
//! 6. the post-hook of a top-level script file

use crate::adapters::{FileReader, LoadedFile, ScriptRegistry, DEFAULT_MAX_FILE_SIZE};
use crate::domain::interpolation::{interpolate, InterpolationMode};
use crate::domain::marker::{absolute_path, substitute, substitute_tree, MarkerPass, ReplacementTable};
use crate::domain::template::extract_templates;
use crate::domain::{ConfigError, ConfigTree, ConfigValue, Result, TemplateRegistry};
use crate::ports::ConfigScript;
use crate::service::representation::{Representation, TargetKind};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Reserved section listing imports merged underneath the file.
pub const PRE_SECTION: &str = "pre";
/// Reserved section listing imports merged on top of the file.
pub const POST_SECTION: &str = "post";
/// The key holding the import list inside `pre` / `post`.
pub const IMPORTS_KEY: &str = "imports";
/// Default limit on nested imports.
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 32;

/// What a parse starts from.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigInput {
    /// A configuration file.
    Path(PathBuf),
    /// An already built tree; loading is skipped.
    Tree(ConfigTree),
}

impl From<PathBuf> for ConfigInput {
    fn from(path: PathBuf) -> Self {
        ConfigInput::Path(path)
    }
}

impl From<&Path> for ConfigInput {
    fn from(path: &Path) -> Self {
        ConfigInput::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for ConfigInput {
    fn from(path: &PathBuf) -> Self {
        ConfigInput::Path(path.clone())
    }
}

impl From<&str> for ConfigInput {
    fn from(path: &str) -> Self {
        ConfigInput::Path(PathBuf::from(path))
    }
}

impl From<String> for ConfigInput {
    fn from(path: String) -> Self {
        ConfigInput::Path(PathBuf::from(path))
    }
}

impl From<ConfigTree> for ConfigInput {
    fn from(tree: ConfigTree) -> Self {
        ConfigInput::Tree(tree)
    }
}

/// How a file entered the parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    TopLevel,
    Pre,
    Post,
}

/// State threaded through one top-level parse.
#[derive(Debug, Default)]
struct ParseState {
    templates: TemplateRegistry,
    stack: Vec<PathBuf>,
}

/// Loads configuration files with imports, markers, references and templates.
///
/// A loader is immutable once built and can be shared between threads; every
/// parse gets its own template registry.
///
/// # Examples
///
/// ```rust,no_run
/// use stratacfg::service::{ConfigLoader, TargetKind};
///
/// # fn main() -> stratacfg::domain::Result<()> {
/// let loader = ConfigLoader::builder().working_dir("/etc/myapp").build()?;
/// let cfg = loader.parse("config.toml", TargetKind::Attr)?.into_attr().unwrap();
/// println!("{}", cfg["server"]["port"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    reader: FileReader,
    working_dir: PathBuf,
    max_import_depth: usize,
}

impl ConfigLoader {
    /// Creates a loader with default settings, rooted at the current directory.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a new loader builder.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// The directory relative paths are resolved against.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The maximum import nesting.
    pub fn max_import_depth(&self) -> usize {
        self.max_import_depth
    }

    /// Locates `filename` in the OS-specific configuration directory of an application.
    ///
    /// Returns `None` when no home directory can be determined.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stratacfg::service::ConfigLoader;
    ///
    /// if let Some(path) = ConfigLoader::default_config_path("myapp", "com.example", "config.yaml") {
    ///     assert!(path.ends_with("config.yaml"));
    /// }
    /// ```
    pub fn default_config_path(app_name: &str, qualifier: &str, filename: &str) -> Option<PathBuf> {
        ProjectDirs::from(qualifier, "", app_name).map(|dirs| dirs.config_dir().join(filename))
    }

    /// Loads and fully resolves a configuration file.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ConfigTree> {
        self.load_with_templates(path.as_ref()).map(|(tree, _)| tree)
    }

    /// Runs the whole pipeline on an in-memory tree as if it had been read from `origin`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stratacfg::domain::ConfigTree;
    /// use stratacfg::service::ConfigLoader;
    ///
    /// # fn main() -> stratacfg::domain::Result<()> {
    /// let loader = ConfigLoader::builder().working_dir("/srv").build()?;
    /// let tree = ConfigTree::new()
    ///     .with("name", "$this_filename_stem")
    ///     .with("greeting", "hello ${name}");
    /// let resolved = loader.resolve(tree, "app.yaml")?;
    /// assert_eq!(resolved["greeting"], "hello app");
    /// # Ok(())
    /// # }
    /// ```
    pub fn resolve(&self, tree: ConfigTree, origin: impl AsRef<Path>) -> Result<ConfigTree> {
        let origin = absolute_path(origin.as_ref(), &self.working_dir);
        let mut state = ParseState::default();
        state.stack.push(origin.clone());
        let tree = self.process(LoadedFile::from_tree(tree), &origin, Role::TopLevel, &mut state)?;
        Ok(tree)
    }

    /// Parses `input` into the requested representation.
    ///
    /// A tree input is only converted.
    pub fn parse(&self, input: impl Into<ConfigInput>, kind: TargetKind) -> Result<Representation> {
        let (tree, templates) = match input.into() {
            ConfigInput::Path(path) => self.load_with_templates(&path)?,
            ConfigInput::Tree(tree) => (tree, TemplateRegistry::new()),
        };
        Ok(Representation::build(kind, tree, templates))
    }

    /// Parses `input` and builds a `T` from the resolved tree through serde.
    ///
    /// # Errors
    ///
    /// Loading errors as for [`ConfigLoader::parse`]; a rejection by `T` is
    /// returned as `Construction`, displaying `T`'s own error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Deserialize;
    /// use stratacfg::domain::ConfigTree;
    /// use stratacfg::service::ConfigLoader;
    ///
    /// #[derive(Deserialize)]
    /// struct Server {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// # fn main() -> stratacfg::domain::Result<()> {
    /// let loader = ConfigLoader::new()?;
    /// let tree = ConfigTree::new().with("host", "localhost").with("port", 8080);
    /// let server: Server = loader.parse_into(tree)?;
    /// assert_eq!(server.port, 8080);
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_into<T: DeserializeOwned>(&self, input: impl Into<ConfigInput>) -> Result<T> {
        let tree = self.parse(input, TargetKind::Tree)?.into_tree();
        let value = serde_json::to_value(&tree)?;
        Ok(serde_json::from_value(value)?)
    }

    fn load_with_templates(&self, path: &Path) -> Result<(ConfigTree, TemplateRegistry)> {
        let mut state = ParseState::default();
        let tree = self.load_file(path, Role::TopLevel, &mut state)?;
        Ok((tree, state.templates))
    }

    fn load_file(&self, path: &Path, role: Role, state: &mut ParseState) -> Result<ConfigTree> {
        let path = absolute_path(path, &self.working_dir);
        if state.stack.contains(&path) {
            let chain = state
                .stack
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ConfigError::ImportCycle { chain });
        }
        let depth = state.stack.len();
        if depth > self.max_import_depth {
            return Err(ConfigError::ImportDepthExceeded {
                path,
                max: self.max_import_depth,
            });
        }

        tracing::debug!(path = %path.display(), ?role, depth, "loading configuration");
        let loaded = self.reader.read(&path)?;

        state.stack.push(path.clone());
        let result = self.process(loaded, &path, role, state);
        state.stack.pop();
        result
    }

    fn process(&self, loaded: LoadedFile, origin: &Path, role: Role, state: &mut ParseState) -> Result<ConfigTree> {
        let LoadedFile { mut tree, post_hook } = loaded;
        let table = ReplacementTable::for_file(origin, &self.working_dir);

        let mut templates = extract_templates(&mut tree)?;
        for template in templates.iter_mut() {
            template.substitute_markers(&table, MarkerPass::Immediate)?;
        }
        substitute_tree(&mut tree, &table, MarkerPass::Immediate)?;
        let pre = self.take_imports(&mut tree, PRE_SECTION, origin, &table)?;
        let post = self.take_imports(&mut tree, POST_SECTION, origin, &table)?;

        if !pre.is_empty() {
            let mut base = ConfigTree::new();
            for import in &pre {
                tracing::debug!(from = %origin.display(), import = %import.display(), "merging pre-import");
                base.merge(self.load_file(import, Role::Pre, state)?);
            }
            base.merge(tree);
            tree = base;
        }

        for template in templates {
            state.templates.register(template);
        }
        if role != Role::Post {
            tree = interpolate(&tree, &state.templates, InterpolationMode::Lenient)?;
        }

        for import in &post {
            tracing::debug!(from = %origin.display(), import = %import.display(), "merging post-import");
            let imported = self.load_file(import, Role::Post, state)?;
            tree.merge(imported);
        }

        if role != Role::TopLevel {
            if post_hook.is_some() {
                tracing::warn!(path = %origin.display(), "ignoring post-hook of imported script");
            }
            return Ok(tree);
        }

        substitute_tree(&mut tree, &table, MarkerPass::Lazy)?;
        state.templates.substitute_markers(&table, MarkerPass::Lazy)?;
        let mut tree = interpolate(&tree, &state.templates, InterpolationMode::Strict)?;
        if let Some(hook) = post_hook {
            tracing::debug!(path = %origin.display(), "running post-hook");
            hook(&mut tree);
        }
        Ok(tree)
    }

    /// Removes a `pre` / `post` section and returns its resolved import paths.
    fn take_imports(
        &self,
        tree: &mut ConfigTree,
        section: &str,
        origin: &Path,
        table: &ReplacementTable,
    ) -> Result<Vec<PathBuf>> {
        let invalid = |message: String| ConfigError::InvalidImports {
            path: origin.to_path_buf(),
            message,
        };

        let imports = match tree.remove(section) {
            None | Some(ConfigValue::Null) => return Ok(Vec::new()),
            Some(ConfigValue::Tree(mut body)) => match body.remove(IMPORTS_KEY) {
                None | Some(ConfigValue::Null) => return Ok(Vec::new()),
                Some(ConfigValue::Sequence(items)) => items,
                Some(other) => {
                    return Err(invalid(format!(
                        "'{}.{}' must be a sequence, found {}",
                        section, IMPORTS_KEY, other
                    )))
                }
            },
            Some(other) => {
                return Err(invalid(format!("'{}' must be a mapping, found {}", section, other)))
            }
        };

        let mut paths = Vec::with_capacity(imports.len());
        for item in imports {
            let text = match item {
                ConfigValue::String(text) => text,
                other => {
                    return Err(invalid(format!(
                        "import entries of '{}' must be strings, found {}",
                        section, other
                    )))
                }
            };
            let resolved = substitute(&text, table, MarkerPass::All)?;
            let path = absolute_path(Path::new(&resolved), &self.working_dir);
            if path == origin {
                return Err(ConfigError::SelfImport { path });
            }
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Builder for constructing a [`ConfigLoader`].
///
/// # Examples
///
/// ```rust
/// use stratacfg::domain::ConfigTree;
/// use stratacfg::service::ConfigLoaderBuilder;
///
/// # fn main() -> stratacfg::domain::Result<()> {
/// let loader = ConfigLoaderBuilder::new()
///     .working_dir("/srv/app")
///     .max_import_depth(8)
///     .max_file_size(1024 * 1024)
///     .with_script("defaults", |_: &str| Some(ConfigTree::new().with("workers", 4)))
///     .build()?;
/// assert_eq!(loader.max_import_depth(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoaderBuilder {
    working_dir: Option<PathBuf>,
    max_import_depth: usize,
    max_file_size: u64,
    scripts: ScriptRegistry,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            working_dir: None,
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            scripts: ScriptRegistry::new(),
        }
    }

    /// Sets the directory relative paths are resolved against and `cwd` reports.
    ///
    /// Defaults to the process's current directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the maximum import nesting.
    pub fn max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    /// Sets the maximum size of a configuration file in bytes.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Registers a script for `.script` files named `<name>.script`.
    pub fn with_script<S>(mut self, name: impl Into<String>, script: S) -> Self
    where
        S: ConfigScript + 'static,
    {
        self.scripts.register(name, script);
        self
    }

    /// Builds the loader.
    ///
    /// # Errors
    ///
    /// `IoError` if no working directory was set and the current one cannot be read.
    pub fn build(self) -> Result<ConfigLoader> {
        let current = std::env::current_dir;
        let working_dir = match self.working_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => current()?.join(dir),
            None => current()?,
        };
        Ok(ConfigLoader {
            reader: FileReader::new(self.scripts, self.max_file_size),
            working_dir: absolute_path(&working_dir, Path::new("/")),
            max_import_depth: self.max_import_depth,
        })
    }
}

impl Default for ConfigLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::builder().working_dir("/work").build().unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let loader = loader();
        assert_eq!(loader.working_dir(), Path::new("/work"));
        assert_eq!(loader.max_import_depth(), DEFAULT_MAX_IMPORT_DEPTH);
    }

    #[test]
    fn test_resolve_tree_without_markers_is_identity() {
        let tree = ConfigTree::new()
            .with("a", 1)
            .with("b", ConfigTree::new().with("c", vec![ConfigValue::from("x")]));
        assert_eq!(loader().resolve(tree.clone(), "cfg.yaml").unwrap(), tree);
    }

    #[test]
    fn test_resolve_strips_reserved_sections() {
        let tree = ConfigTree::new()
            .with("pre", ConfigTree::new())
            .with("post", ConfigTree::new().with("imports", ConfigValue::Sequence(vec![])))
            .with("a", 1);
        let out = loader().resolve(tree, "cfg.yaml").unwrap();
        assert!(!out.contains_key("pre"));
        assert!(!out.contains_key("post"));
        assert_eq!(out["a"], 1);
    }

    #[test]
    fn test_resolve_markers_and_references() {
        let tree = ConfigTree::new()
            .with("dir", "$this_dir")
            .with("lazy", "$[this_filename]")
            .with("stem", "${this_filename_stem:::s/_ft//}")
            .with("data", "${dir}/data");
        let out = loader().resolve(tree, "conf/asdf_ft.yaml").unwrap();
        assert_eq!(out["dir"], "/work/conf");
        assert_eq!(out["lazy"], "asdf_ft.yaml");
        assert_eq!(out["stem"], "asdf");
        assert_eq!(out["data"], "/work/conf/data");
    }

    #[test]
    fn test_self_import_rejected() {
        let tree = ConfigTree::new().with(
            "pre",
            ConfigTree::new().with("imports", vec![ConfigValue::from("$this_file")]),
        );
        let err = loader().resolve(tree, "cfg.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::SelfImport { path } if path == Path::new("/work/cfg.yaml")));
    }

    #[test]
    fn test_invalid_import_sections() {
        let scalar = ConfigTree::new().with("pre", 3);
        assert!(matches!(
            loader().resolve(scalar, "cfg.yaml"),
            Err(ConfigError::InvalidImports { .. })
        ));

        let not_a_list = ConfigTree::new().with("post", ConfigTree::new().with("imports", "a.yaml"));
        assert!(matches!(
            loader().resolve(not_a_list, "cfg.yaml"),
            Err(ConfigError::InvalidImports { .. })
        ));

        let bad_entry = ConfigTree::new().with(
            "pre",
            ConfigTree::new().with("imports", vec![ConfigValue::from(1)]),
        );
        assert!(matches!(
            loader().resolve(bad_entry, "cfg.yaml"),
            Err(ConfigError::InvalidImports { .. })
        ));
    }

    #[test]
    fn test_tree_input_is_only_converted() {
        let tree = ConfigTree::new().with("raw", "${not_resolved}");
        let repr = loader().parse(tree.clone(), TargetKind::Tree).unwrap();
        assert_eq!(repr.into_tree(), tree);
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let tree = ConfigTree::new().with("a", "${missing.key}");
        assert!(matches!(
            loader().resolve(tree, "cfg.yaml"),
            Err(ConfigError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_templates_resolved_in_memory() {
        let tree = ConfigTree::new()
            .with("global", "G")
            .with(
                "shape(x, y)",
                ConfigTree::new().with("a", "${x}-${y}").with("b", "${global}"),
            )
            .with("s", "${shape(1,2)}");
        let out = loader().resolve(tree, "cfg.yaml").unwrap();
        assert_eq!(out["s"]["a"], "1-2");
        assert_eq!(out["s"]["b"], "G");
        assert!(!out.contains_key("shape(x, y)"));
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = ConfigLoader::default_config_path("myapp", "com.example", "config.yaml") {
            assert!(path.ends_with("config.yaml"));
        }
    }
}
