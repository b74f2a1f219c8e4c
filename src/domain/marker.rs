// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contextual markers and regex commands.
//!
//! Every configuration file gets a [`ReplacementTable`] of built-in variables
//! derived from its own path. Strings refer to them with markers:
//!
//! - immediate: `$this_dir` or `${this_dir}`
//! - lazy: `$[this_dir]`, left alone until the top-level file is processed
//! - regex command: `${this_filename_stem:::s/_ft//}` applies a substitution to
//!   the variable's value before it is spliced in
//!
//! A `${name}` whose name is not a contextual variable is left untouched; it is
//! a reference for the interpolation pass.

use crate::domain::config_value::{ConfigTree, ConfigValue};
use crate::domain::errors::{ConfigError, Result};
use indexmap::IndexMap;
use regex::RegexBuilder;
use std::path::{Component, Path, PathBuf};

/// Path of the file being processed.
pub const THIS_FILE: &str = "this_file";
/// Directory holding the file.
pub const THIS_DIR: &str = "this_dir";
/// Name of the directory holding the file.
pub const THIS_DIRNAME: &str = "this_dirname";
/// File name with extension.
pub const THIS_FILENAME: &str = "this_filename";
/// File name without extension.
pub const THIS_FILENAME_STEM: &str = "this_filename_stem";
/// Extension without the leading dot.
pub const THIS_FILENAME_SUFFIX: &str = "this_filename_suffix";
/// Working directory of the loader.
pub const CWD: &str = "cwd";

const COMMAND_SEPARATOR: &str = ":::";
const REGEX_FLAGS: &str = "imsxua";

/// Which marker families a substitution pass handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerPass {
    /// `$name` and `${name}` only.
    Immediate,
    /// `$[name]` only.
    Lazy,
    /// Both families.
    All,
}

impl MarkerPass {
    fn immediate(self) -> bool {
        matches!(self, MarkerPass::Immediate | MarkerPass::All)
    }

    fn lazy(self) -> bool {
        matches!(self, MarkerPass::Lazy | MarkerPass::All)
    }
}

/// The variables available to markers of one file.
///
/// # Examples
///
/// ```
/// use stratacfg::domain::marker::{substitute, MarkerPass, ReplacementTable};
/// use std::path::Path;
///
/// let table = ReplacementTable::for_file(Path::new("/etc/app/asdf_ft.yaml"), Path::new("/"));
/// let text = substitute("${this_filename_stem:::s/_ft//}", &table, MarkerPass::All).unwrap();
/// assert_eq!(text, "asdf");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplacementTable {
    vars: IndexMap<String, String>,
}

impl ReplacementTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the built-in variables for `path`.
    ///
    /// Relative paths are resolved against `cwd`.
    pub fn for_file(path: &Path, cwd: &Path) -> Self {
        let file = absolute_path(path, cwd);
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let text = |p: Option<&std::ffi::OsStr>| {
            p.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let mut table = Self::new();
        table.insert(THIS_FILE, file.to_string_lossy());
        table.insert(THIS_DIR, dir.to_string_lossy());
        table.insert(THIS_DIRNAME, text(dir.file_name()));
        table.insert(THIS_FILENAME, text(file.file_name()));
        table.insert(THIS_FILENAME_STEM, text(file.file_stem()));
        table.insert(THIS_FILENAME_SUFFIX, text(file.extension()));
        table.insert(CWD, cwd.to_string_lossy());
        table
    }

    /// Adds or replaces a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    /// Removes a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.shift_remove(name)
    }

    /// Returns `true` if the variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Looks up a variable.
    ///
    /// An unknown name is an error listing every known variable.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownVariable {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// Iterates over the variable names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

/// Makes `path` absolute against `cwd` and removes `.` and `..` components lexically.
pub fn absolute_path(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Replaces the markers of the given families in `text`.
pub fn substitute(text: &str, table: &ReplacementTable, pass: MarkerPass) -> Result<String> {
    if !text.contains('$') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match scan_marker(after, table, pass)? {
            Some((replacement, consumed)) => {
                tracing::trace!(
                    marker = %format!("${}", &after[..consumed]),
                    value = %replacement,
                    "substituted marker"
                );
                out.push_str(&replacement);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Replaces the markers of the given families in every string of `tree`.
pub fn substitute_tree(tree: &mut ConfigTree, table: &ReplacementTable, pass: MarkerPass) -> Result<()> {
    tree.visit_strings_mut(&mut |text: &mut String| {
        if text.contains('$') {
            *text = substitute(text, table, pass)?;
        }
        Ok(())
    })
}

/// Replaces the markers of the given families in every string of `value`.
pub fn substitute_value(value: &mut ConfigValue, table: &ReplacementTable, pass: MarkerPass) -> Result<()> {
    value.visit_strings_mut(&mut |text: &mut String| {
        if text.contains('$') {
            *text = substitute(text, table, pass)?;
        }
        Ok(())
    })
}

/// Tries to read one marker from the text following a `$`.
///
/// Returns the replacement and the number of bytes consumed after the `$`.
fn scan_marker(after: &str, table: &ReplacementTable, pass: MarkerPass) -> Result<Option<(String, usize)>> {
    if let Some(body) = after.strip_prefix('{') {
        if !pass.immediate() {
            return Ok(None);
        }
        return match parse_body(body, '{', '}')? {
            Some((MarkerBody::Variable(name), used)) if table.contains(name) => {
                Ok(Some((table.get(name)?.to_string(), used + 1)))
            }
            Some((MarkerBody::Command(name, command), used)) => {
                let value = table.get(name)?;
                Ok(Some((command.apply(value)?, used + 1)))
            }
            _ => Ok(None),
        };
    }

    if let Some(body) = after.strip_prefix('[') {
        if !pass.lazy() {
            return Ok(None);
        }
        return match parse_body(body, '[', ']')? {
            Some((MarkerBody::Variable(name), used)) => {
                Ok(Some((table.get(name)?.to_string(), used + 1)))
            }
            Some((MarkerBody::Command(name, command), used)) => {
                let value = table.get(name)?;
                Ok(Some((command.apply(value)?, used + 1)))
            }
            None => Ok(None),
        };
    }

    if pass.immediate() {
        let name = &after[..identifier_len(after)];
        if !name.is_empty() && table.contains(name) {
            return Ok(Some((table.get(name)?.to_string(), name.len())));
        }
    }
    Ok(None)
}

enum MarkerBody<'a> {
    Variable(&'a str),
    Command(&'a str, RegexCommand),
}

fn identifier_len(text: &str) -> usize {
    if text.starts_with(|c: char| c.is_ascii_digit()) {
        return 0;
    }
    text.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len())
}

/// Parses `name}` or `name:::command}` (with the matching closing bracket).
///
/// Returns the body and the bytes consumed including the closing bracket, or
/// `None` when the text is not shaped like a contextual marker.
fn parse_body(body: &str, open: char, close: char) -> Result<Option<(MarkerBody<'_>, usize)>> {
    let name_len = identifier_len(body);
    if name_len == 0 {
        return Ok(None);
    }
    let name = &body[..name_len];
    let rest = &body[name_len..];

    if rest.starts_with(close) {
        return Ok(Some((MarkerBody::Variable(name), name_len + 1)));
    }
    if let Some(command_text) = rest.strip_prefix(COMMAND_SEPARATOR) {
        let marker = match body.find(close) {
            Some(end) => format!("${}{}", open, &body[..=end]),
            None => format!("${}{}", open, body),
        };
        let (command, used) = RegexCommand::parse(command_text, close, &marker)?;
        return Ok(Some((
            MarkerBody::Command(name, command),
            name_len + COMMAND_SEPARATOR.len() + used,
        )));
    }
    Ok(None)
}

/// A sed-like substitution embedded in a marker body: `s/pattern/replacement/flags`.
///
/// Every match is replaced. Flags: `i` case-insensitive, `m` multi-line,
/// `s` dot matches newline, `x` ignore whitespace, `u` unicode, `a` ASCII only.
/// Replacements may use `\1` or `\g<name>` group references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexCommand {
    pattern: String,
    replacement: String,
    flags: String,
    marker: String,
}

impl RegexCommand {
    /// Parses a command up to and including the `close` character.
    ///
    /// Returns the command and the number of bytes consumed.
    pub fn parse(text: &str, close: char, marker: &str) -> Result<(RegexCommand, usize)> {
        let invalid = |message: &str| ConfigError::InvalidMarker {
            marker: marker.to_string(),
            message: message.to_string(),
        };

        let keyword_len = text
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let keyword = &text[..keyword_len];
        if keyword.is_empty() {
            return Err(invalid("missing command after ':::'"));
        }
        if keyword != "s" {
            return Err(ConfigError::UnsupportedInterpolationCommand {
                command: keyword.to_string(),
                marker: marker.to_string(),
            });
        }

        let mut cursor = Cursor {
            text,
            pos: keyword_len,
        };
        let delimiter = cursor
            .bump()
            .ok_or_else(|| invalid("missing delimiter"))?;
        if delimiter.is_alphanumeric() || delimiter.is_whitespace() || delimiter == '\\' || delimiter == close {
            return Err(invalid("invalid delimiter"));
        }
        let pattern = cursor
            .section(delimiter)
            .ok_or_else(|| invalid("unterminated pattern"))?;
        let replacement = cursor
            .section(delimiter)
            .ok_or_else(|| invalid("unterminated replacement"))?;

        let mut flags = String::new();
        while let Some(c) = cursor.peek().filter(|c| c.is_ascii_alphabetic()) {
            if !REGEX_FLAGS.contains(c) {
                return Err(ConfigError::UnknownRegexFlag {
                    flag: c,
                    marker: marker.to_string(),
                });
            }
            flags.push(c);
            cursor.bump();
        }
        if cursor.bump() != Some(close) {
            return Err(invalid("unterminated marker"));
        }

        Ok((
            RegexCommand {
                pattern,
                replacement,
                flags,
                marker: marker.to_string(),
            },
            cursor.pos,
        ))
    }

    /// The regex pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The replacement text, as written in the marker.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// The flag letters.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Applies the substitution to `input`.
    pub fn apply(&self, input: &str) -> Result<String> {
        let mut builder = RegexBuilder::new(&self.pattern);
        for flag in self.flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'u' => builder.unicode(true),
                'a' => builder.unicode(false),
                other => {
                    return Err(ConfigError::UnknownRegexFlag {
                        flag: other,
                        marker: self.marker.clone(),
                    })
                }
            };
        }
        let regex = builder.build().map_err(|source| ConfigError::InvalidRegex {
            pattern: self.pattern.clone(),
            source,
        })?;
        let replacement = translate_replacement(&self.replacement);
        Ok(regex.replace_all(input, replacement.as_str()).into_owned())
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Reads up to the next unescaped `delimiter`; `\<delimiter>` yields the delimiter.
    fn section(&mut self, delimiter: char) -> Option<String> {
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    c if c == delimiter => out.push(c),
                    c => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                c if c == delimiter => return Some(out),
                c => out.push(c),
            }
        }
    }
}

/// Converts `\1` / `\g<name>` group references into the `${1}` / `${name}` form
/// and escapes literal `$`.
fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::from(d);
                    while let Some(next) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(next);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') if chars.peek() == Some(&'<') => {
                    chars.next();
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    out.push_str(&format!("${{{}}}", name));
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReplacementTable {
        ReplacementTable::for_file(Path::new("/configs/test/asdf_ft.yaml"), Path::new("/work"))
    }

    #[test]
    fn test_for_file_variables() {
        let table = table();
        assert_eq!(table.get(THIS_FILE).unwrap(), "/configs/test/asdf_ft.yaml");
        assert_eq!(table.get(THIS_DIR).unwrap(), "/configs/test");
        assert_eq!(table.get(THIS_DIRNAME).unwrap(), "test");
        assert_eq!(table.get(THIS_FILENAME).unwrap(), "asdf_ft.yaml");
        assert_eq!(table.get(THIS_FILENAME_STEM).unwrap(), "asdf_ft");
        assert_eq!(table.get(THIS_FILENAME_SUFFIX).unwrap(), "yaml");
        assert_eq!(table.get(CWD).unwrap(), "/work");
    }

    #[test]
    fn test_relative_path_resolved_against_cwd() {
        let table = ReplacementTable::for_file(Path::new("./conf/../app.toml"), Path::new("/work"));
        assert_eq!(table.get(THIS_FILE).unwrap(), "/work/app.toml");
        assert_eq!(table.get(THIS_DIRNAME).unwrap(), "work");
    }

    #[test]
    fn test_unknown_variable_lists_known() {
        let err = table().get("nope").unwrap_err();
        match err {
            ConfigError::UnknownVariable { name, known } => {
                assert_eq!(name, "nope");
                assert!(known.contains("this_filename_stem"));
                assert!(known.contains("cwd"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_immediate_both_syntaxes() {
        let t = table();
        assert_eq!(
            substitute("$this_dir/base.yaml", &t, MarkerPass::Immediate).unwrap(),
            "/configs/test/base.yaml"
        );
        assert_eq!(
            substitute("${this_dir}/base.yaml", &t, MarkerPass::Immediate).unwrap(),
            "/configs/test/base.yaml"
        );
    }

    #[test]
    fn test_bare_marker_matches_whole_identifier() {
        let t = table();
        assert_eq!(
            substitute("$this_filename_stem", &t, MarkerPass::Immediate).unwrap(),
            "asdf_ft"
        );
        assert_eq!(
            substitute("$this_filename", &t, MarkerPass::Immediate).unwrap(),
            "asdf_ft.yaml"
        );
    }

    #[test]
    fn test_unknown_names_left_for_references() {
        let t = table();
        let text = "${db.host}:$PORT ${shape(1, 2)} $ 5$";
        assert_eq!(substitute(text, &t, MarkerPass::Immediate).unwrap(), text);
    }

    #[test]
    fn test_immediate_pass_skips_lazy_markers() {
        let t = table();
        assert_eq!(
            substitute("$[this_file]", &t, MarkerPass::Immediate).unwrap(),
            "$[this_file]"
        );
        assert_eq!(
            substitute("${this_file}", &t, MarkerPass::Lazy).unwrap(),
            "${this_file}"
        );
    }

    #[test]
    fn test_lazy_marker() {
        let t = table();
        assert_eq!(
            substitute("name=$[this_filename]", &t, MarkerPass::Lazy).unwrap(),
            "name=asdf_ft.yaml"
        );
    }

    #[test]
    fn test_lazy_unknown_variable_is_error() {
        let err = substitute("$[this_fiel]", &table(), MarkerPass::Lazy).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariable { .. }));
    }

    #[test]
    fn test_regex_command_replaces_marker_occurrence() {
        let mut t = ReplacementTable::new();
        t.insert(THIS_FILENAME_STEM, "asdf_ft");
        let cases = [
            ("$[this_filename_stem:::s/_ft//]", "asdf"),
            ("$[this_filename_stem:::s/asdf/1234/]", "1234_ft"),
            ("$[this_filename_stem:::s/asdf/1234/]_v", "1234_ft_v"),
            ("${this_filename_stem:::s/_ft//}", "asdf"),
        ];
        for (marker, expected) in cases {
            assert_eq!(substitute(marker, &t, MarkerPass::All).unwrap(), expected, "{marker}");
        }
    }

    #[test]
    fn test_regex_command_with_brackets_in_pattern() {
        let mut t = ReplacementTable::new();
        t.insert("this_file", "/a/test_interpolation.toml");
        let text = "$[this_file:::s/[a-z]+\\.toml/x.json/]";
        assert_eq!(substitute(text, &t, MarkerPass::Lazy).unwrap(), "/a/test_x.json");
    }

    #[test]
    fn test_regex_flags() {
        let mut t = ReplacementTable::new();
        t.insert("name", "Hello");
        assert_eq!(
            substitute("${name:::s/hello/bye/i}", &t, MarkerPass::All).unwrap(),
            "bye"
        );
        assert_eq!(
            substitute("${name:::s/hello/bye/}", &t, MarkerPass::All).unwrap(),
            "Hello"
        );
    }

    #[test]
    fn test_regex_group_references() {
        let mut t = ReplacementTable::new();
        t.insert("name", "run_042");
        assert_eq!(
            substitute(r"${name:::s/run_(\d+)/\1-$/}", &t, MarkerPass::All).unwrap(),
            "042-$"
        );
    }

    #[test]
    fn test_escaped_delimiter() {
        let mut t = ReplacementTable::new();
        t.insert("path", "a/b");
        assert_eq!(
            substitute(r"${path:::s/\//_/}", &t, MarkerPass::All).unwrap(),
            "a_b"
        );
    }

    #[test]
    fn test_unknown_regex_flag() {
        let err = substitute("${this_file:::s/a/b/q}", &table(), MarkerPass::All).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegexFlag { flag: 'q', .. }));
    }

    #[test]
    fn test_unsupported_command() {
        let err = substitute("${this_file:::y/a/b/}", &table(), MarkerPass::All).unwrap_err();
        match err {
            ConfigError::UnsupportedInterpolationCommand { command, marker } => {
                assert_eq!(command, "y");
                assert_eq!(marker, "${this_file:::y/a/b/}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_command_on_unknown_variable() {
        let err = substitute("${nope:::s/a/b/}", &table(), MarkerPass::All).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariable { .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let err = substitute("${this_file:::s/(/b/}", &table(), MarkerPass::All).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_unterminated_command() {
        let err = substitute("${this_file:::s/a/b", &table(), MarkerPass::All).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMarker { .. }));
    }

    #[test]
    fn test_substitute_tree() {
        let mut tree = ConfigTree::new()
            .with("path", "$this_dir/data")
            .with("lazy", "$[this_filename]")
            .with("num", 3);
        substitute_tree(&mut tree, &table(), MarkerPass::Immediate).unwrap();
        assert_eq!(tree["path"], "/configs/test/data");
        assert_eq!(tree["lazy"], "$[this_filename]");
        assert_eq!(tree["num"], 3);
    }

    #[test]
    fn test_substitute_value_with_removed_variable() {
        let mut t = table();
        assert_eq!(t.remove(CWD).as_deref(), Some("/work"));
        let mut value = ConfigValue::from(vec![
            ConfigValue::from("${cwd}/$[this_filename]"),
            ConfigValue::from(ConfigTree::new().with("dir", "$this_dirname")),
        ]);
        substitute_value(&mut value, &t, MarkerPass::All).unwrap();
        assert_eq!(value[0], "${cwd}/asdf_ft.yaml");
        assert_eq!(value[1]["dir"], "test");
    }

    #[test]
    fn test_non_ascii_text_preserved() {
        let t = table();
        assert_eq!(
            substitute("žluťoučký $cwd kůň", &t, MarkerPass::All).unwrap(),
            "žluťoučký /work kůň"
        );
    }
}
