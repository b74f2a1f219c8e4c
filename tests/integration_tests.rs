// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for loading single files.
//!
//! These tests verify format detection, the output representations and the
//! typed construction path end to end, using fixtures written to a temporary
//! directory.

mod common;

use common::ConfigDir;
use serde::Deserialize;
use std::sync::Arc;
use stratacfg::domain::{ConfigAccess, ConfigError, ConfigKey, ConfigTree, ConfigValue, FlattenOptions};
use stratacfg::ports::{ConfigScript, PostHook};
use stratacfg::service::{ConfigInput, Representation, TargetKind};

const FAMILY_TOML: &str = r#"
[my]
mother = 1

[your.dad]
father = 1
"#;

fn family() -> ConfigTree {
    ConfigTree::new()
        .with("my", ConfigTree::new().with("mother", 1))
        .with(
            "your",
            ConfigTree::new().with("dad", ConfigTree::new().with("father", 1)),
        )
}

#[test]
fn test_read_attr() {
    let dir = ConfigDir::new();
    let path = dir.write("test.toml", FAMILY_TOML);

    let cfg = dir
        .loader()
        .parse(&path, TargetKind::Attr)
        .unwrap()
        .into_attr()
        .unwrap();

    assert_eq!(cfg["my"]["mother"], 1);
    assert_eq!(cfg["your"]["dad"]["father"], 1);
    assert_eq!(cfg.tree(), &family());
}

#[test]
fn test_same_tree_from_every_format() {
    let dir = ConfigDir::new();
    let toml = dir.write("test.toml", FAMILY_TOML);
    let yaml = dir.write("test.yaml", "my:\n  mother: 1\nyour:\n  dad:\n    father: 1\n");
    let yml = dir.write("test2.YML", "my: {mother: 1}\nyour: {dad: {father: 1}}\n");
    let json = dir.write("test.json", r#"{"my": {"mother": 1}, "your": {"dad": {"father": 1}}}"#);

    let loader = dir.loader();
    for path in [toml, yaml, yml, json] {
        assert_eq!(loader.load(&path).unwrap(), family(), "{}", path.display());
    }
}

#[test]
fn test_relative_path_uses_working_dir() {
    let dir = ConfigDir::new();
    dir.write("conf/app.yaml", "name: app\n");
    let tree = dir.loader().load("conf/app.yaml").unwrap();
    assert_eq!(tree["name"], "app");
}

#[test]
fn test_path_not_found_vs_unsupported_format() {
    let dir = ConfigDir::new();
    let loader = dir.loader();

    let missing = loader.load(dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(missing, ConfigError::PathNotFound { .. }));

    let ini = dir.write("app.ini", "[section]\nkey=value\n");
    let unsupported = loader.load(&ini).unwrap_err();
    assert!(matches!(unsupported, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_parse_error_reported() {
    let dir = ConfigDir::new();
    let path = dir.write("broken.yaml", "key: [unclosed\n");
    let err = dir.loader().load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_file_size_limit() {
    let dir = ConfigDir::new();
    let path = dir.write("big.yaml", &format!("blob: {}\n", "x".repeat(2048)));
    let loader = dir.builder().max_file_size(1024).build().unwrap();
    assert!(matches!(
        loader.load(&path),
        Err(ConfigError::FileTooLarge { max: 1024, .. })
    ));
}

#[test]
fn test_every_representation() {
    let dir = ConfigDir::new();
    let path = dir.write("test.toml", FAMILY_TOML);
    let loader = dir.loader();

    let tree = loader.parse(&path, "dict".parse().unwrap()).unwrap();
    assert!(matches!(tree, Representation::Tree(_)));

    let attr = loader.parse(&path, "attr".parse().unwrap()).unwrap();
    assert!(matches!(attr, Representation::Attr(_)));

    let reference = loader.parse(&path, "ref".parse().unwrap()).unwrap();
    assert!(matches!(reference, Representation::Reference(_)));
    assert_eq!(reference.into_reference().unwrap(), family());
}

#[test]
fn test_tree_input_skips_loading() {
    let dir = ConfigDir::new();
    let input = ConfigInput::from(family().with("raw", "$this_file"));
    let repr = dir.loader().parse(input, TargetKind::Attr).unwrap();
    assert_eq!(repr.tree()["raw"], "$this_file");
}

#[derive(Debug, Deserialize, PartialEq)]
struct Server {
    host: String,
    port: u16,
    tags: Vec<String>,
}

#[test]
fn test_parse_into_typed_record() {
    let dir = ConfigDir::new();
    let path = dir.write(
        "server.yaml",
        "host: ${name}.internal\nname: db\nport: 5432\ntags: [a, b]\n",
    );
    let server: Server = dir.loader().parse_into(&path).unwrap();
    assert_eq!(
        server,
        Server {
            host: "db.internal".to_string(),
            port: 5432,
            tags: vec!["a".to_string(), "b".to_string()],
        }
    );
}

#[test]
fn test_parse_into_surfaces_construction_error() {
    let dir = ConfigDir::new();
    let path = dir.write("server.yaml", "host: db\nport: not-a-number\ntags: []\n");
    let err = dir.loader().parse_into::<Server>(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Construction(_)));
    assert!(err.to_string().contains("invalid type"));
}

#[test]
fn test_access_helpers() {
    let dir = ConfigDir::new();
    let path = dir.write(
        "app.yaml",
        "server:\n  port: \"8080\"\n  debug: \"yes\"\n  ratio: 0.25\n",
    );
    let cfg = dir.loader().parse(&path, TargetKind::Tree).unwrap();

    let port = cfg.get(&ConfigKey::from("server.port")).unwrap();
    assert_eq!(port.to_i64("server.port").unwrap(), 8080);
    assert!(cfg.get(&ConfigKey::from("server.debug")).unwrap().to_bool("server.debug").unwrap());
    assert_eq!(cfg.get(&ConfigKey::from("server.ratio")).unwrap(), &ConfigValue::Float(0.25));
    assert_eq!(
        cfg.get_or(&ConfigKey::from("server.workers"), ConfigValue::from(4)),
        4
    );
}

#[test]
fn test_doc_flatten() {
    let dir = ConfigDir::new();
    let path = dir.write(
        "documented.yaml",
        r#"
_doc_: lol
something:
  _doc_: lol
  subsomething:
    _doc_: Now this is something!
    value: 1
"#,
    );
    let tree = dir.loader().load(&path).unwrap();
    let docs = tree.flatten(&FlattenOptions::docs());
    let keys: Vec<_> = docs.keys().cloned().collect();
    assert_eq!(keys, vec!["", "something", "something.subsomething"]);
    assert_eq!(docs["something.subsomething"], "Now this is something!");
}

struct Paths;

impl ConfigScript for Paths {
    fn config(&self, source: &str) -> Option<ConfigTree> {
        let root = source.trim();
        Some(
            ConfigTree::new()
                .with("root", root)
                .with("data", "${root}/data")
                .with("name", "$this_filename_stem"),
        )
    }

    fn post_hook(&self) -> Option<PostHook> {
        Some(Arc::new(|tree: &mut ConfigTree| {
            tree.insert("finalized", true);
        }))
    }
}

#[test]
fn test_script_config_with_post_hook() {
    let dir = ConfigDir::new();
    let path = dir.write("paths.script", "/srv\n");
    let loader = dir.builder().with_script("paths", Paths).build().unwrap();

    let tree = loader.load(&path).unwrap();
    assert_eq!(tree["root"], "/srv");
    assert_eq!(tree["data"], "/srv/data");
    assert_eq!(tree["name"], "paths");
    assert_eq!(tree["finalized"], true);
}

#[test]
fn test_script_errors() {
    let dir = ConfigDir::new();
    let path = dir.write("unknown.script", "");
    let err = dir.loader().load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ScriptNotRegistered { .. }));

    let empty = dir.write("empty.script", "");
    let loader = dir
        .builder()
        .with_script("empty", |_: &str| -> Option<ConfigTree> { None })
        .build()
        .unwrap();
    assert!(matches!(
        loader.load(&empty),
        Err(ConfigError::MissingConfigVariable { .. })
    ));
}

#[test]
fn test_crate_level_parse_with_tree() {
    let repr = stratacfg::parse(family(), TargetKind::Tree).unwrap();
    assert_eq!(repr.into_tree(), family());
}
