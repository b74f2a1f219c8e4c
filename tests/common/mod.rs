// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper utilities for file-based integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use stratacfg::service::{ConfigLoader, ConfigLoaderBuilder};
use tempfile::TempDir;

/// Installed once per test binary.
#[allow(dead_code)]
static TRACING: OnceLock<()> = OnceLock::new();

/// Routes `tracing` output through the test harness.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

/// A temporary directory holding configuration fixtures.
#[allow(dead_code)]
pub struct ConfigDir {
    dir: TempDir,
}

#[allow(dead_code)]
impl ConfigDir {
    /// Creates an empty fixture directory.
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// The directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `content` to `name` (subdirectories are created) and returns its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, content).expect("write fixture");
        path
    }

    /// A builder whose working directory is the fixture directory.
    pub fn builder(&self) -> ConfigLoaderBuilder {
        ConfigLoader::builder().working_dir(self.dir.path())
    }

    /// A loader whose working directory is the fixture directory.
    pub fn loader(&self) -> ConfigLoader {
        self.builder().build().expect("build loader")
    }
}
