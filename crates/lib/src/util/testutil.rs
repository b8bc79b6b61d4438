//! Test utilities for fwbuild-lib.
//!
//! Builder tests run the real strategies against small shell scripts that
//! stand in for the external tools and are found first on `PATH`. Tests
//! using them change the process environment and must be `#[serial]`.

#![cfg(unix)]

use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use crate::builder::DefaultRunner;
use crate::config::BuildConfig;
use crate::execute::{BuildContext, BuildError, build};
use crate::registry::{BuildRequest, Registry};

/// A directory of fake tools.
pub struct FakeTools {
  dir: TempDir,
}

impl FakeTools {
  pub fn new() -> Self {
    Self {
      dir: TempDir::new().unwrap(),
    }
  }

  /// Install an executable `/bin/sh` script named `name`.
  pub fn script(&self, name: &str, body: &str) -> &Self {
    let path = self.dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    self
  }

  /// Run `f` with the fake tools first on `PATH`.
  pub fn with_path<T>(&self, f: impl FnOnce() -> T) -> T {
    let mut dirs = vec![self.dir.path().to_path_buf()];
    if let Some(old) = std::env::var_os("PATH") {
      dirs.extend(std::env::split_paths(&old));
    }
    let path: OsString = std::env::join_paths(dirs).unwrap();
    temp_env::with_var("PATH", Some(path), f)
  }
}

/// Script body writing `size` zero bytes to its last argument, the way
/// `mkimage` writes its output image.
pub fn writes_last_arg(size: u64) -> String {
  format!("for out; do :; done\nhead -c {size} /dev/zero > \"$out\"")
}

/// Write `len` zero bytes to `path`, creating parent directories.
pub fn stage(path: &Path, len: u64) {
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, vec![0u8; len as usize]).unwrap();
}

/// Build `name` with the default runner on a fresh runtime.
pub fn build_one(registry: Registry, config: BuildConfig, name: &str) -> Result<(), BuildError> {
  let ctx = BuildContext::new(registry, config, Arc::new(DefaultRunner));
  let request = BuildRequest::Named(vec![name.to_string()]);
  let runtime = tokio::runtime::Runtime::new().unwrap();
  runtime.block_on(build(&ctx, &request)).map(|_| ())
}

/// The size limit `err` was rejected with, as `(actual, limit, layout)`.
pub fn size_limit(err: &BuildError) -> Option<(u64, u64, &'static str)> {
  match err.root_cause() {
    BuildError::SizeLimit {
      actual, limit, layout, ..
    } => Some((*actual, *limit, *layout)),
    _ => None,
  }
}
