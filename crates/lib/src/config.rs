//! Run configuration.
//!
//! A `BuildConfig` is resolved once per invocation and handed to every
//! builder through the `BuildContext`. Nothing in the library reads
//! process-wide option state.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::image::version::ReleaseKind;

/// CA bundle installed into initramfs images by default.
pub const HOST_CA_BUNDLE: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Flash partitioning scheme the bundle is packaged for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlashLayout {
  /// One combined kernel+ramdisk image.
  #[default]
  Current,
  /// Combined image split into fixed kernel and ramdisk regions.
  Legacy,
}

impl FlashLayout {
  pub fn from_legacy_flag(legacy: bool) -> Self {
    if legacy { FlashLayout::Legacy } else { FlashLayout::Current }
  }

  pub fn is_legacy(self) -> bool {
    matches!(self, FlashLayout::Legacy)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      FlashLayout::Current => "current",
      FlashLayout::Legacy => "legacy",
    }
  }
}

impl fmt::Display for FlashLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Configuration for a build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  /// Directory where artifacts are staged. Shared by all targets in a run.
  pub work_dir: PathBuf,

  /// Directory containing the independently-versioned source trees.
  pub source_root: PathBuf,

  /// Directory holding per-machine worktrees of external trees.
  pub worktree_dir: PathBuf,

  /// Directory holding provisioning secrets (default authorized keys).
  pub secrets_dir: PathBuf,

  /// CA bundle copied into initramfs images.
  pub ca_bundle: PathBuf,

  /// Flash layout used for size limits and packaging.
  pub layout: FlashLayout,

  /// Log external commands instead of running them.
  pub dry_run: bool,

  /// Log every external command at info level.
  pub echo_commands: bool,

  /// Ask the package toolchain to list packages as they are compiled.
  pub verbose: bool,

  /// Build tags passed through to package builds.
  pub tags: Vec<String>,

  /// Output name override for a package build.
  pub output: Option<String>,

  /// Ref existing worktrees are rebased onto before building.
  pub rebase: Option<String>,

  /// Fall back to `git clone` when `git worktree add` fails.
  pub clone_fallback: bool,

  /// Release identifier written to version blocks.
  pub release: ReleaseKind,

  /// Package toolchain command.
  pub toolchain: String,

  /// Parallel jobs passed to kernel builds.
  pub jobs: usize,
}

impl BuildConfig {
  /// Configuration rooted at `work_dir`, with sources in its parent.
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    let work_dir = work_dir.into();
    let source_root = work_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| work_dir.clone());
    Self {
      worktree_dir: work_dir.join("worktrees"),
      secrets_dir: source_root.join("platina-secrets"),
      ca_bundle: PathBuf::from(HOST_CA_BUNDLE),
      source_root,
      work_dir,
      layout: FlashLayout::default(),
      dry_run: false,
      echo_commands: false,
      verbose: false,
      tags: Vec::new(),
      output: None,
      rebase: None,
      clone_fallback: false,
      release: ReleaseKind::default(),
      toolchain: "go".to_string(),
      jobs: default_jobs(),
    }
  }

  /// Path of an artifact staged in the work directory.
  pub fn artifact(&self, name: &str) -> PathBuf {
    self.work_dir.join(name)
  }

  /// Whether the pass-through tags include `tag`.
  pub fn has_tag(&self, tag: &str) -> bool {
    self.tags.iter().any(|t| t == tag)
  }
}

/// Twice the available parallelism, matching what kernel builds expect.
fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4) * 2
}
