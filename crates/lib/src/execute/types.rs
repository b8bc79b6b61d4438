//! Types for target execution.
//!
//! This module defines the error type shared by the scheduler and every
//! builder, the runner seam the scheduler dispatches through, and the
//! summary returned from a run.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::BuildContext;
use crate::image::compose::ComposeError;
use crate::image::env::EnvError;
use crate::image::uboot::UbootError;
use crate::image::version::VersionError;
use crate::registry::{RegistryError, Target};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur while building targets.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("{0}")]
  Registry(#[from] RegistryError),

  #[error("environment block: {0}")]
  Env(#[from] EnvError),

  #[error("version block: {0}")]
  Version(#[from] VersionError),

  #[error("archive: {0}")]
  Compose(#[from] ComposeError),

  #[error("initramfs archive: {0}")]
  Cpio(#[from] hadris_cpio::CpioError),

  #[error("bootloader image: {0}")]
  Uboot(#[from] UbootError),

  /// External command exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// External command could not be started.
  #[error("failed to run {cmd}: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  /// An artifact exceeds its flash partition.
  #[error("{} is {actual} bytes, exceeding the {layout} limit of {limit} bytes", path.display())]
  SizeLimit {
    path: PathBuf,
    actual: u64,
    limit: u64,
    layout: &'static str,
  },

  #[error("worktree {repo}/{machine}: {message}")]
  Worktree {
    repo: String,
    machine: String,
    message: String,
  },

  /// A builder needs a dependency of a kind the target doesn't declare.
  #[error("target {target} has no {kind} dependency")]
  MissingDependency { target: String, kind: &'static str },

  /// An input artifact was expected in the work directory.
  #[error("missing artifact {}", path.display())]
  MissingArtifact { path: PathBuf },

  /// Failure while building `target`, either its own or a dependency's.
  #[error("building {target}")]
  Target {
    target: String,
    #[source]
    source: Arc<BuildError>,
  },

  /// The run was aborted before this target's build finished.
  #[error("build of {0} was cancelled")]
  Cancelled(String),

  #[error("build task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl BuildError {
  /// The innermost error, past any target attribution.
  pub fn root_cause(&self) -> &BuildError {
    match self {
      BuildError::Target { source, .. } => source.root_cause(),
      other => other,
    }
  }

  /// Names of the targets this error propagated through, outermost first.
  pub fn target_path(&self) -> Vec<&str> {
    let mut path = Vec::new();
    let mut current = self;
    while let BuildError::Target { target, source } = current {
      path.push(target.as_str());
      current = source.as_ref();
    }
    path
  }
}

/// Builds a single target once its dependencies are complete.
///
/// The scheduler holds one runner per run; tests substitute recording or
/// failing runners.
pub trait TargetRunner: Send + Sync {
  fn run<'a>(&'a self, target: &'a Target, ctx: &'a BuildContext) -> BoxFuture<'a, Result<(), BuildError>>;
}

/// Result of a successful run.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
  /// Targets whose builder ran, in completion order.
  pub built: Vec<String>,
  pub elapsed: Duration,
}
