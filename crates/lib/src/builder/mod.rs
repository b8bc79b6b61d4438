//! Build strategies.
//!
//! A target's [`Builder`] says how it is built and carries only the
//! fields that strategy needs. [`DefaultRunner`] dispatches on it.

pub mod boot;
pub mod bundle;
pub mod initramfs;
pub mod installer;
pub mod itb;
pub mod kernel;
pub mod package;
pub mod rom;
pub mod toolchain;
pub mod worktree;

use std::path::Path;

use tracing::debug;

use crate::config::BuildConfig;
use crate::execute::{BoxFuture, BuildContext, BuildError, TargetRunner};
use crate::registry::Target;

pub use package::PackageMode;
pub use toolchain::{BootFamily, Toolchain};

#[derive(Debug, Clone)]
pub enum Builder {
  /// Toolchain package build; `config` is the package path.
  Package {
    toolchain: &'static Toolchain,
    mode: PackageMode,
    /// Honors the `debug` tag by disabling optimizations.
    debuggable: bool,
  },
  /// Kernel from a `linux` worktree; `config` is the defconfig.
  Kernel {
    toolchain: &'static Toolchain,
    device_tree: bool,
  },
  /// Boot firmware from the toolchain's boot repository; `config` is the
  /// defconfig.
  Boot { toolchain: &'static Toolchain },
  /// Static package plus compressed initramfs archive.
  Initramfs { toolchain: &'static Toolchain },
  /// Combined kernel+ramdisk image; `config` is the image source file.
  Itb,
  /// Coreboot ROM with kernel and initramfs payload; `config` is the
  /// machine.
  CorebootRom,
  /// Self-extracting installer; `config` is the installer stub package.
  Installer {
    toolchain: &'static Toolchain,
    /// Extra file from the work directory bundled with the main binary.
    payload: &'static str,
  },
  /// Flashable archive for a machine.
  Bundle,
}

impl Builder {
  pub fn kind(&self) -> &'static str {
    match self {
      Builder::Package { .. } => "package",
      Builder::Kernel { .. } => "kernel",
      Builder::Boot { .. } => "boot",
      Builder::Initramfs { .. } => "initramfs",
      Builder::Itb => "itb",
      Builder::CorebootRom => "coreboot-rom",
      Builder::Installer { .. } => "installer",
      Builder::Bundle => "bundle",
    }
  }
}

/// Runs the real build strategies.
#[derive(Debug, Default)]
pub struct DefaultRunner;

impl TargetRunner for DefaultRunner {
  fn run<'a>(&'a self, target: &'a Target, ctx: &'a BuildContext) -> BoxFuture<'a, Result<(), BuildError>> {
    Box::pin(async move {
      debug!(target = %target.name, builder = target.builder.kind(), "dispatching builder");
      match &target.builder {
        Builder::Package {
          toolchain,
          mode,
          debuggable,
        } => package::build(target, ctx, toolchain, *mode, *debuggable).await,
        Builder::Kernel { toolchain, device_tree } => kernel::build(target, ctx, toolchain, *device_tree).await,
        Builder::Boot { toolchain } => boot::build(target, ctx, toolchain).await,
        Builder::Initramfs { toolchain } => initramfs::build(target, ctx, toolchain).await,
        Builder::Itb => itb::build(target, ctx).await,
        Builder::CorebootRom => rom::build(target, ctx).await,
        Builder::Installer { toolchain, payload } => installer::build(target, ctx, toolchain, payload).await,
        Builder::Bundle => bundle::build(target, ctx).await,
      }
    })
  }
}

/// Fail if `path` is larger than `limit`. Skipped in a dry run, where
/// nothing was produced.
pub(crate) async fn check_size(config: &BuildConfig, path: &Path, limit: u64) -> Result<(), BuildError> {
  if config.dry_run {
    return Ok(());
  }
  let actual = tokio::fs::metadata(path).await?.len();
  if actual > limit {
    return Err(BuildError::SizeLimit {
      path: path.to_path_buf(),
      actual,
      limit,
      layout: config.layout.as_str(),
    });
  }
  debug!(path = %path.display(), size = actual, limit, "size within limit");
  Ok(())
}

/// Copy `from` to `to`, or just log it in a dry run.
pub(crate) async fn copy_artifact(config: &BuildConfig, from: &Path, to: &Path) -> Result<(), BuildError> {
  debug!(from = %from.display(), to = %to.display(), dry_run = config.dry_run, "copying artifact");
  if config.dry_run {
    return Ok(());
  }
  tokio::fs::copy(from, to).await.map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      BuildError::MissingArtifact { path: from.to_path_buf() }
    } else {
      BuildError::Io(e)
    }
  })?;
  Ok(())
}

/// Run blocking image work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, BuildError>
where
  F: FnOnce() -> Result<T, BuildError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f).await?
}
