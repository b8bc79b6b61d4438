//! Toolchain package builds.

use std::path::{Path, PathBuf};

use tracing::info;

use super::toolchain::Toolchain;
use crate::config::BuildConfig;
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::registry::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageMode {
  /// Regular binary.
  Build,
  /// Statically linked binary.
  Static,
  /// Test binary.
  Test,
}

/// Toolchain arguments for building `package` into `output`.
///
/// Pass-through tags are merged into an existing `-tags` value or added.
/// Dry run, verbose and echo flags go right after the subcommand.
pub fn package_args(config: &BuildConfig, mode: PackageMode, output: &Path, package: &str, debuggable: bool) -> Vec<String> {
  let out = output.to_string_lossy().to_string();
  let mut args: Vec<String> = match mode {
    PackageMode::Build => vec!["build".into(), "-o".into(), out],
    PackageMode::Static => vec![
      "build".into(),
      "-o".into(),
      out,
      "-tags".into(),
      "netgo".into(),
      "-ldflags".into(),
      "-d".into(),
    ],
    PackageMode::Test => vec!["test".into(), "-c".into(), "-o".into(), out],
  };

  if debuggable && config.has_tag("debug") {
    args.extend(["-gcflags".to_string(), "-N -l".to_string()]);
  }
  args.push(package.to_string());

  if !config.tags.is_empty() {
    let tags = config.tags.join(" ");
    match args.iter().position(|a| a == "-tags") {
      Some(idx) if idx + 1 < args.len() => {
        let merged = format!("{} {tags}", args[idx + 1]);
        args[idx + 1] = merged;
      }
      _ => {
        args.insert(1, "-tags".into());
        args.insert(2, tags);
      }
    }
  }

  for (enabled, flag) in [(config.dry_run, "-n"), (config.verbose, "-v"), (config.echo_commands, "-x")] {
    if enabled {
      args.insert(1, flag.into());
    }
  }
  args
}

/// Build `package` for `target` into `output`.
///
/// Runs even in a dry run: the toolchain honors `-n` itself.
pub async fn build_package(
  target: &Target,
  ctx: &BuildContext,
  toolchain: &Toolchain,
  mode: PackageMode,
  package: &str,
  output: &Path,
  debuggable: bool,
) -> Result<(), BuildError> {
  let config = ctx.config();
  let dir = target.source_dir(config).unwrap_or_else(|| config.source_root.clone());

  let mut inv = Invocation::new(config.toolchain.as_str())
    .args(package_args(config, mode, output, package, debuggable))
    .cwd(dir);
  for (key, value) in toolchain.package_env() {
    inv = inv.env(key, value);
  }

  inv.run(&ctx.cmd_options().always_run()).await?;
  info!(target = %target.name, toolchain = toolchain.name, output = %output.display(), "package built");
  Ok(())
}

/// Output path for a package target, honoring the output-name override.
pub fn output_path(config: &BuildConfig, target: &Target) -> PathBuf {
  config.artifact(config.output.as_deref().unwrap_or(&target.name))
}

pub async fn build(
  target: &Target,
  ctx: &BuildContext,
  toolchain: &Toolchain,
  mode: PackageMode,
  debuggable: bool,
) -> Result<(), BuildError> {
  let output = output_path(ctx.config(), target);
  build_package(target, ctx, toolchain, mode, &target.config, &output, debuggable).await
}
