//! Flashable bundles.
//!
//! Stamps the machine's version block from the staged images, then
//! composes `<machine>.zip` for the configured flash layout.

use std::path::PathBuf;

use tracing::{info, warn};

use super::{Builder, blocking};
use crate::config::BuildConfig;
use crate::consts::{DTB_SUFFIX, ENV_SUFFIX, ITB_SUFFIX, KERNEL_SUFFIX, RAMDISK_SUFFIX, UBOOT_SUFFIX, VERSION_SUFFIX};
use crate::execute::{BuildContext, BuildError, CmdOptions, Invocation};
use crate::image::compose::compose;
use crate::image::layout::{Mapping, mappings};
use crate::image::version::{VersionRecord, write_version_block};
use crate::registry::Target;

/// Machine a bundle target packages: `<machine>.zip`.
pub fn machine(target: &Target) -> &str {
  target.name.strip_suffix(".zip").unwrap_or(&target.name)
}

/// Directory whose git history describes the image packaged as `entry`.
fn provenance_dir(entry: &str, target: &Target, config: &BuildConfig, machine: &str) -> Option<PathBuf> {
  match entry {
    UBOOT_SUFFIX => Some(super::worktree::worktree_path(config, "u-boot", machine)),
    DTB_SUFFIX | KERNEL_SUFFIX | ITB_SUFFIX => Some(super::worktree::worktree_path(config, "linux", machine)),
    RAMDISK_SUFFIX => target
      .dependency(|d| matches!(d.builder, Builder::Itb))
      .and_then(|itb| itb.dependency(|d| matches!(d.builder, Builder::Initramfs { .. })))
      .and_then(|initramfs| initramfs.source_dir(config)),
    ENV_SUFFIX => Some(config.work_dir.clone()),
    _ => None,
  }
}

/// `git <args>` in `dir`, or empty with a warning when that fails.
async fn git_field(dir: Option<&PathBuf>, args: &[&str], opts: &CmdOptions) -> String {
  let Some(dir) = dir.filter(|d| d.exists()) else {
    warn!(args = ?args, "no source tree for version record");
    return String::new();
  };
  match Invocation::new("git").args(args.iter().copied()).cwd(dir).output(opts).await {
    Ok(out) => out,
    Err(err) => {
      warn!(dir = %dir.display(), args = ?args, error = %err, "git query failed");
      String::new()
    }
  }
}

async fn version_records(
  target: &Target,
  config: &BuildConfig,
  machine: &str,
  layout: &[Mapping],
  opts: &CmdOptions,
) -> Result<Vec<VersionRecord>, BuildError> {
  let mut records = Vec::new();
  for mapping in layout.iter().filter(|m| m.suffix != VERSION_SUFFIX) {
    let source = config.artifact(&mapping.source_name(machine));
    let size = tokio::fs::metadata(&source)
      .await
      .map_err(|_| BuildError::MissingArtifact { path: source.clone() })?
      .len();
    if mapping.slice_len(size).is_none() {
      continue;
    }

    let entry = mapping.rename.unwrap_or(mapping.suffix);
    let dir = provenance_dir(entry, target, config, machine);
    let tag = git_field(dir.as_ref(), &["describe", "--abbrev=0"], opts).await;
    let commit = git_field(dir.as_ref(), &["rev-parse", "HEAD"], opts).await;

    let name = mapping.entry_name(machine);
    let (offset, len) = (mapping.offset, mapping.len);
    let record = blocking(move || Ok(VersionRecord::for_artifact(&name, &source, offset, len, tag, commit)?)).await?;
    records.push(record);
  }
  Ok(records)
}

pub async fn build(target: &Target, ctx: &BuildContext) -> Result<(), BuildError> {
  let config = ctx.config();
  let machine = machine(target);
  if config.dry_run {
    info!(target = %target.name, machine, "dry run, skipping packaging");
    return Ok(());
  }

  let layout = mappings(config.layout);
  let records = version_records(target, config, machine, &layout, &ctx.cmd_options()).await?;

  let version = config.artifact(&format!("{machine}{VERSION_SUFFIX}"));
  let release = config.release;
  let work_dir = config.work_dir.clone();
  let machine_owned = machine.to_string();
  let report = blocking(move || {
    write_version_block(&version, release, &records)?;
    Ok(compose(&work_dir, &machine_owned, &layout)?)
  })
  .await?;

  info!(
    target = %target.name,
    archive = %report.archive.display(),
    entries = report.entries.len(),
    skipped = report.skipped.len(),
    layout = %config.layout,
    "bundle composed"
  );
  Ok(())
}
