//! Coreboot ROM with a kernel and initramfs payload.

use tracing::info;

use super::Builder;
use super::copy_artifact;
use super::worktree::worktree_path;
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::registry::Target;

/// Kernel command line baked into the payload.
pub const PAYLOAD_CMDLINE: &str = "console=ttyS1,57600n8 console=ttyS0,115200n8 intel_iommu=off quiet";

pub async fn build(target: &Target, ctx: &BuildContext) -> Result<(), BuildError> {
  let config = ctx.config();
  let opts = ctx.cmd_options();

  let kernel = target
    .dependency(|d| matches!(d.builder, Builder::Kernel { .. }))
    .ok_or_else(|| BuildError::MissingDependency {
      target: target.name.clone(),
      kind: "kernel",
    })?;
  let (initramfs, initramfs_toolchain) = target
    .dependencies
    .iter()
    .find_map(|d| match &d.builder {
      Builder::Initramfs { toolchain } => Some((d, *toolchain)),
      _ => None,
    })
    .ok_or_else(|| BuildError::MissingDependency {
      target: target.name.clone(),
      kind: "initramfs",
    })?;

  let build_dir = worktree_path(config, "coreboot", &target.config).join("build");
  let cbfstool = build_dir.join("cbfstool");
  let rom = config.artifact(&target.name);
  let tmp = config.artifact(&format!("{}.tmp", target.name));

  copy_artifact(config, &build_dir.join("coreboot.rom"), &tmp).await?;

  let added = Invocation::new(cbfstool.to_string_lossy())
    .path_arg(&tmp)
    .arg("add-payload")
    .arg("-f")
    .path_arg(&config.artifact(&kernel.name))
    .arg("-I")
    .path_arg(&config.artifact(&initramfs_toolchain.archive_name(&initramfs.name)))
    .args(["-C", PAYLOAD_CMDLINE, "-n", "fallback/payload", "-c", "none", "-r", "COREBOOT"])
    .run(&opts)
    .await;
  if let Err(err) = added {
    let _ = tokio::fs::remove_file(&tmp).await;
    return Err(err);
  }

  if !config.dry_run {
    tokio::fs::rename(&tmp, &rom).await?;
  }

  Invocation::new(cbfstool.to_string_lossy())
    .path_arg(&rom)
    .arg("print")
    .run(&opts)
    .await?;

  info!(target = %target.name, rom = %rom.display(), "coreboot rom built");
  Ok(())
}
