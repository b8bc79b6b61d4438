//! Kernel builds.

use tracing::info;

use super::toolchain::Toolchain;
use super::worktree::ensure_worktree;
use super::{check_size, copy_artifact};
use crate::consts::{DTB_REGION_SIZE, DTB_SUFFIX, LEGACY_KERNEL_SIZE};
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::registry::Target;

/// Machine a kernel target is built for: `<machine>.vmlinuz`.
pub fn machine(target: &Target) -> &str {
  target.name.strip_suffix(".vmlinuz").unwrap_or(&target.name)
}

/// `KDEB_PKGVERSION` and `KERNELRELEASE` from `git describe` output.
pub fn release_ids(describe: &str, machine: &str) -> (String, String) {
  let version = describe.trim_start_matches('v').to_string();
  let base = version.split('-').next().unwrap_or_default();
  let release = format!("{base}-{machine}");
  (version, release)
}

pub async fn build(target: &Target, ctx: &BuildContext, toolchain: &Toolchain, device_tree: bool) -> Result<(), BuildError> {
  let config = ctx.config();
  let opts = ctx.cmd_options();
  let machine = machine(target);

  let configure = [
    Invocation::new("cp").args([format!("{}/{}", toolchain.kernel_config_path, target.config), ".config".into()]),
    Invocation::new("make").args(["oldconfig".to_string(), format!("ARCH={}", toolchain.kernel_arch)]),
  ];
  let tree = ensure_worktree(config, "linux", machine, &configure).await?;

  let describe = Invocation::new("git").arg("describe").cwd(&tree).output(&opts).await?;
  let (version, release) = release_ids(&describe, machine);

  Invocation::new("make")
    .arg("-C")
    .path_arg(&tree)
    .args(["-j".to_string(), config.jobs.to_string()])
    .arg(format!("ARCH={}", toolchain.kernel_arch))
    .arg(format!("CROSS_COMPILE={}", toolchain.gnu_prefix))
    .arg(format!("KDEB_PKGVERSION={version}"))
    .arg(format!("KERNELRELEASE={release}"))
    .args(toolchain.kernel_make_targets.iter().copied())
    .run(&opts)
    .await?;

  let image = config.artifact(&target.name);
  copy_artifact(config, &tree.join(toolchain.kernel_path), &image).await?;
  // Only the BMC kernel has a fixed region in the legacy layout.
  if device_tree && config.layout.is_legacy() {
    check_size(config, &image, LEGACY_KERNEL_SIZE).await?;
  }

  if device_tree {
    let dtb = config.artifact(&format!("{machine}{DTB_SUFFIX}"));
    let source = tree.join("arch/arm/boot/dts").join(format!("{machine}.dtb"));
    copy_artifact(config, &source, &dtb).await?;
    check_size(config, &dtb, DTB_REGION_SIZE).await?;
  }

  info!(target = %target.name, release = %release, "kernel built");
  Ok(())
}
