//! Boot firmware builds.
//!
//! Coreboot builds its cross toolchain before configuring. U-Boot builds
//! also stamp the environment block and the flashable bootloader image.

use tracing::info;

use super::blocking;
use super::toolchain::{BootFamily, Toolchain};
use super::worktree::ensure_worktree;
use crate::consts::{ENV_SUFFIX, UBOOT_SUFFIX};
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::image::env::{DEFAULT_ENV, write_env_block};
use crate::image::uboot::write_uboot_image;
use crate::registry::Target;

/// Steps that configure a fresh boot firmware worktree.
pub fn configure_steps(boot: BootFamily, defconfig: &str) -> Vec<Invocation> {
  let mut steps = Vec::new();
  if boot == BootFamily::Coreboot {
    steps.push(Invocation::new("make").arg("crossgcc-i386").env("MAKEINFO", "missing"));
  }
  steps.push(Invocation::new("make").arg(defconfig));
  steps
}

pub async fn build(target: &Target, ctx: &BuildContext, toolchain: &Toolchain) -> Result<(), BuildError> {
  let config = ctx.config();
  let opts = ctx.cmd_options();
  let repo = toolchain
    .boot
    .repo()
    .ok_or_else(|| BuildError::Worktree {
      repo: String::new(),
      machine: target.name.clone(),
      message: format!("toolchain {} has no boot firmware", toolchain.name),
    })?;
  let machine = target
    .name
    .strip_prefix(repo)
    .and_then(|m| m.strip_prefix('-'))
    .unwrap_or(&target.name);

  let tree = ensure_worktree(config, repo, machine, &configure_steps(toolchain.boot, &target.config)).await?;

  Invocation::new("make")
    .arg("-C")
    .path_arg(&tree)
    .arg(format!("ARCH={}", toolchain.kernel_arch))
    .arg(format!("CROSS_COMPILE={}", toolchain.gnu_prefix))
    .run(&opts)
    .await?;

  if toolchain.boot == BootFamily::UBoot {
    let env = config.artifact(&format!("{machine}{ENV_SUFFIX}"));
    let image = config.artifact(&format!("{machine}{UBOOT_SUFFIX}"));
    let payload = tree.join("u-boot-dtb.imx");

    if config.dry_run {
      info!(env = %env.display(), image = %image.display(), "dry run, skipping bootloader images");
    } else {
      blocking(move || {
        write_env_block(&env, DEFAULT_ENV)?;
        write_uboot_image(&payload, &image)?;
        Ok(())
      })
      .await?;
    }
  }

  info!(target = %target.name, machine, "boot firmware built");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coreboot_builds_toolchain_first() {
    let steps = configure_steps(BootFamily::Coreboot, "platina-mk1_defconfig");
    let rendered: Vec<String> = steps.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, ["MAKEINFO=missing make crossgcc-i386", "make platina-mk1_defconfig"]);
  }

  #[test]
  fn uboot_only_configures() {
    let steps = configure_steps(BootFamily::UBoot, "platinamx6boards_qspi_defconfig");
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].args, ["platinamx6boards_qspi_defconfig"]);
  }
}
