//! Combined kernel+ramdisk image.

use tracing::info;

use super::check_size;
use crate::config::FlashLayout;
use crate::consts::{ITB_MAX_SIZE, ITB_SUFFIX, LEGACY_ITB_MAX_SIZE};
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::registry::Target;

pub fn size_limit(layout: FlashLayout) -> u64 {
  match layout {
    FlashLayout::Current => ITB_MAX_SIZE,
    FlashLayout::Legacy => LEGACY_ITB_MAX_SIZE,
  }
}

pub async fn build(target: &Target, ctx: &BuildContext) -> Result<(), BuildError> {
  let config = ctx.config();
  let machine = target.name.strip_suffix(".itb").unwrap_or(&target.name);
  let image = config.artifact(&format!("{machine}{ITB_SUFFIX}"));

  Invocation::new("mkimage")
    .args(["-f", target.config.as_str()])
    .path_arg(&image)
    .cwd(&config.work_dir)
    .run(&ctx.cmd_options())
    .await?;

  check_size(config, &image, size_limit(config.layout)).await?;
  info!(target = %target.name, image = %image.display(), "combined image built");
  Ok(())
}
