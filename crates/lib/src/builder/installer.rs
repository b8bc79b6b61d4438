//! Self-extracting installer.
//!
//! The installer stub is followed by a zip of the payload and the main
//! binary; `zip -A` then fixes the archive offsets so the stub can find
//! it.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::package::{PackageMode, build_package};
use super::toolchain::Toolchain;
use super::{Builder, blocking};
use crate::execute::{BuildContext, BuildError, Invocation};
use crate::image::compose::ComposeError;
use crate::registry::Target;

/// Zip `files` by base name into `archive`.
pub fn zip_files(archive: &Path, files: &[PathBuf]) -> Result<(), BuildError> {
  let mut zip = ZipWriter::new(File::create(archive)?);
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  for path in files {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .ok_or_else(|| BuildError::MissingArtifact { path: path.clone() })?;
    let mut input = File::open(path).map_err(|_| BuildError::MissingArtifact { path: path.clone() })?;
    zip.start_file(name.as_str(), options).map_err(ComposeError::from)?;
    io::copy(&mut input, &mut zip)?;
  }
  zip.finish().map_err(ComposeError::from)?;
  Ok(())
}

/// Concatenate `parts` into `output`.
pub fn concatenate(output: &Path, parts: &[&Path]) -> Result<(), BuildError> {
  let mut out = File::create(output)?;
  for part in parts {
    io::copy(&mut File::open(part)?, &mut out)?;
  }
  out.flush()?;
  Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  let mut perms = std::fs::metadata(path)?.permissions();
  perms.set_mode(perms.mode() | 0o111);
  std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
  Ok(())
}

pub async fn build(target: &Target, ctx: &BuildContext, toolchain: &Toolchain, payload: &str) -> Result<(), BuildError> {
  let config = ctx.config();
  let main = target
    .dependency(|d| matches!(d.builder, Builder::Package { .. }))
    .ok_or_else(|| BuildError::MissingDependency {
      target: target.name.clone(),
      kind: "package",
    })?;

  let output = config.artifact(&target.name);
  let stub = config.artifact(&format!("{}.tmp", target.name));
  let archive = config.artifact(&format!("{}.zip", main.name));

  build_package(target, ctx, toolchain, PackageMode::Build, &target.config, &stub, false).await?;

  if config.dry_run {
    info!(target = %target.name, "dry run, skipping installer assembly");
  } else {
    let files = vec![config.artifact(payload), config.artifact(&main.name)];
    let (output, stub, archive) = (output.clone(), stub.clone(), archive.clone());
    blocking(move || {
      zip_files(&archive, &files)?;
      concatenate(&output, &[&stub, &archive])?;
      std::fs::remove_file(&stub)?;
      std::fs::remove_file(&archive)?;
      Ok(())
    })
    .await?;
  }

  Invocation::new("zip")
    .args(["-q", "-A"])
    .path_arg(&output)
    .run(&ctx.cmd_options())
    .await?;

  if !config.dry_run {
    make_executable(&output)?;
  }
  info!(target = %target.name, "installer built");
  Ok(())
}
