//! Initramfs builds.
//!
//! The target's package is built statically, stripped, and installed as
//! `/init` in a small cpio skeleton that is then xz-compressed.

use std::path::{Path, PathBuf};

use hadris_cpio::CpioError;
use hadris_cpio::write::file_tree::{FileNode, FileTree};
use hadris_cpio::write::{CpioWriteOptions, CpioWriter};
use tracing::info;

use super::package::{PackageMode, build_package};
use super::toolchain::Toolchain;
use super::{blocking, check_size};
use crate::config::BuildConfig;
use crate::consts::LEGACY_RAMDISK_SIZE;
use crate::execute::{BuildContext, BuildError, CmdOptions, Invocation};
use crate::registry::Target;

/// Host-side inputs of an initramfs.
#[derive(Debug, Clone, Default)]
pub struct InitramfsInputs {
  pub ca_bundle: Vec<u8>,
  pub authorized_keys: Vec<u8>,
  /// Stripped init binary.
  pub init: Vec<u8>,
}

/// Default authorized keys in the secrets directory.
pub fn authorized_keys_path(config: &BuildConfig) -> PathBuf {
  config.secrets_dir.join("secrets/sshd/id_rsa.pub")
}

const DIR_PERM: u32 = 0o775;

fn dir(name: &str, children: Vec<FileNode>) -> FileNode {
  FileNode::dir(name, children, DIR_PERM)
}

/// Uncompressed cpio archive for `inputs`.
pub fn initramfs_archive(inputs: &InitramfsInputs) -> Result<Vec<u8>, CpioError> {
  let sshd = FileNode::dir(
    "sshd",
    vec![FileNode::file("authorized_keys.default", inputs.authorized_keys.clone(), 0o600)],
    0o700,
  );
  let goes = dir(
    "goes",
    vec![sshd, FileNode::file("init", b"ip link lo change up\n".to_vec(), 0o644)],
  );
  let ssl = dir(
    "ssl",
    vec![dir(
      "certs",
      vec![FileNode::file("ca-certificates.crt", inputs.ca_bundle.clone(), 0o644)],
    )],
  );
  let etc = dir(
    "etc",
    vec![goes, FileNode::file("resolv.conf", b"nameserver 8.8.8.8\n".to_vec(), 0o644), ssl],
  );
  let usr = dir("usr", vec![dir("bin", vec![FileNode::symlink("goes", "../../init")])]);

  let mut tree = FileTree::new();
  for node in [
    dir(".", Vec::new()),
    dir("boot", Vec::new()),
    etc,
    FileNode::file("init", inputs.init.clone(), 0o755),
    dir("perm", Vec::new()),
    dir("sbin", Vec::new()),
    usr,
    dir("volatile", Vec::new()),
  ] {
    tree.add(node);
  }

  let mut archive = Vec::new();
  CpioWriter::new(CpioWriteOptions::default()).write(&mut archive, &tree)?;
  Ok(archive)
}

async fn read_input(path: &Path) -> Result<Vec<u8>, BuildError> {
  tokio::fs::read(path).await.map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      BuildError::MissingArtifact { path: path.to_path_buf() }
    } else {
      BuildError::Io(e)
    }
  })
}

async fn strip_binary(toolchain: &Toolchain, input: &Path, opts: &CmdOptions) -> Result<Vec<u8>, BuildError> {
  let stripped = input.with_extension("strip.tmp");
  let result = Invocation::new(toolchain.strip())
    .arg("-o")
    .path_arg(&stripped)
    .path_arg(input)
    .run(opts)
    .await;
  let data = match result {
    Ok(()) => read_input(&stripped).await,
    Err(err) => Err(err),
  };
  let _ = tokio::fs::remove_file(&stripped).await;
  data
}

pub async fn build(target: &Target, ctx: &BuildContext, toolchain: &Toolchain) -> Result<(), BuildError> {
  let config = ctx.config();
  let opts = ctx.cmd_options();
  let binary = config.artifact(&target.name);

  build_package(target, ctx, toolchain, PackageMode::Static, &target.config, &binary, false).await?;

  let archive = config.artifact(&toolchain.archive_name(&target.name));
  if config.dry_run {
    info!(archive = %archive.display(), "dry run, skipping initramfs archive");
    return Ok(());
  }

  let inputs = InitramfsInputs {
    ca_bundle: read_input(&config.ca_bundle).await?,
    authorized_keys: read_input(&authorized_keys_path(config)).await?,
    init: strip_binary(toolchain, &binary, &opts).await?,
  };
  let cpio = blocking(move || Ok(initramfs_archive(&inputs)?)).await?;

  let compressed = Invocation::new("xz")
    .args(["--stdout", "--check=crc32", "-9"])
    .filter(cpio, &opts)
    .await?;

  let tmp = archive.with_extension("xz.tmp");
  if let Err(err) = tokio::fs::write(&tmp, &compressed).await {
    let _ = tokio::fs::remove_file(&tmp).await;
    return Err(err.into());
  }
  tokio::fs::rename(&tmp, &archive).await?;
  info!(archive = %archive.display(), size = compressed.len(), "initramfs archive written");

  if config.layout.is_legacy() && toolchain.is_arm() {
    let ramdisk = archive.with_extension("xz.img");
    Invocation::new("mkimage")
      .args(["-A", "arm", "-O", "linux", "-T", "ramdisk", "-C", "none", "-d"])
      .path_arg(&archive)
      .path_arg(&ramdisk)
      .run(&opts)
      .await?;
    check_size(config, &ramdisk, LEGACY_RAMDISK_SIZE).await?;
  }

  Ok(())
}
