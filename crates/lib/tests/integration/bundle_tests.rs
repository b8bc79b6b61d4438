//! End-to-end packaging against staged fake artifacts.

use std::sync::Arc;

use fwbuild_lib::builder::{Builder, DefaultRunner};
use fwbuild_lib::config::{BuildConfig, FlashLayout};
use fwbuild_lib::execute::{BuildContext, BuildError, build};
use fwbuild_lib::image::version::VersionRecord;
use fwbuild_lib::registry::{BuildRequest, Registry, TargetDef};
use tempfile::TempDir;

use super::common::{entry_names, read_entry, stage};

const MACHINE: &str = "m";

fn bundle_context(work_dir: &std::path::Path, layout: FlashLayout) -> Arc<BuildContext> {
  let mut registry = Registry::new();
  registry
    .register(TargetDef::new("m.zip", Builder::Bundle).default_target())
    .unwrap();

  let mut config = BuildConfig::new(work_dir);
  config.layout = layout;
  BuildContext::new(registry, config, Arc::new(DefaultRunner))
}

fn stage_images(dir: &std::path::Path, itb_len: usize) {
  stage(dir, "m-ubo.bin", 0xc0000, 0x11);
  stage(dir, "m-env.bin", 8192, 0x22);
  stage(dir, "m-itb.bin", itb_len, 0x33);
}

fn records(archive: &std::path::Path) -> Vec<VersionRecord> {
  let block = read_entry(archive, "m-ver.bin");
  assert_eq!(block.len(), 256 * 1024);
  assert_eq!(&block[..3], b"dev");
  let json = &block[0x100..];
  let end = json.iter().position(|&b| b == 0xff).unwrap();
  serde_json::from_slice(&json[..end]).unwrap()
}

#[tokio::test]
async fn current_layout_packages_combined_image() {
  let temp = TempDir::new().unwrap();
  stage_images(temp.path(), 0x100000);

  let ctx = bundle_context(temp.path(), FlashLayout::Current);
  build(&ctx, &BuildRequest::Default).await.unwrap();

  let archive = temp.path().join(format!("{MACHINE}.zip"));
  assert_eq!(
    entry_names(&archive),
    ["m-ubo.bin", "m-dtb.bin", "m-env.bin", "m-ver.bin", "m-itb.bin", "m-v2"]
  );
  assert_eq!(read_entry(&archive, "m-ubo.bin").len(), 0x80000);
  assert_eq!(read_entry(&archive, "m-dtb.bin").len(), 0x40000);
  assert_eq!(read_entry(&archive, "m-itb.bin").len(), 0x100000);
  assert!(read_entry(&archive, "m-v2").is_empty());

  let records = records(&archive);
  let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, ["m-ubo.bin", "m-dtb.bin", "m-env.bin", "m-itb.bin"]);
  assert_eq!(records[1].size, (0x40000).to_string());
  assert!(records.iter().all(|r| r.chksum.len() == 40));
}

#[tokio::test]
async fn legacy_layout_splits_combined_image() {
  let temp = TempDir::new().unwrap();
  stage_images(temp.path(), 0x280000);

  let ctx = bundle_context(temp.path(), FlashLayout::Legacy);
  build(&ctx, &BuildRequest::Default).await.unwrap();

  let archive = temp.path().join("m.zip");
  assert_eq!(
    entry_names(&archive),
    ["m-ubo.bin", "m-dtb.bin", "m-env.bin", "m-ver.bin", "m-ker.bin", "m-ini.bin", "m-v2"]
  );
  assert_eq!(read_entry(&archive, "m-ker.bin").len(), 0x200000);
  assert_eq!(read_entry(&archive, "m-ini.bin").len(), 0x80000);

  let records = records(&archive);
  let ini = records.iter().find(|r| r.name == "m-ini.bin").unwrap();
  assert_eq!(ini.size, (0x80000).to_string());
}

#[tokio::test]
async fn legacy_layout_skips_missing_ramdisk_region() {
  let temp = TempDir::new().unwrap();
  stage_images(temp.path(), 0x180000);

  let ctx = bundle_context(temp.path(), FlashLayout::Legacy);
  build(&ctx, &BuildRequest::Default).await.unwrap();

  let archive = temp.path().join("m.zip");
  let names = entry_names(&archive);
  assert!(names.contains(&"m-ker.bin".to_string()));
  assert!(!names.contains(&"m-ini.bin".to_string()));
  assert!(records(&archive).iter().all(|r| r.name != "m-ini.bin"));
}

#[tokio::test]
async fn missing_image_fails_without_archive() {
  let temp = TempDir::new().unwrap();
  stage(temp.path(), "m-ubo.bin", 0xc0000, 0x11);
  stage(temp.path(), "m-env.bin", 8192, 0x22);

  let ctx = bundle_context(temp.path(), FlashLayout::Current);
  let err = build(&ctx, &BuildRequest::Default).await.unwrap_err();

  assert!(matches!(err.root_cause(), BuildError::MissingArtifact { .. }));
  assert!(!temp.path().join("m.zip").exists());
}

#[tokio::test]
async fn dry_run_writes_nothing() {
  let temp = TempDir::new().unwrap();
  stage_images(temp.path(), 0x100000);

  let mut registry = Registry::new();
  registry.register(TargetDef::new("m.zip", Builder::Bundle)).unwrap();
  let mut config = BuildConfig::new(temp.path());
  config.dry_run = true;
  let ctx = BuildContext::new(registry, config, Arc::new(DefaultRunner));

  build(&ctx, &BuildRequest::Named(vec!["m.zip".to_string()])).await.unwrap();
  assert!(!temp.path().join("m.zip").exists());
  assert!(!temp.path().join("m-ver.bin").exists());
}
