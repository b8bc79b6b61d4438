//! Version block.
//!
//! A 256 KiB flash-erased block: the release identifier at `0x000`, a JSON
//! array of per-image records at `0x100`. Flashing tools read the block
//! back to report what a device is running.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{FLASH_ERASE_BYTE, VERSION_BLOCK_SIZE, VERSION_RECORDS_OFFSET, VERSION_RELEASE_OFFSET};
use crate::util::hash::hash_range;

#[derive(Debug, Error)]
pub enum VersionError {
  #[error("invalid release kind {0:?}, expected dev or rel")]
  InvalidRelease(String),

  #[error("version records of {size} bytes exceed {max} bytes")]
  RecordsOverflow { size: usize, max: usize },

  #[error("failed to serialize version records: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to describe {path}: {source}")]
  Describe {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Release identifier written at the start of the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleaseKind {
  /// Literal `dev`.
  #[default]
  Dev,
  /// Build date as `YYYYMMDD`.
  Rel,
}

impl ReleaseKind {
  pub fn identifier(self, now: DateTime<Local>) -> String {
    match self {
      ReleaseKind::Dev => "dev".to_string(),
      ReleaseKind::Rel => now.format("%Y%m%d").to_string(),
    }
  }
}

impl FromStr for ReleaseKind {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "dev" => Ok(ReleaseKind::Dev),
      "rel" => Ok(ReleaseKind::Rel),
      other => Err(VersionError::InvalidRelease(other.to_string())),
    }
  }
}

impl fmt::Display for ReleaseKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ReleaseKind::Dev => "dev",
      ReleaseKind::Rel => "rel",
    })
  }
}

/// Provenance of one packaged image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionRecord {
  pub name: String,
  pub build: String,
  pub user: String,
  pub size: String,
  pub tag: String,
  pub commit: String,
  pub chksum: String,
}

impl VersionRecord {
  /// Describe `len` bytes of `path` from `offset` (zero `len` to end of
  /// file). Tag and commit come from the image's source tree.
  pub fn for_artifact(
    name: &str,
    path: &Path,
    offset: u64,
    len: u64,
    tag: String,
    commit: String,
  ) -> Result<Self, VersionError> {
    let describe = |source| VersionError::Describe {
      path: path.display().to_string(),
      source,
    };

    let meta = std::fs::metadata(path).map_err(describe)?;
    let remaining = meta.len().saturating_sub(offset);
    let size = if len == 0 { remaining } else { remaining.min(len) };
    let built: DateTime<Local> = meta.modified().map_err(describe)?.into();
    let chksum = hash_range(path, offset, len).map_err(describe)?;

    Ok(Self {
      name: name.to_string(),
      build: built.format("%b %-d %Y %H:%M").to_string(),
      user: owner(&meta),
      size: size.to_string(),
      tag,
      commit,
      chksum: chksum.0,
    })
  }
}

/// Name of the user owning an artifact, the account that built it. Falls
/// back to the numeric uid when it has no passwd entry.
#[cfg(unix)]
fn owner(meta: &std::fs::Metadata) -> String {
  use nix::unistd::{Uid, User};
  use std::os::unix::fs::MetadataExt;

  match User::from_uid(Uid::from_raw(meta.uid())) {
    Ok(Some(user)) => user.name,
    _ => meta.uid().to_string(),
  }
}

/// Files carry no portable owner here; use the invoking user.
#[cfg(not(unix))]
fn owner(_meta: &std::fs::Metadata) -> String {
  whoami::username()
}

/// Lay out the release identifier and records in a fresh block.
pub fn build_version_block(release: &str, records: &[VersionRecord]) -> Result<Vec<u8>, VersionError> {
  let json = serde_json::to_vec(records)?;
  let max = VERSION_BLOCK_SIZE - VERSION_RECORDS_OFFSET;
  if json.len() > max {
    return Err(VersionError::RecordsOverflow { size: json.len(), max });
  }

  let mut block = vec![FLASH_ERASE_BYTE; VERSION_BLOCK_SIZE];
  block[VERSION_RELEASE_OFFSET..VERSION_RELEASE_OFFSET + release.len()].copy_from_slice(release.as_bytes());
  block[VERSION_RECORDS_OFFSET..VERSION_RECORDS_OFFSET + json.len()].copy_from_slice(&json);
  Ok(block)
}

/// Stamp `path` with a version block for `release`.
pub fn write_version_block(path: &Path, release: ReleaseKind, records: &[VersionRecord]) -> Result<(), VersionError> {
  let id = release.identifier(Local::now());
  let block = build_version_block(&id, records)?;
  std::fs::write(path, &block)?;
  debug!(path = %path.display(), release = %id, records = records.len(), "wrote version block");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use tempfile::TempDir;

  #[test]
  fn release_kind_parses() {
    assert_eq!("dev".parse::<ReleaseKind>().unwrap(), ReleaseKind::Dev);
    assert_eq!("rel".parse::<ReleaseKind>().unwrap(), ReleaseKind::Rel);
    assert!(matches!("beta".parse::<ReleaseKind>(), Err(VersionError::InvalidRelease(k)) if k == "beta"));
  }

  #[test]
  fn release_identifier() {
    let now = Local.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
    assert_eq!(ReleaseKind::Dev.identifier(now), "dev");
    assert_eq!(ReleaseKind::Rel.identifier(now), "20240307");
  }

  #[test]
  fn dev_block_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m-ver.bin");
    write_version_block(&path, ReleaseKind::Dev, &[]).unwrap();

    let block = std::fs::read(&path).unwrap();
    assert_eq!(block.len(), 256 * 1024);
    assert_eq!(&block[0..3], b"dev");
    assert!(block[3..0x100].iter().all(|&b| b == 0xff));
    assert_eq!(&block[0x100..0x102], b"[]");
    assert!(block[0x102..].iter().all(|&b| b == 0xff));
  }

  #[test]
  fn rel_block_starts_with_date() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m-ver.bin");
    write_version_block(&path, ReleaseKind::Rel, &[]).unwrap();

    let block = std::fs::read(&path).unwrap();
    assert!(block[0..8].iter().all(u8::is_ascii_digit));
    assert_eq!(block[8], 0xff);
  }

  #[test]
  fn records_use_pascal_case_keys() {
    let record = VersionRecord {
      name: "m-ubo.bin".to_string(),
      ..Default::default()
    };
    let block = build_version_block("dev", &[record]).unwrap();
    let end = block[0x100..].iter().position(|&b| b == 0xff).unwrap();
    let json = std::str::from_utf8(&block[0x100..0x100 + end]).unwrap();
    assert_eq!(
      json,
      r#"[{"Name":"m-ubo.bin","Build":"","User":"","Size":"","Tag":"","Commit":"","Chksum":""}]"#
    );
  }

  #[test]
  fn records_overflow_is_rejected() {
    let record = VersionRecord {
      name: "x".repeat(VERSION_BLOCK_SIZE),
      ..Default::default()
    };
    let err = build_version_block("dev", &[record]).unwrap_err();
    assert!(matches!(err, VersionError::RecordsOverflow { .. }));
  }

  #[test]
  fn record_for_slice() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m-itb.bin");
    std::fs::write(&path, b"0123456789").unwrap();

    let record = VersionRecord::for_artifact("m-ini.bin", &path, 4, 0, "v1".into(), "abc".into()).unwrap();
    assert_eq!(record.size, "6");
    assert_eq!(record.chksum, crate::util::hash::hash_bytes(b"456789").0);
    assert_eq!(record.tag, "v1");
    assert!(!record.build.is_empty());
  }

  #[cfg(unix)]
  #[test]
  fn record_user_is_file_owner() {
    use nix::unistd::{User, getuid};

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m-ubo.bin");
    std::fs::write(&path, b"u-boot").unwrap();

    let record = VersionRecord::for_artifact("m-ubo.bin", &path, 0, 0, String::new(), String::new()).unwrap();
    let expected = match User::from_uid(getuid()).unwrap() {
      Some(user) => user.name,
      None => getuid().to_string(),
    };
    assert_eq!(record.user, expected);
  }
}
