//! Firmware archive composer.
//!
//! Composition is all-or-nothing: on any error the partially written
//! archive is removed before the error is returned.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::layout::Mapping;
use crate::consts::ARCHIVE_FORMAT_TAG;

#[derive(Debug, Error)]
pub enum ComposeError {
  #[error("failed to open {path}: {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("expected to copy {expected} bytes into {entry} but copied {actual}")]
  LengthMismatch { entry: String, expected: u64, actual: u64 },

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Outcome of a successful composition.
#[derive(Debug, Clone, Default)]
pub struct ComposeReport {
  pub archive: PathBuf,
  /// Entry names in archive order, marker included.
  pub entries: Vec<String>,
  /// Source artifacts whose mapping was skipped.
  pub skipped: Vec<String>,
}

/// Path of the archive composed for `machine`.
pub fn archive_path(work_dir: &Path, machine: &str) -> PathBuf {
  work_dir.join(format!("{machine}.zip"))
}

/// Compose `<machine>.zip` in `work_dir` from `mappings`.
pub fn compose(work_dir: &Path, machine: &str, mappings: &[Mapping]) -> Result<ComposeReport, ComposeError> {
  let archive = archive_path(work_dir, machine);
  let file = File::create(&archive)?;

  match write_archive(file, work_dir, machine, mappings) {
    Ok((entries, skipped)) => Ok(ComposeReport {
      archive,
      entries,
      skipped,
    }),
    Err(err) => {
      if let Err(rm_err) = std::fs::remove_file(&archive) {
        warn!(archive = %archive.display(), error = %rm_err, "failed to remove partial archive");
      }
      Err(err)
    }
  }
}

fn write_archive<W: Write + Seek>(
  out: W,
  work_dir: &Path,
  machine: &str,
  mappings: &[Mapping],
) -> Result<(Vec<String>, Vec<String>), ComposeError> {
  let mut zip = ZipWriter::new(out);
  let mut entries = Vec::with_capacity(mappings.len() + 1);
  let mut skipped = Vec::new();

  for mapping in mappings {
    let source = work_dir.join(mapping.source_name(machine));
    let mut file = File::open(&source).map_err(|source_err| ComposeError::Open {
      path: source.clone(),
      source: source_err,
    })?;
    let meta = file.metadata()?;

    let Some(len) = mapping.slice_len(meta.len()) else {
      warn!(
        source = %source.display(),
        offset = mapping.offset,
        size = meta.len(),
        "skipping mapping past end of source"
      );
      skipped.push(mapping.source_name(machine));
      continue;
    };

    let name = mapping.entry_name(machine);
    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .last_modified_time(zip_time(meta.modified().ok()));
    zip.start_file(name.as_str(), options)?;

    file.seek(SeekFrom::Start(mapping.offset))?;
    let copied = io::copy(&mut (&mut file).take(len), &mut zip)?;
    if copied != len {
      return Err(ComposeError::LengthMismatch {
        entry: name,
        expected: len,
        actual: copied,
      });
    }

    info!(entry = %name, bytes = len, "added to archive");
    entries.push(name);
  }

  let marker = format!("{machine}{ARCHIVE_FORMAT_TAG}");
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Stored)
    .last_modified_time(zip_time(Some(SystemTime::now())));
  zip.start_file(marker.as_str(), options)?;
  info!(entry = %marker, "added to archive");
  entries.push(marker);

  zip.finish()?;
  Ok((entries, skipped))
}

/// Local wall-clock time in zip's DOS format; out-of-range times clamp to
/// the zip epoch.
fn zip_time(time: Option<SystemTime>) -> zip::DateTime {
  time
    .map(|t| chrono::DateTime::<Local>::from(t).naive_local())
    .and_then(|naive: NaiveDateTime| zip::DateTime::try_from(naive).ok())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::FlashLayout;
  use crate::image::layout::mappings;
  use tempfile::TempDir;

  fn stage(dir: &Path, name: &str, len: usize, fill: u8) {
    std::fs::write(dir.join(name), vec![fill; len]).unwrap();
  }

  fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut entry = zip.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
  }

  #[test]
  fn slices_are_copied_by_range() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    let mut ubo = vec![0x11u8; 0x80000];
    ubo.extend(vec![0x22u8; 0x100]);
    std::fs::write(dir.join("m-ubo.bin"), &ubo).unwrap();
    stage(dir, "m-env.bin", 8192, 0);
    stage(dir, "m-ver.bin", 256 * 1024, 0xff);
    stage(dir, "m-itb.bin", 1000, 0x33);

    let report = compose(dir, "m", &mappings(FlashLayout::Current)).unwrap();
    assert_eq!(
      report.entries,
      ["m-ubo.bin", "m-dtb.bin", "m-env.bin", "m-ver.bin", "m-itb.bin", "m-v2"]
    );

    let ubo_entry = read_entry(&report.archive, "m-ubo.bin");
    assert_eq!(ubo_entry.len(), 0x80000);
    assert!(ubo_entry.iter().all(|&b| b == 0x11));

    let dtb_entry = read_entry(&report.archive, "m-dtb.bin");
    assert_eq!(dtb_entry, vec![0x22u8; 0x100]);

    assert!(read_entry(&report.archive, "m-v2").is_empty());
  }

  #[test]
  fn mapping_past_end_is_skipped() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    stage(dir, "m-ubo.bin", 0x80000, 0x11);
    stage(dir, "m-env.bin", 8192, 0);
    stage(dir, "m-ver.bin", 16, 0xff);
    stage(dir, "m-itb.bin", 16, 0x33);

    let report = compose(dir, "m", &mappings(FlashLayout::Current)).unwrap();
    assert_eq!(report.skipped, ["m-ubo.bin"]);
    assert_eq!(report.entries, ["m-ubo.bin", "m-env.bin", "m-ver.bin", "m-itb.bin", "m-v2"]);
  }

  #[test]
  fn entries_are_deflated() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    stage(dir, "m-env.bin", 8192, 0);

    let report = compose(dir, "m", &[Mapping::slice("-env.bin", None, 0, 0)]).unwrap();
    let mut zip = zip::ZipArchive::new(File::open(&report.archive).unwrap()).unwrap();
    let entry = zip.by_name("m-env.bin").unwrap();
    assert_eq!(entry.compression(), CompressionMethod::Deflated);
    assert_eq!(entry.size(), 8192);
  }

  #[test]
  fn missing_source_removes_archive() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    stage(dir, "m-ubo.bin", 0x80000, 0x11);

    let err = compose(dir, "m", &mappings(FlashLayout::Current)).unwrap_err();
    assert!(matches!(err, ComposeError::Open { ref path, .. } if path.ends_with("m-env.bin")));
    assert!(!archive_path(dir, "m").exists());
  }
}
