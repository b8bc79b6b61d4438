//! Archive layouts.
//!
//! A layout is an ordered list of mappings, each copying a byte range of a
//! staged artifact into one archive entry.

use crate::config::FlashLayout;
use crate::consts::{
  DTB_REGION_OFFSET, DTB_REGION_SIZE, DTB_SUFFIX, ENV_SUFFIX, ITB_SUFFIX, KERNEL_SUFFIX, LEGACY_KERNEL_OFFSET,
  LEGACY_KERNEL_SIZE, LEGACY_RAMDISK_OFFSET, LEGACY_RAMDISK_SIZE, RAMDISK_SUFFIX, UBOOT_REGION_SIZE, UBOOT_SUFFIX,
  VERSION_SUFFIX,
};

/// Copy `[offset, offset + len)` of `<machine><suffix>` into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
  /// Source artifact suffix.
  pub suffix: &'static str,
  /// Entry name suffix, when it differs from the source.
  pub rename: Option<&'static str>,
  pub offset: u64,
  /// Zero copies to the end of the source.
  pub len: u64,
}

impl Mapping {
  pub const fn whole(suffix: &'static str) -> Self {
    Self {
      suffix,
      rename: None,
      offset: 0,
      len: 0,
    }
  }

  pub const fn slice(suffix: &'static str, rename: Option<&'static str>, offset: u64, len: u64) -> Self {
    Self {
      suffix,
      rename,
      offset,
      len,
    }
  }

  pub fn source_name(&self, machine: &str) -> String {
    format!("{machine}{}", self.suffix)
  }

  pub fn entry_name(&self, machine: &str) -> String {
    format!("{machine}{}", self.rename.unwrap_or(self.suffix))
  }

  /// Bytes to copy from a source of `size` bytes.
  ///
  /// `None` when a non-zero offset lies at or beyond the end of the
  /// source: an optional trailing region that this build doesn't have.
  pub fn slice_len(&self, size: u64) -> Option<u64> {
    if self.offset != 0 && size <= self.offset {
      return None;
    }
    let remaining = size.saturating_sub(self.offset);
    Some(if self.len != 0 { remaining.min(self.len) } else { remaining })
  }
}

const COMMON: [Mapping; 4] = [
  Mapping::slice(UBOOT_SUFFIX, None, 0, UBOOT_REGION_SIZE),
  Mapping::slice(UBOOT_SUFFIX, Some(DTB_SUFFIX), DTB_REGION_OFFSET, DTB_REGION_SIZE),
  Mapping::whole(ENV_SUFFIX),
  Mapping::whole(VERSION_SUFFIX),
];

const CURRENT_IMAGES: [Mapping; 1] = [Mapping::whole(ITB_SUFFIX)];

const LEGACY_IMAGES: [Mapping; 2] = [
  Mapping::slice(ITB_SUFFIX, Some(KERNEL_SUFFIX), LEGACY_KERNEL_OFFSET, LEGACY_KERNEL_SIZE),
  Mapping::slice(ITB_SUFFIX, Some(RAMDISK_SUFFIX), LEGACY_RAMDISK_OFFSET, LEGACY_RAMDISK_SIZE),
];

/// Mappings packaged for `layout`, in archive order.
pub fn mappings(layout: FlashLayout) -> Vec<Mapping> {
  let images: &[Mapping] = match layout {
    FlashLayout::Current => &CURRENT_IMAGES,
    FlashLayout::Legacy => &LEGACY_IMAGES,
  };
  COMMON.iter().chain(images).copied().collect()
}
