//! Flashable bootloader image.
//!
//! ```text
//! [0]     1024 bytes unused
//! [1024]  512-byte QSPI header
//! [1536]  zero
//! [4096]  bootloader payload
//! ```

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use super::qspi::QspiHeader;
use crate::consts::{QSPI_HEADER_SIZE, UBOOT_HEADER_OFFSET, UBOOT_IMAGE_SIZE, UBOOT_PAYLOAD_OFFSET};

/// Largest payload that fits behind the header.
pub const UBOOT_PAYLOAD_MAX: usize = UBOOT_IMAGE_SIZE - UBOOT_PAYLOAD_OFFSET;

#[derive(Debug, Error)]
pub enum UbootError {
  #[error("bootloader payload of {size} bytes exceeds {max} bytes")]
  Oversize { size: usize, max: usize },

  #[error("failed to read bootloader payload {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Lay out `payload` behind `header` in a fixed-size image.
pub fn build_uboot_image(header: &QspiHeader, payload: &[u8]) -> Result<Vec<u8>, UbootError> {
  if payload.len() > UBOOT_PAYLOAD_MAX {
    return Err(UbootError::Oversize {
      size: payload.len(),
      max: UBOOT_PAYLOAD_MAX,
    });
  }

  let mut image = vec![0u8; UBOOT_IMAGE_SIZE];
  image[UBOOT_HEADER_OFFSET..UBOOT_HEADER_OFFSET + QSPI_HEADER_SIZE].copy_from_slice(&header.to_bytes());
  image[UBOOT_PAYLOAD_OFFSET..UBOOT_PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
  Ok(image)
}

/// Read the payload from `input` and write the image to `output`.
pub fn write_uboot_image(input: &Path, output: &Path) -> Result<(), UbootError> {
  let payload = std::fs::read(input).map_err(|source| UbootError::Read {
    path: input.display().to_string(),
    source,
  })?;
  let image = build_uboot_image(&QspiHeader::bmc(), &payload)?;
  std::fs::write(output, &image)?;
  debug!(input = %input.display(), output = %output.display(), payload = payload.len(), "wrote bootloader image");
  Ok(())
}
