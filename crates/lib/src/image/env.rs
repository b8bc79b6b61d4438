//! Bootloader environment block.
//!
//! Layout: a little-endian CRC32 (IEEE) of bytes `4..8192`, then the
//! variables as NUL-separated `key=value` strings, then zero padding.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::consts::{ENV_BLOCK_SIZE, ENV_CRC_SIZE};

/// Largest variable payload that fits behind the checksum.
pub const ENV_PAYLOAD_MAX: usize = ENV_BLOCK_SIZE - ENV_CRC_SIZE;

/// Default environment for the BMC bootloader, one variable per line.
pub const DEFAULT_ENV: &str = "baudrate=115200
bootargs=console=ttymxc0,115200n8 GODEBUG=asyncpreemptoff=1
bootcmd=run readmac;run sf_read_itb bootlinux_itb;run ubi_read_itb bootlinux_itb
bootlinux_itb=bootm ${loadaddr}
bootdelay=3
ethact=FEC
ethprime=FEC
fdt_high=0x88000000
initrd_high=0x89000000
loadaddr=0x82000000
net_read_itb=${netbootmethod} ${loadaddr} ${serverpath}platina-mk1-bmc-itb.bin
netboot=run readmac net_read_itb bootlinux_itb
netbootmethod=dhcp
qspi0=mw 020e01b8 00000005; mw 20a8004 c7000000; mw 020a8000 4300ca05
qspi1=mw 020e01b8 00000005; mw 20a8004 c7000000; mw 020a8000 c300ca05
readmac=i2c read 55 0.2 200 80800000; setmac 80800000 24; saveenv
sf_read_itb=sf probe 0;sf read ${loadaddr} 0x00100000 ${sz_itb}
ubi_read_itb=ubi part ubi;ubifsmount ubi0:perm;ubifsload ${loadaddr} boot/platina-mk1-bmc-itb.bin
stderr=serial
stdin=serial
stdout=serial
sz_itb=800000
wd=mw 020e01a0 00000005;mw 020e01a4 00000005;mw 020e01a8 00000005;mw 020e01b8 00000005;mw 020e01bc 00000005;mw 020a8000 0300ca05;mw 020a8004 07000000
";

#[derive(Debug, Error)]
pub enum EnvError {
  #[error("environment payload of {size} bytes exceeds {max} bytes")]
  Oversize { size: usize, max: usize },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Serialize newline-delimited variables into an environment block.
pub fn build_env_block(vars: &str) -> Result<Vec<u8>, EnvError> {
  if vars.len() > ENV_PAYLOAD_MAX {
    return Err(EnvError::Oversize {
      size: vars.len(),
      max: ENV_PAYLOAD_MAX,
    });
  }

  let mut block = vec![0u8; ENV_BLOCK_SIZE];
  for (dst, src) in block[ENV_CRC_SIZE..].iter_mut().zip(vars.bytes()) {
    *dst = if src == b'\n' { 0 } else { src };
  }

  let crc = crc32fast::hash(&block[ENV_CRC_SIZE..]);
  block[..ENV_CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
  Ok(block)
}

/// Build the block for `vars` and write it to `path`.
///
/// Nothing is written when the payload is oversize.
pub fn write_env_block(path: &Path, vars: &str) -> Result<(), EnvError> {
  let block = build_env_block(vars)?;
  std::fs::write(path, &block)?;
  debug!(path = %path.display(), payload = vars.len(), "wrote environment block");
  Ok(())
}
