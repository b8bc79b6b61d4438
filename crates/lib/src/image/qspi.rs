//! QSPI boot configuration header for the i.MX6 boot ROM.
//!
//! 128 little-endian `u32` words, 512 bytes total. Every value is fixed by
//! the board's NOR flash; nothing is computed at runtime.

use crate::consts::QSPI_HEADER_SIZE;

const LUT_LEN: usize = 64;
const WORDS: usize = QSPI_HEADER_SIZE / 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QspiHeader {
  pub dqs_loopback: u32,
  pub hold_delay: u32,
  pub reserved1: [u32; 2],
  pub device_quad_mode_en: u32,
  pub device_cmd: u32,
  pub write_cmd_ipcr: u32,
  pub write_enable_ipcr: u32,
  pub cs_hold_time: u32,
  pub cs_setup_time: u32,
  pub flash_a1_size: u32,
  pub flash_a2_size: u32,
  pub flash_b1_size: u32,
  pub flash_b2_size: u32,
  pub sclk_frequency: u32,
  pub busy_bit_offset: u32,
  pub mode_of_operation: u32,
  pub port_b_selection: u32,
  pub ddr_mode_enable: u32,
  pub dqs_enable: u32,
  pub parallel_mode_enable: u32,
  pub cs1_on_port_a: u32,
  pub cs1_on_port_b: u32,
  pub full_speed_phase_sel: u32,
  pub full_speed_delay_sel: u32,
  pub ddr_sampling_point: u32,
  /// Flash read instruction sequence.
  pub lut: [u32; LUT_LEN],
  pub read_status_ipcr: u32,
  pub enable_dqs_phase: u32,
  pub reserved2: [u32; 9],
  pub dqs_pad_override: u32,
  pub sclk_pad_override: u32,
  pub data_pad_override: u32,
  pub cs_pad_override: u32,
  pub dqs_loopback_internal: u32,
  pub dqs_phase_sel: u32,
  pub dqs_fa_delay_chain_sel: u32,
  pub dqs_fb_delay_chain_sel: u32,
  pub sclk_fa_delay_chain_sel: u32,
  pub sclk_fb_delay_chain_sel: u32,
  pub reserved3: [u32; 16],
  pub tag: u32,
}

impl QspiHeader {
  /// Header for the platina-mk1 BMC's QSPI NOR at SCLK setting 00.
  pub fn bmc() -> Self {
    let mut lut = [0u32; LUT_LEN];
    lut[..18].copy_from_slice(&[
      0x2a1804ed, 0x0e082e01, 0x24003a04, 0x0, //
      0x1c010405, 0x00002400, 0x0, 0x0, //
      0x24000406, 0x0, 0x0, 0x0, //
      0x20010401, 0x00002400, 0x0, 0x0, //
      0x1c010435, 0x00002400,
    ]);

    Self {
      dqs_loopback: 0,
      hold_delay: 0,
      reserved1: [0; 2],
      device_quad_mode_en: 0x01,
      device_cmd: 0x8282,
      write_cmd_ipcr: 0x03000002,
      write_enable_ipcr: 0x02000000,
      cs_hold_time: 0x3,
      cs_setup_time: 0x3,
      flash_a1_size: 0x08000000,
      flash_a2_size: 0,
      flash_b1_size: 0x08000000,
      flash_b2_size: 0,
      sclk_frequency: 0,
      busy_bit_offset: 0,
      mode_of_operation: 0x4,
      port_b_selection: 0,
      ddr_mode_enable: 0x1,
      dqs_enable: 0,
      parallel_mode_enable: 0,
      cs1_on_port_a: 0,
      cs1_on_port_b: 0,
      full_speed_phase_sel: 0,
      full_speed_delay_sel: 0,
      ddr_sampling_point: 0,
      lut,
      read_status_ipcr: 0x01000001,
      enable_dqs_phase: 0,
      reserved2: [0; 9],
      dqs_pad_override: 0,
      sclk_pad_override: 0,
      data_pad_override: 0,
      cs_pad_override: 0,
      dqs_loopback_internal: 0,
      dqs_phase_sel: 0,
      dqs_fa_delay_chain_sel: 0,
      dqs_fb_delay_chain_sel: 0,
      sclk_fa_delay_chain_sel: 0,
      sclk_fb_delay_chain_sel: 0,
      reserved3: [0; 16],
      tag: 0xc0ffee01,
    }
  }

  fn words(&self) -> Vec<u32> {
    let mut w = Vec::with_capacity(WORDS);
    w.extend([self.dqs_loopback, self.hold_delay]);
    w.extend(self.reserved1);
    w.extend([
      self.device_quad_mode_en,
      self.device_cmd,
      self.write_cmd_ipcr,
      self.write_enable_ipcr,
      self.cs_hold_time,
      self.cs_setup_time,
      self.flash_a1_size,
      self.flash_a2_size,
      self.flash_b1_size,
      self.flash_b2_size,
      self.sclk_frequency,
      self.busy_bit_offset,
      self.mode_of_operation,
      self.port_b_selection,
      self.ddr_mode_enable,
      self.dqs_enable,
      self.parallel_mode_enable,
      self.cs1_on_port_a,
      self.cs1_on_port_b,
      self.full_speed_phase_sel,
      self.full_speed_delay_sel,
      self.ddr_sampling_point,
    ]);
    w.extend(self.lut);
    w.extend([self.read_status_ipcr, self.enable_dqs_phase]);
    w.extend(self.reserved2);
    w.extend([
      self.dqs_pad_override,
      self.sclk_pad_override,
      self.data_pad_override,
      self.cs_pad_override,
      self.dqs_loopback_internal,
      self.dqs_phase_sel,
      self.dqs_fa_delay_chain_sel,
      self.dqs_fb_delay_chain_sel,
      self.sclk_fa_delay_chain_sel,
      self.sclk_fb_delay_chain_sel,
    ]);
    w.extend(self.reserved3);
    w.push(self.tag);
    w
  }

  /// Serialize to the 512-byte on-flash form.
  pub fn to_bytes(&self) -> [u8; QSPI_HEADER_SIZE] {
    let mut out = [0u8; QSPI_HEADER_SIZE];
    for (chunk, word) in out.chunks_exact_mut(4).zip(self.words()) {
      chunk.copy_from_slice(&word.to_le_bytes());
    }
    out
  }
}
