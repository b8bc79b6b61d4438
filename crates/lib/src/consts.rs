//! Flash geometry and artifact naming shared across builders and image formats.

/// Size of the bootloader environment block.
pub const ENV_BLOCK_SIZE: usize = 8192;

/// Size of the CRC32 that prefixes the environment block.
pub const ENV_CRC_SIZE: usize = 4;

/// Size of the version block.
pub const VERSION_BLOCK_SIZE: usize = 256 * 1024;

/// Offset of the release identifier inside the version block.
pub const VERSION_RELEASE_OFFSET: usize = 0x000;

/// Offset of the serialized version records inside the version block.
pub const VERSION_RECORDS_OFFSET: usize = 0x100;

/// Flash erase value used to pre-fill the version block.
pub const FLASH_ERASE_BYTE: u8 = 0xff;

/// Size of the QSPI boot configuration header.
pub const QSPI_HEADER_SIZE: usize = 512;

/// Size of the bootloader image written to flash.
pub const UBOOT_IMAGE_SIZE: usize = 768 * 1024;

/// Offset of the QSPI header inside the bootloader image.
pub const UBOOT_HEADER_OFFSET: usize = 2 * 512;

/// Offset of the bootloader payload inside the bootloader image.
pub const UBOOT_PAYLOAD_OFFSET: usize = 8 * 512;

/// Bootloader region of the bootloader image as packaged.
pub const UBOOT_REGION_SIZE: u64 = 0x80000;

/// Device-tree region, directly after the bootloader region.
pub const DTB_REGION_OFFSET: u64 = 0x80000;
pub const DTB_REGION_SIZE: u64 = 0x40000;

/// Legacy layout: kernel region of the combined image.
pub const LEGACY_KERNEL_OFFSET: u64 = 0x0;
pub const LEGACY_KERNEL_SIZE: u64 = 0x200000;

/// Legacy layout: ramdisk region of the combined image.
pub const LEGACY_RAMDISK_OFFSET: u64 = 0x200000;
pub const LEGACY_RAMDISK_SIZE: u64 = 0x300000;

/// Combined kernel+ramdisk image ceilings.
pub const ITB_MAX_SIZE: u64 = 0x00800000;
pub const LEGACY_ITB_MAX_SIZE: u64 = 0x00500000;

/// Artifact suffixes for machine `M`: `M-env.bin`, `M-ubo.bin`, ...
pub const ENV_SUFFIX: &str = "-env.bin";
pub const UBOOT_SUFFIX: &str = "-ubo.bin";
pub const DTB_SUFFIX: &str = "-dtb.bin";
pub const KERNEL_SUFFIX: &str = "-ker.bin";
pub const RAMDISK_SUFFIX: &str = "-ini.bin";
pub const ITB_SUFFIX: &str = "-itb.bin";
pub const VERSION_SUFFIX: &str = "-ver.bin";

/// Format tag recorded as a zero-length marker entry in every archive.
pub const ARCHIVE_FORMAT_TAG: &str = "-v2";
