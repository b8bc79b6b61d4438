//! The product-line catalog.
//!
//! Targets are registered leaves-first so every dependency already exists
//! when a dependent is registered.

use crate::builder::toolchain::{AMD64_LINUX, ARM_LINUX, HOST, Toolchain};
use crate::builder::{Builder, PackageMode};
use crate::registry::{Registry, RegistryError, TargetDef};

/// Installer payload bundled next to the main binary.
pub const INSTALLER_PAYLOAD: &str = "fe1.so";

fn package(name: &str, toolchain: &'static Toolchain, mode: PackageMode) -> TargetDef {
  TargetDef::new(
    name,
    Builder::Package {
      toolchain,
      mode,
      debuggable: false,
    },
  )
}

fn kernel(name: &str, toolchain: &'static Toolchain, device_tree: bool, defconfig: &str) -> TargetDef {
  TargetDef::new(name, Builder::Kernel { toolchain, device_tree }).with_config(defconfig)
}

fn boot(name: &str, toolchain: &'static Toolchain, defconfig: &str) -> TargetDef {
  TargetDef::new(name, Builder::Boot { toolchain }).with_config(defconfig)
}

fn initramfs(name: &str, toolchain: &'static Toolchain, dir: &str) -> TargetDef {
  TargetDef::new(name, Builder::Initramfs { toolchain })
    .with_config(".")
    .with_dir(dir)
}

fn definitions() -> Vec<TargetDef> {
  vec![
    boot("coreboot-example-amd64", &AMD64_LINUX, "example-amd64_defconfig"),
    boot("coreboot-platina-mk1", &AMD64_LINUX, "platina-mk1_defconfig"),
    kernel("example-amd64.vmlinuz", &AMD64_LINUX, false, "platina-example-amd64_defconfig").default_target(),
    kernel("platina-mk1.vmlinuz", &AMD64_LINUX, false, "platina-mk1_defconfig"),
    kernel("platina-mk1-bmc.vmlinuz", &ARM_LINUX, true, "platina-mk1-bmc_defconfig"),
    kernel("platina-mk2-lc1-bmc.vmlinuz", &ARM_LINUX, true, "platina-mk2-lc1-bmc_defconfig"),
    kernel("platina-mk2-mc1-bmc.vmlinuz", &ARM_LINUX, true, "platina-mk2-mc1-bmc_defconfig"),
    initramfs("goes-boot", &AMD64_LINUX, "goes-boot"),
    initramfs("goes-boot-arm", &ARM_LINUX, "goes-boot"),
    package("goes-example", &HOST, PackageMode::Build)
      .with_config(".")
      .with_dir("goes-example")
      .default_target(),
    package("goes-example-arm", &ARM_LINUX, PackageMode::Static)
      .with_config(".")
      .with_dir("goes-example")
      .default_target(),
    package("goes-ip", &HOST, PackageMode::Build)
      .with_config("./main/ip")
      .with_dir("goes-legacy"),
    package("goes-ip.test", &HOST, PackageMode::Test)
      .with_config("./main/ip")
      .with_dir("goes-legacy"),
    TargetDef::new(
      "goes-platina-mk1",
      Builder::Package {
        toolchain: &AMD64_LINUX,
        mode: PackageMode::Build,
        debuggable: true,
      },
    )
    .with_config(".")
    .with_dir("goes-platina-mk1")
    .default_target(),
    package("goes-platina-mk1.test", &AMD64_LINUX, PackageMode::Test)
      .with_config(".")
      .with_dir("goes-platina-mk1"),
    initramfs("goes-platina-mk1-bmc", &ARM_LINUX, "goes-bmc"),
    package("goes-platina-mk2-lc1-bmc", &ARM_LINUX, PackageMode::Static)
      .with_config("./main/goes-platina-mk2-lc1-bmc")
      .with_dir("goes-legacy"),
    package("goes-platina-mk2-mc1-bmc", &ARM_LINUX, PackageMode::Static)
      .with_config("./main/goes-platina-mk2-mc1-bmc")
      .with_dir("goes-legacy"),
    package("vnet-platina-mk1", &AMD64_LINUX, PackageMode::Static)
      .with_config(".")
      .with_dir("vnet-platina-mk1")
      .default_target(),
    boot("u-boot-platina-mk1-bmc", &ARM_LINUX, "platinamx6boards_qspi_defconfig"),
    TargetDef::new(
      "goes-platina-mk1-installer",
      Builder::Installer {
        toolchain: &AMD64_LINUX,
        payload: INSTALLER_PAYLOAD,
      },
    )
    .with_config("./main/goes-installer")
    .with_dir("goes-legacy")
    .depends_on(&["goes-platina-mk1"]),
    TargetDef::new("coreboot-example-amd64.rom", Builder::CorebootRom)
      .with_config("example-amd64")
      .default_target()
      .depends_on(&["coreboot-example-amd64", "example-amd64.vmlinuz", "goes-boot"]),
    TargetDef::new("coreboot-platina-mk1.rom", Builder::CorebootRom)
      .with_config("platina-mk1")
      .default_target()
      .depends_on(&["coreboot-platina-mk1", "platina-mk1.vmlinuz", "goes-boot"]),
    TargetDef::new("platina-mk1-bmc.itb", Builder::Itb)
      .with_config("platina-mk1-bmc.its")
      .depends_on(&["goes-platina-mk1-bmc", "platina-mk1-bmc.vmlinuz"]),
    TargetDef::new("platina-mk1-bmc.zip", Builder::Bundle)
      .default_target()
      .depends_on(&["platina-mk1-bmc.itb", "u-boot-platina-mk1-bmc"]),
  ]
}

/// Registry of every product-line target.
pub fn catalog() -> Result<Registry, RegistryError> {
  let mut registry = Registry::new();
  for def in definitions() {
    registry.register(def)?;
  }
  Ok(registry)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::BuildRequest;

  fn names(targets: &[std::sync::Arc<crate::registry::Target>]) -> Vec<&str> {
    targets.iter().map(|t| t.name.as_str()).collect()
  }

  #[test]
  fn catalog_registers_every_target() {
    let registry = catalog().unwrap();
    assert_eq!(registry.len(), 25);
  }

  #[test]
  fn default_set() {
    let registry = catalog().unwrap();
    let defaults = registry.resolve(&BuildRequest::Default).unwrap();
    assert_eq!(
      names(&defaults),
      [
        "example-amd64.vmlinuz",
        "goes-example",
        "goes-example-arm",
        "goes-platina-mk1",
        "vnet-platina-mk1",
        "coreboot-example-amd64.rom",
        "coreboot-platina-mk1.rom",
        "platina-mk1-bmc.zip",
      ]
    );
  }

  #[test]
  fn bundle_reaches_initramfs_through_itb() {
    let registry = catalog().unwrap();
    let bundle = registry.get("platina-mk1-bmc.zip").unwrap();
    let itb = bundle.dependency(|d| matches!(d.builder, Builder::Itb)).unwrap();
    let initramfs = itb
      .dependency(|d| matches!(d.builder, Builder::Initramfs { .. }))
      .unwrap();
    assert_eq!(initramfs.name, "goes-platina-mk1-bmc");
  }

  #[test]
  fn roms_share_goes_boot() {
    let registry = catalog().unwrap();
    let a = registry.get("coreboot-example-amd64.rom").unwrap();
    let b = registry.get("coreboot-platina-mk1.rom").unwrap();
    let boot = |t: &crate::registry::Target| t.dependency(|d| d.name == "goes-boot").cloned().unwrap();
    assert!(std::sync::Arc::ptr_eq(&boot(&a), &boot(&b)));
  }

  #[test]
  fn installer_depends_on_main_package() {
    let registry = catalog().unwrap();
    let installer = registry.get("goes-platina-mk1-installer").unwrap();
    assert!(matches!(
      installer.builder,
      Builder::Installer { payload: INSTALLER_PAYLOAD, .. }
    ));
    assert_eq!(names(&installer.dependencies), ["goes-platina-mk1"]);
  }
}
