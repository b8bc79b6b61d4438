//! Build environments for packages, kernels and bootloaders.

/// Boot firmware built for a toolchain's machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFamily {
  None,
  Coreboot,
  UBoot,
}

impl BootFamily {
  /// Repository the firmware is built from.
  pub fn repo(self) -> Option<&'static str> {
    match self {
      BootFamily::None => None,
      BootFamily::Coreboot => Some("coreboot"),
      BootFamily::UBoot => Some("u-boot"),
    }
  }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Toolchain {
  pub name: &'static str,
  /// Package architecture; `None` builds for the host.
  pub goarch: Option<&'static str>,
  pub goos: Option<&'static str>,
  /// Prefix of the GNU cross tools (`strip`, `gcc`, ...).
  pub gnu_prefix: &'static str,
  pub kernel_make_targets: &'static [&'static str],
  /// Kernel image, relative to the kernel tree.
  pub kernel_path: &'static str,
  /// Defconfig directory, relative to the kernel tree.
  pub kernel_config_path: &'static str,
  pub kernel_arch: &'static str,
  pub boot: BootFamily,
  pub cpio_suffix: &'static str,
  /// Stripped from the front of initramfs archive names.
  pub cpio_trim_prefix: &'static str,
}

pub static HOST: Toolchain = Toolchain {
  name: "host",
  goarch: None,
  goos: None,
  gnu_prefix: "",
  kernel_make_targets: &[],
  kernel_path: "",
  kernel_config_path: "",
  kernel_arch: "",
  boot: BootFamily::None,
  cpio_suffix: "",
  cpio_trim_prefix: "",
};

pub static AMD64_LINUX: Toolchain = Toolchain {
  name: "amd64-linux",
  goarch: Some("amd64"),
  goos: Some("linux"),
  gnu_prefix: "x86_64-linux-gnu-",
  kernel_make_targets: &["bindeb-pkg"],
  kernel_path: "arch/x86/boot/bzImage",
  kernel_config_path: "arch/x86/configs",
  kernel_arch: "x86_64",
  boot: BootFamily::Coreboot,
  cpio_suffix: ".cpio.xz",
  cpio_trim_prefix: "",
};

pub static ARM_LINUX: Toolchain = Toolchain {
  name: "arm-linux",
  goarch: Some("arm"),
  goos: Some("linux"),
  gnu_prefix: "arm-linux-gnueabi-",
  kernel_make_targets: &["zImage", "dtbs"],
  kernel_path: "arch/arm/boot/zImage",
  kernel_config_path: "arch/arm/configs",
  kernel_arch: "arm",
  boot: BootFamily::UBoot,
  cpio_suffix: ".cpio.xz",
  cpio_trim_prefix: "goes-",
};

impl Toolchain {
  /// Environment for package builds targeting this toolchain.
  pub fn package_env(&self) -> Vec<(&'static str, &'static str)> {
    let mut env = Vec::new();
    if let Some(arch) = self.goarch {
      env.push(("GOARCH", arch));
    }
    if let Some(os) = self.goos {
      env.push(("GOOS", os));
    }
    env
  }

  /// Compressed initramfs archive built for target `name`.
  pub fn archive_name(&self, name: &str) -> String {
    let full = format!("{name}{}", self.cpio_suffix);
    match full.strip_prefix(self.cpio_trim_prefix) {
      Some(trimmed) if !self.cpio_trim_prefix.is_empty() => trimmed.to_string(),
      _ => full,
    }
  }

  pub fn strip(&self) -> String {
    format!("{}strip", self.gnu_prefix)
  }

  pub fn is_arm(&self) -> bool {
    self.goarch == Some("arm")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn archive_names() {
    assert_eq!(ARM_LINUX.archive_name("goes-platina-mk1-bmc"), "platina-mk1-bmc.cpio.xz");
    assert_eq!(ARM_LINUX.archive_name("goes-boot-arm"), "boot-arm.cpio.xz");
    assert_eq!(AMD64_LINUX.archive_name("goes-boot"), "goes-boot.cpio.xz");
  }

  #[test]
  fn host_sets_no_cross_env() {
    assert!(HOST.package_env().is_empty());
    assert_eq!(ARM_LINUX.package_env(), [("GOARCH", "arm"), ("GOOS", "linux")]);
  }

  #[test]
  fn strip_uses_cross_prefix() {
    assert_eq!(ARM_LINUX.strip(), "arm-linux-gnueabi-strip");
    assert_eq!(HOST.strip(), "strip");
  }

  #[test]
  fn boot_repos() {
    assert_eq!(AMD64_LINUX.boot.repo(), Some("coreboot"));
    assert_eq!(ARM_LINUX.boot.repo(), Some("u-boot"));
    assert_eq!(HOST.boot.repo(), None);
  }
}
