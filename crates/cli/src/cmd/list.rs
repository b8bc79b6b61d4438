use anyhow::{Context, Result};

use fwbuild_lib::catalog::catalog;

/// Print the default target set and the full target set.
pub fn cmd_list() -> Result<()> {
  let registry = catalog().context("Failed to load target catalog")?;

  println!("default:");
  for target in registry.defaults() {
    println!("\t{}", target.name);
  }
  println!("all:");
  for target in registry.targets() {
    println!("\t{}", target.name);
  }
  Ok(())
}
