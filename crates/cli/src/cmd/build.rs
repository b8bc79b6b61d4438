//! Implementation of the default build command.
//!
//! Resolves the run configuration from the command line, builds the
//! requested targets from the product-line catalog, and prints a summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use fwbuild_lib::builder::DefaultRunner;
use fwbuild_lib::catalog::catalog;
use fwbuild_lib::config::{BuildConfig, FlashLayout};
use fwbuild_lib::execute::{BuildContext, BuildError, build};
use fwbuild_lib::image::version::ReleaseKind;
use fwbuild_lib::registry::BuildRequest;

use crate::output::{format_duration, print_error, print_info, print_stat, print_success};

/// Options of a build run, as given on the command line.
#[derive(Debug, Default)]
pub struct BuildArgs {
  pub targets: Vec<String>,
  pub verbose: bool,
  pub echo: bool,
  pub dry_run: bool,
  pub output: Option<String>,
  pub tags: Vec<String>,
  pub work_dir: Option<PathBuf>,
  pub source_root: Option<PathBuf>,
  pub worktree_dir: Option<PathBuf>,
  pub secrets_dir: Option<PathBuf>,
  pub ca_bundle: Option<PathBuf>,
  pub rebase: Option<String>,
  pub clone: bool,
  pub legacy: bool,
  pub release: String,
  pub toolchain: String,
  pub jobs: Option<usize>,
}

fn absolute(path: &Path) -> Result<PathBuf> {
  dunce::canonicalize(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Resolve `args` into a run configuration.
fn resolve_config(args: &BuildArgs) -> Result<BuildConfig> {
  let release: ReleaseKind = args.release.parse().context("Invalid --release")?;

  if args.output.is_some() {
    let explicit = !matches!(args.targets.first().map(String::as_str), None | Some("all"));
    if !explicit || args.targets.len() != 1 {
      bail!("--output requires exactly one target");
    }
  }

  let work_dir = match &args.work_dir {
    Some(dir) => absolute(dir)?,
    None => absolute(Path::new("."))?,
  };

  let mut config = BuildConfig::new(work_dir);
  if let Some(dir) = &args.source_root {
    config.source_root = absolute(dir)?;
    config.secrets_dir = config.source_root.join("platina-secrets");
  }
  if let Some(dir) = &args.worktree_dir {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    config.worktree_dir = absolute(dir)?;
  }
  if let Some(dir) = &args.secrets_dir {
    config.secrets_dir = absolute(dir)?;
  }
  if let Some(path) = &args.ca_bundle {
    config.ca_bundle = absolute(path)?;
  }

  config.layout = FlashLayout::from_legacy_flag(args.legacy);
  config.dry_run = args.dry_run;
  config.echo_commands = args.echo;
  config.verbose = args.verbose;
  config.tags = args.tags.iter().filter(|t| !t.is_empty()).cloned().collect();
  config.output = args.output.clone();
  config.rebase = args.rebase.clone();
  config.clone_fallback = args.clone;
  config.release = release;
  config.toolchain = args.toolchain.clone();
  if let Some(jobs) = args.jobs {
    config.jobs = jobs.max(1);
  }

  debug!(?config, "resolved configuration");
  Ok(config)
}

/// Build the requested targets.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let config = resolve_config(&args)?;
  let request = BuildRequest::from_args(&args.targets);
  let registry = catalog().context("Failed to load target catalog")?;

  print_info(&format!(
    "Building in {} ({} layout{})",
    config.work_dir.display(),
    config.layout,
    if config.dry_run { ", dry run" } else { "" }
  ));

  let ctx = BuildContext::new(registry, config, Arc::new(DefaultRunner));
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  match rt.block_on(build(&ctx, &request)) {
    Ok(summary) => {
      print_success(&format!(
        "Built {} target(s) in {}",
        summary.built.len(),
        format_duration(summary.elapsed)
      ));
      for name in &summary.built {
        print_stat("built", name);
      }
      Ok(())
    }
    Err(err) => {
      report_failure(&err);
      Err(anyhow::Error::new(err).context("Build failed"))
    }
  }
}

fn report_failure(err: &BuildError) {
  let path = err.target_path();
  if !path.is_empty() {
    print_error(&format!("failed target: {}", path.join(" -> ")));
  }
  print_error(&err.root_cause().to_string());
}
