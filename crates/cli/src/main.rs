mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cmd::BuildArgs;

/// fwbuild - firmware product-line builder
#[derive(Parser)]
#[command(name = "fwbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Targets to build; none builds the default set, `all` builds everything
  targets: Vec<String>,

  /// List packages as the toolchain compiles them
  #[arg(short, long)]
  verbose: bool,

  /// Print every external command as it runs
  #[arg(short = 'x', long)]
  echo: bool,

  /// Print commands without running them
  #[arg(short = 'n', long)]
  dry_run: bool,

  /// Output name for a single package target
  #[arg(short, long)]
  output: Option<String>,

  /// Build tags passed through to package builds
  #[arg(long, value_delimiter = ',')]
  tags: Vec<String>,

  /// Directory where artifacts are staged (default: current directory)
  #[arg(long)]
  work_dir: Option<PathBuf>,

  /// Directory containing the source trees (default: parent of the work directory)
  #[arg(long)]
  source_root: Option<PathBuf>,

  /// Directory holding per-machine worktrees (default: <work-dir>/worktrees)
  #[arg(long)]
  worktree_dir: Option<PathBuf>,

  /// Directory holding provisioning secrets
  #[arg(long)]
  secrets_dir: Option<PathBuf>,

  /// CA bundle installed into initramfs images
  #[arg(long)]
  ca_bundle: Option<PathBuf>,

  /// Rebase existing worktrees onto this ref before building
  #[arg(short, long)]
  rebase: Option<String>,

  /// Clone repositories when a worktree cannot be added
  #[arg(long)]
  clone: bool,

  /// Package for the legacy flash layout
  #[arg(long)]
  legacy: bool,

  /// Release identifier stamped into version blocks: dev or rel
  #[arg(long, default_value = "dev")]
  release: String,

  /// Package toolchain command
  #[arg(long, default_value = "go")]
  toolchain: String,

  /// Parallel jobs for kernel builds
  #[arg(short, long)]
  jobs: Option<usize>,

  /// List the default and `all` target sets
  #[arg(long)]
  list: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if cli.list {
    return cmd::cmd_list();
  }

  cmd::cmd_build(BuildArgs {
    targets: cli.targets,
    verbose: cli.verbose,
    echo: cli.echo,
    dry_run: cli.dry_run,
    output: cli.output,
    tags: cli.tags,
    work_dir: cli.work_dir,
    source_root: cli.source_root,
    worktree_dir: cli.worktree_dir,
    secrets_dir: cli.secrets_dir,
    ca_bundle: cli.ca_bundle,
    rebase: cli.rebase,
    clone: cli.clone,
    legacy: cli.legacy,
    release: cli.release,
    toolchain: cli.toolchain,
    jobs: cli.jobs,
  })
}
