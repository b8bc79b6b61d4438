//! Per-machine worktrees of external source trees.
//!
//! `worktree_dir/<repo>/<machine>` is checked out on first use from the
//! repository found under the source root, then configured. Later runs
//! reuse it, optionally rebasing first.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::execute::{BuildError, CmdOptions, Invocation};

fn worktree_error(repo: &str, machine: &str, message: impl Into<String>) -> BuildError {
  BuildError::Worktree {
    repo: repo.to_string(),
    machine: machine.to_string(),
    message: message.into(),
  }
}

/// Whether `name` is exactly one normal path component.
fn is_single_component(name: &str) -> bool {
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(c)), None) if c == name
  )
}

/// Directories searched, in order, for a checkout of `repo`.
pub fn repo_candidates(config: &BuildConfig, repo: &str) -> Vec<PathBuf> {
  vec![
    config.source_root.join(repo),
    config.source_root.join("src").join(repo),
    config.source_root.join("system-build").join("src").join(repo),
  ]
}

/// First candidate that has a `.git` entry.
pub fn find_git_dir(config: &BuildConfig, repo: &str) -> Option<PathBuf> {
  repo_candidates(config, repo)
    .into_iter()
    .find(|dir| dir.join(".git").exists())
}

/// Branch name for a worktree at `path`.
pub fn branch_name(path: &Path) -> String {
  format!("worktree_{}", path.to_string_lossy().replace('/', "_"))
}

pub fn worktree_path(config: &BuildConfig, repo: &str, machine: &str) -> PathBuf {
  config.worktree_dir.join(repo).join(machine)
}

/// Ensure the worktree for `repo`/`machine` exists and is configured.
///
/// `configure` runs inside the worktree after checkout, and again after a
/// rebase of an existing worktree.
pub async fn ensure_worktree(
  config: &BuildConfig,
  repo: &str,
  machine: &str,
  configure: &[Invocation],
) -> Result<PathBuf, BuildError> {
  if !is_single_component(repo) || !is_single_component(machine) {
    return Err(worktree_error(repo, machine, "names must be single path components"));
  }

  let opts = CmdOptions::from(config);
  let workdir = worktree_path(config, repo, machine);

  if workdir.exists() {
    if let Some(rebase) = &config.rebase {
      info!(repo, machine, onto = %rebase, "rebasing worktree");
      Invocation::new("git")
        .args(["rebase", rebase.as_str()])
        .cwd(&workdir)
        .run(&opts)
        .await?;
      run_configure(&workdir, configure, &opts).await?;
    } else {
      debug!(repo, machine, path = %workdir.display(), "reusing worktree");
    }
    return Ok(workdir);
  }

  let gitdir = find_git_dir(config, repo)
    .ok_or_else(|| worktree_error(repo, machine, "no git checkout found under the source root"))?;
  info!(repo, machine, gitdir = %gitdir.display(), path = %workdir.display(), "creating worktree");

  if !opts.dry_run {
    if let Some(parent) = workdir.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
  }

  let git = |args: &[&str]| Invocation::new("git").args(args.iter().copied()).cwd(&gitdir);
  let branch = branch_name(&workdir);
  let path = workdir.to_string_lossy().to_string();

  if let Err(err) = git(&["worktree", "prune"]).run(&opts).await {
    warn!(repo, error = %err, "worktree prune failed");
  }
  // A stale branch from a deleted worktree blocks `worktree add -b`.
  if let Err(err) = git(&["branch", "-D", branch.as_str()]).run(&opts).await {
    debug!(repo, branch = %branch, error = %err, "no stale branch to delete");
  }

  let added = git(&["worktree", "add", "-b", branch.as_str(), path.as_str()]).run(&opts).await;
  match added {
    Ok(()) => {}
    Err(err) if config.clone_fallback => {
      warn!(repo, error = %err, "worktree add failed, cloning instead");
      git(&["clone", ".", path.as_str()]).run(&opts).await?;
    }
    Err(err) => return Err(err),
  }

  run_configure(&workdir, configure, &opts).await?;
  Ok(workdir)
}

async fn run_configure(workdir: &Path, configure: &[Invocation], opts: &CmdOptions) -> Result<(), BuildError> {
  for step in configure {
    step.clone().cwd(workdir).run(opts).await?;
  }
  Ok(())
}
