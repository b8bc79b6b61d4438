//! Target scheduling.
//!
//! A build walks the dependency graph depth-first as a fork-join tree:
//! each level's targets are spawned onto a `JoinSet` and joined before the
//! dependent's builder runs. Every target owns a single-assignment cell
//! holding its outcome, so a target reached through several dependents is
//! built once and the rest wait on the same cell.
//!
//! A target's builder runs on its own task, started synchronously when its
//! cell is first claimed; the cell then only holds a receiver for the
//! outcome. Aborting a waiter never leaves a half-initialized cell behind.
//!
//! Any failure is fatal: the first error aborts the remaining siblings and
//! every in-flight target run, and is returned from [`build`]. A cancelled
//! target is never started again; later requests for it fail with
//! [`BuildError::Cancelled`].

pub mod cmd;
pub mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{OnceCell, watch};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{error, info};

use crate::config::BuildConfig;
use crate::registry::{BuildRequest, Registry, RegistryError, Target};

pub use cmd::{CmdOptions, Invocation};
pub use types::{BoxFuture, BuildError, BuildSummary, TargetRunner};

type Outcome = Result<(), Arc<BuildError>>;

/// Resolves to `Some` once the target's run finishes. A closed channel
/// with `None` means the run was aborted.
type OutcomeRx = watch::Receiver<Option<Outcome>>;

/// Everything a run needs, constructed once and shared by all tasks.
pub struct BuildContext {
  registry: Registry,
  config: BuildConfig,
  runner: Arc<dyn TargetRunner>,
  cells: HashMap<String, OnceCell<OutcomeRx>>,
  runs: Mutex<Vec<AbortHandle>>,
  built: Mutex<Vec<String>>,
}

impl BuildContext {
  pub fn new(registry: Registry, config: BuildConfig, runner: Arc<dyn TargetRunner>) -> Arc<Self> {
    let cells = registry
      .targets()
      .iter()
      .map(|t| (t.name.clone(), OnceCell::new()))
      .collect();
    Arc::new(Self {
      registry,
      config,
      runner,
      cells,
      runs: Mutex::new(Vec::new()),
      built: Mutex::new(Vec::new()),
    })
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  pub fn cmd_options(&self) -> CmdOptions {
    CmdOptions::from(&self.config)
  }

  /// Whether `name` has been built successfully in this run.
  pub fn is_built(&self, name: &str) -> bool {
    self
      .cells
      .get(name)
      .and_then(OnceCell::get)
      .is_some_and(|rx| matches!(*rx.borrow(), Some(Ok(()))))
  }

  /// Targets built so far, in completion order.
  pub fn built(&self) -> Vec<String> {
    self.built.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  fn track_run(&self, handle: AbortHandle) {
    self.runs.lock().unwrap_or_else(PoisonError::into_inner).push(handle);
  }

  fn abort_runs(&self) {
    for run in self.runs.lock().unwrap_or_else(PoisonError::into_inner).iter() {
      run.abort();
    }
  }

  fn record_built(&self, name: &str) {
    self
      .built
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(name.to_string());
  }
}

/// Build the targets named by `request` and everything they depend on.
///
/// Names are resolved before anything is built, so an unknown target
/// fails the run without side effects.
pub async fn build(ctx: &Arc<BuildContext>, request: &BuildRequest) -> Result<BuildSummary, BuildError> {
  let roots = ctx.registry.resolve(request)?;
  info!(targets = roots.len(), layout = %ctx.config.layout, "starting build");

  let start = Instant::now();
  if let Err(err) = build_all(ctx.clone(), roots, None).await {
    ctx.abort_runs();
    return Err(err);
  }

  Ok(BuildSummary {
    built: ctx.built(),
    elapsed: start.elapsed(),
  })
}

/// Build `targets` concurrently and join them all.
fn build_all(ctx: Arc<BuildContext>, targets: Vec<Arc<Target>>, parent: Option<String>) -> BoxFuture<'static, Result<(), BuildError>> {
  Box::pin(async move {
    let mut join_set = JoinSet::new();
    for target in targets {
      join_set.spawn(build_target(ctx.clone(), target, parent.clone()));
    }

    while let Some(joined) = join_set.join_next().await {
      let result = joined.map_err(BuildError::from).and_then(|r| r);
      if let Err(err) = result {
        join_set.abort_all();
        return Err(err);
      }
    }
    Ok(())
  })
}

fn build_target(ctx: Arc<BuildContext>, target: Arc<Target>, parent: Option<String>) -> BoxFuture<'static, Result<(), BuildError>> {
  Box::pin(async move {
    let cell = ctx
      .cells
      .get(&target.name)
      .ok_or_else(|| RegistryError::UnknownTarget(target.name.clone()))?;

    let mut ran = false;
    let rx = cell
      .get_or_init(|| {
        ran = true;
        std::future::ready(start_run(&ctx, &target, &parent))
      })
      .await;

    let mut rx = rx.clone();
    let outcome = rx.wait_for(Option::is_some).await.ok().and_then(|done| done.clone());
    let Some(outcome) = outcome else {
      return Err(BuildError::Target {
        target: target.name.clone(),
        source: Arc::new(BuildError::Cancelled(target.name.clone())),
      });
    };

    match outcome {
      Ok(()) => {
        if !ran {
          info!(target = %target.name, parent = parent.as_deref().unwrap_or(""), "target already built");
        }
        Ok(())
      }
      Err(err) => Err(BuildError::Target {
        target: target.name.clone(),
        source: err,
      }),
    }
  })
}

/// Spawn the run of `target` and return a receiver for its outcome.
fn start_run(ctx: &Arc<BuildContext>, target: &Arc<Target>, parent: &Option<String>) -> OutcomeRx {
  let (tx, rx) = watch::channel(None);
  let run = run_target(ctx.clone(), target.clone(), parent.clone());
  let handle = tokio::spawn(async move {
    let _ = tx.send(Some(run.await));
  });
  ctx.track_run(handle.abort_handle());
  rx
}

async fn run_target(ctx: Arc<BuildContext>, target: Arc<Target>, parent: Option<String>) -> Outcome {
  match &parent {
    Some(parent) => info!(target = %target.name, parent = %parent, "building dependency"),
    None => info!(target = %target.name, "building target"),
  }

  if !target.dependencies.is_empty() {
    build_all(ctx.clone(), target.dependencies.clone(), Some(target.name.clone()))
      .await
      .map_err(Arc::new)?;
  }

  let start = Instant::now();
  if let Err(err) = ctx.runner.run(&target, &ctx).await {
    error!(target = %target.name, error = %err, "target failed");
    return Err(Arc::new(err));
  }

  ctx.record_built(&target.name);
  info!(
    target = %target.name,
    elapsed = %humantime::format_duration(start.elapsed()),
    "target built"
  );
  Ok(())
}
