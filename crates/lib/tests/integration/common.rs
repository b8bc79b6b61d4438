//! Shared helpers for library integration tests.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fwbuild_lib::builder::Builder;
use fwbuild_lib::config::BuildConfig;
use fwbuild_lib::execute::{BoxFuture, BuildContext, BuildError, TargetRunner};
use fwbuild_lib::registry::{Registry, Target, TargetDef};

/// Runner that records each invocation and fails the names in `fail`.
#[derive(Default)]
pub struct Recorder {
  pub calls: Mutex<Vec<String>>,
  pub fail: HashSet<String>,
  pub delay: Duration,
}

impl Recorder {
  pub fn failing(names: &[&str]) -> Self {
    Self {
      fail: names.iter().map(|n| n.to_string()).collect(),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count(&self, name: &str) -> usize {
    self.calls().iter().filter(|c| *c == name).count()
  }
}

impl TargetRunner for Recorder {
  fn run<'a>(&'a self, target: &'a Target, ctx: &'a BuildContext) -> BoxFuture<'a, Result<(), BuildError>> {
    Box::pin(async move {
      for dep in &target.dependencies {
        assert!(ctx.is_built(&dep.name), "{} ran before {}", target.name, dep.name);
      }
      self.calls.lock().unwrap().push(target.name.clone());
      tokio::time::sleep(self.delay).await;
      if self.fail.contains(&target.name) {
        return Err(BuildError::CmdFailed {
          cmd: format!("make {}", target.name),
          code: Some(2),
        });
      }
      Ok(())
    })
  }
}

fn node(name: &str) -> TargetDef {
  TargetDef::new(name, Builder::Itb)
}

/// `root -> {b, c}`, `b -> a`, `c -> a`.
pub fn diamond() -> Registry {
  let mut registry = Registry::new();
  registry.register(node("a")).unwrap();
  registry.register(node("b").depends_on(&["a"])).unwrap();
  registry.register(node("c").depends_on(&["a"])).unwrap();
  registry
    .register(node("root").depends_on(&["b", "c"]).default_target())
    .unwrap();
  registry
}

pub fn context(registry: Registry, work_dir: &Path, runner: Arc<dyn TargetRunner>) -> Arc<BuildContext> {
  BuildContext::new(registry, BuildConfig::new(work_dir), runner)
}

/// Write `len` bytes of `fill` to `dir/name`.
pub fn stage(dir: &Path, name: &str, len: usize, fill: u8) {
  std::fs::write(dir.join(name), vec![fill; len]).unwrap();
}

pub fn entry_names(archive: &Path) -> Vec<String> {
  let zip = zip::ZipArchive::new(std::fs::File::open(archive).unwrap()).unwrap();
  zip.file_names().map(str::to_string).collect()
}

pub fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
  let mut zip = zip::ZipArchive::new(std::fs::File::open(archive).unwrap()).unwrap();
  let mut entry = zip.by_name(name).unwrap();
  let mut buf = Vec::new();
  entry.read_to_end(&mut buf).unwrap();
  buf
}
