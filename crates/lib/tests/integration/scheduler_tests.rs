//! Scheduler behavior over small graphs with a recording runner.

use std::sync::Arc;
use std::time::Duration;

use fwbuild_lib::execute::{BuildError, build};
use fwbuild_lib::registry::{BuildRequest, RegistryError};
use tempfile::TempDir;

use super::common::{Recorder, context, diamond};

fn named(names: &[&str]) -> BuildRequest {
  BuildRequest::Named(names.iter().map(|n| n.to_string()).collect())
}

#[tokio::test]
async fn diamond_builds_shared_dependency_once() {
  let temp = TempDir::new().unwrap();
  let runner = Arc::new(Recorder {
    delay: Duration::from_millis(5),
    ..Recorder::default()
  });
  let ctx = context(diamond(), temp.path(), runner.clone());

  let summary = build(&ctx, &named(&["root"])).await.unwrap();

  assert_eq!(runner.count("a"), 1);
  assert_eq!(runner.calls().len(), 4);
  assert_eq!(runner.calls().first().map(String::as_str), Some("a"));
  assert_eq!(runner.calls().last().map(String::as_str), Some("root"));
  assert_eq!(summary.built.len(), 4);
}

#[tokio::test]
async fn requesting_a_dependency_twice_builds_it_once() {
  let temp = TempDir::new().unwrap();
  let runner = Arc::new(Recorder::default());
  let ctx = context(diamond(), temp.path(), runner.clone());

  build(&ctx, &named(&["a", "root", "a"])).await.unwrap();
  assert_eq!(runner.count("a"), 1);
  assert_eq!(runner.count("root"), 1);
}

#[tokio::test]
async fn unknown_target_builds_nothing() {
  let temp = TempDir::new().unwrap();
  let runner = Arc::new(Recorder::default());
  let ctx = context(diamond(), temp.path(), runner.clone());

  let err = build(&ctx, &named(&["a", "no-such-target"])).await.unwrap_err();
  assert!(matches!(
    err,
    BuildError::Registry(RegistryError::UnknownTarget(ref name)) if name == "no-such-target"
  ));
  assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn failed_dependency_stops_dependents() {
  let temp = TempDir::new().unwrap();
  let runner = Arc::new(Recorder::failing(&["a"]));
  let ctx = context(diamond(), temp.path(), runner.clone());

  let err = build(&ctx, &BuildRequest::Default).await.unwrap_err();

  assert!(matches!(err.root_cause(), BuildError::CmdFailed { code: Some(2), .. }));
  let path = err.target_path();
  assert_eq!(path.first(), Some(&"root"));
  assert_eq!(path.last(), Some(&"a"));
  assert_eq!(runner.count("a"), 1);
  assert_eq!(runner.count("b"), 0);
  assert_eq!(runner.count("root"), 0);
}

#[tokio::test]
async fn all_builds_every_target() {
  let temp = TempDir::new().unwrap();
  let runner = Arc::new(Recorder::default());
  let ctx = context(diamond(), temp.path(), runner.clone());

  build(&ctx, &BuildRequest::All).await.unwrap();
  let mut calls = runner.calls();
  calls.sort();
  assert_eq!(calls, ["a", "b", "c", "root"]);
}
