//! Target registry.
//!
//! Targets are immutable once registered. A target may only name
//! dependencies that are already registered, so the dependency graph is
//! acyclic by construction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::builder::Builder;
use crate::config::BuildConfig;

/// Errors raised while registering or looking up targets.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("duplicate target {0}")]
  DuplicateTarget(String),

  #[error("unknown target {0}")]
  UnknownTarget(String),

  #[error("target {target} depends on unregistered target {dependency}")]
  UnknownDependency { target: String, dependency: String },
}

/// A named buildable unit.
#[derive(Debug)]
pub struct Target {
  pub name: String,
  pub builder: Builder,
  /// Machine, defconfig or package path, depending on the builder.
  pub config: String,
  /// Source tree relative to the source root, if the target has one.
  pub dir: Option<PathBuf>,
  /// Member of the set built when no targets are requested.
  pub default: bool,
  pub dependencies: Vec<Arc<Target>>,
}

impl Target {
  /// Absolute source directory of this target.
  pub fn source_dir(&self, config: &BuildConfig) -> Option<PathBuf> {
    self.dir.as_ref().map(|dir| config.source_root.join(dir))
  }

  /// First dependency accepted by `pred`.
  pub fn dependency(&self, pred: impl Fn(&Target) -> bool) -> Option<&Arc<Target>> {
    self.dependencies.iter().find(|dep| pred(dep))
  }
}

/// Definition of a target prior to registration.
#[derive(Debug, Clone)]
pub struct TargetDef {
  pub name: String,
  pub builder: Builder,
  pub config: String,
  pub dir: Option<PathBuf>,
  pub default: bool,
  pub dependencies: Vec<String>,
}

impl TargetDef {
  pub fn new(name: &str, builder: Builder) -> Self {
    Self {
      name: name.to_string(),
      builder,
      config: String::new(),
      dir: None,
      default: false,
      dependencies: Vec::new(),
    }
  }

  pub fn with_config(mut self, config: &str) -> Self {
    self.config = config.to_string();
    self
  }

  pub fn with_dir(mut self, dir: &str) -> Self {
    self.dir = Some(PathBuf::from(dir));
    self
  }

  pub fn default_target(mut self) -> Self {
    self.default = true;
    self
  }

  pub fn depends_on(mut self, deps: &[&str]) -> Self {
    self.dependencies.extend(deps.iter().map(|d| d.to_string()));
    self
  }
}

/// Root targets of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRequest {
  /// Every target flagged as default.
  Default,
  /// Every registered target.
  All,
  /// Explicitly named targets, in order.
  Named(Vec<String>),
}

impl BuildRequest {
  /// Interpret positional command-line arguments.
  ///
  /// No arguments selects the default set; a leading `all` selects
  /// everything.
  pub fn from_args(args: &[String]) -> Self {
    match args.first().map(String::as_str) {
      None => BuildRequest::Default,
      Some("all") => BuildRequest::All,
      Some(_) => BuildRequest::Named(args.to_vec()),
    }
  }
}

/// The set of registered targets, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
  targets: Vec<Arc<Target>>,
  by_name: HashMap<String, usize>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a target. Its dependencies must already be registered.
  pub fn register(&mut self, def: TargetDef) -> Result<Arc<Target>, RegistryError> {
    if self.by_name.contains_key(&def.name) {
      return Err(RegistryError::DuplicateTarget(def.name));
    }

    let mut dependencies = Vec::with_capacity(def.dependencies.len());
    for dep in &def.dependencies {
      let target = self.get(dep).map_err(|_| RegistryError::UnknownDependency {
        target: def.name.clone(),
        dependency: dep.clone(),
      })?;
      dependencies.push(target);
    }

    let target = Arc::new(Target {
      name: def.name,
      builder: def.builder,
      config: def.config,
      dir: def.dir,
      default: def.default,
      dependencies,
    });

    self.by_name.insert(target.name.clone(), self.targets.len());
    self.targets.push(target.clone());
    Ok(target)
  }

  pub fn get(&self, name: &str) -> Result<Arc<Target>, RegistryError> {
    self
      .by_name
      .get(name)
      .map(|&idx| self.targets[idx].clone())
      .ok_or_else(|| RegistryError::UnknownTarget(name.to_string()))
  }

  pub fn targets(&self) -> &[Arc<Target>] {
    &self.targets
  }

  pub fn defaults(&self) -> impl Iterator<Item = &Arc<Target>> {
    self.targets.iter().filter(|t| t.default)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Resolve a request into root targets.
  ///
  /// Every name is looked up before anything is returned, so an unknown
  /// name means nothing gets built.
  pub fn resolve(&self, request: &BuildRequest) -> Result<Vec<Arc<Target>>, RegistryError> {
    match request {
      BuildRequest::Default => Ok(self.defaults().cloned().collect()),
      BuildRequest::All => Ok(self.targets.clone()),
      BuildRequest::Named(names) => names.iter().map(|name| self.get(name)).collect(),
    }
  }
}
