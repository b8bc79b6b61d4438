//! External command invocation.
//!
//! Every external tool is run from an argument vector with an explicit
//! working directory and environment additions. No shell is involved.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::execute::types::BuildError;

/// How invocations are carried out for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmdOptions {
  /// Log instead of running.
  pub dry_run: bool,
  /// Log at info rather than debug.
  pub echo: bool,
}

impl CmdOptions {
  /// Options that run the command even in a dry run, for tools that honor
  /// their own dry-run flag.
  pub fn always_run(self) -> Self {
    Self { dry_run: false, ..self }
  }
}

impl From<&BuildConfig> for CmdOptions {
  fn from(config: &BuildConfig) -> Self {
    Self {
      dry_run: config.dry_run,
      echo: config.echo_commands,
    }
  }
}

/// A structured command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Added to the inherited environment.
  pub env: BTreeMap<String, String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy())
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.args).envs(&self.env).kill_on_drop(true);
    if let Some(dir) = &self.cwd {
      command.current_dir(dir);
    }
    command
  }

  fn log(&self, opts: &CmdOptions) {
    let cwd = self.cwd.as_deref().map(Path::display);
    if opts.echo {
      info!(cmd = %self, cwd = ?cwd, dry_run = opts.dry_run, "executing command");
    } else {
      debug!(cmd = %self, cwd = ?cwd, dry_run = opts.dry_run, "executing command");
    }
  }

  fn spawn_error(&self, source: std::io::Error) -> BuildError {
    BuildError::Spawn {
      cmd: self.to_string(),
      source,
    }
  }

  fn check(&self, output: &Output) -> Result<(), BuildError> {
    if output.status.success() {
      return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }

    Err(BuildError::CmdFailed {
      cmd: self.to_string(),
      code: output.status.code(),
    })
  }

  /// Run to completion, failing on a nonzero exit.
  pub async fn run(&self, opts: &CmdOptions) -> Result<(), BuildError> {
    self.output(opts).await.map(|_| ())
  }

  /// Run to completion and return trimmed stdout. A dry run returns an
  /// empty string.
  pub async fn output(&self, opts: &CmdOptions) -> Result<String, BuildError> {
    self.log(opts);
    if opts.dry_run {
      return Ok(String::new());
    }

    let output = self
      .command()
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| self.spawn_error(e))?;
    self.check(&output)?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command output");
    }
    Ok(stdout)
  }

  /// Feed `input` on stdin and return stdout. A dry run returns nothing.
  pub async fn filter(&self, input: Vec<u8>, opts: &CmdOptions) -> Result<Vec<u8>, BuildError> {
    self.log(opts);
    if opts.dry_run {
      return Ok(Vec::new());
    }

    let mut child = self
      .command()
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| self.spawn_error(e))?;

    let mut stdin = child
      .stdin
      .take()
      .ok_or_else(|| self.spawn_error(std::io::Error::other("stdin not captured")))?;
    let writer = tokio::spawn(async move {
      stdin.write_all(&input).await?;
      stdin.shutdown().await
    });

    let output = child.wait_with_output().await?;
    self.check(&output)?;
    writer.await??;

    Ok(output.stdout)
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (key, value) in &self.env {
      write!(f, "{key}={value} ")?;
    }
    f.write_str(&self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains([' ', '\t']) {
        write!(f, " {arg:?}")?;
      } else {
        write!(f, " {arg}")?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn opts() -> CmdOptions {
    CmdOptions::default()
  }

  #[test]
  fn display_quotes_args_with_spaces() {
    let inv = Invocation::new("go")
      .args(["build", "-gcflags", "-N -l"])
      .env("GOARCH", "arm");
    assert_eq!(inv.to_string(), r#"GOARCH=arm go build -gcflags "-N -l""#);
  }

  #[tokio::test]
  async fn output_trims_stdout() {
    let out = Invocation::new("echo").arg("hello").output(&opts()).await.unwrap();
    assert_eq!(out, "hello");
  }

  #[tokio::test]
  async fn env_is_added() {
    let out = Invocation::new("sh")
      .args(["-c", "echo $MY_VAR"])
      .env("MY_VAR", "my_value")
      .output(&opts())
      .await
      .unwrap();
    assert_eq!(out, "my_value");
  }

  #[tokio::test]
  async fn cwd_is_set() {
    let temp = TempDir::new().unwrap();
    Invocation::new("touch")
      .arg("cwd_marker")
      .cwd(temp.path())
      .run(&opts())
      .await
      .unwrap();
    assert!(temp.path().join("cwd_marker").exists());
  }

  #[tokio::test]
  async fn failure_reports_exit_code() {
    let result = Invocation::new("sh").args(["-c", "exit 3"]).run(&opts()).await;
    assert!(matches!(result, Err(BuildError::CmdFailed { code: Some(3), .. })));
  }

  #[tokio::test]
  async fn missing_program_is_spawn_error() {
    let result = Invocation::new("definitely-not-a-real-tool").run(&opts()).await;
    assert!(matches!(result, Err(BuildError::Spawn { .. })));
  }

  #[tokio::test]
  async fn dry_run_does_not_execute() {
    let temp = TempDir::new().unwrap();
    let dry = CmdOptions {
      dry_run: true,
      echo: true,
    };
    let out = Invocation::new("touch")
      .arg("marker")
      .cwd(temp.path())
      .output(&dry)
      .await
      .unwrap();
    assert!(out.is_empty());
    assert!(!temp.path().join("marker").exists());
  }

  #[tokio::test]
  async fn filter_pipes_stdin() {
    let out = Invocation::new("cat")
      .filter(b"payload".to_vec(), &opts())
      .await
      .unwrap();
    assert_eq!(out, b"payload");
  }

  #[tokio::test]
  async fn filter_failure_reports_exit_code() {
    let result = Invocation::new("sh")
      .args(["-c", "cat >/dev/null; exit 1"])
      .filter(vec![0; 16], &opts())
      .await;
    assert!(matches!(result, Err(BuildError::CmdFailed { code: Some(1), .. })));
  }
}
