//! External command execution
//!
//! Stages never talk to external tools directly; they build a [`Cmd`] and run it.
//! Output is captured (stdout then stderr) and attached to the error on failure,
//! together with the command line and working directory as details. A deadline
//! is local to one invocation: when it passes, the child's whole process group
//! is killed and whatever output arrived so far is returned. Nothing else is
//! cancelled.

use crate::core::context::Context;
use crate::core::error::{DetailedError, YardResult};
use anyhow::anyhow;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Poll interval while waiting on a child with a deadline
const POLL: Duration = Duration::from_millis(20);

/// One external command invocation
#[derive(Debug, Clone)]
pub struct Cmd {
  program: String,
  args: Vec<String>,
  dir: PathBuf,
  env: Vec<(String, String)>,
  timeout: Option<Duration>,
}

impl Cmd {
  /// Build from an argv; the first element is the program
  pub fn from_argv(argv: &[String]) -> YardResult<Self> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty command"))?;
    Ok(Self {
      program: program.clone(),
      args: args.to_vec(),
      dir: PathBuf::from("."),
      env: Vec::new(),
      timeout: None,
    })
  }

  /// Build from a hook line such as `make docs` or `sh -c "echo 'a b'"`
  pub fn from_line(line: &str) -> YardResult<Self> {
    Self::from_argv(&split_line(line)?)
  }

  /// Working directory, environment and deadline of a run context
  pub fn in_context(self, ctx: &Context) -> Self {
    let env = ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    self.dir(ctx.root()).envs(env).timeout(ctx.command_timeout)
  }

  pub fn dir(mut self, dir: &Path) -> Self {
    self.dir = dir.to_path_buf();
    self
  }

  pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
    self.env.extend(env);
    self
  }

  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  /// Command line for logs and error details
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Run to completion, returning the combined output
  pub fn run(&self) -> YardResult<String> {
    debug!(cmd = %self.display(), dir = %self.dir.display(), "running");

    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .current_dir(&self.dir)
      .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    #[cfg(unix)]
    {
      use std::os::unix::process::CommandExt;
      // Own group, so a timeout also reaches anything the command spawned
      command.process_group(0);
    }
    let mut child = command
      .spawn()
      .map_err(|e| {
        let message = if e.kind() == io::ErrorKind::NotFound {
          format!("command not found: {}", self.program)
        } else {
          format!("failed to start {}", self.program)
        };
        self.detailed(anyhow::Error::new(e)).with_message(message)
      })?;

    let stdout = child.stdout.take().map(Drain::start);
    let stderr = child.stderr.take().map(Drain::start);

    let status = match self.timeout {
      None => child.wait()?,
      Some(limit) => match wait_with_deadline(&mut child, limit)? {
        Some(status) => status,
        None => {
          // Descendants that escaped the group may still hold the pipes
          let output = snapshot(&stdout, &stderr);
          return Err(
            self
              .detailed(anyhow!("{} timed out after {:?}", self.program, limit))
              .with_output(output)
              .into(),
          );
        }
      },
    };

    let output = collect(stdout, stderr);
    if !status.success() {
      return Err(
        self
          .detailed(anyhow!("{} failed: {}", self.program, status))
          .with_output(output)
          .into(),
      );
    }
    Ok(output)
  }

  fn detailed(&self, err: anyhow::Error) -> DetailedError {
    DetailedError::wrap(err)
      .with_detail("cmd", self.display())
      .with_detail("dir", self.dir.display())
  }
}

/// A pipe read on its own thread into a shared buffer
struct Drain {
  buf: Arc<Mutex<Vec<u8>>>,
  handle: thread::JoinHandle<()>,
}

impl Drain {
  fn start<R: Read + Send + 'static>(mut reader: R) -> Self {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let handle = thread::spawn(move || {
      let mut chunk = [0u8; 8192];
      // A read error only truncates what we show; the exit status decides success
      while let Ok(n) = reader.read(&mut chunk) {
        if n == 0 {
          break;
        }
        sink.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(&chunk[..n]);
      }
    });
    Self { buf, handle }
  }

  fn bytes(&self) -> Vec<u8> {
    self.buf.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

/// Everything both pipes produced, after they closed
fn collect(stdout: Option<Drain>, stderr: Option<Drain>) -> String {
  let mut output = Vec::new();
  for drain in [stdout, stderr].into_iter().flatten() {
    let _ = drain.handle.join();
    output.extend_from_slice(&drain.buf.lock().unwrap_or_else(PoisonError::into_inner));
  }
  String::from_utf8_lossy(&output).into_owned()
}

/// Whatever both pipes produced so far; the reader threads are left to finish alone
fn snapshot(stdout: &Option<Drain>, stderr: &Option<Drain>) -> String {
  let mut output = Vec::new();
  for drain in [stdout, stderr].into_iter().flatten() {
    output.extend(drain.bytes());
  }
  String::from_utf8_lossy(&output).into_owned()
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> YardResult<Option<std::process::ExitStatus>> {
  let deadline = Instant::now() + limit;
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if Instant::now() >= deadline {
      kill_group(child);
      child.wait()?;
      return Ok(None);
    }
    thread::sleep(POLL);
  }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
  use nix::sys::signal::{Signal, killpg};
  use nix::unistd::Pid;

  // The group id is the child's pid, see `process_group(0)` above
  if killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL).is_err() {
    // Already exited between the checks is fine
    let _ = child.kill();
  }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
  // Already exited between the checks is fine
  let _ = child.kill();
}

/// Split a command line into words, honoring single and double quotes
pub fn split_line(line: &str) -> YardResult<Vec<String>> {
  let mut words = Vec::new();
  let mut current = String::new();
  let mut in_word = false;
  let mut quote: Option<char> = None;

  for c in line.chars() {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => current.push(c),
      None if c == '\'' || c == '"' => {
        quote = Some(c);
        in_word = true;
      }
      None if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut current));
          in_word = false;
        }
      }
      None => {
        current.push(c);
        in_word = true;
      }
    }
  }

  if quote.is_some() {
    anyhow::bail!("unbalanced quotes in command: {}", line);
  }
  if in_word {
    words.push(current);
  }
  Ok(words)
}

/// Resolve a command name against PATH (or check it directly when it has a separator)
pub fn look_path(program: &str) -> Option<PathBuf> {
  let candidate = Path::new(program);
  if candidate.components().count() > 1 {
    return is_executable(candidate).then(|| candidate.to_path_buf());
  }
  let path = std::env::var_os("PATH")?;
  std::env::split_paths(&path)
    .flat_map(|dir| executable_names(program).into_iter().map(move |name| dir.join(name)))
    .find(|full| is_executable(full))
}

#[cfg(windows)]
fn executable_names(program: &str) -> Vec<String> {
  vec![program.to_string(), format!("{}.exe", program)]
}

#[cfg(not(windows))]
fn executable_names(program: &str) -> Vec<String> {
  vec![program.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
