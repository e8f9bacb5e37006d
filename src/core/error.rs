//! Error types for railyard with contextual messages and exit codes
//!
//! Every fallible operation returns [`YardResult`], an `anyhow::Result`. Errors that
//! need presentation data (a friendly message, key/value details, captured tool
//! output, an exit code) are wrapped in a [`DetailedError`]. Wrapping stacks: the
//! wrapped error stays reachable through `source()`, so chain walks such as
//! [`caused_by`] and [`crate::pipe::is_skip`] see through any number of layers.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for railyard
pub type YardResult<T> = anyhow::Result<T>;

/// Exit codes for railyard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (external tool, I/O)
  System = 2,
  /// Validation failure (health check failed)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Sentinel appended to an odd-length detail list
pub const MISSING_VALUE: &str = "missing value";

/// An error decorated with a message, ordered key/value details, captured
/// output and an exit code.
///
/// `Display` always renders the wrapped error; the message is presentation
/// data read by [`message_of`].
#[derive(Debug)]
pub struct DetailedError {
  inner: anyhow::Error,
  message: Option<String>,
  details: Vec<(String, String)>,
  output: Option<String>,
  exit: Option<i32>,
}

impl DetailedError {
  /// Wrap an error. If it already carries a `DetailedError` somewhere in its
  /// chain, that error's details, message, output and exit code are inherited
  /// and can be overridden by the builder methods.
  pub fn wrap(err: impl Into<anyhow::Error>) -> Self {
    let inner = err.into();
    let (message, details, output, exit) = match find::<DetailedError>(&inner) {
      Some(de) => (de.message.clone(), de.details.clone(), de.output.clone(), de.exit),
      None => (None, Vec::new(), None, None),
    };
    Self {
      inner,
      message,
      details,
      output,
      exit,
    }
  }

  /// Set the user-facing message (outer-most message wins)
  pub fn with_message(mut self, message: impl Into<String>) -> Self {
    self.message = Some(message.into());
    self
  }

  /// Set an explicit exit code
  pub fn with_exit(mut self, exit: i32) -> Self {
    self.exit = Some(exit);
    self
  }

  /// Attach captured tool output (kept from the inner error when unset)
  pub fn with_output(mut self, output: impl Into<String>) -> Self {
    let output = output.into();
    if !output.is_empty() {
      self.output = Some(output);
    }
    self
  }

  /// Add a single detail. An existing key is overwritten in place.
  pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.set_detail(key.into(), value.to_string());
    self
  }

  /// Add details from alternating key/value arguments.
  ///
  /// An odd count gets [`MISSING_VALUE`] as the last key's value.
  pub fn with_details<I, S>(mut self, pairs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: ToString,
  {
    let mut iter = pairs.into_iter();
    while let Some(key) = iter.next() {
      let value = iter.next().map(|v| v.to_string()).unwrap_or_else(|| MISSING_VALUE.to_string());
      self.set_detail(key.to_string(), value);
    }
    self
  }

  fn set_detail(&mut self, key: String, value: String) {
    match self.details.iter_mut().find(|(k, _)| *k == key) {
      Some(slot) => slot.1 = value,
      None => self.details.push((key, value)),
    }
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn details(&self) -> &[(String, String)] {
    &self.details
  }

  pub fn output(&self) -> Option<&str> {
    self.output.as_deref()
  }

  /// Resolved exit code: this error's explicit code, else the wrapped one's, else 1
  pub fn exit(&self) -> i32 {
    self.exit.unwrap_or(ExitCode::User.as_i32())
  }

  /// The wrapped error
  pub fn inner(&self) -> &anyhow::Error {
    &self.inner
  }
}

impl fmt::Display for DetailedError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.inner)
  }
}

impl std::error::Error for DetailedError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&*self.inner)
  }
}

/// First error of type `E` anywhere in the chain
pub fn find<E>(err: &anyhow::Error) -> Option<&E>
where
  E: std::error::Error + 'static,
{
  err.chain().find_map(|cause| cause.downcast_ref::<E>())
}

/// Whether an error of type `E` is anywhere in the chain
pub fn caused_by<E>(err: &anyhow::Error) -> bool
where
  E: std::error::Error + 'static,
{
  find::<E>(err).is_some()
}

/// Exit code to report for an error
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
  if let Some(de) = find::<DetailedError>(err) {
    return de.exit();
  }
  if let Some(ce) = find::<ConfigError>(err) {
    return ce.exit_code().as_i32();
  }
  ExitCode::User.as_i32()
}

/// Details of the outer-most detailed error, empty when there is none
pub fn details_of(err: &anyhow::Error) -> Vec<(String, String)> {
  find::<DetailedError>(err).map(|de| de.details.clone()).unwrap_or_default()
}

/// Message of the outer-most detailed error
pub fn message_of(err: &anyhow::Error) -> Option<String> {
  find::<DetailedError>(err).and_then(|de| de.message.clone())
}

/// Captured output of the outer-most detailed error
pub fn output_of(err: &anyhow::Error) -> Option<String> {
  find::<DetailedError>(err).and_then(|de| de.output.clone())
}

/// Configuration-related errors
///
/// Raised while loading the project file or while stages normalize their
/// configuration. These abort the run before any side effect happens.
#[derive(Debug)]
pub enum ConfigError {
  /// railyard.toml not found
  NotFound { root: PathBuf },

  /// Config file could not be parsed
  Parse { path: PathBuf, message: String },

  /// Missing required field
  MissingField { field: String },

  /// Field has an unsupported value
  InvalidValue { field: String, value: String, expected: String },

  /// Two entries of the same kind share an id
  DuplicateId { kind: String, id: String, count: usize },

  /// A skip key outside the allow-list of the current run
  SkipNotAllowed { key: String, allowed: Vec<String> },
}

impl ConfigError {
  pub fn exit_code(&self) -> ExitCode {
    ExitCode::User
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Create a railyard.toml with at least `project_name = \"...\"`.".to_string()),
      ConfigError::DuplicateId { kind, .. } => Some(format!("Give every entry in [[{}]] a distinct `id`.", kind)),
      ConfigError::SkipNotAllowed { .. } => Some("Run `railyard release --help` to list the valid --skip keys.".to_string()),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { root } => {
        write!(
          f,
          "No railyard configuration found.\nExpected file: {}/railyard.toml",
          root.display()
        )
      }
      ConfigError::Parse { path, message } => {
        write!(f, "Failed to parse {}: {}", path.display(), message)
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::InvalidValue { field, value, expected } => {
        write!(f, "invalid {} '{}', expected one of: {}", field, value, expected)
      }
      ConfigError::DuplicateId { kind, id, count } => {
        write!(f, "found {} {} with the ID '{}', please fix your config", count, kind, id)
      }
      ConfigError::SkipNotAllowed { key, allowed } => {
        write!(
          f,
          "--skip={} is not allowed. Valid options for skip are [{}]",
          key,
          allowed.join(", ")
        )
      }
    }
  }
}

impl std::error::Error for ConfigError {}

/// Pretty-print an error to stderr with details and help text
pub fn print_error(error: &anyhow::Error) {
  match message_of(error) {
    Some(message) => eprintln!("\n❌ {}: {}\n", message, error),
    None => eprintln!("\n❌ {}\n", error),
  }

  for cause in error.chain().skip(1) {
    // DetailedError displays its inner error, which would repeat the line above
    if cause.downcast_ref::<DetailedError>().is_some() {
      continue;
    }
    eprintln!("   caused by: {}", cause);
  }

  let details = details_of(error);
  if !details.is_empty() {
    eprintln!();
    for (key, value) in &details {
      eprintln!("   {}: {}", key, value);
    }
  }

  if let Some(output) = output_of(error) {
    eprintln!("\n📄 Output:\n{}", output.trim_end());
  }

  if let Some(help) = find::<ConfigError>(error).and_then(|e| e.help_message()) {
    eprintln!("\n💡 Help: {}\n", help);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;

  #[derive(Debug)]
  struct Fake;

  impl fmt::Display for Fake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "fake")
    }
  }

  impl std::error::Error for Fake {}

  fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn test_details() {
    let og = anyhow::Error::new(Fake);
    let err = anyhow::Error::new(
      DetailedError::wrap(og)
        .with_message("message")
        .with_details(["foo", "bar", "hi", "10"]),
    );

    assert_eq!(details_of(&err), pairs(&[("foo", "bar"), ("hi", "10")]));
    assert_eq!(exit_code_of(&err), 1);
    assert_eq!(message_of(&err).as_deref(), Some("message"));
    assert_eq!(err.to_string(), "fake");
    assert!(caused_by::<Fake>(&err));
  }

  #[test]
  fn test_plain_error_has_no_details() {
    let err = anyhow!("plain");
    assert!(details_of(&err).is_empty());
    assert_eq!(exit_code_of(&err), 1);
    assert!(message_of(&err).is_none());
  }

  #[test]
  fn test_details_stacking() {
    let err = anyhow::Error::new(DetailedError::wrap(Fake).with_message("message1").with_detail("x", 1));
    let err = anyhow::Error::new(
      DetailedError::wrap(err)
        .with_message("message2")
        .with_exit(2)
        .with_detail("y", 2),
    );

    assert_eq!(details_of(&err), pairs(&[("x", "1"), ("y", "2")]));
    assert_eq!(exit_code_of(&err), 2);
    assert_eq!(message_of(&err).as_deref(), Some("message2"));
    assert!(caused_by::<Fake>(&err));
    assert_eq!(err.to_string(), "fake");
  }

  #[test]
  fn test_inner_exit_is_inherited_when_outer_unset() {
    let err = anyhow::Error::new(DetailedError::wrap(Fake).with_exit(7));
    let err = anyhow::Error::new(DetailedError::wrap(err).with_detail("k", "v"));
    assert_eq!(exit_code_of(&err), 7);
  }

  #[test]
  fn test_details_odd() {
    let err = anyhow::Error::new(DetailedError::wrap(Fake).with_details(["foo", "bar", "hi"]));
    assert_eq!(details_of(&err), pairs(&[("foo", "bar"), ("hi", MISSING_VALUE)]));
  }

  #[test]
  fn test_details_multiple_wraps_through_context() {
    let err = anyhow::Error::new(DetailedError::wrap(Fake).with_details(["foo", "bar", "zaz", "something"]));
    let err = err.context("some more stuff");
    let err = anyhow::Error::new(DetailedError::wrap(err).with_details(["foo", "again we wrap"]));
    let err = anyhow::Error::new(DetailedError::wrap(err).with_details(["test2", "another msg"]));

    assert_eq!(
      details_of(&err),
      pairs(&[("foo", "again we wrap"), ("zaz", "something"), ("test2", "another msg")])
    );
    assert!(caused_by::<Fake>(&err));
  }

  #[test]
  fn test_output_kept_from_inner() {
    let err = anyhow::Error::new(DetailedError::wrap(Fake).with_output("tool said no"));
    let err = anyhow::Error::new(DetailedError::wrap(err).with_output(""));
    assert_eq!(output_of(&err).as_deref(), Some("tool said no"));
  }

  #[test]
  fn test_config_error_messages() {
    let err = ConfigError::DuplicateId {
      kind: "archives".to_string(),
      id: "a".to_string(),
      count: 2,
    };
    assert_eq!(err.to_string(), "found 2 archives with the ID 'a', please fix your config");
    assert!(err.help_message().is_some());

    let err = ConfigError::SkipNotAllowed {
      key: "nope".to_string(),
      allowed: vec!["publish".to_string(), "sign".to_string()],
    };
    assert_eq!(
      err.to_string(),
      "--skip=nope is not allowed. Valid options for skip are [publish, sign]"
    );
  }
}
