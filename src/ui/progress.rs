//! Progress bars for fanned-out stage work
//!
//! Uses `linya`, whose bars can be advanced from many threads at once. Bars are
//! only drawn when stderr is a terminal, so logs and CI output stay clean.

use linya::{Bar, Progress};
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, PoisonError};

/// Thread-safe progress for the tasks of one stage
#[derive(Clone)]
pub struct TaskProgress {
  progress: Arc<Mutex<Progress>>,
  bar: Arc<Bar>,
}

impl TaskProgress {
  /// A bar for `total` tasks, or `None` when there is nothing worth drawing
  pub fn start(total: usize, label: impl Into<String>) -> Option<Self> {
    if total < 2 || !std::io::stderr().is_terminal() {
      return None;
    }
    Some(Self::new(total, label))
  }

  fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self {
      progress: Arc::new(Mutex::new(progress)),
      bar: Arc::new(bar),
    }
  }

  /// Mark one task finished
  pub fn inc(&self) {
    let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
    progress.inc_and_draw(&self.bar, 1);
  }
}

/// Advance an optional bar
pub fn tick(progress: &Option<TaskProgress>) {
  if let Some(progress) = progress {
    progress.inc();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_no_bar_for_single_task() {
    assert!(TaskProgress::start(1, "archives").is_none());
    assert!(TaskProgress::start(0, "archives").is_none());
    tick(&None);
  }
}
