//! Bounded-parallelism task groups
//!
//! - [`Parallel`]: runs submitted tasks on at most N threads and reports the
//!   first error observed
//! - [`SkipAware`]: turns skip outcomes into an aggregate skip instead of a failure
//! - [`BlockingFirst`]: runs the first submission inline before any concurrency
//!
//! Groups never cancel work: once a task fails, every other submitted task still
//! runs to completion. Tasks are queued by [`Group::go`] and executed by
//! [`Group::wait`], which returns only after all of them finished.

use crate::core::error::YardResult;
use crate::pipe::{MultiSkip, is_skip};
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of work submitted to a group
pub type Task<'env> = Box<dyn FnOnce() -> YardResult<()> + Send + 'env>;

/// Common interface of the group family
pub trait Group<'env> {
  /// Submit a task
  fn go<F>(&mut self, task: F)
  where
    F: FnOnce() -> YardResult<()> + Send + 'env;

  /// Run everything submitted and wait for it
  fn wait(self) -> YardResult<()>;
}

/// Threads per core an unlimited group may use
const UNBOUNDED_PER_CORE: usize = 8;

/// Plain bounded group.
///
/// A limit of 0 means no configured limit: one thread per task, capped at
/// [`UNBOUNDED_PER_CORE`] threads per available core. With a limit of 1 (or a
/// single task) tasks run inline in submission order.
pub struct Parallel<'env> {
  limit: usize,
  tasks: Vec<Task<'env>>,
}

impl<'env> Parallel<'env> {
  pub fn new(limit: usize) -> Self {
    Self {
      limit,
      tasks: Vec::new(),
    }
  }
}

impl<'env> Group<'env> for Parallel<'env> {
  fn go<F>(&mut self, task: F)
  where
    F: FnOnce() -> YardResult<()> + Send + 'env,
  {
    self.tasks.push(Box::new(task));
  }

  fn wait(self) -> YardResult<()> {
    let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let record = |result: YardResult<()>| {
      if let Err(err) = result {
        let mut slot = first_error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
          *slot = Some(err);
        }
      }
    };

    let count = self.tasks.len();
    if self.limit == 1 || count <= 1 {
      for task in self.tasks {
        record(task());
      }
    } else {
      let threads = pool_size(self.limit, count);
      let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
      let record = &record;
      pool.scope_fifo(|scope| {
        for task in self.tasks {
          scope.spawn_fifo(move |_| record(task()));
        }
      });
    }

    match first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

fn pool_size(limit: usize, count: usize) -> usize {
  let cap = if limit == 0 {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    cores.saturating_mul(UNBOUNDED_PER_CORE)
  } else {
    limit
  };
  cap.min(count)
}

/// Wraps a group so skips are collected instead of failing it.
///
/// On wait: a real error wins; otherwise one skip is returned as-is and two or
/// more are merged into a [`MultiSkip`] listing every reason.
pub struct SkipAware<G> {
  inner: G,
  skips: Arc<Mutex<Vec<anyhow::Error>>>,
}

impl<G> SkipAware<G> {
  pub fn new(inner: G) -> Self {
    Self {
      inner,
      skips: Arc::new(Mutex::new(Vec::new())),
    }
  }
}

impl<'env, G: Group<'env>> Group<'env> for SkipAware<G> {
  fn go<F>(&mut self, task: F)
  where
    F: FnOnce() -> YardResult<()> + Send + 'env,
  {
    let skips = Arc::clone(&self.skips);
    self.inner.go(move || match task() {
      Err(err) if is_skip(&err) => {
        skips.lock().unwrap_or_else(PoisonError::into_inner).push(err);
        Ok(())
      }
      other => other,
    });
  }

  fn wait(self) -> YardResult<()> {
    self.inner.wait()?;
    let mut skips = std::mem::take(&mut *self.skips.lock().unwrap_or_else(PoisonError::into_inner));
    match skips.len() {
      0 => Ok(()),
      1 => Err(skips.remove(0)),
      _ => Err(MultiSkip::new(skips.iter().map(|e| e.to_string()).collect()).into()),
    }
  }
}

/// Wraps a group so the first submission runs synchronously in the caller.
///
/// Its outcome, success or failure, is handed to the inner group as an already
/// completed task. Later submissions go through the inner group unchanged.
pub struct BlockingFirst<G> {
  inner: G,
  started: bool,
}

impl<G> BlockingFirst<G> {
  pub fn new(inner: G) -> Self {
    Self { inner, started: false }
  }
}

impl<'env, G: Group<'env>> Group<'env> for BlockingFirst<G> {
  fn go<F>(&mut self, task: F)
  where
    F: FnOnce() -> YardResult<()> + Send + 'env,
  {
    if self.started {
      self.inner.go(task);
      return;
    }
    self.started = true;
    let outcome = task();
    self.inner.go(move || outcome);
  }

  fn wait(self) -> YardResult<()> {
    self.inner.wait()
  }
}
