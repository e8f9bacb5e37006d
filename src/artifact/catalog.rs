//! Thread-safe artifact catalog
//!
//! Artifacts are stored behind `Arc` in insertion order. Readers clone the list of
//! handles under a read lock, so a snapshot never tears against concurrent adds
//! and never blocks writers for longer than that clone.

use super::filter::{self, Filter};
use super::Artifact;
use crate::core::error::YardResult;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
pub struct Catalog {
  items: RwLock<Vec<Arc<Artifact>>>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Artifact>>> {
    self.items.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Artifact>>> {
    self.items.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a new artifact. Safe from any number of threads.
  pub fn add(&self, artifact: Artifact) {
    tracing::debug!(
      name = %artifact.name,
      kind = %artifact.kind,
      path = %artifact.path.display(),
      "added artifact"
    );
    self.write().push(Arc::new(artifact));
  }

  /// Ordered snapshot of every artifact
  pub fn list(&self) -> Vec<Arc<Artifact>> {
    self.read().clone()
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  /// Lazily evaluated view of the artifacts matching `filter`
  pub fn filter(&self, filter: Filter) -> View<'_> {
    View { catalog: self, filter }
  }

  /// View over everything
  pub fn all(&self) -> View<'_> {
    self.filter(filter::all())
  }

  /// Remove every artifact matching `filter`, returning how many were removed
  pub fn remove(&self, filter: &Filter) -> usize {
    let mut items = self.write();
    let before = items.len();
    items.retain(|a| !filter.matches(a));
    before - items.len()
  }

  /// Run the refresh hook of every artifact that has one, in order.
  ///
  /// Hooks run without the lock held, so they may read the catalog. Refreshed
  /// artifacts keep their position; snapshots taken earlier keep the old values.
  pub fn refresh(&self) -> YardResult<()> {
    let refreshable: Vec<Arc<Artifact>> = self.list().into_iter().filter(|a| a.is_refreshable()).collect();
    for old in refreshable {
      let mut updated = Artifact::clone(&old);
      updated.refresh(self)?;
      let mut items = self.write();
      if let Some(slot) = items.iter_mut().find(|a| Arc::ptr_eq(a, &old)) {
        *slot = Arc::new(updated);
      }
    }
    Ok(())
  }

  /// JSON array of the catalog (refresh hooks are not serialized)
  pub fn to_json(&self) -> YardResult<String> {
    let items = self.list();
    let plain: Vec<&Artifact> = items.iter().map(|a| a.as_ref()).collect();
    Ok(serde_json::to_string_pretty(&plain)?)
  }
}

/// A filtered, lazily evaluated view of a catalog
#[derive(Clone)]
pub struct View<'a> {
  catalog: &'a Catalog,
  filter: Filter,
}

impl<'a> View<'a> {
  /// Narrow the view further
  pub fn filter(&self, filter: Filter) -> View<'a> {
    View {
      catalog: self.catalog,
      filter: self.filter.clone().and(filter),
    }
  }

  /// Ordered snapshot of the matching artifacts
  pub fn list(&self) -> Vec<Arc<Artifact>> {
    self
      .catalog
      .read()
      .iter()
      .filter(|a| self.filter.matches(a))
      .cloned()
      .collect()
  }

  pub fn len(&self) -> usize {
    self.list().len()
  }

  pub fn is_empty(&self) -> bool {
    self.list().is_empty()
  }

  /// Apply `f` to each artifact in order, stopping at the first error
  pub fn visit<F>(&self, mut f: F) -> YardResult<()>
  where
    F: FnMut(&Artifact) -> YardResult<()>,
  {
    for artifact in self.list() {
      f(&artifact)?;
    }
    Ok(())
  }

  pub fn paths(&self) -> Vec<PathBuf> {
    self.list().iter().map(|a| a.path.clone()).collect()
  }

  /// Partition by [`Artifact::platform`]
  pub fn group_by_platform(&self) -> BTreeMap<String, Vec<Arc<Artifact>>> {
    self.group_by(|a| a.platform())
  }

  /// Partition by owning id; artifacts without one share the `""` bucket
  pub fn group_by_id(&self) -> BTreeMap<String, Vec<Arc<Artifact>>> {
    self.group_by(|a| a.id().to_string())
  }

  fn group_by(&self, key: impl Fn(&Artifact) -> String) -> BTreeMap<String, Vec<Arc<Artifact>>> {
    let mut groups: BTreeMap<String, Vec<Arc<Artifact>>> = BTreeMap::new();
    for artifact in self.list() {
      groups.entry(key(&artifact)).or_default().push(artifact);
    }
    groups
  }
}
