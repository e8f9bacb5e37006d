//! Artifact predicates and their combinators
//!
//! A [`Filter`] only looks at the artifact it is given and at values captured
//! when it was built, so filters compose freely and can be evaluated from any
//! thread.

use super::{Artifact, ArtifactType, Catalog, extra};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A pure predicate over one artifact
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Artifact) -> bool + Send + Sync>);

impl fmt::Debug for Filter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Filter(..)")
  }
}

impl Filter {
  pub fn new(predicate: impl Fn(&Artifact) -> bool + Send + Sync + 'static) -> Self {
    Self(Arc::new(predicate))
  }

  pub fn matches(&self, artifact: &Artifact) -> bool {
    (self.0)(artifact)
  }

  pub fn and(self, other: Filter) -> Filter {
    Filter::new(move |a| self.matches(a) && other.matches(a))
  }

  pub fn or(self, other: Filter) -> Filter {
    Filter::new(move |a| self.matches(a) || other.matches(a))
  }

  #[allow(clippy::should_implement_trait)]
  pub fn not(self) -> Filter {
    Filter::new(move |a| !self.matches(a))
  }
}

/// Matches everything
pub fn all() -> Filter {
  Filter::new(|_| true)
}

/// Conjunction of every filter; empty input matches everything
pub fn and(filters: impl IntoIterator<Item = Filter>) -> Filter {
  let filters: Vec<Filter> = filters.into_iter().collect();
  Filter::new(move |a| filters.iter().all(|f| f.matches(a)))
}

/// Disjunction of every filter; empty input matches nothing
pub fn or(filters: impl IntoIterator<Item = Filter>) -> Filter {
  let filters: Vec<Filter> = filters.into_iter().collect();
  Filter::new(move |a| filters.iter().any(|f| f.matches(a)))
}

/// Disjunction of conjunctions
pub fn or_of_ands(groups: impl IntoIterator<Item = Vec<Filter>>) -> Filter {
  or(groups.into_iter().map(and))
}

pub fn by_type(kind: ArtifactType) -> Filter {
  Filter::new(move |a| a.kind == kind)
}

pub fn by_types(kinds: &[ArtifactType]) -> Filter {
  let kinds = kinds.to_vec();
  Filter::new(move |a| kinds.contains(&a.kind))
}

pub fn by_os(os: &str) -> Filter {
  let os = os.to_string();
  Filter::new(move |a| a.os == os)
}

pub fn by_arch(arch: &str) -> Filter {
  let arch = arch.to_string();
  Filter::new(move |a| a.arch == arch)
}

/// ARM revision; an empty revision matches the default (6)
pub fn by_arm(arm: &str) -> Filter {
  let arm = arm.to_string();
  Filter::new(move |a| a.arm == arm || (is_default(&arm, "6") && is_default(&a.arm, "6")))
}

/// AMD64 microarchitecture level; an empty level matches the default (v1)
pub fn by_amd64(level: &str) -> Filter {
  let level = level.to_string();
  Filter::new(move |a| a.amd64 == level || (is_default(&level, "v1") && is_default(&a.amd64, "v1")))
}

fn is_default(value: &str, default: &str) -> bool {
  value.is_empty() || value == default
}

/// Artifacts owned by one of `ids`; an empty list matches everything
pub fn by_ids<S: AsRef<str>>(ids: &[S]) -> Filter {
  if ids.is_empty() {
    return all();
  }
  let ids: HashSet<String> = ids.iter().map(|s| s.as_ref().to_string()).collect();
  Filter::new(move |a| ids.contains(a.id()))
}

/// Archives in one of `formats`
pub fn by_formats<S: AsRef<str>>(formats: &[S]) -> Filter {
  let formats: Vec<String> = formats.iter().map(|s| s.as_ref().to_string()).collect();
  Filter::new(move |a| {
    a.extra
      .get_str(extra::FORMAT)
      .is_some_and(|format| formats.iter().any(|f| f == format))
  })
}

/// Artifacts whose recorded extension (or file name) ends in one of `exts`
pub fn by_exts<S: AsRef<str>>(exts: &[S]) -> Filter {
  let exts: Vec<String> = exts
    .iter()
    .map(|s| {
      let ext = s.as_ref();
      if ext.starts_with('.') { ext.to_string() } else { format!(".{}", ext) }
    })
    .collect();
  Filter::new(move |a| {
    let recorded = a.extra.get_str(extra::EXT);
    exts
      .iter()
      .any(|ext| recorded == Some(ext.as_str()) || (recorded.is_none() && a.name.ends_with(ext.as_str())))
  })
}

/// Universal binaries that superseded their inputs
pub fn only_replacing_universal() -> Filter {
  Filter::new(|a| a.kind != ArtifactType::UniversalBinary || a.extra_or(extra::REPLACES, false))
}

/// Binary-like artifacts, dropping build outputs already shipped as uploadable binaries
///
/// Paths are captured from `catalog` when the filter is built.
pub fn by_binary_like(catalog: &Catalog) -> Filter {
  let uploadable: HashSet<PathBuf> = catalog
    .filter(by_type(ArtifactType::UploadableBinary))
    .list()
    .iter()
    .map(|a| a.path.clone())
    .collect();
  Filter::new(move |a| match a.kind {
    ArtifactType::UploadableBinary => true,
    ArtifactType::Binary | ArtifactType::UniversalBinary => !uploadable.contains(&a.path),
    _ => false,
  })
}
