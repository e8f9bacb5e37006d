//! Artifacts produced by a run and the catalog that holds them
//!
//! - **Artifact**: typed record of one produced file or image, with platform
//!   fields and an open attribute bag ([`Extras`])
//! - **Catalog**: thread-safe, insertion-ordered store shared by every stage
//! - **Filter**: composable predicates used to select catalog subsets
//!
//! Stages only ever add artifacts, read them through filters, refresh their
//! metadata, or remove them when something explicitly supersedes them.

mod catalog;
pub mod filter;

pub use catalog::{Catalog, View};
pub use filter::Filter;

use crate::core::error::YardResult;
use anyhow::{Context, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Well-known keys of the attribute bag
pub mod extra {
  /// Owning config id; the artifact's logical identifier
  pub const ID: &str = "ID";
  /// Binary name a build produced
  pub const BINARY: &str = "Binary";
  /// Binary names packed into an archive
  pub const BINARIES: &str = "Binaries";
  /// File extension, including the dot
  pub const EXT: &str = "Ext";
  /// Archive format
  pub const FORMAT: &str = "Format";
  /// Top-level directory inside an archive
  pub const WRAPPED_IN: &str = "WrappedIn";
  /// Universal binary replaced its single-arch inputs
  pub const REPLACES: &str = "Replaces";
  /// Content digest recorded by the stage that made the artifact
  pub const DIGEST: &str = "Digest";
  /// C library flavour (gnu, musl), part of the platform key
  pub const ABI: &str = "Abi";
  /// Checksum algorithm of a checksum file
  pub const CHECKSUM: &str = "Checksum";
}

/// Kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactType {
  /// A tar/tar.gz/zip archive to be uploaded
  #[serde(rename = "Archive")]
  UploadableArchive,
  /// A binary to be uploaded as-is
  #[serde(rename = "Binary")]
  UploadableBinary,
  /// Output of a build, not uploaded directly
  #[serde(rename = "Build")]
  Binary,
  /// Multi-arch darwin binary
  #[serde(rename = "Universal Binary")]
  UniversalBinary,
  #[serde(rename = "Source")]
  UploadableSourceArchive,
  #[serde(rename = "File")]
  UploadableFile,
  #[serde(rename = "Linux Package")]
  LinuxPackage,
  #[serde(rename = "Docker Image")]
  DockerImage,
  #[serde(rename = "Published Docker Image")]
  PublishableDockerImage,
  #[serde(rename = "Checksum")]
  Checksum,
  #[serde(rename = "Signature")]
  Signature,
  #[serde(rename = "Certificate")]
  Certificate,
  #[serde(rename = "SBOM")]
  Sbom,
  #[serde(rename = "Metadata")]
  Metadata,
}

impl ArtifactType {
  pub const ALL: &'static [ArtifactType] = &[
    ArtifactType::UploadableArchive,
    ArtifactType::UploadableBinary,
    ArtifactType::Binary,
    ArtifactType::UniversalBinary,
    ArtifactType::UploadableSourceArchive,
    ArtifactType::UploadableFile,
    ArtifactType::LinuxPackage,
    ArtifactType::DockerImage,
    ArtifactType::PublishableDockerImage,
    ArtifactType::Checksum,
    ArtifactType::Signature,
    ArtifactType::Certificate,
    ArtifactType::Sbom,
    ArtifactType::Metadata,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ArtifactType::UploadableArchive => "Archive",
      ArtifactType::UploadableBinary => "Binary",
      ArtifactType::Binary => "Build",
      ArtifactType::UniversalBinary => "Universal Binary",
      ArtifactType::UploadableSourceArchive => "Source",
      ArtifactType::UploadableFile => "File",
      ArtifactType::LinuxPackage => "Linux Package",
      ArtifactType::DockerImage => "Docker Image",
      ArtifactType::PublishableDockerImage => "Published Docker Image",
      ArtifactType::Checksum => "Checksum",
      ArtifactType::Signature => "Signature",
      ArtifactType::Certificate => "Certificate",
      ArtifactType::Sbom => "SBOM",
      ArtifactType::Metadata => "Metadata",
    }
  }

  /// Whether publishers should ship artifacts of this type
  pub fn is_uploadable(self) -> bool {
    !matches!(
      self,
      ArtifactType::Binary | ArtifactType::UniversalBinary | ArtifactType::Metadata
    )
  }
}

impl fmt::Display for ArtifactType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Open-ended attribute bag, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extras(serde_json::Map<String, serde_json::Value>);

impl Extras {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
    self.0.insert(key.to_string(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
    self.0.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// String value of `key`, if present and a string
  pub fn get_str(&self, key: &str) -> Option<&str> {
    self.0.get(key).and_then(|v| v.as_str())
  }
}

/// Hook recomputing an artifact's file or metadata in place
///
/// The hook receives the catalog the artifact lives in, unlocked.
pub type Refresher = Arc<dyn Fn(&mut Artifact, &Catalog) -> YardResult<()> + Send + Sync>;

/// One produced output
#[derive(Clone, Serialize, Deserialize)]
pub struct Artifact {
  pub name: String,
  pub path: PathBuf,
  #[serde(rename = "type")]
  pub kind: ArtifactType,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub os: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub arch: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub arm: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub amd64: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub mips: String,
  #[serde(default, skip_serializing_if = "Extras::is_empty")]
  pub extra: Extras,
  #[serde(skip)]
  refresher: Option<Refresher>,
}

impl fmt::Debug for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Artifact")
      .field("name", &self.name)
      .field("path", &self.path)
      .field("kind", &self.kind)
      .field("platform", &self.platform())
      .field("extra", &self.extra)
      .field("refreshable", &self.refresher.is_some())
      .finish()
  }
}

impl fmt::Display for Artifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

impl Artifact {
  pub fn new(kind: ArtifactType, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      kind,
      os: String::new(),
      arch: String::new(),
      arm: String::new(),
      amd64: String::new(),
      mips: String::new(),
      extra: Extras::new(),
      refresher: None,
    }
  }

  /// Copy the platform fields of another artifact
  pub fn with_platform_of(mut self, other: &Artifact) -> Self {
    self.os = other.os.clone();
    self.arch = other.arch.clone();
    self.arm = other.arm.clone();
    self.amd64 = other.amd64.clone();
    self.mips = other.mips.clone();
    if let Some(abi) = other.extra.get(extra::ABI) {
      self.extra.set(extra::ABI, abi.clone());
    }
    self
  }

  pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
    self.extra.set(key, value);
    self
  }

  pub fn with_refresher(mut self, refresher: Refresher) -> Self {
    self.refresher = Some(refresher);
    self
  }

  /// Owning config id, empty when not set
  pub fn id(&self) -> &str {
    self.extra.get_str(extra::ID).unwrap_or("")
  }

  /// Architecture variant with defaults normalized away
  ///
  /// `amd64` v1, `arm` 6 and `mips` hardfloat are what a builder produces when no
  /// variant is asked for, so they group with artifacts that left it blank.
  pub fn variant(&self) -> &str {
    match self.arch.as_str() {
      "amd64" if self.amd64 != "v1" => &self.amd64,
      "arm" if self.arm != "6" => &self.arm,
      "mips" | "mipsle" | "mips64" | "mips64le" if self.mips != "hardfloat" => &self.mips,
      _ => "",
    }
  }

  /// Deterministic platform key: os, arch, variant and abi concatenated
  pub fn platform(&self) -> String {
    format!(
      "{}{}{}{}",
      self.os,
      self.arch,
      self.variant(),
      self.extra.get_str(extra::ABI).unwrap_or("")
    )
  }

  /// Decode an extra, failing when it is missing or has the wrong shape
  pub fn must_extra<T: DeserializeOwned>(&self, key: &str) -> YardResult<T> {
    let value = self
      .extra
      .get(key)
      .with_context(|| format!("extra: {}: key not present", key))?;
    serde_json::from_value(value.clone()).with_context(|| format!("extra: {}: wrong type", key))
  }

  /// Decode an extra, falling back to `default` when missing or malformed
  pub fn extra_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
    match self.extra.get(key) {
      None => default,
      Some(value) => match serde_json::from_value(value.clone()) {
        Ok(decoded) => decoded,
        Err(e) => {
          warn!(artifact = %self.name, key, error = %e, "extra has unexpected type, using default");
          default
        }
      },
    }
  }

  /// Hex digest of the artifact's file
  pub fn checksum(&self, algorithm: &str) -> YardResult<String> {
    match algorithm {
      "sha224" => digest_file::<Sha224>(&self.path),
      "sha256" => digest_file::<Sha256>(&self.path),
      "sha384" => digest_file::<Sha384>(&self.path),
      "sha512" => digest_file::<Sha512>(&self.path),
      other => bail!("invalid algorithm: {}", other),
    }
  }

  /// Run the refresh hook, if any
  pub fn refresh(&mut self, catalog: &Catalog) -> YardResult<()> {
    let Some(refresher) = self.refresher.clone() else {
      return Ok(());
    };
    refresher(self, catalog).with_context(|| format!("failed to refresh {:?}", self.name))
  }

  pub fn is_refreshable(&self) -> bool {
    self.refresher.is_some()
  }
}

/// Algorithms accepted by [`Artifact::checksum`]
pub const ALGORITHMS: &[&str] = &["sha224", "sha256", "sha384", "sha512"];

fn digest_file<D: Digest + io::Write>(path: &Path) -> YardResult<String> {
  let mut file = File::open(path)?;
  let mut hasher = D::new();
  io::copy(&mut file, &mut hasher)?;
  Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
}
