//! Project configuration (railyard.toml)
//!
//! Searched in order: railyard.toml, .railyard.toml, .config/railyard.toml.
//! Every section is optional; stages fill generated values (ids, name
//! templates, algorithms) during their defaults phase.

use crate::core::error::{ConfigError, YardResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_CANDIDATES: &[&str] = &["railyard.toml", ".railyard.toml", ".config/railyard.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  /// Defaults to the project directory name
  #[serde(default)]
  pub project_name: String,

  /// Version being released; `--release-version` overrides it
  #[serde(default)]
  pub version: Option<String>,

  /// Output directory, relative to the project root
  #[serde(default = "default_dist")]
  pub dist: PathBuf,

  /// Extra environment for every external command, as `KEY=VALUE`
  #[serde(default)]
  pub env: Vec<String>,

  #[serde(default)]
  pub before: BeforeConfig,

  #[serde(default)]
  pub builds: Vec<BuildConfig>,

  #[serde(default)]
  pub universal_binaries: Vec<UniversalBinaryConfig>,

  #[serde(default)]
  pub archives: Vec<ArchiveConfig>,

  #[serde(default)]
  pub checksum: ChecksumConfig,

  #[serde(default)]
  pub signs: Vec<SignConfig>,

  #[serde(default)]
  pub sboms: Vec<SbomConfig>,

  #[serde(default)]
  pub uploads: Vec<UploadConfig>,
}

fn default_dist() -> PathBuf {
  PathBuf::from("dist")
}

impl Default for Project {
  fn default() -> Self {
    Self {
      project_name: String::new(),
      version: None,
      dist: default_dist(),
      env: Vec::new(),
      before: BeforeConfig::default(),
      builds: Vec::new(),
      universal_binaries: Vec::new(),
      archives: Vec::new(),
      checksum: ChecksumConfig::default(),
      signs: Vec::new(),
      sboms: Vec::new(),
      uploads: Vec::new(),
    }
  }
}

/// Global hooks run once before anything is built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeforeConfig {
  #[serde(default)]
  pub hooks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
  #[serde(default)]
  pub id: String,

  /// Binary name, defaults to the project name
  #[serde(default)]
  pub binary: String,

  /// Targets as `os_arch` or `os_arch_variant` (e.g. `linux_arm_7`, `linux_amd64_v3`)
  #[serde(default)]
  pub targets: Vec<String>,

  /// Command run once per target; must write the file at `{output}`
  #[serde(default)]
  pub command: Vec<String>,

  /// Path template of an already-built binary, copied to `{output}` instead of building
  #[serde(default)]
  pub prebuilt: Option<String>,

  #[serde(default)]
  pub env: Vec<String>,

  #[serde(default)]
  pub hooks: BuildHooks,

  #[serde(default)]
  pub skip: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildHooks {
  #[serde(default)]
  pub pre: Vec<String>,
  #[serde(default)]
  pub post: Vec<String>,
}

/// Combines darwin binaries of one build into a single multi-arch binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniversalBinaryConfig {
  #[serde(default)]
  pub id: String,

  /// Build ids to combine, defaults to `[id]`
  #[serde(default)]
  pub ids: Vec<String>,

  #[serde(default)]
  pub name_template: String,

  /// Remove the single-arch inputs from the catalog
  #[serde(default)]
  pub replace: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
  #[serde(default)]
  pub id: String,

  /// Build ids to include, empty means all
  #[serde(default)]
  pub ids: Vec<String>,

  #[serde(default)]
  pub name_template: String,

  /// One of `tar`, `tar.gz`, `zip`, `binary`
  #[serde(default)]
  pub format: String,

  #[serde(default)]
  pub format_overrides: Vec<FormatOverride>,

  /// Extra files (relative to the project root) added to every archive
  #[serde(default)]
  pub files: Vec<PathBuf>,

  /// Put everything in a top-level directory named after the archive
  #[serde(default)]
  pub wrap_in_directory: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatOverride {
  pub os: String,
  pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumConfig {
  #[serde(default)]
  pub name_template: String,

  /// One of `sha224`, `sha256`, `sha384`, `sha512`
  #[serde(default)]
  pub algorithm: String,

  /// Only checksum artifacts with these ids
  #[serde(default)]
  pub ids: Vec<String>,

  #[serde(default)]
  pub disable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignConfig {
  #[serde(default)]
  pub id: String,

  #[serde(default)]
  pub cmd: String,

  #[serde(default)]
  pub args: Vec<String>,

  #[serde(default)]
  pub signature: String,

  /// One of `none`, `all`, `checksum`, `archive`, `binary`, `sbom`
  #[serde(default)]
  pub artifacts: String,

  #[serde(default)]
  pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbomConfig {
  #[serde(default)]
  pub id: String,

  #[serde(default)]
  pub cmd: String,

  #[serde(default)]
  pub args: Vec<String>,

  #[serde(default)]
  pub documents: Vec<String>,

  /// One of `archive`, `binary`, `any`
  #[serde(default)]
  pub artifacts: String,

  #[serde(default)]
  pub ids: Vec<String>,
}

/// Copies uploadable artifacts into a directory (a mounted share, a bucket sync dir)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
  #[serde(default)]
  pub name: String,

  pub target: PathBuf,

  #[serde(default)]
  pub ids: Vec<String>,

  /// Also copy the checksum file and signatures
  #[serde(default = "default_true")]
  pub include_checksums: bool,
}

fn default_true() -> bool {
  true
}

impl Project {
  /// Load the project configuration from `root`
  pub fn load(root: &Path) -> YardResult<Self> {
    let path = Self::find_config_path(root).ok_or_else(|| ConfigError::NotFound {
      root: root.to_path_buf(),
    })?;
    Self::load_from(&path)
  }

  /// Load a specific config file
  pub fn load_from(path: &Path) -> YardResult<Self> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    Self::parse(&content).map_err(|e| match e.downcast::<ConfigError>() {
      Ok(ConfigError::Parse { message, .. }) => ConfigError::Parse {
        path: path.to_path_buf(),
        message,
      }
      .into(),
      Ok(other) => other.into(),
      Err(e) => e,
    })
  }

  pub fn parse(content: &str) -> YardResult<Self> {
    let project: Project = toml_edit::de::from_str(content).map_err(|e| ConfigError::Parse {
      path: PathBuf::from("<inline>"),
      message: e.to_string(),
    })?;
    project.validate()?;
    Ok(project)
  }

  /// Find the first existing config file under `root`
  pub fn find_config_path(root: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
      .iter()
      .map(|candidate| root.join(candidate))
      .find(|path| path.exists())
  }

  /// Structural checks that do not depend on defaults
  pub fn validate(&self) -> YardResult<()> {
    for entry in self.env.iter().chain(self.builds.iter().flat_map(|b| b.env.iter())) {
      if !entry.contains('=') {
        return Err(
          ConfigError::InvalidValue {
            field: "env".to_string(),
            value: entry.clone(),
            expected: "KEY=VALUE".to_string(),
          }
          .into(),
        );
      }
    }

    for upload in &self.uploads {
      if upload.target.as_os_str().is_empty() {
        return Err(
          ConfigError::MissingField {
            field: "uploads.target".to_string(),
          }
          .into(),
        );
      }
    }

    Ok(())
  }
}

/// Split `KEY=VALUE` entries; entries without `=` are ignored
pub fn parse_env(entries: &[String]) -> Vec<(String, String)> {
  entries
    .iter()
    .filter_map(|entry| entry.split_once('='))
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_parse_minimal() {
    let project = Project::parse("project_name = \"demo\"").unwrap();
    assert_eq!(project.project_name, "demo");
    assert_eq!(project.dist, PathBuf::from("dist"));
    assert!(project.builds.is_empty());
    assert!(!project.checksum.disable);
  }

  #[test]
  fn test_parse_sections() {
    let toml = r#"
project_name = "demo"
env = ["FOO=bar"]

[[builds]]
id = "cli"
targets = ["linux_amd64", "darwin_arm64"]
command = ["cargo", "build", "--release"]

[[archives]]
id = "default"
format = "tar.gz"

[[archives.format_overrides]]
os = "windows"
format = "zip"

[checksum]
algorithm = "sha512"

[[uploads]]
target = "/srv/releases"
"#;
    let project = Project::parse(toml).unwrap();
    assert_eq!(project.builds[0].targets.len(), 2);
    assert_eq!(project.archives[0].format_overrides[0].format, "zip");
    assert_eq!(project.checksum.algorithm, "sha512");
    assert!(project.uploads[0].include_checksums);
    assert_eq!(parse_env(&project.env), vec![("FOO".to_string(), "bar".to_string())]);
  }

  #[test]
  fn test_invalid_env_is_rejected() {
    let err = Project::parse("env = [\"NOPE\"]").unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
  }

  #[test]
  fn test_parse_error_is_config_error() {
    let err = Project::parse("builds = 3").unwrap_err();
    assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::Parse { .. })));
  }

  #[test]
  fn test_load_search_order() {
    let dir = TempDir::new().unwrap();
    assert!(Project::load(dir.path()).is_err());

    fs::create_dir_all(dir.path().join(".config")).unwrap();
    fs::write(dir.path().join(".config/railyard.toml"), "project_name = \"late\"").unwrap();
    fs::write(dir.path().join("railyard.toml"), "project_name = \"first\"").unwrap();

    let project = Project::load(dir.path()).unwrap();
    assert_eq!(project.project_name, "first");
  }
}
