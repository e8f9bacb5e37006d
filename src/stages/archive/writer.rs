//! Archive writers: tar, tar.gz and zip
//!
//! Entries are written with a zero mtime and root ownership so the same inputs
//! always produce the same bytes.

use crate::core::error::YardResult;
use anyhow::{Context as _, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Tar,
  TarGz,
  Zip,
  /// No archive: binaries are shipped as they are
  Binary,
}

impl Format {
  pub fn parse(s: &str) -> Option<Format> {
    match s {
      "tar" => Some(Format::Tar),
      "tar.gz" | "tgz" => Some(Format::TarGz),
      "zip" => Some(Format::Zip),
      "binary" => Some(Format::Binary),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Format::Tar => "tar",
      Format::TarGz => "tar.gz",
      Format::Zip => "zip",
      Format::Binary => "binary",
    }
  }

  /// File extension including the leading dot, empty for `binary`
  pub fn ext(self) -> &'static str {
    match self {
      Format::Tar => ".tar",
      Format::TarGz => ".tar.gz",
      Format::Zip => ".zip",
      Format::Binary => "",
    }
  }
}

/// One file to put in an archive
#[derive(Debug, Clone)]
pub struct Entry {
  pub source: PathBuf,
  /// Path inside the archive, `/`-separated
  pub name: String,
}

/// Write `entries` to a new file at `dest`. Fails if `dest` already exists.
pub fn write(format: Format, dest: &Path, entries: &[Entry]) -> YardResult<()> {
  let file = OpenOptions::new()
    .write(true)
    .create_new(true)
    .open(dest)
    .map_err(|e| match e.kind() {
      io::ErrorKind::AlreadyExists => anyhow::anyhow!(
        "archive named {} already exists, check your archive name template",
        dest.display()
      ),
      _ => anyhow::Error::new(e).context(format!("failed to create {}", dest.display())),
    })?;

  match format {
    Format::Tar => {
      let builder = write_tar(tar::Builder::new(file), entries)?;
      builder.into_inner().context("failed to finish tar archive")?;
    }
    Format::TarGz => {
      let encoder = GzEncoder::new(file, Compression::default());
      let builder = write_tar(tar::Builder::new(encoder), entries)?;
      let encoder = builder.into_inner().context("failed to finish tar archive")?;
      encoder.finish().context("failed to finish gzip compression")?;
    }
    Format::Zip => write_zip(file, entries)?,
    Format::Binary => bail!("format binary does not produce an archive"),
  }
  Ok(())
}

fn write_tar<W: Write>(mut builder: tar::Builder<W>, entries: &[Entry]) -> YardResult<tar::Builder<W>> {
  for entry in entries {
    let contents = fs::read(&entry.source).with_context(|| format!("failed to read {}", entry.source.display()))?;
    let mut header = tar::Header::new_gnu();
    header.set_path(&entry.name)?;
    header.set_size(contents.len() as u64);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode_of(&entry.source));
    header.set_cksum();
    builder.append(&header, contents.as_slice())?;
  }
  Ok(builder)
}

fn write_zip(file: File, entries: &[Entry]) -> YardResult<()> {
  let mut zip = zip::ZipWriter::new(file);
  for entry in entries {
    let contents = fs::read(&entry.source).with_context(|| format!("failed to read {}", entry.source.display()))?;
    let options = zip::write::FileOptions::default()
      .compression_method(zip::CompressionMethod::Deflated)
      .unix_permissions(mode_of(&entry.source));
    zip.start_file(entry.name.as_str(), options)?;
    zip.write_all(&contents)?;
  }
  zip.finish()?;
  Ok(())
}

#[cfg(unix)]
fn mode_of(path: &Path) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  let executable = path
    .metadata()
    .map(|m| m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false);
  if executable { 0o755 } else { 0o644 }
}

#[cfg(not(unix))]
fn mode_of(_path: &Path) -> u32 {
  0o755
}
