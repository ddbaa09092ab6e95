//! Artifact files: naming, archiving and checksums.
//!
//! The helpers here do blocking file I/O and are run through
//! `tokio::task::spawn_blocking` by the async callers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use jiff::Zoned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::SourceKind;

/// A finished backup file ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// SHA-256, lowercase hex
    pub checksum: String,
}

impl Artifact {
    /// Stat and hash an existing file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact path has no file name"))?;
        let (size, checksum) = checksum_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size,
            checksum,
        })
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` so the name is safe as a file name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "source".to_string()
    } else {
        cleaned
    }
}

/// `{name}_{kind}_{YYYYmmdd_HHMMSS}`, without extension.
pub fn base_name(source_name: &str, kind: SourceKind, at: &Zoned) -> String {
    format!(
        "{}_{}_{}",
        sanitize_name(source_name),
        kind.label(),
        at.strftime("%Y%m%d_%H%M%S")
    )
}

pub fn checksum_file(path: &Path) -> io::Result<(u64, String)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    let digest = hasher.finalize();
    let checksum = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok((size, checksum))
}

/// Put a single file into a new `.tar.gz` under `entry_name`.
pub fn pack_tar_gz(input: &Path, entry_name: &str, output: &Path) -> io::Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(File::create(output)?), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_path_with_name(input, entry_name)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?.flush()
}

/// Gzip an existing file (a tar stream, for volumes) into `output`.
pub fn gzip_file(input: &Path, output: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(input)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(output)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()
}
