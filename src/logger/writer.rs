//! Size-rotating file writer used by the file output layer

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

use crate::logger::config::{FileConfig, RotationConfig};
use crate::logger::error::LoggerError;

/// File writer that rolls `app.log` over to `app.log.1`, `app.log.2`, ... once
/// the configured size is reached. Rolled files may be gzipped (`app.log.1.gz`).
///
/// When the file becomes unwritable the writer switches to stderr for the rest of
/// the process so log lines are never silently lost.
pub struct RotatingFileWriter {
    state: Arc<Mutex<WriterState>>,
}

struct WriterState {
    path: PathBuf,
    file: BufWriter<File>,
    current_size: u64,
    rotation: RotationConfig,
    fallback: bool,
}

impl RotatingFileWriter {
    pub fn new(config: &FileConfig) -> Result<Self, LoggerError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_log_file(&config.path, config.append)?;
        let current_size = if config.append {
            fs::metadata(&config.path).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            state: Arc::new(Mutex::new(WriterState {
                path: config.path.clone(),
                file,
                current_size,
                rotation: config.rotation.clone(),
                fallback: false,
            })),
        })
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriterGuard {
            state: self.state.clone(),
        }
    }
}

pub struct RotatingWriterGuard {
    state: Arc<Mutex<WriterState>>,
}

impl Write for RotatingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire writer lock"))?;

        if state.fallback {
            return io::stderr().write(buf);
        }

        if state.current_size >= state.rotation.max_size {
            if let Err(e) = state.roll_over() {
                return state.fall_back(buf, e);
            }
        }

        match state.file.write(buf) {
            Ok(written) => {
                state.current_size += written as u64;
                Ok(written)
            }
            Err(e) => state.fall_back(buf, e),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire writer lock"))?;

        if state.fallback {
            return io::stderr().flush();
        }
        state.file.flush()
    }
}

impl Drop for RotatingWriterGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.file.flush();
        }
    }
}

impl WriterState {
    fn roll_over(&mut self) -> io::Result<()> {
        self.file.flush()?;
        rotate_files(&self.path, &self.rotation)?;
        self.file = open_log_file(&self.path, false)?;
        self.current_size = 0;
        Ok(())
    }

    fn fall_back(&mut self, buf: &[u8], error: io::Error) -> io::Result<usize> {
        self.fallback = true;
        eprintln!("[logger] file write failed, falling back to stderr: {error}");
        io::stderr().write(buf)
    }
}

fn rolled_path(base: &Path, index: usize, compressed: bool) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let suffix = if compressed { ".gz" } else { "" };
    base.with_file_name(format!("{name}.{index}{suffix}"))
}

/// Shift every rolled file up by one slot, dropping the oldest, then move the
/// active file into slot 1.
fn rotate_files(base: &Path, rotation: &RotationConfig) -> io::Result<()> {
    let compressed = rotation.compress;
    let oldest = rolled_path(base, rotation.max_files, compressed);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for index in (1..rotation.max_files).rev() {
        let from = rolled_path(base, index, compressed);
        if from.exists() {
            fs::rename(&from, rolled_path(base, index + 1, compressed))?;
        }
    }

    if !base.exists() {
        return Ok(());
    }

    let first = rolled_path(base, 1, false);
    fs::rename(base, &first)?;
    if compressed {
        gzip_in_place(&first)?;
    }
    Ok(())
}

/// Replace `path` with `path.gz`.
fn gzip_in_place(path: &Path) -> io::Result<()> {
    let input = fs::read(path)?;
    let target = PathBuf::from(format!("{}.gz", path.display()));
    let mut encoder = GzEncoder::new(File::create(&target)?, Compression::default());
    encoder.write_all(&input)?;
    encoder.finish()?;
    fs::remove_file(path)
}

fn open_log_file(path: &Path, append: bool) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::LogFormat;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    fn file_config(path: PathBuf, max_size: u64, compress: bool) -> FileConfig {
        FileConfig {
            enabled: true,
            path,
            append: true,
            format: LogFormat::Full,
            rotation: RotationConfig {
                max_size,
                max_files: 2,
                compress,
            },
        }
    }

    #[test]
    fn test_rolls_over_when_size_reached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = RotatingFileWriter::new(&file_config(path.clone(), 8, false)).unwrap();

        let mut guard = writer.make_writer();
        guard.write_all(b"first line\n").unwrap();
        guard.write_all(b"second\n").unwrap();
        guard.flush().unwrap();
        drop(guard);

        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "first line\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_keeps_at_most_max_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = RotatingFileWriter::new(&file_config(path, 1, false)).unwrap();

        let mut guard = writer.make_writer();
        for line in ["a\n", "b\n", "c\n", "d\n"] {
            guard.write_all(line.as_bytes()).unwrap();
        }
        guard.flush().unwrap();

        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
        assert_eq!(fs::read_to_string(dir.path().join("app.log.2")).unwrap(), "b\n");
    }

    #[test]
    fn test_compresses_rolled_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = RotatingFileWriter::new(&file_config(path, 4, true)).unwrap();

        let mut guard = writer.make_writer();
        guard.write_all(b"compressed\n").unwrap();
        guard.write_all(b"next\n").unwrap();
        guard.flush().unwrap();

        let rolled = dir.path().join("app.log.1.gz");
        assert!(rolled.exists());
        assert!(!dir.path().join("app.log.1").exists());

        let mut decoded = String::new();
        GzDecoder::new(File::open(rolled).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "compressed\n");
    }
}
