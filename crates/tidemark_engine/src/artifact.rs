use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tidemark_logging::{ingest_debug, ingest_warn};

use crate::filename::{parse_artifact_filename, quarantine_filename};
use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};
use crate::render::Renderer;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("cannot scan {}: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },
    #[error("artifact {} failed verification: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Rendered artifacts on disk, one per identifier, never overwritten.
pub struct ArtifactStore {
    writer: AtomicFileWriter,
    quarantine: Option<AtomicFileWriter>,
    min_bytes: u64,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf, quarantine_dir: Option<PathBuf>, min_bytes: u64) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            quarantine: quarantine_dir.map(AtomicFileWriter::new),
            min_bytes,
        }
    }

    pub fn prepare(&self) -> Result<(), ArtifactError> {
        ensure_output_dir(self.writer.dir())?;
        Ok(())
    }

    /// A valid artifact already written for `id`, whatever its date prefix.
    ///
    /// Invalid leftovers for the same id are deleted so the id can be
    /// rendered again.
    pub fn find_existing(
        &self,
        id: u64,
        renderer: &dyn Renderer,
    ) -> Result<Option<PathBuf>, ArtifactError> {
        let dir = self.writer.dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ArtifactError::Scan {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut found = None;
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactError::Scan {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match parse_artifact_filename(name, renderer.extension()) {
                Some((_, found_id)) if found_id == id => {}
                _ => continue,
            }
            let path = entry.path();
            if found.is_some() {
                ingest_debug!("duplicate artifact for {}: {}", id, path.display());
                continue;
            }
            match self.verify(&path, None, renderer) {
                Ok(()) => found = Some(path),
                Err(ArtifactError::Invalid { reason, .. }) => {
                    ingest_warn!("removing invalid artifact {}: {}", path.display(), reason);
                    fs::remove_file(&path).map_err(PersistError::from)?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    pub fn write(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        Ok(self.writer.write_new(filename, bytes)?)
    }

    /// Re-read `path` and check it is complete and plausible.
    pub fn verify(
        &self,
        path: &Path,
        expected_len: Option<usize>,
        renderer: &dyn Renderer,
    ) -> Result<(), ArtifactError> {
        let invalid = |reason: String| ArtifactError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|err| invalid(format!("unreadable: {err}")))?;
        if bytes.is_empty() {
            return Err(invalid("empty file".into()));
        }
        if (bytes.len() as u64) < self.min_bytes {
            return Err(invalid(format!(
                "{} bytes, minimum is {}",
                bytes.len(),
                self.min_bytes
            )));
        }
        if let Some(expected) = expected_len {
            if bytes.len() != expected {
                return Err(invalid(format!(
                    "{} bytes on disk, {} rendered",
                    bytes.len(),
                    expected
                )));
            }
        }
        if !renderer.is_valid_artifact(&bytes) {
            return Err(invalid(format!(
                "not a valid .{} payload",
                renderer.extension()
            )));
        }
        Ok(())
    }

    /// Keep sub-threshold text for later inspection. No-op without a quarantine dir.
    pub fn quarantine(&self, id: u64, text: &str) -> Result<Option<PathBuf>, ArtifactError> {
        let Some(writer) = &self.quarantine else {
            return Ok(None);
        };
        let path = writer.replace(&quarantine_filename(id), text.as_bytes())?;
        Ok(Some(path))
    }
}
