use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tidemark_core::{salvage_last_processed_id, Mode, SkipReason, Watermark, WatermarkError};
use tidemark_logging::{ingest_info, ingest_warn};

use crate::persist::{AtomicFileWriter, PersistError};

/// The persisted watermark plus the only code allowed to change it.
///
/// Every mutation is applied to a copy, written through a temp file and a
/// rename, and adopted in memory only once the write succeeded.
pub struct WatermarkStore {
    path: PathBuf,
    file_name: String,
    writer: AtomicFileWriter,
    current: Watermark,
}

impl WatermarkStore {
    /// Load an existing record. A missing file is `MissingState`.
    pub fn load(path: &Path) -> Result<Self, WatermarkError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::with_record(path, Watermark::parse(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(WatermarkError::MissingState(path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load the record, or seed and persist a new one when none exists and
    /// a baseline is known. A corrupt record is never replaced here.
    pub fn open_or_seed(
        path: &Path,
        baseline: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Self, WatermarkError> {
        match Self::load(path) {
            Err(WatermarkError::MissingState(missing)) => {
                let Some(baseline) = baseline else {
                    return Err(WatermarkError::MissingState(missing));
                };
                ingest_info!("seeding watermark at {} in {}", baseline, path.display());
                let mut store = Self::with_record(path, Watermark::seed(baseline, now))?;
                store.commit(store.current.clone())?;
                Ok(store)
            }
            other => other,
        }
    }

    /// Operator reset to `baseline`.
    ///
    /// Never moves below the last known id: a valid record with a higher id,
    /// or a corrupt one whose id can still be read and is higher, is
    /// `BaselineBelowKnown`. A corrupt record is kept aside as
    /// `{name}.corrupt-{timestamp}` before being replaced.
    pub fn recover_with_baseline(
        path: &Path,
        baseline: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, WatermarkError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Self::open_or_seed(path, Some(baseline), now);
            }
            Err(err) => return Err(err.into()),
        };

        match Watermark::parse(&text) {
            Ok(existing) => {
                if baseline < existing.last_processed_id {
                    return Err(WatermarkError::BaselineBelowKnown {
                        baseline,
                        known: existing.last_processed_id,
                    });
                }
                let mut store = Self::with_record(path, existing)?;
                store.advance(baseline, "", now)?;
                Ok(store)
            }
            Err(WatermarkError::CorruptState(reason)) => {
                if let Some(known) = salvage_last_processed_id(&text) {
                    if baseline < known {
                        return Err(WatermarkError::BaselineBelowKnown { baseline, known });
                    }
                }
                let backup = backup_path(path, now);
                ingest_warn!(
                    "replacing corrupt watermark ({}); old record kept at {}",
                    reason,
                    backup.display()
                );
                fs::rename(path, &backup)?;
                let mut store = Self::with_record(path, Watermark::seed(baseline, now))?;
                store.commit(store.current.clone())?;
                Ok(store)
            }
            Err(err) => Err(err),
        }
    }

    fn with_record(path: &Path, current: Watermark) -> Result<Self, WatermarkError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                WatermarkError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                ))
            })?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            writer: AtomicFileWriter::new(dir),
            current,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn watermark(&self) -> &Watermark {
        &self.current
    }

    pub fn last_processed_id(&self) -> u64 {
        self.current.last_processed_id
    }

    /// Durably move the cursor to `id`. Returns `Ok(false)` when already there.
    pub fn advance(
        &mut self,
        id: u64,
        reference: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, WatermarkError> {
        let mut next = self.current.clone();
        if !next.advance(id, reference, at)? {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Move past `id` and remember why it produced nothing, in one write.
    pub fn advance_past_miss(
        &mut self,
        id: u64,
        reference: &str,
        reason: SkipReason,
        at: DateTime<Utc>,
    ) -> Result<(), WatermarkError> {
        let mut next = self.current.clone();
        next.advance(id, reference, at)?;
        next.record_miss(id, reason, at);
        self.commit(next)
    }

    pub fn mark_level(&mut self, now: DateTime<Utc>, mode: Mode) -> Result<(), WatermarkError> {
        let mut next = self.current.clone();
        next.mark_level(now, mode);
        self.commit(next)
    }

    pub fn set_last_mode(&mut self, mode: Mode) -> Result<(), WatermarkError> {
        if self.current.last_mode == mode {
            return Ok(());
        }
        let mut next = self.current.clone();
        next.last_mode = mode;
        self.commit(next)
    }

    fn commit(&mut self, next: Watermark) -> Result<(), WatermarkError> {
        let json = next.to_json()?;
        self.writer
            .replace(&self.file_name, json.as_bytes())
            .map_err(persist_to_watermark)?;
        self.current = next;
        Ok(())
    }
}

fn backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".corrupt-{}", now.format("%Y%m%dT%H%M%SZ")));
    path.with_file_name(name)
}

fn persist_to_watermark(err: PersistError) -> WatermarkError {
    match err {
        PersistError::Io(err) => WatermarkError::Io(err),
        other => WatermarkError::Io(io::Error::other(other.to_string())),
    }
}
