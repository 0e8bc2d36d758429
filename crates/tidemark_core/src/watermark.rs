use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::SkipReason;

pub const WATERMARK_VERSION: u32 = 1;

/// Oldest entries are dropped once the miss list grows past this.
pub const MAX_RECORDED_MISSES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Incremental,
    Catchup,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Incremental => write!(f, "INCREMENTAL"),
            Mode::Catchup => write!(f, "CATCHUP"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("watermark state is corrupt: {0}")]
    CorruptState(String),
    #[error("watermark regression rejected: current {current}, attempted {attempted}")]
    RegressionRejected { current: u64, attempted: u64 },
    #[error("no watermark state at {0} and no baseline was supplied")]
    MissingState(String),
    #[error("baseline {baseline} is below the last known watermark {known}")]
    BaselineBelowKnown { baseline: u64, known: u64 },
    #[error("watermark io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An identifier that was moved past without producing an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissRecord {
    pub id: u64,
    pub reason: SkipReason,
    pub at: DateTime<Utc>,
}

/// Persisted ingestion cursor.
///
/// `last_processed_id` only moves forward. `last_run_at` is the last instant
/// the cursor was known to be level with the source; mode selection keys off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub version: u32,
    pub last_processed_id: u64,
    pub last_processed_reference: String,
    pub last_run_at: DateTime<Utc>,
    pub last_date_used: NaiveDate,
    pub current_date: NaiveDate,
    pub last_mode: Mode,
    #[serde(default)]
    pub misses: Vec<MissRecord>,
}

impl Watermark {
    /// Fresh record for a first run, seeded at an operator-supplied baseline.
    pub fn seed(baseline: u64, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            version: WATERMARK_VERSION,
            last_processed_id: baseline,
            last_processed_reference: String::new(),
            last_run_at: now,
            last_date_used: today,
            current_date: today,
            last_mode: Mode::Incremental,
            misses: Vec::new(),
        }
    }

    /// Parse and validate a persisted record. Any deviation is `CorruptState`.
    pub fn parse(text: &str) -> Result<Self, WatermarkError> {
        let watermark: Watermark = serde_json::from_str(text)
            .map_err(|err| WatermarkError::CorruptState(err.to_string()))?;
        watermark.validate()?;
        Ok(watermark)
    }

    pub fn to_json(&self) -> Result<String, WatermarkError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| WatermarkError::CorruptState(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), WatermarkError> {
        if self.version != WATERMARK_VERSION {
            return Err(WatermarkError::CorruptState(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if let Some(miss) = self
            .misses
            .iter()
            .find(|miss| miss.id > self.last_processed_id)
        {
            return Err(WatermarkError::CorruptState(format!(
                "miss {} is ahead of last_processed_id {}",
                miss.id, self.last_processed_id
            )));
        }
        Ok(())
    }

    /// Move the cursor to `id`. Re-advancing to the current id is a no-op and
    /// returns `Ok(false)`; a lower id is rejected.
    pub fn advance(
        &mut self,
        id: u64,
        reference: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, WatermarkError> {
        if id < self.last_processed_id {
            return Err(WatermarkError::RegressionRejected {
                current: self.last_processed_id,
                attempted: id,
            });
        }
        if id == self.last_processed_id {
            return Ok(false);
        }
        self.last_processed_id = id;
        self.last_processed_reference = reference.to_string();
        self.last_date_used = at.date_naive();
        self.current_date = at.date_naive();
        Ok(true)
    }

    pub fn record_miss(&mut self, id: u64, reason: SkipReason, at: DateTime<Utc>) {
        self.misses.retain(|miss| miss.id != id);
        self.misses.push(MissRecord { id, reason, at });
        if self.misses.len() > MAX_RECORDED_MISSES {
            let excess = self.misses.len() - MAX_RECORDED_MISSES;
            self.misses.drain(..excess);
        }
    }

    /// Mark the cursor as level with the source as of `now`.
    pub fn mark_level(&mut self, now: DateTime<Utc>, mode: Mode) {
        self.last_run_at = now;
        self.last_mode = mode;
        self.current_date = now.date_naive();
    }
}

/// Best-effort read of `last_processed_id` from a record that failed validation.
///
/// Used only to stop an operator baseline from rewinding below a known value.
pub fn salvage_last_processed_id(text: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let field = value.get("last_processed_id")?;
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
}
