use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::policy::SkipReason;
use crate::watermark::Mode;

/// How a run that did not hit a fatal error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Discovery yielded no candidates. Clean, silent success.
    NothingNew,
    /// At least one candidate ended with a valid artifact.
    Completed,
    /// Candidates existed but none produced an artifact.
    NoArtifacts,
    /// An artifact failed verification and the run stopped at that id.
    Halted { at: u64 },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NothingNew | RunOutcome::Completed => 0,
            RunOutcome::NoArtifacts | RunOutcome::Halted { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: Mode,
    pub candidates: usize,
    pub attempted: usize,
    pub rendered: usize,
    /// Artifacts already on disk from an earlier, interrupted run.
    pub reused: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Candidates left untouched because of the per-run cap.
    pub deferred: usize,
    pub watermark_before: u64,
    pub watermark_after: u64,
    pub caught_up: bool,
    pub halted_at: Option<u64>,
    pub artifacts: Vec<PathBuf>,
}

impl RunSummary {
    pub fn new(mode: Mode, watermark_before: u64) -> Self {
        Self {
            mode,
            candidates: 0,
            attempted: 0,
            rendered: 0,
            reused: 0,
            skipped: BTreeMap::new(),
            deferred: 0,
            watermark_before,
            watermark_after: watermark_before,
            caught_up: false,
            halted_at: None,
            artifacts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn outcome(&self) -> RunOutcome {
        if let Some(at) = self.halted_at {
            return RunOutcome::Halted { at };
        }
        if self.candidates == 0 {
            return RunOutcome::NothingNew;
        }
        if self.rendered + self.reused == 0 {
            return RunOutcome::NoArtifacts;
        }
        RunOutcome::Completed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} candidates={} attempted={} rendered={} reused={} deferred={} watermark={}->{}",
            self.mode,
            self.candidates,
            self.attempted,
            self.rendered,
            self.reused,
            self.deferred,
            self.watermark_before,
            self.watermark_after
        )?;
        for (reason, count) in &self.skipped {
            write!(f, " skipped.{reason}={count}")?;
        }
        if self.caught_up {
            write!(f, " caught_up")?;
        }
        if let Some(id) = self.halted_at {
            write!(f, " halted_at={id}")?;
        }
        Ok(())
    }
}
