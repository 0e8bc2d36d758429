use std::fmt;

use serde::{Deserialize, Serialize};

use crate::watermark::Mode;

/// Why a candidate ended without producing an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    Unavailable,
    TransientFetchFailure,
    NoContent,
    RenderFailure,
    VerifyFailure,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::NotFound => "not_found",
            SkipReason::Unavailable => "unavailable",
            SkipReason::TransientFetchFailure => "transient_fetch_failure",
            SkipReason::NoContent => "no_content",
            SkipReason::RenderFailure => "render_failure",
            SkipReason::VerifyFailure => "verify_failure",
        };
        f.write_str(label)
    }
}

/// What the sequencer does with the watermark after a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipAction {
    /// Move the watermark past the identifier.
    Advance,
    /// Move past it and keep a miss record in the watermark.
    AdvanceAndRecordMiss,
    /// Move past it only once a later identifier in the same run shows the
    /// source has content beyond it.
    AdvanceOnLaterProgress,
    /// Stop the run; the watermark stays where it is.
    Halt,
}

/// The single skip policy table.
pub fn skip_action(mode: Mode, reason: SkipReason) -> SkipAction {
    match (mode, reason) {
        (Mode::Catchup, SkipReason::NotFound | SkipReason::Unavailable) => {
            SkipAction::AdvanceOnLaterProgress
        }
        (_, SkipReason::NotFound | SkipReason::Unavailable | SkipReason::NoContent) => {
            SkipAction::Advance
        }
        (_, SkipReason::TransientFetchFailure | SkipReason::RenderFailure) => {
            SkipAction::AdvanceAndRecordMiss
        }
        (_, SkipReason::VerifyFailure) => SkipAction::Halt,
    }
}
