//! Tidemark core: pure watermark model, mode selection, discovery parsing and run policy.
mod candidate;
mod mode;
mod policy;
mod summary;
mod watermark;

pub use candidate::{probe_range, Candidate, CandidateOrigin, DiscoveryError, ListingParser};
pub use mode::{is_recent, select_mode};
pub use policy::{skip_action, SkipAction, SkipReason};
pub use summary::{RunOutcome, RunSummary};
pub use watermark::{
    salvage_last_processed_id, MissRecord, Mode, Watermark, WatermarkError, MAX_RECORDED_MISSES,
    WATERMARK_VERSION,
};
