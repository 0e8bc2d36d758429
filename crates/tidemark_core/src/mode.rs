use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::watermark::{Mode, Watermark};

/// Pick the discovery strategy for a run.
///
/// A gap since the cursor was last level with the source that strictly
/// exceeds `threshold` selects `Catchup`; anything else is `Incremental`.
pub fn select_mode(now: DateTime<Utc>, watermark: &Watermark, threshold: Duration) -> Mode {
    let gap = now.signed_duration_since(watermark.last_run_at);
    if gap > threshold {
        Mode::Catchup
    } else {
        Mode::Incremental
    }
}

/// True when an item dated `item_date` is from yesterday or later relative to `now`.
pub fn is_recent(item_date: NaiveDate, now: DateTime<Utc>) -> bool {
    let today = now.date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);
    item_date >= yesterday
}
