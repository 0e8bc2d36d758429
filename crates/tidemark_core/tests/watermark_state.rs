use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tidemark_core::{Mode, SkipReason, Watermark, WatermarkError};

fn init_logging() {
    tidemark_logging::initialize_for_tests();
}

const VALID: &str = r#"{
  "version": 1,
  "last_processed_id": 9256,
  "last_processed_reference": "https://example.com/article.cfm?recent_news_id=9256",
  "last_run_at": "2025-03-01T06:00:00Z",
  "last_date_used": "2025-03-01",
  "current_date": "2025-03-01",
  "last_mode": "INCREMENTAL"
}"#;

#[test]
fn valid_record_parses_with_empty_miss_list() {
    init_logging();
    let wm = Watermark::parse(VALID).expect("valid record");
    assert_eq!(wm.last_processed_id, 9256);
    assert_eq!(wm.last_mode, Mode::Incremental);
    assert!(wm.misses.is_empty());
}

#[test]
fn non_integer_id_is_corrupt_state() {
    init_logging();
    let text = VALID.replace("9256,", "\"abc\",");
    let err = Watermark::parse(&text).unwrap_err();
    assert!(matches!(err, WatermarkError::CorruptState(_)), "{err:?}");
}

#[test]
fn negative_id_is_corrupt_state() {
    let text = VALID.replace("9256,", "-4,");
    assert!(matches!(
        Watermark::parse(&text),
        Err(WatermarkError::CorruptState(_))
    ));
}

#[test]
fn invalid_calendar_date_is_corrupt_state() {
    let text = VALID.replace("\"last_date_used\": \"2025-03-01\"", "\"last_date_used\": \"2025-02-30\"");
    assert!(matches!(
        Watermark::parse(&text),
        Err(WatermarkError::CorruptState(_))
    ));
}

#[test]
fn unknown_version_is_corrupt_state() {
    let text = VALID.replace("\"version\": 1", "\"version\": 7");
    assert!(matches!(
        Watermark::parse(&text),
        Err(WatermarkError::CorruptState(_))
    ));
}

#[test]
fn truncated_record_is_corrupt_state() {
    let text = &VALID[..VALID.len() / 2];
    assert!(matches!(
        Watermark::parse(text),
        Err(WatermarkError::CorruptState(_))
    ));
}

#[test]
fn advance_moves_forward_and_tolerates_same_id() {
    let now = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
    let mut wm = Watermark::parse(VALID).unwrap();

    assert!(wm.advance(9257, "ref-9257", now).unwrap());
    assert_eq!(wm.last_processed_id, 9257);
    assert_eq!(wm.last_processed_reference, "ref-9257");
    assert_eq!(wm.last_date_used, now.date_naive());

    assert!(!wm.advance(9257, "ref-again", now).unwrap());
    assert_eq!(wm.last_processed_reference, "ref-9257");
}

#[test]
fn advance_to_lower_id_is_rejected() {
    let now = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
    let mut wm = Watermark::parse(VALID).unwrap();
    let err = wm.advance(9000, "ref", now).unwrap_err();
    match err {
        WatermarkError::RegressionRejected { current, attempted } => {
            assert_eq!((current, attempted), (9256, 9000));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(wm.last_processed_id, 9256);
}

#[test]
fn advance_does_not_touch_last_run_at() {
    let now = Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap();
    let mut wm = Watermark::parse(VALID).unwrap();
    let before = wm.last_run_at;
    wm.advance(9300, "ref", now).unwrap();
    assert_eq!(wm.last_run_at, before);

    wm.mark_level(now, Mode::Incremental);
    assert_eq!(wm.last_run_at, now);
}

#[test]
fn record_round_trips_with_misses() {
    let now = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
    let mut wm = Watermark::seed(10, now);
    wm.advance(12, "ref-12", now).unwrap();
    wm.record_miss(11, SkipReason::RenderFailure, now);

    let text = wm.to_json().unwrap();
    assert!(text.contains("\"render_failure\""));
    assert_eq!(Watermark::parse(&text).unwrap(), wm);
}

#[test]
fn miss_ahead_of_cursor_is_corrupt_state() {
    let now = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
    let mut wm = Watermark::seed(10, now);
    wm.record_miss(11, SkipReason::NoContent, now);
    let text = wm.to_json().unwrap();
    assert!(matches!(
        Watermark::parse(&text),
        Err(WatermarkError::CorruptState(_))
    ));
}
