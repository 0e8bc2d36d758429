use pretty_assertions::assert_eq;
use tidemark_core::{skip_action, Mode, RunOutcome, RunSummary, SkipAction, SkipReason};

#[test]
fn incremental_skips_always_move_forward_except_verify() {
    use SkipReason::*;
    assert_eq!(skip_action(Mode::Incremental, NotFound), SkipAction::Advance);
    assert_eq!(skip_action(Mode::Incremental, Unavailable), SkipAction::Advance);
    assert_eq!(skip_action(Mode::Incremental, NoContent), SkipAction::Advance);
    assert_eq!(
        skip_action(Mode::Incremental, TransientFetchFailure),
        SkipAction::AdvanceAndRecordMiss
    );
    assert_eq!(
        skip_action(Mode::Incremental, RenderFailure),
        SkipAction::AdvanceAndRecordMiss
    );
    assert_eq!(skip_action(Mode::Incremental, VerifyFailure), SkipAction::Halt);
}

#[test]
fn catchup_defers_not_found_past_the_end_of_the_source() {
    use SkipReason::*;
    assert_eq!(
        skip_action(Mode::Catchup, NotFound),
        SkipAction::AdvanceOnLaterProgress
    );
    assert_eq!(
        skip_action(Mode::Catchup, Unavailable),
        SkipAction::AdvanceOnLaterProgress
    );
    assert_eq!(skip_action(Mode::Catchup, NoContent), SkipAction::Advance);
    assert_eq!(skip_action(Mode::Catchup, VerifyFailure), SkipAction::Halt);
}

#[test]
fn outcome_distinguishes_nothing_new_from_no_artifacts() {
    let empty = RunSummary::new(Mode::Incremental, 10);
    assert_eq!(empty.outcome(), RunOutcome::NothingNew);
    assert_eq!(empty.outcome().exit_code(), 0);

    let mut all_skipped = RunSummary::new(Mode::Incremental, 10);
    all_skipped.candidates = 2;
    all_skipped.attempted = 2;
    all_skipped.record_skip(SkipReason::NotFound);
    all_skipped.record_skip(SkipReason::NotFound);
    assert_eq!(all_skipped.outcome(), RunOutcome::NoArtifacts);
    assert_eq!(all_skipped.outcome().exit_code(), 2);
    assert_eq!(all_skipped.skipped_for(SkipReason::NotFound), 2);
    assert_eq!(all_skipped.skipped_total(), 2);
}

#[test]
fn reused_artifacts_count_as_success() {
    let mut summary = RunSummary::new(Mode::Incremental, 10);
    summary.candidates = 1;
    summary.attempted = 1;
    summary.reused = 1;
    assert_eq!(summary.outcome(), RunOutcome::Completed);
}

#[test]
fn halt_wins_over_other_outcomes() {
    let mut summary = RunSummary::new(Mode::Catchup, 10);
    summary.candidates = 3;
    summary.rendered = 1;
    summary.halted_at = Some(12);
    assert_eq!(summary.outcome(), RunOutcome::Halted { at: 12 });
    assert_ne!(summary.outcome().exit_code(), 0);
}

#[test]
fn summary_line_reports_skip_reasons() {
    let mut summary = RunSummary::new(Mode::Incremental, 9256);
    summary.candidates = 3;
    summary.attempted = 3;
    summary.rendered = 2;
    summary.watermark_after = 9260;
    summary.record_skip(SkipReason::NotFound);
    let line = summary.to_string();
    assert!(line.contains("mode=INCREMENTAL"));
    assert!(line.contains("watermark=9256->9260"));
    assert!(line.contains("skipped.not_found=1"));
}
