#![allow(clippy::unwrap_used, clippy::expect_used)]

use entorm_core::errors::{OrmError, OrmErrorKind};
use entorm_core::logging_facility::test_capture::init_test_capture;
use entorm_core::{log_op_end, log_op_error, log_op_start};
use entorm_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro_records_table() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, table = "MainTable");

    let events = capture.events_for(op_name, "MainTable");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event(), Some(EVENT_START));
}

#[test]
fn test_log_op_end_macro_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42, table = "MainTable");

    let events = capture.events_for(op_name, "MainTable");
    assert_eq!(events.len(), 1, "Should have exactly one end event");
    assert_eq!(events[0].event(), Some(EVENT_END));
    assert_eq!(events[0].duration_ms(), Some(42));
}

#[test]
fn test_log_op_error_includes_code_and_kind() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = OrmError::new(OrmErrorKind::RecordExists);
    log_op_error!(op_name, &err, duration_ms = 10, table = "MainTable");

    let events = capture.events_for(op_name, "MainTable");
    let error_event = events
        .iter()
        .find(|e| e.event() == Some(EVENT_END_ERROR))
        .expect("error event captured");

    assert_eq!(error_event.err_code(), Some("ERR_RECORD_EXISTS"));
    assert_eq!(error_event.err_kind(), Some("RecordExists"));
    assert_eq!(error_event.level, tracing::Level::ERROR);
}

#[test]
fn test_sequence_keeps_emission_order() {
    let capture = init_test_capture();
    let op_name = "test_sequence_unique_4";

    log_op_start!(op_name, table = "A");
    log_op_start!(op_name, table = "B");
    log_op_end!(op_name, duration_ms = 1, table = "A");

    assert_eq!(capture.sequence_for(op_name, "A"), vec![EVENT_START, EVENT_END]);
    assert_eq!(capture.sequence_for(op_name, "B"), vec![EVENT_START]);
}
