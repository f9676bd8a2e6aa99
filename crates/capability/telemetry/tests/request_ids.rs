use bookgate_telemetry::{new_request_ids, now_epoch_ms};

#[test]
fn request_ids_are_distinct() {
    let first = new_request_ids();
    let second = new_request_ids();
    assert_ne!(first.request_id, second.request_id);
    assert_ne!(first.trace_id, second.trace_id);
    assert_ne!(first.request_id, first.trace_id);
}

#[test]
fn epoch_ms_is_monotonic_enough() {
    let before = now_epoch_ms();
    let after = now_epoch_ms();
    assert!(after >= before);
    assert!(before > 1_500_000_000_000);
}
