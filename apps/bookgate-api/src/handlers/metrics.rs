//! 运行指标快照。
//!
//! - GET /metrics

use api_contract::MetricsSnapshotDto;
use axum::{Json, response::IntoResponse};
use bookgate_telemetry::metrics;

pub async fn get_metrics() -> impl IntoResponse {
    let snapshot = metrics().snapshot();
    Json(MetricsSnapshotDto {
        success: true,
        inventories: snapshot.inventories,
        tags_seen: snapshot.tags_seen,
        initializations: snapshot.initializations,
        edits: snapshot.edits,
        clears: snapshot.clears,
        security_toggles: snapshot.security_toggles,
        analyzes: snapshot.analyzes,
        rf_retries: snapshot.rf_retries,
        reconnects: snapshot.reconnects,
        operation_failures: snapshot.operation_failures,
        notification_events: snapshot.notification_events,
        dropped_events: snapshot.dropped_events,
    })
}
