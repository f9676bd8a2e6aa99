//! 追踪、请求 ID 与基础运行指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub inventories: u64,
    pub tags_seen: u64,
    pub initializations: u64,
    pub edits: u64,
    pub clears: u64,
    pub security_toggles: u64,
    pub analyzes: u64,
    pub rf_retries: u64,
    pub reconnects: u64,
    pub operation_failures: u64,
    pub notification_events: u64,
    pub dropped_events: u64,
}

/// 基础运行指标。
pub struct TelemetryMetrics {
    inventories: AtomicU64,
    tags_seen: AtomicU64,
    initializations: AtomicU64,
    edits: AtomicU64,
    clears: AtomicU64,
    security_toggles: AtomicU64,
    analyzes: AtomicU64,
    rf_retries: AtomicU64,
    reconnects: AtomicU64,
    operation_failures: AtomicU64,
    notification_events: AtomicU64,
    dropped_events: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            inventories: AtomicU64::new(0),
            tags_seen: AtomicU64::new(0),
            initializations: AtomicU64::new(0),
            edits: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            security_toggles: AtomicU64::new(0),
            analyzes: AtomicU64::new(0),
            rf_retries: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            operation_failures: AtomicU64::new(0),
            notification_events: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inventories: self.inventories.load(Ordering::Relaxed),
            tags_seen: self.tags_seen.load(Ordering::Relaxed),
            initializations: self.initializations.load(Ordering::Relaxed),
            edits: self.edits.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            security_toggles: self.security_toggles.load(Ordering::Relaxed),
            analyzes: self.analyzes.load(Ordering::Relaxed),
            rf_retries: self.rf_retries.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            operation_failures: self.operation_failures.load(Ordering::Relaxed),
            notification_events: self.notification_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// 记录一次盘点。
pub fn record_inventory(tag_count: usize) {
    let metrics = metrics();
    metrics.inventories.fetch_add(1, Ordering::Relaxed);
    metrics
        .tags_seen
        .fetch_add(tag_count as u64, Ordering::Relaxed);
}

/// 记录一次标签初始化。
pub fn record_initialization() {
    metrics().initializations.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次媒体号改写。
pub fn record_edit() {
    metrics().edits.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次标签清除。
pub fn record_clear() {
    metrics().clears.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次防盗位翻转。
pub fn record_security_toggle() {
    metrics().security_toggles.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次标签分析。
pub fn record_analyze() {
    metrics().analyzes.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次射频层重试。
pub fn record_rf_retry() {
    metrics().rf_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次强制重连。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次最终失败的操作。
pub fn record_operation_failure() {
    metrics().operation_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录一条通知事件。
pub fn record_notification_event() {
    metrics()
        .notification_events
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录一条因队列满被丢弃的事件。
pub fn record_dropped_event() {
    metrics().dropped_events.fetch_add(1, Ordering::Relaxed);
}
