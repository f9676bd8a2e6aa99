//! 异步通知事件队列。

use bookgate_driver::{ReaderEvent, RssiValue};
use bookgate_telemetry::{now_epoch_ms, record_dropped_event};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::warn;

/// 队列默认容量。
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// 通知事件（创建后不可变）。
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// 服务端接收时刻（epoch 毫秒）。
    pub timestamp: i64,
    /// TAG_EVENT / IDENTIFICATION_EVENT / 其他透传名称。
    pub event_type: String,
    pub idd: Option<String>,
    pub rssi_values: Option<Vec<RssiValue>>,
    pub reader_timestamp: Option<String>,
    pub reader_type: Option<String>,
    pub firmware_version: Option<String>,
}

impl NotificationEvent {
    /// 由驱动侧事件加时间戳构造。
    pub fn from_reader_event(event: ReaderEvent) -> Self {
        let timestamp = now_epoch_ms();
        match event {
            ReaderEvent::Tag {
                idd_hex,
                rssi_values,
                reader_timestamp,
            } => Self {
                timestamp,
                event_type: "TAG_EVENT".to_string(),
                idd: Some(idd_hex),
                rssi_values: Some(rssi_values),
                reader_timestamp,
                reader_type: None,
                firmware_version: None,
            },
            ReaderEvent::Identification {
                reader_type,
                firmware_version,
            } => Self {
                timestamp,
                event_type: "IDENTIFICATION_EVENT".to_string(),
                idd: None,
                rssi_values: None,
                reader_timestamp: None,
                reader_type: Some(reader_type),
                firmware_version: Some(firmware_version),
            },
            ReaderEvent::Other(name) => Self {
                timestamp,
                event_type: name,
                idd: None,
                rssi_values: None,
                reader_timestamp: None,
                reader_type: None,
                firmware_version: None,
            },
        }
    }
}

/// 有界多生产者事件队列，超限丢弃最旧事件。
pub struct NotificationQueue {
    events: Mutex<VecDeque<NotificationEvent>>,
    capacity: usize,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// 入队；超出容量时弹出队首并逐条记录丢弃。
    pub fn push(&self, event: NotificationEvent) {
        let mut events = self.events.lock();
        events.push_back(event);
        while events.len() > self.capacity {
            if let Some(dropped) = events.pop_front() {
                warn!(
                    event_type = %dropped.event_type,
                    "event queue full, dropped event"
                );
                record_dropped_event();
            }
        }
    }

    /// 取走全部事件（消费式快照）。
    pub fn poll_all(&self) -> Vec<NotificationEvent> {
        self.events.lock().drain(..).collect()
    }

    /// 非消费式快照。
    pub fn peek_all(&self) -> Vec<NotificationEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
