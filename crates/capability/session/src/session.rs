//! 单台读写器的受管会话。
//!
//! 一次协议例程在整个执行期间持有会话的公平互斥锁；通知回调走同一把
//! 锁，轮询操作与异步回调不会在同一会话上交错驱动调用。
//!
//! 连接故障与逻辑故障按错误文本判别：命中连接特征的错误触发
//! 拆除重建式重连（最多 3 次，退避 `attempt × 1s`），其余错误立即上抛。

use crate::error::SessionError;
use crate::queue::{NotificationEvent, NotificationQueue};
use bookgate_config::ReaderConfig;
use bookgate_driver::{DriverFactory, EventCallback, ReaderDriver};
use bookgate_telemetry::{record_notification_event, record_reconnect};
use parking_lot::FairMutex;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_DELAY_MS: u64 = 1000;
const TCP_CONNECT_TIMEOUT_MS: u64 = 5000;

/// 连接错误特征（小写子串，含嵌入的厂商错误码）。
const CONNECTION_ERROR_MARKERS: [&str; 9] = [
    "disconnected",
    "connection lost",
    "connection timeout",
    "transmit failed",
    "peer",
    "-5012",
    "-5011",
    "-5010",
    "-1520",
];

/// 判别错误文本是否指示连接故障。
pub fn is_connection_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECTION_ERROR_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

struct SessionInner {
    driver: Option<Box<dyn ReaderDriver>>,
    notification_active: bool,
    listener_port: Option<u16>,
    closed: bool,
}

/// 受管读写器会话。
pub struct ManagedSession {
    config: ReaderConfig,
    driver_factory: DriverFactory,
    inner: FairMutex<SessionInner>,
    queue: NotificationQueue,
}

impl ManagedSession {
    pub fn new(config: ReaderConfig, driver_factory: DriverFactory) -> Arc<Self> {
        Arc::new(Self {
            config,
            driver_factory,
            inner: FairMutex::new(SessionInner {
                driver: None,
                notification_active: false,
                listener_port: None,
                closed: false,
            }),
            queue: NotificationQueue::default(),
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// 串行执行一次例程，连接故障自动重连重试。
    ///
    /// 闭包内的任何错误按 `Display` 文本分类：连接错误在
    /// `attempt × 1s` 退避后强制重连并重试，最多 3 次；逻辑错误直接
    /// 上抛。每次判别结果都记 debug 日志。
    pub fn execute<T, E, F>(&self, mut operation: F) -> Result<T, SessionError>
    where
        E: Display,
        F: FnMut(&mut dyn ReaderDriver) -> Result<T, E>,
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::Closed);
        }

        let mut last_message = String::new();
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let outcome: Result<T, String> =
                match Self::ensure_connected(&self.config, &self.driver_factory, &mut inner) {
                    Ok(()) => match inner.driver.as_deref_mut() {
                        Some(driver) => operation(driver).map_err(|e| e.to_string()),
                        None => Err("driver unavailable after connect".to_string()),
                    },
                    Err(message) => Err(message),
                };

            match outcome {
                Ok(value) => return Ok(value),
                Err(message) => {
                    let connection_error = is_connection_error(&message);
                    debug!(
                        reader = %self.config.name,
                        attempt,
                        classification = if connection_error { "connection" } else { "logical" },
                        error = %message,
                        "classified operation error"
                    );

                    if !connection_error {
                        return Err(SessionError::OperationFailed(message));
                    }

                    error!(
                        reader = %self.config.name,
                        attempt,
                        max_attempts = MAX_RECONNECT_ATTEMPTS,
                        error = %message,
                        "connection error during operation"
                    );
                    last_message = message;

                    if attempt < MAX_RECONNECT_ATTEMPTS {
                        std::thread::sleep(Duration::from_millis(
                            RECONNECT_DELAY_MS * u64::from(attempt),
                        ));
                        if let Err(reconnect_error) =
                            Self::force_reconnect_inner(&self.config, &self.driver_factory, &mut inner)
                        {
                            error!(
                                reader = %self.config.name,
                                error = %reconnect_error,
                                "reconnection failed"
                            );
                        }
                    }
                }
            }
        }

        Err(SessionError::RetriesExhausted {
            attempts: MAX_RECONNECT_ATTEMPTS,
            message: last_message,
        })
    }

    /// 强制走一次完整的拆除重建重连。
    pub fn force_reconnect(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        Self::force_reconnect_inner(&self.config, &self.driver_factory, &mut inner)
            .map_err(SessionError::OperationFailed)
    }

    /// 懒连接：首次使用时构造驱动，先尝试 reconnect 再回退完整 connect。
    fn ensure_connected(
        config: &ReaderConfig,
        factory: &DriverFactory,
        inner: &mut SessionInner,
    ) -> Result<(), String> {
        if inner.driver.is_none() {
            inner.driver = Some(factory(&config.name));
        }
        let driver = match inner.driver.as_deref_mut() {
            Some(driver) => driver,
            None => return Err("driver construction failed".to_string()),
        };

        if driver.is_connected() {
            return Ok(());
        }

        if driver.reconnect().is_ok() {
            return Ok(());
        }

        driver
            .connect(&config.address, config.port, TCP_CONNECT_TIMEOUT_MS)
            .map_err(|e| {
                format!(
                    "Failed to connect to reader {}: {} (code: {})",
                    config.name, e.message, e.code
                )
            })?;
        info!(reader = %config.name, "connected to reader");
        Ok(())
    }

    /// 完整拆除既有驱动并重建连接。
    fn force_reconnect_inner(
        config: &ReaderConfig,
        factory: &DriverFactory,
        inner: &mut SessionInner,
    ) -> Result<(), String> {
        if let Some(mut driver) = inner.driver.take() {
            if driver.is_connected() {
                info!(reader = %config.name, "forcing disconnect");
                driver.disconnect();
            }
            driver.close();
        }

        info!(reader = %config.name, "creating fresh driver instance");
        let mut driver = factory(&config.name);
        driver
            .connect(&config.address, config.port, TCP_CONNECT_TIMEOUT_MS)
            .map_err(|e| {
                format!(
                    "Failed to reconnect to reader {}: {} (code: {})",
                    config.name, e.message, e.code
                )
            })?;

        record_reconnect();
        info!(reader = %config.name, "successfully reconnected");
        inner.driver = Some(driver);
        Ok(())
    }

    /// `/readers` 用的连接状态：尝试确保连接并报告结果。
    pub fn connection_status(&self) -> (bool, String) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return (false, "closed".to_string());
        }
        match Self::ensure_connected(&self.config, &self.driver_factory, &mut inner) {
            Ok(()) => {
                let connected = inner
                    .driver
                    .as_deref()
                    .is_some_and(|driver| driver.is_connected());
                let status = if connected { "connected" } else { "disconnected" };
                (connected, status.to_string())
            }
            Err(message) => (false, format!("error: {message}")),
        }
    }

    /// 启动通知模式；已激活时返回 `Ok(false)`，任何步骤失败回退先前步骤。
    pub fn start_notification(self: &Arc<Self>, port: u16) -> Result<bool, SessionError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        if inner.notification_active {
            return Ok(false);
        }

        Self::ensure_connected(&self.config, &self.driver_factory, &mut inner)
            .map_err(SessionError::OperationFailed)?;
        let driver = match inner.driver.as_deref_mut() {
            Some(driver) => driver,
            None => {
                return Err(SessionError::OperationFailed(
                    "driver unavailable after connect".to_string(),
                ));
            }
        };

        let weak = Arc::downgrade(self);
        let callback: EventCallback = Arc::new(move || {
            if let Some(session) = weak.upgrade() {
                session.drain_driver_events();
            }
        });

        driver
            .start_notification(callback)
            .map_err(|e| SessionError::OperationFailed(e.to_string()))?;

        if let Err(e) = driver.start_listener(port, "0.0.0.0", true) {
            // 回退已绑定的回调。
            if let Err(stop_error) = driver.stop_notification() {
                warn!(reader = %self.config.name, error = %stop_error, "failed to unwind notification callback");
            }
            return Err(SessionError::OperationFailed(e.to_string()));
        }

        inner.notification_active = true;
        inner.listener_port = Some(port);
        info!(reader = %self.config.name, port, "notification mode started");
        Ok(true)
    }

    /// 停止通知模式；未激活时返回 `Ok(false)`，步骤失败仅告警。
    pub fn stop_notification(&self) -> Result<bool, SessionError> {
        let mut inner = self.inner.lock();
        if !inner.notification_active {
            return Ok(false);
        }

        if let Some(driver) = inner.driver.as_deref_mut() {
            if let Err(e) = driver.stop_listener() {
                warn!(reader = %self.config.name, error = %e, "failed to stop listener thread");
            }
            if let Err(e) = driver.stop_notification() {
                warn!(reader = %self.config.name, error = %e, "failed to stop notification");
            }
        }

        inner.notification_active = false;
        inner.listener_port = None;
        info!(reader = %self.config.name, "notification mode stopped");
        Ok(true)
    }

    pub fn is_notification_active(&self) -> bool {
        self.inner.lock().notification_active
    }

    pub fn notification_port(&self) -> Option<u16> {
        self.inner.lock().listener_port
    }

    /// 通知模式下读写器是否已连入监听端口。
    pub fn listener_peer_connected(&self) -> bool {
        self.inner
            .lock()
            .driver
            .as_deref()
            .is_some_and(|driver| driver.listener_peer_connected())
    }

    /// SDK 线程的回调入口。
    ///
    /// 用 try_lock 与显式操作互锁：锁被占用时跳过本次搬运，事件留在
    /// 驱动队列里，由下一次回调或 `poll_events` 补搬，回调线程因此
    /// 永不阻塞在会话锁上。
    fn drain_driver_events(&self) {
        if let Some(mut inner) = self.inner.try_lock() {
            Self::drain_locked(&mut inner, &self.queue);
        }
    }

    fn drain_locked(inner: &mut SessionInner, queue: &NotificationQueue) {
        if let Some(driver) = inner.driver.as_deref_mut() {
            while let Some(event) = driver.pop_event() {
                queue.push(NotificationEvent::from_reader_event(event));
                record_notification_event();
            }
        }
    }

    /// 取走全部通知事件（先补搬驱动队列，再清空会话队列）。
    pub fn poll_events(&self) -> Vec<NotificationEvent> {
        {
            let mut inner = self.inner.lock();
            Self::drain_locked(&mut inner, &self.queue);
        }
        self.queue.poll_all()
    }

    /// 当前排队事件数。
    pub fn queued_event_count(&self) -> usize {
        self.queue.len()
    }

    /// 事件队列（测试与状态端点使用）。
    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// 终态关闭：停通知、断连接、释放驱动。
    pub fn close(&self) {
        if let Err(e) = self.stop_notification() {
            warn!(reader = %self.config.name, error = %e, "error stopping notification during close");
        }

        let mut inner = self.inner.lock();
        if let Some(mut driver) = inner.driver.take() {
            if driver.is_connected() {
                info!(reader = %self.config.name, "disconnecting from reader");
                driver.disconnect();
            }
            info!(reader = %self.config.name, "closing reader");
            driver.close();
        }
        inner.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookgate_config::ReaderMode;
    use bookgate_driver::{
        FailurePlan, MemoryBank, OpLog, SimOp, SimReaderDriver, SimTag, new_sim_field,
    };
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn reader_config() -> ReaderConfig {
        ReaderConfig {
            name: "testreader".to_string(),
            address: "10.0.0.9".to_string(),
            port: 10001,
            mode: ReaderMode::Host,
            antennas: vec![1],
        }
    }

    /// 先吐出预置驱动，耗尽后按共享标签场新建。
    fn scripted_factory(
        prepared: Vec<SimReaderDriver>,
        field: bookgate_driver::SimField,
    ) -> DriverFactory {
        let queue = Mutex::new(VecDeque::from(prepared));
        Arc::new(move |_reader_name: &str| match queue.lock().pop_front() {
            Some(driver) => Box::new(driver) as Box<dyn ReaderDriver>,
            None => Box::new(SimReaderDriver::new(Arc::clone(&field))),
        })
    }

    #[test]
    fn classifies_connection_errors_by_text() {
        for message in [
            "device DISCONNECTED unexpectedly",
            "Connection Lost",
            "connection timeout after 5000 ms",
            "transmit failed (code: -4082)",
            "reset by peer",
            "transponder error (code: -5012)",
            "bus fault -1520",
        ] {
            assert!(is_connection_error(message), "message={message}");
        }

        for message in [
            "media id out of range",
            "Invalid media ID format",
            "no transponder in reader field (code: -1211)",
            "access denied: memory locked (code: -1311)",
        ] {
            assert!(!is_connection_error(message), "message={message}");
        }
    }

    #[test]
    fn connection_error_triggers_reconnect_and_retry() {
        let field = new_sim_field();
        field.lock().push(SimTag::blank([0xE2; 12]));

        let first = SimReaderDriver::new(Arc::clone(&field));
        *first.failure_plan().lock() = FailurePlan {
            inventory_failures: 1,
            failure_text: Some("communication error: connection lost".to_string()),
            ..FailurePlan::default()
        };
        let first_ops: OpLog = first.ops();

        let session = ManagedSession::new(
            reader_config(),
            scripted_factory(vec![first], Arc::clone(&field)),
        );

        let items = session
            .execute(|driver| driver.inventory(0x01))
            .expect("second attempt succeeds");
        assert_eq!(items.len(), 1);

        // 第一个驱动在失败后被整体拆除。
        let ops = first_ops.lock();
        assert!(ops.contains(&SimOp::Close));
    }

    #[test]
    fn logical_errors_surface_without_retry() {
        let field = new_sim_field();
        field.lock().push(SimTag::blank([0xE2; 12]));

        let first = SimReaderDriver::new(Arc::clone(&field));
        *first.failure_plan().lock() = FailurePlan {
            inventory_failures: 1,
            failure_text: Some("media id out of range".to_string()),
            // 错误码也参与文本判别，用一个非连接类的码。
            failure_code: -4034,
            ..FailurePlan::default()
        };
        let first_ops: OpLog = first.ops();

        let session = ManagedSession::new(
            reader_config(),
            scripted_factory(vec![first], Arc::clone(&field)),
        );

        let err = session
            .execute(|driver| driver.inventory(0x01))
            .expect_err("logical error");
        assert!(matches!(err, SessionError::OperationFailed(_)));
        assert!(err.message().contains("media id out of range"));

        // 逻辑错误只尝试一次盘点，驱动未被拆除。
        let ops = first_ops.lock();
        let inventories = ops
            .iter()
            .filter(|op| matches!(op, SimOp::Inventory { .. }))
            .count();
        assert_eq!(inventories, 1);
        assert!(!ops.contains(&SimOp::Close));
    }

    #[test]
    fn driver_calls_serialize_through_session() {
        let field = new_sim_field();
        field.lock().push(SimTag::blank([0xA1; 12]));
        let session = ManagedSession::new(reader_config(), scripted_factory(Vec::new(), field));

        session
            .execute(|driver| {
                driver.inventory(0x01)?;
                let handle = driver.create_tag_handle(0)?;
                driver.read_blocks(&handle, MemoryBank::Tid, 0, 6, None)
            })
            .expect("routine");
    }

    #[test]
    fn closed_session_rejects_operations() {
        let field = new_sim_field();
        let session = ManagedSession::new(reader_config(), scripted_factory(Vec::new(), field));
        session.close();

        let err = session
            .execute(|driver| driver.inventory(0x01))
            .expect_err("closed");
        assert!(matches!(err, SessionError::Closed));
    }

    #[test]
    fn start_notification_twice_reports_already_active() {
        let field = new_sim_field();
        let session = ManagedSession::new(reader_config(), scripted_factory(Vec::new(), field));

        let port = free_port();
        assert!(session.start_notification(port).expect("first start"));
        assert!(session.is_notification_active());
        assert_eq!(session.notification_port(), Some(port));

        // 第二次启动无副作用地报告已激活。
        assert!(!session.start_notification(port).expect("second start"));

        assert!(session.stop_notification().expect("stop"));
        assert!(!session.is_notification_active());
        assert!(!session.stop_notification().expect("stop when inactive"));
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind(("127.0.0.1", 0))
            .expect("bind")
            .local_addr()
            .expect("addr")
            .port()
    }
}
