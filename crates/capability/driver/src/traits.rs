//! 读写器驱动契约。

use crate::error::DriverError;
use crate::types::{InventoryItem, LockSettings, MemoryBank, RssiValue, TagHandle};
use std::sync::Arc;

/// 通知回调：有事件待取时被调用（由驱动管理的线程触发）。
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// 按读写器名称构造驱动实例的工厂。
///
/// 重连会拆除旧实例并通过工厂重建，名称让工厂能复用读写器级的
/// 底层资源（真实 SDK 的连接器配置、仿真驱动的标签场）。
pub type DriverFactory = Arc<dyn Fn(&str) -> Box<dyn ReaderDriver> + Send + Sync>;

/// 异步通知事件（驱动侧原始形态）。
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// 标签事件。
    Tag {
        idd_hex: String,
        rssi_values: Vec<RssiValue>,
        reader_timestamp: Option<String>,
    },
    /// 读写器自报身份事件。
    Identification {
        reader_type: String,
        firmware_version: String,
    },
    /// 其余事件类型，仅透传名称。
    Other(String),
}

/// 读写器驱动契约（阻塞式）。
///
/// 所有调用都在持有会话锁的线程上进行；实现不要求内部加锁。
/// 错误同时携带厂商错误码与文案，"no transponder" 类错误属于正常
/// 的空场条件，由上层识别。
pub trait ReaderDriver: Send {
    fn connect(&mut self, address: &str, port: u16, timeout_ms: u64) -> Result<(), DriverError>;

    /// 尝试复用既有连接；失败时由调用方回退到 `connect`。
    fn reconnect(&mut self) -> Result<(), DriverError>;

    fn disconnect(&mut self);

    /// 释放底层资源，此后实例不可再用。
    fn close(&mut self);

    fn is_connected(&self) -> bool;

    /// 最近一次失败的厂商文案。
    fn last_error_text(&self) -> String;

    /// 最近一次标签操作的 ISO 错误码。
    fn last_iso_error(&self) -> i32;

    /// 以天线掩码盘点射频场内标签。
    fn inventory(&mut self, antenna_mask: u8) -> Result<Vec<InventoryItem>, DriverError>;

    /// 为盘点结果中的条目建立操作句柄。
    fn create_tag_handle(&mut self, index: usize) -> Result<TagHandle, DriverError>;

    fn read_blocks(
        &mut self,
        handle: &TagHandle,
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        password: Option<[u8; 4]>,
    ) -> Result<Vec<u8>, DriverError>;

    fn write_blocks(
        &mut self,
        handle: &TagHandle,
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        data: &[u8],
        password: Option<[u8; 4]>,
    ) -> Result<(), DriverError>;

    fn lock(
        &mut self,
        handle: &TagHandle,
        settings: &LockSettings,
        password: [u8; 4],
    ) -> Result<(), DriverError>;

    /// 绑定通知回调。
    fn start_notification(&mut self, callback: EventCallback) -> Result<(), DriverError>;

    fn stop_notification(&mut self) -> Result<(), DriverError>;

    /// 启动 TCP 监听线程接收读写器推送。
    fn start_listener(
        &mut self,
        port: u16,
        bind_addr: &str,
        keep_alive: bool,
    ) -> Result<(), DriverError>;

    fn stop_listener(&mut self) -> Result<(), DriverError>;

    /// 通知模式下是否有读写器已连入监听端口。
    fn listener_peer_connected(&self) -> bool;

    /// 取出一条待处理事件，队列空时返回 None。
    fn pop_event(&mut self) -> Option<ReaderEvent>;
}
