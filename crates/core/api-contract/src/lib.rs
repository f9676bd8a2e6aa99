//! 稳定的 HTTP 响应契约。
//!
//! 所有响应顶层携带 `success: bool`；失败响应携带 `error: string`；
//! 成功响应为扁平结构（无 data 包装），字段名统一 camelCase。

use serde::Serialize;

/// 失败响应体。
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// 仅带提示信息的成功响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// 盘点到的单个标签。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub tag_type: String,
    pub epc: String,
    pub pc: String,
    pub media_id: String,
    pub secured: bool,
    pub rssi_values: Vec<AntennaRssiDto>,
}

/// 单天线 RSSI 测量值。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AntennaRssiDto {
    pub antenna_number: u8,
    pub rssi: i32,
}

/// GET /inventory/{name} 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub tags: Vec<TagDto>,
}

/// 单个读写器的运行状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderInfoDto {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub mode: String,
    pub antennas: Vec<u8>,
    /// 形如 "0x03" 的天线掩码。
    pub antenna_mask: String,
    pub is_connected: bool,
    pub connection_status: String,
    pub notification_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_port: Option<u16>,
}

/// GET /readers 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadersResponse {
    pub success: bool,
    pub reader_count: usize,
    pub readers: Vec<ReaderInfoDto>,
}

/// POST /initialize/{name} 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub message: String,
    pub epc: String,
    pub pc: String,
    pub media_id: String,
    pub secured: bool,
    pub format: String,
    pub tag_type: String,
}

/// POST /edit/{name} 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub success: bool,
    pub message: String,
    pub old_epc: String,
    pub new_epc: String,
    pub media_id: String,
    pub tag_type: String,
}

/// POST /clear/{name} 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
    pub old_epc: String,
    pub new_epc: String,
    pub new_pc: String,
    pub tid: String,
}

/// POST /secure 与 /unsecure 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityToggleResponse {
    pub success: bool,
    pub message: String,
    pub epc: String,
    pub tag_type: String,
    pub secured: bool,
}

/// POST /notification/start/{name} 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStartResponse {
    pub success: bool,
    pub message: String,
    pub port: u16,
    pub reader_name: String,
}

/// 通知事件里的单天线 RSSI（字段名与盘点结果不同，历史格式）。
#[derive(Debug, Clone, Serialize)]
pub struct EventRssiDto {
    pub antenna: u8,
    pub rssi: i32,
}

/// 异步通知事件。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEventDto {
    /// 服务端接收时刻（epoch 毫秒）。
    pub timestamp: i64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi_values: Option<Vec<EventRssiDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
}

/// GET /notification/events/{name} 响应体（取走式读取）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEventsResponse {
    pub success: bool,
    pub reader_name: String,
    pub event_count: usize,
    pub is_connected: bool,
    pub events: Vec<NotificationEventDto>,
}

/// 单读写器的通知会话信息。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSessionDto {
    pub reader_name: String,
    pub port: u16,
    pub is_connected: bool,
    pub queued_events: usize,
}

/// GET /notification/status 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatusResponse {
    pub success: bool,
    pub active_sessions: usize,
    pub sessions: Vec<NotificationSessionDto>,
}

/// GET /metrics 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub success: bool,
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
