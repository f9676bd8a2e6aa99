//! 协议引擎错误类型定义。

use bookgate_driver::DriverError;
use bookgate_tag::TagError;

/// 协议例程错误。
///
/// 文案会原样进入 HTTP 响应与会话层的连接错误判别，驱动的错误码
/// 与 ISO 错误码都嵌在文本里以便远程诊断。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 盘点命令失败（非"无标签"情形）。
    #[error("Inventory failed: {0}")]
    Inventory(String),

    /// 场内没有标签。
    #[error("No tags found in field")]
    NoTagInField,

    /// 初始化要求场内恰好一个标签。
    #[error("Multiple tags found - please ensure only one tag is in the field")]
    MultipleTagsInField,

    /// 指定 EPC 的标签不在场内。
    #[error("Specified tag not found or not EPC Gen2")]
    TagNotFound,

    /// EPC 写入成功后重新盘点失败。
    #[error("Failed to re-select tag after EPC write: {0}")]
    ReselectFailed(String),

    /// 重新盘点成功但目标 EPC 不在结果中；不会重写，标签状态待查。
    #[error("Tag EPC verification failed - expected {expected} but not found in field")]
    VerificationFailed { expected: String },

    /// TID 读回长度异常。
    #[error("TID read returned unexpected length: {length} bytes (expected 12)")]
    TidReadInvalid { length: usize },

    /// 读/写/锁在重试阶梯耗尽后仍失败。
    #[error("Failed to {action}: {message} (ISO error: {iso_error})")]
    TagOperationFailed {
        action: String,
        message: String,
        iso_error: i32,
    },

    /// 标签编解码错误（不重试）。
    #[error("{0}")]
    Tag(#[from] TagError),

    /// 驱动错误透传。
    #[error("{0}")]
    Driver(#[from] DriverError),
}
