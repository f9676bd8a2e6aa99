//! 驱动层错误类型定义。

/// 驱动层错误：厂商错误码 + 可读文案。
///
/// 文案会携带错误码，上层的连接错误判别按文本匹配。
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (code: {code})")]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
