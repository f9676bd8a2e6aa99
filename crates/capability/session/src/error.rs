//! 会话层错误类型定义。

/// 会话层错误。
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 逻辑错误，不重试，直接上抛。
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// 连接错误经重连阶梯后仍然失败。
    #[error("Operation failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// 会话已关闭，不可再用。
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// 面向 HTTP 响应的失败文案。
    pub fn message(&self) -> String {
        self.to_string()
    }
}
