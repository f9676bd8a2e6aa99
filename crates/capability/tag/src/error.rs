//! 标签编解码错误类型定义。

/// 标签编解码错误。
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// 媒体号不符合目标格式。
    #[error("{0}")]
    InvalidMediaId(String),

    /// EPC 十六进制字符串非法。
    #[error("{0}")]
    InvalidEpcHex(String),

    /// 不支持的初始化格式。
    #[error("Unsupported tag format: {0}. Supported formats: DE290, CD290, DE6, DE290F, DE386")]
    UnsupportedFormat(String),

    /// 标签数据与格式布局不符。
    #[error("{0}")]
    InvalidTagData(String),
}
