//! # 标签变更协议引擎
//!
//! 初始化 / 改号 / 清除 / 布防撤防 / 分析的多步状态机，跑在抽象驱动
//! 之上：
//! - 每步块写与锁命令都有各自的重试阶梯（瞬时射频错误）
//! - EPC 改写会使旧标签句柄失效，之后必须重新盘点并按新 EPC 重新选择
//! - 改写前后口令不同：解锁用旧口令，写入后加锁用新口令
//!
//! 连接层故障不在这里处理，由会话层按错误文本分类并重连。

mod analyze;
mod engine;
mod error;

pub use analyze::{
    EpcBankAnalysis, LockStatus, ReservedBankAnalysis, SecurityAssessment, TagAnalysis,
    TidBankAnalysis, analyze_tag,
};
pub use engine::{
    ClearOutcome, clear_tag, edit_tag, initialize_tag, inventory_tags, write_security_state,
};
pub use error::EngineError;
