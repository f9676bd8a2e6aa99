//! # 读写器会话能力模块
//!
//! 长连接读写器的生命周期管理：
//! - **ManagedSession**：公平互斥锁串行化 + 懒连接 + 按错误文本分类的
//!   重连阶梯 + 通知模式生命周期
//! - **NotificationQueue**：容量 1000 的丢弃最旧事件队列
//! - **ReaderRegistry**：名称到会话的注册表 + 监听端口分配 + 关停扇出

mod error;
mod queue;
mod registry;
mod session;

pub use error::SessionError;
pub use queue::{NotificationEvent, NotificationQueue};
pub use registry::ReaderRegistry;
pub use session::{ManagedSession, is_connection_error};
