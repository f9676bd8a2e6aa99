//! # 读写器驱动抽象
//!
//! 厂商读写器库是杂质边界：核心逻辑只面向 [`ReaderDriver`] trait 编程，
//! 协议引擎可以在没有硬件的情况下端到端测试。
//!
//! [`SimReaderDriver`] 提供内存中的读写器仿真（标签场、口令与锁语义、
//! 失败注入、操作日志、通知监听线程），既是默认的驱动实现，也是
//! 协议与会话测试的基础。厂商 SDK 驱动通过同一个 [`DriverFactory`]
//! 接缝接入。

mod error;
mod sim;
mod traits;
mod types;

pub use error::DriverError;
pub use sim::{FailurePlan, OpLog, SimField, SimOp, SimReaderDriver, SimTag, new_sim_field};
pub use traits::{DriverFactory, EventCallback, ReaderDriver, ReaderEvent};
pub use types::{InventoryItem, LockParam, LockSettings, MemoryBank, RssiValue, TagHandle};
