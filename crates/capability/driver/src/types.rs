//! 驱动层类型定义。

/// Gen2 存储区。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBank {
    /// 保留区（销毁口令 + 访问口令）。
    Reserved,
    /// EPC 区（CRC + PC + EPC）。
    Epc,
    /// TID 区（只读芯片序列号）。
    Tid,
    /// 用户区。
    User,
}

/// Gen2 锁命令参数（每个区域一个）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockParam {
    Unchanged,
    Lock,
    Unlock,
    PermanentLock,
    PermanentUnlock,
}

/// 一次锁命令的完整参数向量。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub kill: LockParam,
    pub access: LockParam,
    pub epc: LockParam,
    pub tid: LockParam,
    pub user: LockParam,
}

impl LockSettings {
    /// 锁定销毁口令、访问口令与 EPC 区，TID/User 不变。
    pub fn lock_all() -> Self {
        Self {
            kill: LockParam::Lock,
            access: LockParam::Lock,
            epc: LockParam::Lock,
            tid: LockParam::Unchanged,
            user: LockParam::Unchanged,
        }
    }

    /// 解锁销毁口令、访问口令与 EPC 区，TID/User 不变。
    pub fn unlock_all() -> Self {
        Self {
            kill: LockParam::Unlock,
            access: LockParam::Unlock,
            epc: LockParam::Unlock,
            tid: LockParam::Unchanged,
            user: LockParam::Unchanged,
        }
    }
}

/// 单天线 RSSI 测量值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssiValue {
    pub antenna_number: u8,
    pub rssi: i32,
}

/// 盘点结果中的单个标签条目。
#[derive(Debug, Clone)]
pub struct InventoryItem {
    /// 标签标识（EPC 大写十六进制）。
    pub idd_hex: String,
    pub rssi_values: Vec<RssiValue>,
}

/// 标签操作句柄。
///
/// 句柄按盘点时刻的 EPC 寻址；EPC 被改写后旧句柄随之失效，
/// 后续操作必须重新盘点并重新选择。
#[derive(Debug, Clone)]
pub struct TagHandle {
    /// 盘点结果中的条目下标。
    pub index: usize,
    /// 盘点时刻观测到的 EPC 十六进制。
    pub idd_hex: String,
}
