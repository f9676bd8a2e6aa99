//! 内存中的读写器仿真。
//!
//! 仿真一台单读写器与其射频场：标签的四个存储区、访问口令校验、
//! 锁状态、EPC 改写后的句柄失效语义。额外提供失败注入与操作日志，
//! 供协议引擎与会话层在无硬件环境下做序列断言；通知模式下真实
//! 监听 TCP 端口，把收到的每行 EPC 十六进制转成标签事件。

use crate::error::DriverError;
use crate::traits::{EventCallback, ReaderDriver, ReaderEvent};
use crate::types::{InventoryItem, LockParam, LockSettings, MemoryBank, RssiValue, TagHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 共享的仿真标签场。
pub type SimField = Arc<Mutex<Vec<SimTag>>>;

/// 共享的操作日志。
pub type OpLog = Arc<Mutex<Vec<SimOp>>>;

/// 构造空标签场。
pub fn new_sim_field() -> SimField {
    Arc::new(Mutex::new(Vec::new()))
}

/// 仿真标签。
///
/// EPC 区采用平面布局：字 0 为 CRC，字 1 为 PC，字 2 起为 EPC 数据，
/// 与 Gen2 存储映射一致，因此对字 1 的写入落在 PC 上。
#[derive(Debug, Clone)]
pub struct SimTag {
    /// 保留区：销毁口令(4) + 访问口令(4)。
    pub reserved: [u8; 8],
    /// EPC 区平面字节（CRC + PC + EPC 数据）。
    pub epc_bank: Vec<u8>,
    /// TID 区（96 位）。
    pub tid: [u8; 12],
    /// 用户区。
    pub user: Vec<u8>,
    /// 保留区/EPC 区是否处于锁定状态。
    pub locked: bool,
    /// 盘点时上报的 RSSI。
    pub rssi_values: Vec<RssiValue>,
}

const EPC_BANK_CAPACITY: usize = 4 + 62;

impl SimTag {
    /// 出厂空白标签：口令全零、EPC 为 TID 前 12 字节以外的零。
    pub fn blank(tid: [u8; 12]) -> Self {
        let mut epc_bank = vec![0u8; EPC_BANK_CAPACITY];
        // 空白标签按 96 位 EPC 出厂（长度字段 6 个字）。
        epc_bank[2] = 0x30;
        Self {
            reserved: [0; 8],
            epc_bank,
            tid,
            user: vec![0; 8],
            locked: false,
            rssi_values: vec![RssiValue {
                antenna_number: 1,
                rssi: -55,
            }],
        }
    }

    /// 按 PC/EPC 预置标签内容。
    pub fn with_epc(pc: [u8; 2], epc: &[u8], tid: [u8; 12]) -> Self {
        let mut tag = Self::blank(tid);
        tag.epc_bank[2] = pc[0];
        tag.epc_bank[3] = pc[1];
        tag.epc_bank[4..4 + epc.len()].copy_from_slice(epc);
        tag
    }

    pub fn pc(&self) -> [u8; 2] {
        [self.epc_bank[2], self.epc_bank[3]]
    }

    /// PC 长度字段指示的当前 EPC 数据。
    pub fn epc(&self) -> &[u8] {
        let words = ((self.pc()[0] >> 3) & 0x1F) as usize;
        let len = (words * 2).min(self.epc_bank.len().saturating_sub(4));
        &self.epc_bank[4..4 + len]
    }

    pub fn epc_hex(&self) -> String {
        hex::encode_upper(self.epc())
    }

    pub fn access_password(&self) -> [u8; 4] {
        [
            self.reserved[4],
            self.reserved[5],
            self.reserved[6],
            self.reserved[7],
        ]
    }

    pub fn kill_password(&self) -> [u8; 4] {
        [
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
            self.reserved[3],
        ]
    }
}

/// 失败注入计划。
#[derive(Debug, Default)]
pub struct FailurePlan {
    /// 使后续 connect/reconnect 失败。
    pub fail_connect: bool,
    /// 接下来 N 次块写失败。
    pub write_failures: u32,
    /// 接下来 N 次锁命令失败。
    pub lock_failures: u32,
    /// 接下来 N 次盘点失败。
    pub inventory_failures: u32,
    /// 注入失败使用的文案（缺省为瞬时射频错误）。
    pub failure_text: Option<String>,
    /// 注入失败使用的错误码。
    pub failure_code: i32,
}

impl FailurePlan {
    fn take_failure(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    fn error(&self, default_text: &str, default_code: i32) -> DriverError {
        let text = self
            .failure_text
            .clone()
            .unwrap_or_else(|| default_text.to_string());
        let code = if self.failure_code != 0 {
            self.failure_code
        } else {
            default_code
        };
        DriverError::new(code, text)
    }
}

/// 操作日志条目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOp {
    Connect,
    Reconnect,
    Disconnect,
    Close,
    Inventory {
        antenna_mask: u8,
    },
    ReadBlocks {
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        authenticated: bool,
    },
    WriteBlocks {
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        data: Vec<u8>,
        authenticated: bool,
    },
    Lock {
        settings: LockSettings,
        password: [u8; 4],
    },
}

struct ListenerState {
    stop: Arc<AtomicBool>,
    peer_connected: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    port: u16,
}

/// 仿真读写器驱动。
pub struct SimReaderDriver {
    field: SimField,
    failures: Arc<Mutex<FailurePlan>>,
    ops: OpLog,
    connected: bool,
    was_connected: bool,
    closed: bool,
    last_error: String,
    last_iso: i32,
    last_inventory: Vec<String>,
    callback: Arc<Mutex<Option<EventCallback>>>,
    events: Arc<Mutex<VecDeque<ReaderEvent>>>,
    listener: Option<ListenerState>,
}

impl SimReaderDriver {
    pub fn new(field: SimField) -> Self {
        Self {
            field,
            failures: Arc::new(Mutex::new(FailurePlan::default())),
            ops: Arc::new(Mutex::new(Vec::new())),
            connected: false,
            was_connected: false,
            closed: false,
            last_error: String::new(),
            last_iso: 0,
            last_inventory: Vec::new(),
            callback: Arc::new(Mutex::new(None)),
            events: Arc::new(Mutex::new(VecDeque::new())),
            listener: None,
        }
    }

    /// 共享标签场（测试可直接注入/检查标签）。
    pub fn field(&self) -> SimField {
        Arc::clone(&self.field)
    }

    /// 共享操作日志。
    pub fn ops(&self) -> OpLog {
        Arc::clone(&self.ops)
    }

    /// 共享失败注入计划。
    pub fn failure_plan(&self) -> Arc<Mutex<FailurePlan>> {
        Arc::clone(&self.failures)
    }

    fn record(&self, op: SimOp) {
        self.ops.lock().push(op);
    }

    fn fail(&mut self, err: DriverError) -> DriverError {
        self.last_error = err.to_string();
        err
    }

    fn ensure_connected(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Err(self.fail(DriverError::new(-1, "driver closed")));
        }
        if !self.connected {
            return Err(self.fail(DriverError::new(-5012, "device disconnected")));
        }
        Ok(())
    }

    /// 按句柄记录的 EPC 在当前场内寻址；EPC 已变化的句柄视同无标签。
    fn resolve_handle(&mut self, handle: &TagHandle) -> Result<usize, DriverError> {
        let field = self.field.lock();
        let position = field
            .iter()
            .position(|tag| tag.epc_hex().eq_ignore_ascii_case(&handle.idd_hex));
        drop(field);

        position.ok_or_else(|| {
            self.last_iso = 0x0B;
            self.fail(DriverError::new(-1211, "no transponder in reader field"))
        })
    }

    fn check_authorization(
        &mut self,
        tag_locked: bool,
        stored_access: [u8; 4],
        bank: MemoryBank,
        password: Option<[u8; 4]>,
        is_write: bool,
    ) -> Result<(), DriverError> {
        // 锁定的标签：保留区读写与 EPC 区写入都要求口令完全匹配。
        let protected = tag_locked
            && (bank == MemoryBank::Reserved || (bank == MemoryBank::Epc && is_write));
        if !protected {
            return Ok(());
        }
        match password {
            Some(supplied) if supplied == stored_access => Ok(()),
            _ => {
                self.last_iso = 0x04;
                Err(self.fail(DriverError::new(-1311, "access denied: memory locked")))
            }
        }
    }
}

impl ReaderDriver for SimReaderDriver {
    fn connect(&mut self, address: &str, port: u16, timeout_ms: u64) -> Result<(), DriverError> {
        self.record(SimOp::Connect);
        if self.closed {
            return Err(self.fail(DriverError::new(-1, "driver closed")));
        }
        if self.failures.lock().fail_connect {
            return Err(self.fail(DriverError::new(
                -1520,
                format!("connection timeout after {timeout_ms} ms"),
            )));
        }
        debug!(address, port, "sim reader connected");
        self.connected = true;
        self.was_connected = true;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        self.record(SimOp::Reconnect);
        if self.closed {
            return Err(self.fail(DriverError::new(-1, "driver closed")));
        }
        if !self.was_connected || self.failures.lock().fail_connect {
            return Err(self.fail(DriverError::new(-5011, "reconnect failed: connection lost")));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.record(SimOp::Disconnect);
        self.connected = false;
    }

    fn close(&mut self) {
        self.record(SimOp::Close);
        let _ = self.stop_listener();
        self.connected = false;
        self.closed = true;
    }

    fn is_connected(&self) -> bool {
        self.connected && !self.closed
    }

    fn last_error_text(&self) -> String {
        self.last_error.clone()
    }

    fn last_iso_error(&self) -> i32 {
        self.last_iso
    }

    fn inventory(&mut self, antenna_mask: u8) -> Result<Vec<InventoryItem>, DriverError> {
        self.record(SimOp::Inventory { antenna_mask });
        self.ensure_connected()?;

        {
            let mut failures = self.failures.lock();
            if FailurePlan::take_failure(&mut failures.inventory_failures) {
                let err = failures.error("transmit failed", -5010);
                drop(failures);
                return Err(self.fail(err));
            }
        }

        let field = self.field.lock();
        let items: Vec<InventoryItem> = field
            .iter()
            .map(|tag| InventoryItem {
                idd_hex: tag.epc_hex(),
                rssi_values: tag.rssi_values.clone(),
            })
            .collect();
        drop(field);

        self.last_inventory = items.iter().map(|item| item.idd_hex.clone()).collect();

        if items.is_empty() {
            return Err(self.fail(DriverError::new(-1211, "no transponder in reader field")));
        }
        Ok(items)
    }

    fn create_tag_handle(&mut self, index: usize) -> Result<TagHandle, DriverError> {
        match self.last_inventory.get(index) {
            Some(idd_hex) => Ok(TagHandle {
                index,
                idd_hex: idd_hex.clone(),
            }),
            None => Err(self.fail(DriverError::new(-1, "invalid tag item index"))),
        }
    }

    fn read_blocks(
        &mut self,
        handle: &TagHandle,
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        password: Option<[u8; 4]>,
    ) -> Result<Vec<u8>, DriverError> {
        self.record(SimOp::ReadBlocks {
            bank,
            start_word,
            n_words,
            authenticated: password.is_some(),
        });
        self.ensure_connected()?;
        let index = self.resolve_handle(handle)?;

        let (locked, access) = {
            let field = self.field.lock();
            (field[index].locked, field[index].access_password())
        };
        self.check_authorization(locked, access, bank, password, false)?;

        let start = start_word as usize * 2;
        let len = n_words as usize * 2;
        let field = self.field.lock();
        let tag = &field[index];
        let source: &[u8] = match bank {
            MemoryBank::Reserved => &tag.reserved,
            MemoryBank::Epc => &tag.epc_bank,
            MemoryBank::Tid => &tag.tid,
            MemoryBank::User => &tag.user,
        };
        if start + len > source.len() {
            drop(field);
            self.last_iso = 0x03;
            return Err(self.fail(DriverError::new(-1312, "memory overrun")));
        }
        let data = source[start..start + len].to_vec();
        drop(field);
        self.last_iso = 0;
        Ok(data)
    }

    fn write_blocks(
        &mut self,
        handle: &TagHandle,
        bank: MemoryBank,
        start_word: u16,
        n_words: u16,
        data: &[u8],
        password: Option<[u8; 4]>,
    ) -> Result<(), DriverError> {
        self.record(SimOp::WriteBlocks {
            bank,
            start_word,
            n_words,
            data: data.to_vec(),
            authenticated: password.is_some(),
        });
        self.ensure_connected()?;

        if data.len() != n_words as usize * 2 {
            return Err(self.fail(DriverError::new(-1, "data length does not match word count")));
        }

        {
            let mut failures = self.failures.lock();
            if FailurePlan::take_failure(&mut failures.write_failures) {
                let err = failures.error("transponder write error", -4082);
                drop(failures);
                self.last_iso = 0x0B;
                return Err(self.fail(err));
            }
        }

        if bank == MemoryBank::Tid {
            self.last_iso = 0x03;
            return Err(self.fail(DriverError::new(-1313, "tid bank is read-only")));
        }

        let index = self.resolve_handle(handle)?;
        let (locked, access) = {
            let field = self.field.lock();
            (field[index].locked, field[index].access_password())
        };
        self.check_authorization(locked, access, bank, password, true)?;

        let start = start_word as usize * 2;
        let mut field = self.field.lock();
        let tag = &mut field[index];
        let target: &mut [u8] = match bank {
            MemoryBank::Reserved => &mut tag.reserved,
            MemoryBank::Epc => &mut tag.epc_bank,
            MemoryBank::User => &mut tag.user,
            MemoryBank::Tid => unreachable!("checked above"),
        };
        if start + data.len() > target.len() {
            drop(field);
            self.last_iso = 0x03;
            return Err(self.fail(DriverError::new(-1312, "memory overrun")));
        }
        target[start..start + data.len()].copy_from_slice(data);
        drop(field);
        self.last_iso = 0;
        Ok(())
    }

    fn lock(
        &mut self,
        handle: &TagHandle,
        settings: &LockSettings,
        password: [u8; 4],
    ) -> Result<(), DriverError> {
        self.record(SimOp::Lock {
            settings: *settings,
            password,
        });
        self.ensure_connected()?;

        {
            let mut failures = self.failures.lock();
            if FailurePlan::take_failure(&mut failures.lock_failures) {
                let err = failures.error("transponder lock error", -4083);
                drop(failures);
                self.last_iso = 0x0B;
                return Err(self.fail(err));
            }
        }

        let index = self.resolve_handle(handle)?;
        let stored_access = {
            let field = self.field.lock();
            field[index].access_password()
        };

        // 锁/解锁都要求以标签当前的访问口令认证。
        if password != stored_access {
            self.last_iso = 0x04;
            return Err(self.fail(DriverError::new(-1311, "access denied: wrong password")));
        }

        let mut field = self.field.lock();
        let tag = &mut field[index];
        if settings.kill == LockParam::Lock
            || settings.access == LockParam::Lock
            || settings.epc == LockParam::Lock
        {
            tag.locked = true;
        } else if settings.kill == LockParam::Unlock
            && settings.access == LockParam::Unlock
            && settings.epc == LockParam::Unlock
        {
            tag.locked = false;
        }
        drop(field);
        self.last_iso = 0;
        Ok(())
    }

    fn start_notification(&mut self, callback: EventCallback) -> Result<(), DriverError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop_notification(&mut self) -> Result<(), DriverError> {
        *self.callback.lock() = None;
        Ok(())
    }

    fn start_listener(
        &mut self,
        port: u16,
        bind_addr: &str,
        keep_alive: bool,
    ) -> Result<(), DriverError> {
        if self.listener.is_some() {
            return Err(DriverError::new(-1, "listener already running"));
        }

        let listener = TcpListener::bind((bind_addr, port))
            .map_err(|e| DriverError::new(-1, format!("failed to bind listener port {port}: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| DriverError::new(-1, format!("failed to configure listener: {e}")))?;

        let stop = Arc::new(AtomicBool::new(false));
        let peer_connected = Arc::new(AtomicBool::new(false));
        let events = Arc::clone(&self.events);
        let callback = Arc::clone(&self.callback);
        let thread_stop = Arc::clone(&stop);
        let thread_peer = Arc::clone(&peer_connected);

        let handle = std::thread::spawn(move || {
            listener_loop(listener, thread_stop, thread_peer, events, callback);
        });

        info!(port, keep_alive, "sim notification listener started");
        self.listener = Some(ListenerState {
            stop,
            peer_connected,
            handle: Some(handle),
            port,
        });
        Ok(())
    }

    fn stop_listener(&mut self) -> Result<(), DriverError> {
        if let Some(mut state) = self.listener.take() {
            state.stop.store(true, Ordering::Release);
            if let Some(handle) = state.handle.take() {
                let _ = handle.join();
            }
            info!(port = state.port, "sim notification listener stopped");
        }
        Ok(())
    }

    fn listener_peer_connected(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|state| state.peer_connected.load(Ordering::Acquire))
    }

    fn pop_event(&mut self) -> Option<ReaderEvent> {
        self.events.lock().pop_front()
    }
}

impl Drop for SimReaderDriver {
    fn drop(&mut self) {
        let _ = self.stop_listener();
    }
}

/// 监听线程主循环：每行输入视为一个标签事件的 EPC 十六进制。
fn listener_loop(
    listener: TcpListener,
    stop: Arc<AtomicBool>,
    peer_connected: Arc<AtomicBool>,
    events: Arc<Mutex<VecDeque<ReaderEvent>>>,
    callback: Arc<Mutex<Option<EventCallback>>>,
) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "notification peer connected");
                peer_connected.store(true, Ordering::Release);
                let _ = stream.set_read_timeout(Some(Duration::from_millis(100)));
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                loop {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            let idd = line.trim().to_uppercase();
                            if idd.is_empty() {
                                continue;
                            }
                            events.lock().push_back(ReaderEvent::Tag {
                                idd_hex: idd,
                                rssi_values: Vec::new(),
                                reader_timestamp: None,
                            });
                            if let Some(cb) = callback.lock().clone() {
                                cb();
                            }
                        }
                        Err(e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "notification peer read error");
                            break;
                        }
                    }
                }
                peer_connected.store(false, Ordering::Release);
                info!(%peer, "notification peer disconnected");
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                warn!(error = %e, "notification listener accept error");
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}
