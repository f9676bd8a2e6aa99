//! 变更例程：盘点、初始化、改号、清除、布防撤防。
//!
//! 每个例程的共同前奏：以会话的天线掩码盘点一次，在结果中定位目标
//! 标签。所有块写与锁命令都套各自的重试阶梯。

use crate::error::EngineError;
use bookgate_driver::{
    DriverError, InventoryItem, LockSettings, MemoryBank, ReaderDriver, TagHandle,
};
use bookgate_tag::{AntennaRssi, Tag, TagFactory, to_hex_upper};
use bookgate_telemetry::{
    record_clear, record_edit, record_initialization, record_inventory, record_rf_retry,
    record_security_toggle,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 块写阶梯：最多 10 次，间隔 100 毫秒。
const MAX_RETRIES: u32 = 10;
const RETRY_DELAY_MS: u64 = 100;

/// EPC 写入后给标签的稳定时间。
const POST_EPC_WRITE_DELAY_MS: u64 = 50;

/// 清除后的中性 PC：长度字段 6 个字，其余清零。
const NEUTRAL_PC: [u8; 2] = [0x30, 0x00];

/// 清除例程的结果。
#[derive(Debug, Clone)]
pub struct ClearOutcome {
    pub new_epc: String,
    pub new_pc: String,
    pub tid: String,
}

/// 盘点并解码场内标签。
///
/// 驱动以错误码形式上报"no transponder"，这是正常的空场条件，
/// 映射为空列表而不是错误。
pub fn inventory_tags(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    factory: &TagFactory,
) -> Result<Vec<Tag>, EngineError> {
    let items = run_inventory(driver, antenna_mask)?;

    let mut tags = Vec::with_capacity(items.len());
    for item in &items {
        let mut tag = factory.from_hex(&item.idd_hex)?;
        tag.set_rssi_values(
            item.rssi_values
                .iter()
                .map(|rssi| AntennaRssi {
                    antenna_number: rssi.antenna_number,
                    rssi: rssi.rssi,
                })
                .collect(),
        );
        debug!(
            epc = %tag.epc_hex(),
            tag_type = tag.tag_type(),
            secured = tag.is_secured(),
            "inventoried tag"
        );
        tags.push(tag);
    }

    record_inventory(tags.len());
    Ok(tags)
}

/// 初始化：空白标签 → 已格式化标签。
///
/// 前置条件：场内恰好一个标签。步骤：写口令（保留区字 0，4 个字，
/// 无认证）→ 写 PC+EPC（EPC 区字 1，无认证）→ 稳定延时后重新盘点、
/// 按新 EPC 重新选择 → 用新访问口令加锁。
pub fn initialize_tag(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    new_tag: &Tag,
) -> Result<(), EngineError> {
    let items = run_inventory(driver, antenna_mask)?;
    if items.is_empty() {
        return Err(EngineError::NoTagInField);
    }
    if items.len() > 1 {
        return Err(EngineError::MultipleTagsInField);
    }

    let handle = driver.create_tag_handle(0)?;

    // 口令布局：销毁口令在字 0..2，访问口令在字 2..4。
    let mut passwords = [0u8; 8];
    passwords[..4].copy_from_slice(&new_tag.kill_password());
    passwords[4..].copy_from_slice(&new_tag.access_password());
    write_with_retry(
        driver,
        &handle,
        MemoryBank::Reserved,
        0,
        4,
        &passwords,
        None,
        "write passwords",
    )?;

    let pc_and_epc = concat_pc_epc(new_tag);
    write_with_retry(
        driver,
        &handle,
        MemoryBank::Epc,
        1,
        (pc_and_epc.len() / 2) as u16,
        &pc_and_epc,
        None,
        "write PC+EPC",
    )?;

    // EPC 已变化，旧句柄失效；重新盘点拿新句柄后才能加锁。
    let fresh_handle = reselect_after_epc_write(driver, antenna_mask, &new_tag.epc_hex())?;

    lock_with_retry(
        driver,
        &fresh_handle,
        &LockSettings::lock_all(),
        new_tag.access_password(),
        "lock memory banks",
    )?;

    record_initialization();
    info!(epc = %new_tag.epc_hex(), tag_type = new_tag.tag_type(), "tag initialized");
    Ok(())
}

/// 改号：改写既有标签的媒体号。
///
/// 解锁用旧访问口令（失败仅告警，容忍未加锁的标签）；新旧 EPC 等长
/// 时只写 EPC 数据（字 2 起），长度变化时连 PC 一起写（字 1 起）；
/// 重新选择后用新口令加锁。
pub fn edit_tag(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    epc_hex: &str,
    old_tag: &Tag,
    new_tag: &Tag,
) -> Result<(), EngineError> {
    let items = run_inventory(driver, antenna_mask)?;
    if items.is_empty() {
        return Err(EngineError::NoTagInField);
    }
    let handle = select_tag(driver, &items, epc_hex)?;

    if let Err(e) = lock_with_retry(
        driver,
        &handle,
        &LockSettings::unlock_all(),
        old_tag.access_password(),
        "unlock memory banks",
    ) {
        warn!(error = %e, "failed to unlock memory banks, continuing");
    }

    let mut passwords = [0u8; 8];
    passwords[..4].copy_from_slice(&new_tag.kill_password());
    passwords[4..].copy_from_slice(&new_tag.access_password());
    write_with_retry(
        driver,
        &handle,
        MemoryBank::Reserved,
        0,
        4,
        &passwords,
        None,
        "write new passwords",
    )?;

    if old_tag.epc().len() == new_tag.epc().len() {
        let epc = new_tag.epc().to_vec();
        write_with_retry(
            driver,
            &handle,
            MemoryBank::Epc,
            2,
            (epc.len() / 2) as u16,
            &epc,
            None,
            "write new EPC",
        )?;
    } else {
        let pc_and_epc = concat_pc_epc(new_tag);
        write_with_retry(
            driver,
            &handle,
            MemoryBank::Epc,
            1,
            (pc_and_epc.len() / 2) as u16,
            &pc_and_epc,
            None,
            "write new EPC",
        )?;
    }

    let fresh_handle = reselect_after_epc_write(driver, antenna_mask, &new_tag.epc_hex())?;

    lock_with_retry(
        driver,
        &fresh_handle,
        &LockSettings::lock_all(),
        new_tag.access_password(),
        "lock memory banks",
    )?;

    record_edit();
    info!(
        old_epc = %epc_hex,
        new_epc = %new_tag.epc_hex(),
        "tag media id updated"
    );
    Ok(())
}

/// 清除：口令清零，EPC 恢复为 TID。
pub fn clear_tag(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    epc_hex: &str,
    old_tag: &Tag,
) -> Result<ClearOutcome, EngineError> {
    let items = run_inventory(driver, antenna_mask)?;
    if items.is_empty() {
        return Err(EngineError::NoTagInField);
    }
    let handle = select_tag(driver, &items, epc_hex)?;

    let tid_bytes = driver
        .read_blocks(&handle, MemoryBank::Tid, 0, 6, None)
        .map_err(|e| EngineError::TagOperationFailed {
            action: "read TID".to_string(),
            message: e.message,
            iso_error: driver.last_iso_error(),
        })?;
    if tid_bytes.len() != 12 {
        return Err(EngineError::TidReadInvalid {
            length: tid_bytes.len(),
        });
    }

    // 旧口令非零才尝试解锁；失败仅告警（标签可能从未加锁）。
    let old_access = old_tag.access_password();
    if old_access != [0; 4] {
        if let Err(e) = lock_with_retry(
            driver,
            &handle,
            &LockSettings::unlock_all(),
            old_access,
            "unlock memory banks",
        ) {
            warn!(error = %e, "failed to unlock memory banks, continuing");
        }
    }

    // 无认证写入零口令；若前面的解锁没有生效，这里会经阶梯失败上抛。
    write_with_retry(
        driver,
        &handle,
        MemoryBank::Reserved,
        0,
        4,
        &[0u8; 8],
        None,
        "clear passwords",
    )?;

    let mut pc_and_epc = Vec::with_capacity(2 + tid_bytes.len());
    pc_and_epc.extend_from_slice(&NEUTRAL_PC);
    pc_and_epc.extend_from_slice(&tid_bytes);
    write_with_retry(
        driver,
        &handle,
        MemoryBank::Epc,
        1,
        (pc_and_epc.len() / 2) as u16,
        &pc_and_epc,
        None,
        "write PC+EPC",
    )?;

    let tid_hex = to_hex_upper(&tid_bytes);
    record_clear();
    info!(old_epc = %epc_hex, new_epc = %tid_hex, "tag cleared");
    Ok(ClearOutcome {
        new_epc: tid_hex.clone(),
        new_pc: "3000".to_string(),
        tid: tid_hex,
    })
}

/// 布防/撤防：把标签的动态片段写回 EPC 区。
///
/// 调用方先在内存中翻转防盗位；口令非零时带认证写入。
pub fn write_security_state(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    epc_hex: &str,
    tag: &Tag,
) -> Result<(), EngineError> {
    let items = run_inventory(driver, antenna_mask)?;
    if items.is_empty() {
        return Err(EngineError::NoTagInField);
    }
    let handle = select_tag(driver, &items, epc_hex)?;

    let dynamic_blocks = tag.dynamic_blocks();
    let access = tag.access_password();
    let password = if access != [0; 4] { Some(access) } else { None };

    write_with_retry(
        driver,
        &handle,
        MemoryBank::Epc,
        tag.dynamic_blocks_start_word(),
        (dynamic_blocks.len() / 2) as u16,
        &dynamic_blocks,
        password,
        "write security bit",
    )?;

    record_security_toggle();
    info!(epc = %epc_hex, secured = tag.is_secured(), "security state written");
    Ok(())
}

/// 盘点一次；"no transponder" 映射为空列表。
pub(crate) fn run_inventory(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
) -> Result<Vec<InventoryItem>, EngineError> {
    match driver.inventory(antenna_mask) {
        Ok(items) => Ok(items),
        Err(e) if is_no_transponder(&e) => {
            debug!("no tags found in reader field");
            Ok(Vec::new())
        }
        Err(e) => Err(EngineError::Inventory(e.to_string())),
    }
}

fn is_no_transponder(error: &DriverError) -> bool {
    error.message.to_lowercase().contains("no transponder")
}

/// 在盘点结果中按 EPC 十六进制定位标签并建句柄。
pub(crate) fn select_tag(
    driver: &mut dyn ReaderDriver,
    items: &[InventoryItem],
    epc_hex: &str,
) -> Result<TagHandle, EngineError> {
    let index = items
        .iter()
        .position(|item| item.idd_hex.eq_ignore_ascii_case(epc_hex))
        .ok_or(EngineError::TagNotFound)?;
    Ok(driver.create_tag_handle(index)?)
}

/// EPC 写入成功后的重新选择；找不到新 EPC 时绝不重写。
fn reselect_after_epc_write(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    expected_epc_hex: &str,
) -> Result<TagHandle, EngineError> {
    std::thread::sleep(Duration::from_millis(POST_EPC_WRITE_DELAY_MS));

    let items = match driver.inventory(antenna_mask) {
        Ok(items) => items,
        Err(e) => return Err(EngineError::ReselectFailed(e.to_string())),
    };
    if items.is_empty() {
        return Err(EngineError::ReselectFailed(
            "no tags found in field".to_string(),
        ));
    }

    let index = items
        .iter()
        .position(|item| item.idd_hex.eq_ignore_ascii_case(expected_epc_hex))
        .ok_or_else(|| EngineError::VerificationFailed {
            expected: expected_epc_hex.to_string(),
        })?;
    Ok(driver.create_tag_handle(index)?)
}

fn concat_pc_epc(tag: &Tag) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + tag.epc().len());
    data.extend_from_slice(&tag.pc());
    data.extend_from_slice(tag.epc());
    data
}

/// 块写重试阶梯：最多 10 次，间隔 100 毫秒，成功即短路。
#[allow(clippy::too_many_arguments)]
fn write_with_retry(
    driver: &mut dyn ReaderDriver,
    handle: &TagHandle,
    bank: MemoryBank,
    start_word: u16,
    n_words: u16,
    data: &[u8],
    password: Option<[u8; 4]>,
    action: &str,
) -> Result<(), EngineError> {
    for attempt in 1..=MAX_RETRIES {
        match driver.write_blocks(handle, bank, start_word, n_words, data, password) {
            Ok(()) => {
                if attempt > 1 {
                    info!(?bank, start_word, attempt, max = MAX_RETRIES, "write succeeded after retry");
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    ?bank,
                    start_word,
                    attempt,
                    max = MAX_RETRIES,
                    error = %e,
                    "write attempt failed"
                );
                if attempt < MAX_RETRIES {
                    record_rf_retry();
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
    }

    Err(EngineError::TagOperationFailed {
        action: action.to_string(),
        message: driver.last_error_text(),
        iso_error: driver.last_iso_error(),
    })
}

/// 锁命令重试阶梯：最多 10 次，间隔 100 + (attempt-1)×50 毫秒。
fn lock_with_retry(
    driver: &mut dyn ReaderDriver,
    handle: &TagHandle,
    settings: &LockSettings,
    password: [u8; 4],
    action: &str,
) -> Result<(), EngineError> {
    for attempt in 1..=MAX_RETRIES {
        match driver.lock(handle, settings, password) {
            Ok(()) => {
                if attempt > 1 {
                    info!(attempt, max = MAX_RETRIES, "lock operation succeeded after retry");
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    attempt,
                    max = MAX_RETRIES,
                    error = %e,
                    "lock attempt failed"
                );
                if attempt < MAX_RETRIES {
                    record_rf_retry();
                    std::thread::sleep(Duration::from_millis(
                        RETRY_DELAY_MS + u64::from(attempt - 1) * 50,
                    ));
                }
            }
        }
    }

    Err(EngineError::TagOperationFailed {
        action: action.to_string(),
        message: driver.last_error_text(),
        iso_error: driver.last_iso_error(),
    })
}
