//! 只读的标签深度分析。
//!
//! 由给定 EPC 计算理论布局，再逐区读取实际内容比对：EPC 区（PC 探读
//! 后按实际长度读全）、TID 区、保留区（先无认证探读，再带理论口令
//! 读），最终给出锁状态与安全评估。全程不写。

use crate::engine::{run_inventory, select_tag};
use crate::error::EngineError;
use bookgate_driver::{MemoryBank, ReaderDriver};
use bookgate_tag::{Tag, to_hex_upper};
use bookgate_telemetry::record_analyze;
use serde::Serialize;
use tracing::debug;

/// EPC 区比对结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpcBankAnalysis {
    pub read_success: bool,
    /// 形如 "0x3000"。
    pub pc_value: String,
    pub epc_length_in_words: usize,
    pub epc_length_in_bytes: usize,
    pub actual: String,
    pub theoretical: String,
    pub matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// TID 区读取结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TidBankAnalysis {
    pub read_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 保留区口令分析。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedBankAnalysis {
    pub readable_without_auth: bool,
    pub readable_with_auth: bool,
    pub theoretical: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwords_are_zero: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 锁状态推断。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    /// LOCKED / UNLOCKED_NO_PASSWORD / UNLOCKED / UNKNOWN。
    pub reserved_bank: String,
    pub reserved_bank_status: String,
}

/// 总体安全评估。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAssessment {
    pub properly_secured: bool,
    pub password_correct: bool,
    pub issues: Vec<String>,
    pub password_protection_configured: bool,
    pub password_protection_required: bool,
}

/// 分析报告。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagAnalysis {
    pub tag_type: String,
    pub media_id: String,
    pub epc_bank: EpcBankAnalysis,
    pub tid_bank: TidBankAnalysis,
    pub reserved_bank: ReservedBankAnalysis,
    pub lock_status: LockStatus,
    pub security_assessment: SecurityAssessment,
}

/// 深度分析场内指定标签的存储区与安全状态。
pub fn analyze_tag(
    driver: &mut dyn ReaderDriver,
    antenna_mask: u8,
    epc_hex: &str,
    theoretical: &Tag,
) -> Result<TagAnalysis, EngineError> {
    let items = run_inventory(driver, antenna_mask)?;
    if items.is_empty() {
        return Err(EngineError::NoTagInField);
    }
    let handle = select_tag(driver, &items, epc_hex)?;

    // 先读一个字拿到 PC，由长度字段决定随后读多少。
    let pc_bytes = driver
        .read_blocks(&handle, MemoryBank::Epc, 1, 1, None)
        .map_err(|e| EngineError::TagOperationFailed {
            action: "read PC".to_string(),
            message: e.message,
            iso_error: driver.last_iso_error(),
        })?;
    if pc_bytes.len() < 2 {
        return Err(EngineError::TagOperationFailed {
            action: "read PC".to_string(),
            message: format!("short read: {} bytes", pc_bytes.len()),
            iso_error: driver.last_iso_error(),
        });
    }
    let pc_value = (u16::from(pc_bytes[0]) << 8) | u16::from(pc_bytes[1]);
    let epc_length_in_words = usize::from((pc_value >> 11) & 0x1F);

    let epc_bank_read =
        driver.read_blocks(&handle, MemoryBank::Epc, 1, (1 + epc_length_in_words) as u16, None);
    let (actual_pc_epc, epc_read_error) = match &epc_bank_read {
        Ok(data) => (to_hex_upper(data), None),
        Err(e) => (String::new(), Some(e.to_string())),
    };

    let mut theoretical_pc_epc = theoretical.pc().to_vec();
    theoretical_pc_epc.extend_from_slice(theoretical.epc());
    let theoretical_pc_epc_hex = to_hex_upper(&theoretical_pc_epc);
    let epc_matches = actual_pc_epc == theoretical_pc_epc_hex;

    let epc_bank = EpcBankAnalysis {
        read_success: epc_bank_read.is_ok(),
        pc_value: format!("0x{pc_value:04X}"),
        epc_length_in_words,
        epc_length_in_bytes: epc_length_in_words * 2,
        actual: actual_pc_epc,
        theoretical: theoretical_pc_epc_hex,
        matches: epc_matches,
        error: epc_read_error,
    };

    let tid_bank = match driver.read_blocks(&handle, MemoryBank::Tid, 0, 6, None) {
        Ok(data) => TidBankAnalysis {
            read_success: true,
            length: Some(data.len()),
            data: Some(to_hex_upper(&data)),
            error: None,
        },
        Err(e) => TidBankAnalysis {
            read_success: false,
            data: None,
            length: None,
            error: Some(e.to_string()),
        },
    };

    let (reserved_bank, lock_status, security_assessment) =
        analyze_reserved_bank(driver, &handle, theoretical);

    record_analyze();
    Ok(TagAnalysis {
        tag_type: theoretical.tag_type().to_string(),
        media_id: theoretical.media_id()?,
        epc_bank,
        tid_bank,
        reserved_bank,
        lock_status,
        security_assessment,
    })
}

/// 保留区探读与安全评估。
fn analyze_reserved_bank(
    driver: &mut dyn ReaderDriver,
    handle: &bookgate_driver::TagHandle,
    theoretical: &Tag,
) -> (ReservedBankAnalysis, LockStatus, SecurityAssessment) {
    let without_auth = driver.read_blocks(handle, MemoryBank::Reserved, 0, 4, None);
    let readable_without_auth = without_auth.is_ok();

    let theoretical_access = theoretical.access_password();
    let with_auth =
        driver.read_blocks(handle, MemoryBank::Reserved, 0, 4, Some(theoretical_access));
    let readable_with_auth = with_auth.is_ok();

    debug!(
        readable_without_auth,
        readable_with_auth, "probed reserved bank"
    );

    let mut theoretical_passwords = theoretical.kill_password().to_vec();
    theoretical_passwords.extend_from_slice(&theoretical_access);
    let theoretical_hex = to_hex_upper(&theoretical_passwords);

    let observed = with_auth.ok().or_else(|| without_auth.ok());
    let mut passwords_match = false;
    let mut passwords_are_zero = false;

    let mut reserved_bank = ReservedBankAnalysis {
        readable_without_auth,
        readable_with_auth,
        theoretical: theoretical_hex.clone(),
        actual: None,
        matches: false,
        passwords_are_zero: None,
        info: None,
        warning: None,
        error: None,
    };

    if let Some(actual) = observed {
        let actual_hex = to_hex_upper(&actual);
        passwords_match = actual_hex == theoretical_hex;
        passwords_are_zero = actual.iter().all(|byte| *byte == 0);

        reserved_bank.actual = Some(actual_hex);
        reserved_bank.matches = passwords_match;
        reserved_bank.passwords_are_zero = Some(passwords_are_zero);

        if readable_without_auth {
            if passwords_are_zero {
                reserved_bank.info =
                    Some("Tag has no password protection (passwords are zero)".to_string());
            } else {
                reserved_bank.warning = Some(
                    "Reserved bank readable without password - not properly secured".to_string(),
                );
            }
        }
    } else {
        reserved_bank.error = Some("Unable to read Reserved bank even with password".to_string());
    }

    let (status_code, status_text) = if !readable_without_auth && readable_with_auth {
        ("LOCKED", "Read-protected with access password")
    } else if readable_without_auth {
        if passwords_are_zero {
            ("UNLOCKED_NO_PASSWORD", "No password protection configured")
        } else {
            ("UNLOCKED", "Readable without authentication (insecure)")
        }
    } else {
        ("UNKNOWN", "Cannot determine lock status")
    };
    let lock_status = LockStatus {
        reserved_bank: status_code.to_string(),
        reserved_bank_status: status_text.to_string(),
    };

    let properly_secured = !readable_without_auth && readable_with_auth && passwords_match;
    let should_have_passwords = !theoretical.is_raw();

    let mut issues = Vec::new();
    if readable_without_auth && !passwords_are_zero {
        issues.push("Reserved bank not password-protected but contains non-zero passwords".to_string());
    }
    if readable_with_auth && !passwords_match && !passwords_are_zero {
        issues.push("Password does not match theoretical calculation".to_string());
    }
    if passwords_are_zero && should_have_passwords {
        issues.push(
            "Tag format requires password protection but passwords are not configured (initialization incomplete or failed)"
                .to_string(),
        );
    }

    let security_assessment = SecurityAssessment {
        properly_secured,
        password_correct: passwords_match,
        issues,
        password_protection_configured: !passwords_are_zero,
        password_protection_required: should_have_passwords,
    };

    (reserved_bank, lock_status, security_assessment)
}
