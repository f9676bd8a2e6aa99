//! 标签口令配置与派生。
//!
//! 口令表按 `"<标签类型>.<角色>"` 检索（如 `DE290Tag.access`、
//! `BRTag.secret`），启动时装载一次，之后只读。缺失键返回含
//! `CHANGE-ME` 的占位值，装载时对所有占位值告警。

use sha1::Sha1;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use tracing::warn;

/// 名称检索的口令注册表。
#[derive(Debug, Default)]
pub struct PasswordRegistry {
    entries: HashMap<String, String>,
}

impl PasswordRegistry {
    /// 构造注册表，并对仍为占位值的条目记录告警。
    pub fn new(entries: HashMap<String, String>) -> Self {
        for (key, value) in &entries {
            if value.contains("CHANGE-ME") {
                warn!(
                    key = %key,
                    "SECURITY: password is still using placeholder value, configure real passwords in config.yaml"
                );
            }
        }
        Self { entries }
    }

    /// 查找口令，缺失时返回占位值。
    pub fn get(&self, tag_type: &str, role: &str) -> String {
        let key = format!("{tag_type}.{role}");
        self.entries
            .get(&key)
            .cloned()
            .unwrap_or_else(|| placeholder(role))
    }
}

/// 角色对应的占位口令。
pub fn placeholder(role: &str) -> String {
    format!("CHANGE-ME-IN-YAML-{}", role.to_uppercase())
}

/// SHA-512(EPC 前 12 字节 ‖ 密钥) 的前 4 字节。
pub(crate) fn gen2_password(epc_prefix: &[u8], secret_key: &str) -> [u8; 4] {
    let mut hasher = Sha512::new();
    hasher.update(epc_prefix);
    hasher.update(secret_key.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

/// SHA-1(EPC 大写十六进制 ASCII ‖ 密钥)，取第 0、2、3、6 字节。
pub(crate) fn br_password(epc: &[u8], secret_key: &str) -> [u8; 4] {
    let mut hasher = Sha1::new();
    hasher.update(hex::encode_upper(epc).as_bytes());
    hasher.update(secret_key.as_bytes());
    let digest = hasher.finalize();
    [digest[0], digest[2], digest[3], digest[6]]
}
