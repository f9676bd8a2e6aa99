//! BR 格式（Smartfreq，历史库存）。
//!
//! 变长 EPC：字节 0 为 0x41 标记，字节 1 为载荷字节数，之后是 6 位
//! ASCII 打包的媒体号，整体补齐到偶数长度。防盗状态不在 EPC 中，
//! 而是编码在 PC 字节 1（0x07 已布防 / 0xC2 未布防），PC 字节 0 的
//! 最低位标记非 GS1 应用。

use super::TagData;
use crate::error::TagError;
use crate::passwords;
use crate::sixbit;

const SECURED_BITS: u8 = 0x07;
const UNSECURED_BITS: u8 = 0xC2;

/// BR 格式标签。
#[derive(Debug, Clone)]
pub struct BrTag {
    data: TagData,
    secret_key: String,
}

impl BrTag {
    pub const BR_HEADER: u8 = 0x41;

    pub fn from_parts(pc: Option<[u8; 2]>, epc: Vec<u8>, secret_key: String) -> Self {
        Self {
            data: TagData::new(pc, epc),
            secret_key,
        }
    }

    pub(crate) fn data(&self) -> &TagData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    pub fn media_id(&self) -> String {
        let epc = &self.data.epc;
        if epc.len() < 2 {
            return String::new();
        }
        let payload_len = epc[1] as usize;
        if epc.len() < 2 + payload_len {
            return String::new();
        }
        sixbit::decode(&epc[2..2 + payload_len])
    }

    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        let encoded = sixbit::encode(media_id)?;

        // EPC 整体补齐到偶数字节（块大小为一个 16 位字）。
        let mut result = vec![0u8; encoded.len() + 2 + (encoded.len() % 2)];
        result[0] = Self::BR_HEADER;
        result[1] = encoded.len() as u8;
        result[2..2 + encoded.len()].copy_from_slice(&encoded);

        crate::bytes::update_pc_len(&mut self.data.pc, result.len());
        self.data.epc = result;
        Ok(())
    }

    /// PC 字节 1 等于已布防标记时为布防状态；其余值一律视为未布防。
    pub fn is_secured(&self) -> bool {
        self.data.pc[1] == SECURED_BITS
    }

    pub fn set_secured(&mut self, secured: bool) {
        // 置非 GS1 应用标志位。
        self.data.pc[0] |= 0b0000_0001;
        self.data.pc[1] = if secured { SECURED_BITS } else { UNSECURED_BITS };
    }

    /// Smartfreq 标签不使用销毁口令。
    pub fn kill_password(&self) -> [u8; 4] {
        [0; 4]
    }

    pub fn access_password(&self) -> [u8; 4] {
        passwords::br_password(&self.data.epc, &self.secret_key)
    }

    /// 防盗状态在 PC 中，动态片段即整个 PC（EPC 区字 1）。
    pub fn dynamic_blocks(&self) -> Vec<u8> {
        self.data.pc.to_vec()
    }

    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        if media_id.trim().is_empty() {
            return Err(TagError::InvalidMediaId(
                "Media ID cannot be empty".to_string(),
            ));
        }
        if !media_id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ')
        {
            return Err(TagError::InvalidMediaId(format!(
                "BRTag (Smartfreq BR) format requires uppercase alphanumeric media ID with optional spaces (got: '{media_id}')"
            )));
        }
        Ok(())
    }

    /// BR 结构检查：头部标记 + 长度方程 `len == 2 + n + (n % 2)`。
    pub fn is_br_tag(epc: &[u8]) -> bool {
        if epc.len() < 2 || epc[0] != Self::BR_HEADER {
            return false;
        }
        let payload_len = epc[1] as usize;
        if payload_len == 0 {
            return false;
        }
        epc.len() == 2 + payload_len + (payload_len % 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(media_id: &str) -> BrTag {
        let mut tag = BrTag::from_parts(None, vec![BrTag::BR_HEADER, 0], "key".to_string());
        tag.set_media_id(media_id).expect("set media id");
        tag
    }

    #[test]
    fn media_id_round_trips_with_even_epc() {
        for media_id in ["A", "BR", "BOOK 42", "0123456789"] {
            let tag = sample(media_id);
            assert_eq!(tag.media_id(), *media_id, "media_id={media_id}");
            assert_eq!(tag.data().epc.len() % 2, 0, "media_id={media_id}");
            assert!(BrTag::is_br_tag(&tag.data().epc));
        }
    }

    #[test]
    fn structural_check_rejects_wrong_lengths() {
        assert!(!BrTag::is_br_tag(&[0x41]));
        assert!(!BrTag::is_br_tag(&[0x41, 0x00]));
        assert!(!BrTag::is_br_tag(&[0x41, 0x03, 0xAA, 0xBB, 0xCC]));
        assert!(BrTag::is_br_tag(&[0x41, 0x03, 0xAA, 0xBB, 0xCC, 0x00]));
        assert!(!BrTag::is_br_tag(&[0x42, 0x03, 0xAA, 0xBB, 0xCC, 0x00]));
    }

    #[test]
    fn security_markers_flip_pc_bytes() {
        let mut tag = BrTag::from_parts(Some([0xC2, 0x01]), vec![0x41, 0x00], "key".to_string());
        tag.set_secured(true);
        assert_eq!(tag.data().pc, [0xC3, 0x07]);
        assert!(tag.is_secured());

        tag.set_secured(false);
        assert_eq!(tag.data().pc, [0xC3, 0xC2]);
        assert!(!tag.is_secured());
    }

    #[test]
    fn indeterminate_afi_reads_as_unsecured() {
        let tag = BrTag::from_parts(Some([0x18, 0x00]), vec![0x41, 0x00], "key".to_string());
        assert!(!tag.is_secured());
    }

    #[test]
    fn access_password_tracks_epc_and_key() {
        let first = sample("BOOK 42");
        let second = sample("BOOK 42");
        let other = sample("BOOK 43");
        assert_eq!(first.access_password(), second.access_password());
        assert_ne!(first.access_password(), other.access_password());
        assert_eq!(first.kill_password(), [0; 4]);
    }

    #[test]
    fn validation_rejects_lowercase() {
        let tag = sample("OK");
        assert!(tag.validate_media_id("book").is_err());
        assert!(tag.validate_media_id("").is_err());
        assert!(tag.validate_media_id("BOOK 42").is_ok());
    }
}
