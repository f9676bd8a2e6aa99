//! DE290 格式（含 CD290 兼容变体）。
//!
//! 128 位 EPC：4 字节头部 + 8 字节大端媒体号 + 4 字节尾部，
//! 防盗位在末字节最低位。CD290 为早期批次的旧头部，布局相同。

use super::TagData;
use crate::error::TagError;
use crate::passwords;

/// DE290 变体（头部不同，布局一致）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum De290Variant {
    De290,
    Cd290,
}

impl De290Variant {
    pub fn name(&self) -> &'static str {
        match self {
            De290Variant::De290 => "DE290",
            De290Variant::Cd290 => "CD290",
        }
    }

    pub fn header(&self) -> [u8; 4] {
        match self {
            De290Variant::De290 => De290Tag::DE290_HEADER,
            De290Variant::Cd290 => De290Tag::CD290_HEADER,
        }
    }
}

/// DE290 格式标签。
#[derive(Debug, Clone)]
pub struct De290Tag {
    data: TagData,
    variant: De290Variant,
    access_key: String,
    kill_key: String,
}

impl De290Tag {
    pub const DE290_HEADER: [u8; 4] = [0x19, 0xE9, 0xF8, 0x71];
    pub const CD290_HEADER: [u8; 4] = [0x13, 0x81, 0xF8, 0x71];
    pub const EPC_LENGTH: usize = 16;

    const HEADER_LENGTH: usize = 4;
    const MEDIA_ID_LENGTH: usize = 8;

    /// 由既有 PC/EPC 构造，变体按头部自动识别。
    pub fn from_parts(
        pc: Option<[u8; 2]>,
        epc: Vec<u8>,
        access_key: String,
        kill_key: String,
    ) -> Self {
        let variant = Self::detect_variant(&epc);
        Self {
            data: TagData::new(pc, epc),
            variant,
            access_key,
            kill_key,
        }
    }

    /// 由媒体号构造全新标签。
    pub fn from_media_id(
        media_id: u64,
        secured: bool,
        variant: De290Variant,
        access_key: String,
        kill_key: String,
    ) -> Self {
        let epc = Self::build_epc(media_id, secured, variant);
        Self {
            data: TagData::new(None, epc),
            variant,
            access_key,
            kill_key,
        }
    }

    pub(crate) fn data(&self) -> &TagData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    pub fn variant(&self) -> De290Variant {
        self.variant
    }

    pub fn media_id(&self) -> String {
        let mut bytes = [0u8; Self::MEDIA_ID_LENGTH];
        for (target, byte) in bytes
            .iter_mut()
            .zip(self.data.epc.iter().skip(Self::HEADER_LENGTH))
        {
            *target = *byte;
        }
        u64::from_be_bytes(bytes).to_string()
    }

    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        let value = parse_numeric_media_id(self.variant.name(), media_id)?;
        let new_epc = Self::build_epc(value, self.is_secured(), self.variant);
        crate::bytes::update_pc_len(&mut self.data.pc, new_epc.len());
        self.data.epc = new_epc;
        Ok(())
    }

    pub fn is_secured(&self) -> bool {
        self.data.epc.get(15).is_some_and(|byte| byte & 0x01 == 1)
    }

    pub fn set_secured(&mut self, secured: bool) {
        if let Some(byte) = self.data.epc.get_mut(15) {
            *byte = (*byte & 0b1111_1110) | u8::from(secured);
        }
    }

    pub fn access_password(&self) -> [u8; 4] {
        passwords::gen2_password(&self.data.epc_prefix_96(), &self.access_key)
    }

    pub fn kill_password(&self) -> [u8; 4] {
        passwords::gen2_password(&self.data.epc_prefix_96(), &self.kill_key)
    }

    /// 末字（字节 14..16），含防盗位。
    pub fn dynamic_blocks(&self) -> Vec<u8> {
        self.data.epc.get(14..16).map(<[u8]>::to_vec).unwrap_or_default()
    }

    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        parse_numeric_media_id(self.variant.name(), media_id).map(|_| ())
    }

    fn detect_variant(epc: &[u8]) -> De290Variant {
        if epc.len() >= Self::HEADER_LENGTH && epc[..Self::HEADER_LENGTH] == Self::CD290_HEADER {
            De290Variant::Cd290
        } else {
            De290Variant::De290
        }
    }

    fn build_epc(media_id: u64, secured: bool, variant: De290Variant) -> Vec<u8> {
        let mut epc = vec![0u8; Self::EPC_LENGTH];
        epc[..Self::HEADER_LENGTH].copy_from_slice(&variant.header());
        epc[Self::HEADER_LENGTH..Self::HEADER_LENGTH + Self::MEDIA_ID_LENGTH]
            .copy_from_slice(&media_id.to_be_bytes());
        epc[15] = u8::from(secured);
        epc
    }
}

/// 数字媒体号解析，DE290/CD290/DE6 共用。
pub(crate) fn parse_numeric_media_id(format_name: &str, media_id: &str) -> Result<u64, TagError> {
    if media_id.trim().is_empty() {
        return Err(TagError::InvalidMediaId(
            "Media ID cannot be empty".to_string(),
        ));
    }
    media_id.parse::<u64>().map_err(|_| {
        TagError::InvalidMediaId(format!(
            "{format_name} format requires numeric media ID (got: '{media_id}')"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(media_id: u64, secured: bool) -> De290Tag {
        De290Tag::from_media_id(
            media_id,
            secured,
            De290Variant::De290,
            "access-key".to_string(),
            "kill-key".to_string(),
        )
    }

    #[test]
    fn builds_expected_epc_layout() {
        let tag = sample(6600, true);
        let epc = tag.data().epc.clone();
        assert_eq!(epc.len(), 16);
        assert_eq!(&epc[..4], &De290Tag::DE290_HEADER);
        assert_eq!(&epc[4..12], &6600u64.to_be_bytes());
        assert_eq!(epc[15], 0x01);
        assert_eq!(tag.data().pc, [0x40, 0x00]);
    }

    #[test]
    fn media_id_round_trips() {
        for media_id in [0u64, 1, 6600, 22062, u64::from(u32::MAX), 1 << 62] {
            for secured in [false, true] {
                let tag = sample(media_id, secured);
                assert_eq!(tag.media_id(), media_id.to_string());
                assert_eq!(tag.is_secured(), secured);
            }
        }
    }

    #[test]
    fn set_media_id_preserves_security_bit() {
        let mut tag = sample(6600, true);
        tag.set_media_id("22062").expect("set media id");
        assert_eq!(tag.media_id(), "22062");
        assert!(tag.is_secured());
        assert_eq!(&tag.data().epc[4..12], &22062u64.to_be_bytes());
    }

    #[test]
    fn cd290_header_is_detected() {
        let mut epc = vec![0u8; 16];
        epc[..4].copy_from_slice(&De290Tag::CD290_HEADER);
        let tag = De290Tag::from_parts(None, epc, "a".to_string(), "k".to_string());
        assert_eq!(tag.variant(), De290Variant::Cd290);
    }

    #[test]
    fn passwords_depend_on_epc_prefix_and_key() {
        let secured = sample(6600, true);
        let unsecured = sample(6600, false);
        // 防盗位在字节 15，不参与前 12 字节的口令派生。
        assert_eq!(secured.access_password(), unsecured.access_password());
        assert_ne!(secured.access_password(), secured.kill_password());
        assert_ne!(
            sample(6600, true).access_password(),
            sample(6601, true).access_password()
        );
    }

    #[test]
    fn dynamic_blocks_are_last_word() {
        let tag = sample(6600, true);
        assert_eq!(tag.dynamic_blocks(), vec![0x00, 0x01]);
    }

    #[test]
    fn non_numeric_media_id_is_rejected() {
        let tag = sample(1, true);
        assert!(tag.validate_media_id("12A").is_err());
        assert!(tag.validate_media_id("").is_err());
        assert!(tag.validate_media_id("-5").is_err());
    }
}
