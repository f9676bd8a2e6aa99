//! DE6 格式（外部机构）。
//!
//! 布局与 DE290 相同（8 字节大端媒体号，防盗位在末字节），但头部为
//! ISIL DE-6，且 PC 固定写为 0x4400。

use super::TagData;
use super::de290::parse_numeric_media_id;
use crate::error::TagError;
use crate::passwords;

/// DE6 格式标签。
#[derive(Debug, Clone)]
pub struct De6Tag {
    data: TagData,
    access_key: String,
    kill_key: String,
}

impl De6Tag {
    pub const DE6_HEADER: [u8; 4] = [0x19, 0xED, 0x00, 0x01];
    pub const EPC_LENGTH: usize = 16;

    /// DE6 的 PC 固定值。
    pub const PC_VALUE: [u8; 2] = [0x44, 0x00];

    pub fn from_parts(
        pc: Option<[u8; 2]>,
        epc: Vec<u8>,
        access_key: String,
        kill_key: String,
    ) -> Self {
        Self {
            data: TagData::new(pc, epc),
            access_key,
            kill_key,
        }
    }

    /// 由媒体号构造全新标签。
    pub fn from_media_id(
        media_id: &str,
        secured: bool,
        access_key: String,
        kill_key: String,
    ) -> Result<Self, TagError> {
        let mut tag = Self::from_parts(None, vec![0u8; Self::EPC_LENGTH], access_key, kill_key);
        tag.set_media_id(media_id)?;
        tag.set_secured(secured);
        Ok(tag)
    }

    pub(crate) fn data(&self) -> &TagData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    pub fn media_id(&self) -> String {
        let mut bytes = [0u8; 8];
        for (target, byte) in bytes.iter_mut().zip(self.data.epc.iter().skip(4)) {
            *target = *byte;
        }
        u64::from_be_bytes(bytes).to_string()
    }

    /// 重建 EPC 并固定 PC 为 0x4400；尾部字节清零（防盗位需随后重设）。
    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        let value = parse_numeric_media_id("DE6", media_id)?;
        let mut new_epc = vec![0u8; Self::EPC_LENGTH];
        new_epc[..4].copy_from_slice(&Self::DE6_HEADER);
        new_epc[4..12].copy_from_slice(&value.to_be_bytes());

        self.data.epc = new_epc;
        self.data.pc = Self::PC_VALUE;
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

    pub fn dynamic_blocks(&self) -> Vec<u8> {
        self.data.epc.get(14..16).map(<[u8]>::to_vec).unwrap_or_default()
    }

    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        parse_numeric_media_id("DE6", media_id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_id_round_trips_with_fixed_pc() {
        let tag = De6Tag::from_media_id("123456", true, "a".to_string(), "k".to_string())
            .expect("valid");
        assert_eq!(tag.media_id(), "123456");
        assert!(tag.is_secured());
        assert_eq!(tag.data().pc, [0x44, 0x00]);
        assert_eq!(&tag.data().epc[..4], &De6Tag::DE6_HEADER);
        assert_eq!(crate::bytes::epc_len_from_pc(tag.data().pc), 16);
    }

    #[test]
    fn set_media_id_clears_security_bit() {
        let mut tag = De6Tag::from_media_id("1", true, "a".to_string(), "k".to_string())
            .expect("valid");
        tag.set_media_id("2").expect("set");
        assert!(!tag.is_secured());
    }

    #[test]
    fn non_numeric_is_rejected() {
        let tag = De6Tag::from_media_id("7", false, "a".to_string(), "k".to_string())
            .expect("valid");
        assert!(tag.validate_media_id("DE6-1").is_err());
    }
}
