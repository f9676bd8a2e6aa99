//! DE386 格式。
//!
//! 128 位 EPC：4 字节头部 + 右对齐 ASCII 媒体号（1..=10 字节，左侧以
//! 0x00 或 0x20 填充）+ 2 字节可变区（版本字节 + 防盗位）。
//! 版本字节在媒体号改写时保留。

use super::TagData;
use crate::error::TagError;
use crate::passwords;

/// DE386 格式标签。
#[derive(Debug, Clone)]
pub struct De386Tag {
    data: TagData,
    access_key: String,
    kill_key: String,
}

impl De386Tag {
    pub const DE386_HEADER: [u8; 4] = [0x19, 0xEA, 0xF3, 0x21];
    pub const EPC_LENGTH: usize = 16;

    const HEADER_LENGTH: usize = 4;
    const VARIABLE_LENGTH: usize = 2;
    const MAX_MEDIA_ID_LENGTH: usize = 10;

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
        version: u8,
        secured: bool,
        access_key: String,
        kill_key: String,
    ) -> Result<Self, TagError> {
        validate(media_id)?;
        Ok(Self {
            data: TagData::new(None, Self::build_epc(media_id, version, secured)),
            access_key,
            kill_key,
        })
    }

    pub(crate) fn data(&self) -> &TagData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    /// 从左跳过 0x00/0x20 填充，到可变区之前为媒体号。
    pub fn media_id(&self) -> String {
        let epc = &self.data.epc;
        let media_id_end = Self::EPC_LENGTH.saturating_sub(Self::VARIABLE_LENGTH).min(epc.len());
        let mut media_id_start = Self::HEADER_LENGTH.min(media_id_end);
        while media_id_start < media_id_end
            && matches!(epc[media_id_start], 0x00 | 0x20)
        {
            media_id_start += 1;
        }
        String::from_utf8_lossy(&epc[media_id_start..media_id_end]).into_owned()
    }

    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        validate(media_id)?;
        let new_epc = Self::build_epc(media_id, self.version(), self.is_secured());
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

    /// 可变区的版本字节（用户可见，媒体号改写时保留）。
    pub fn version(&self) -> u8 {
        self.data.epc.get(14).copied().unwrap_or(0)
    }

    pub fn set_version(&mut self, version: u8) {
        if let Some(byte) = self.data.epc.get_mut(14) {
            *byte = version;
        }
    }

    pub fn access_password(&self) -> [u8; 4] {
        passwords::gen2_password(&self.data.epc_prefix_96(), &self.access_key)
    }

    pub fn kill_password(&self) -> [u8; 4] {
        passwords::gen2_password(&self.data.epc_prefix_96(), &self.kill_key)
    }

    /// 可变区（字节 14..16）。
    pub fn dynamic_blocks(&self) -> Vec<u8> {
        self.data.epc.get(14..16).map(<[u8]>::to_vec).unwrap_or_default()
    }

    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        validate(media_id)
    }

    fn build_epc(media_id: &str, version: u8, secured: bool) -> Vec<u8> {
        let mut epc = vec![0u8; Self::EPC_LENGTH];
        epc[..Self::HEADER_LENGTH].copy_from_slice(&Self::DE386_HEADER);

        let media_id_bytes = media_id.as_bytes();
        let media_id_start = Self::EPC_LENGTH - Self::VARIABLE_LENGTH - media_id_bytes.len();
        epc[media_id_start..media_id_start + media_id_bytes.len()].copy_from_slice(media_id_bytes);

        epc[14] = version;
        epc[15] = u8::from(secured);
        epc
    }
}

fn validate(media_id: &str) -> Result<(), TagError> {
    if media_id.trim().is_empty() {
        return Err(TagError::InvalidMediaId(
            "Media ID cannot be empty".to_string(),
        ));
    }
    if !media_id.is_ascii() {
        return Err(TagError::InvalidMediaId(
            "DE386 format requires ASCII-only media ID (got non-ASCII characters)".to_string(),
        ));
    }
    if media_id.len() > De386Tag::MAX_MEDIA_ID_LENGTH {
        return Err(TagError::InvalidMediaId(format!(
            "DE386 format media ID too long: maximum {} characters, got {}",
            De386Tag::MAX_MEDIA_ID_LENGTH,
            media_id.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(media_id: &str) -> De386Tag {
        De386Tag::from_media_id(media_id, 0x00, true, "a".to_string(), "k".to_string())
            .expect("valid media id")
    }

    #[test]
    fn ascii_media_ids_round_trip() {
        for media_id in ["X", "42", "AB12345678", "b386-9", "0"] {
            let tag = sample(media_id);
            assert_eq!(tag.media_id(), *media_id, "media_id={media_id}");
            assert_eq!(tag.data().epc.len(), 16);
            assert_eq!(tag.data().pc, [0x40, 0x00]);
        }
    }

    #[test]
    fn media_id_is_right_aligned_before_variable_section() {
        let tag = sample("42");
        let epc = &tag.data().epc;
        assert_eq!(&epc[..4], &De386Tag::DE386_HEADER);
        assert_eq!(&epc[12..14], b"42");
        assert_eq!(&epc[4..12], &[0u8; 8]);
    }

    #[test]
    fn space_padding_is_skipped_on_decode() {
        let mut epc = vec![0u8; 16];
        epc[..4].copy_from_slice(&De386Tag::DE386_HEADER);
        epc[4..9].fill(0x20);
        epc[9..14].copy_from_slice(b"BOOKS");
        let tag = De386Tag::from_parts(None, epc, "a".to_string(), "k".to_string());
        assert_eq!(tag.media_id(), "BOOKS");
    }

    #[test]
    fn version_byte_survives_media_id_update() {
        let mut tag = sample("OLD");
        tag.set_version(0x07);
        tag.set_media_id("NEW").expect("set");
        assert_eq!(tag.version(), 0x07);
        assert_eq!(tag.media_id(), "NEW");
        assert!(tag.is_secured());
    }

    #[test]
    fn over_long_media_id_is_rejected() {
        assert!(
            De386Tag::from_media_id("ELEVENCHARS", 0, true, "a".to_string(), "k".to_string())
                .is_err()
        );
        let tag = sample("OK");
        assert!(tag.validate_media_id("ABCDEFGHIJK").is_err());
        assert!(tag.validate_media_id("Ä").is_err());
        assert!(tag.validate_media_id("").is_err());
    }

    #[test]
    fn dynamic_blocks_are_variable_section() {
        let mut tag = sample("X");
        tag.set_version(0x02);
        assert_eq!(tag.dynamic_blocks(), vec![0x02, 0x01]);
    }
}
