//! 未识别格式的透传标签。

use super::TagData;
use crate::bytes;
use crate::error::TagError;

/// 未识别格式标签，媒体号即完整 EPC 的大写十六进制。
#[derive(Debug, Clone)]
pub struct RawTag {
    data: TagData,
}

impl RawTag {
    pub fn from_parts(pc: Option<[u8; 2]>, epc: Vec<u8>) -> Self {
        Self {
            data: TagData::new(pc, epc),
        }
    }

    pub(crate) fn data(&self) -> &TagData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    pub fn media_id(&self) -> String {
        bytes::to_hex_upper(&self.data.epc)
    }

    /// 媒体号按十六进制写入 EPC。
    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        if media_id.len() % 2 != 0 {
            return Err(TagError::InvalidMediaId(
                "Media ID must be even-length hex string".to_string(),
            ));
        }
        let new_epc = hex::decode(media_id).map_err(|_| {
            TagError::InvalidMediaId("Media ID must be a valid hex string".to_string())
        })?;
        bytes::update_pc_len(&mut self.data.pc, new_epc.len());
        self.data.epc = new_epc;
        Ok(())
    }

    /// Raw 标签不支持媒体号操作，任何改写请求都在校验阶段拒绝。
    pub fn validate_media_id(&self, _media_id: &str) -> Result<(), TagError> {
        Err(TagError::InvalidMediaId(
            "RawTag (unknown/unformatted tag) does not support media ID operations. Use /initialize endpoint to format the tag first.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_id_is_full_epc_hex() {
        let tag = RawTag::from_parts(None, vec![0x30, 0x34, 0xAB]);
        assert_eq!(tag.media_id(), "3034AB");
    }

    #[test]
    fn validation_always_rejects() {
        let tag = RawTag::from_parts(None, vec![0x01]);
        assert!(tag.validate_media_id("3034").is_err());
    }
}
