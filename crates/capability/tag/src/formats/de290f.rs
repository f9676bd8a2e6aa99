//! DE290F 格式（馆际互借）。
//!
//! 与 DE290 共享防盗位与口令派生（含口令键），差异在媒体号区：
//! 字节 4 为判别字节，字节 5..12 为载荷。

use super::TagData;
use super::de290::{De290Tag, parse_numeric_media_id};
use crate::code40;
use crate::error::TagError;

const ID_TYPE_NUMERIC: u8 = 0x01;
const ID_TYPE_AT_PREFIX: u8 = 0x02;
const ID_TYPE_HBZU_PREFIX: u8 = 0x03;
const ID_TYPE_URN_CODE40: u8 = 0x04;

const MAX_HBZU_NUMBER: u64 = 9_999_999;
const HBZU_NUMBER_LENGTH: usize = 7;
const HBZU_PREFIX: &str = "49HBZUBD";
const URN_CODE40_LENGTH: usize = 8;

/// DE290F 格式标签。
#[derive(Debug, Clone)]
pub struct De290FTag {
    inner: De290Tag,
}

impl De290FTag {
    pub const DE290F_HEADER: [u8; 4] = [0x19, 0xE9, 0xF8, 0x77];

    pub fn from_parts(
        pc: Option<[u8; 2]>,
        epc: Vec<u8>,
        access_key: String,
        kill_key: String,
    ) -> Self {
        Self {
            inner: De290Tag::from_parts(pc, epc, access_key, kill_key),
        }
    }

    pub(crate) fn data(&self) -> &TagData {
        self.inner.data()
    }

    pub(crate) fn data_mut(&mut self) -> &mut TagData {
        self.inner.data_mut()
    }

    /// 按判别字节解码媒体号。
    pub fn media_id(&self) -> Result<String, TagError> {
        let epc = &self.data().epc;
        if epc.len() < 12 {
            return Err(TagError::InvalidTagData(format!(
                "EPC too short for DE290F format: expected at least 12 bytes, got {}",
                epc.len()
            )));
        }

        let id_type = epc[4];
        let payload = &epc[5..12];

        match id_type {
            ID_TYPE_NUMERIC => Ok(payload_to_u64(payload).to_string()),
            ID_TYPE_AT_PREFIX => Ok(format!("@{}", payload_to_u64(payload))),
            ID_TYPE_HBZU_PREFIX => {
                let number = payload_to_u64(payload);
                if number > MAX_HBZU_NUMBER {
                    return Err(TagError::InvalidTagData(format!(
                        "DE290F HBZU number too large: {number} exceeds maximum {MAX_HBZU_NUMBER}"
                    )));
                }
                Ok(format!("{HBZU_PREFIX}{number:07}"))
            }
            // 载荷首字节（字节 5）不参与 Code40 编码，保持原始布局。
            ID_TYPE_URN_CODE40 => Ok(code40::decode(&epc[6..12])?.trim().to_string()),
            other => Err(TagError::InvalidTagData(format!(
                "Unknown DE290F ID type: 0x{other:02X} (expected 0x01-0x04)"
            ))),
        }
    }

    /// 按输入形态选择判别类型并重建 EPC。
    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        if media_id.trim().is_empty() {
            return Err(TagError::InvalidMediaId(
                "Media ID cannot be empty".to_string(),
            ));
        }

        let mut id_bytes = [0u8; 7];
        let id_type = if media_id.len() == URN_CODE40_LENGTH && is_code40_compatible(media_id) {
            let encoded = code40::encode(media_id)?;
            id_bytes[1..1 + encoded.len()].copy_from_slice(&encoded);
            ID_TYPE_URN_CODE40
        } else if media_id.starts_with(HBZU_PREFIX)
            && media_id.len() == HBZU_PREFIX.len() + HBZU_NUMBER_LENGTH
        {
            encode_numeric_id(&media_id[HBZU_PREFIX.len()..], &mut id_bytes)?;
            ID_TYPE_HBZU_PREFIX
        } else if let Some(numeric) = media_id.strip_prefix('@') {
            encode_numeric_id(numeric, &mut id_bytes)?;
            ID_TYPE_AT_PREFIX
        } else {
            encode_numeric_id(media_id, &mut id_bytes)?;
            ID_TYPE_NUMERIC
        };

        let mut new_epc = vec![0u8; 16];
        new_epc[..4].copy_from_slice(&Self::DE290F_HEADER);
        new_epc[4] = id_type;
        new_epc[5..12].copy_from_slice(&id_bytes);
        // 字节 12..15 保持为零。

        let data = self.data_mut();
        crate::bytes::update_pc_len(&mut data.pc, new_epc.len());
        data.epc = new_epc;
        Ok(())
    }

    pub fn is_secured(&self) -> bool {
        self.inner.is_secured()
    }

    pub fn set_secured(&mut self, secured: bool) {
        self.inner.set_secured(secured);
    }

    pub fn access_password(&self) -> [u8; 4] {
        self.inner.access_password()
    }

    pub fn kill_password(&self) -> [u8; 4] {
        self.inner.kill_password()
    }

    pub fn dynamic_blocks(&self) -> Vec<u8> {
        self.inner.dynamic_blocks()
    }

    /// 接受 set_media_id 支持的全部四种形态。
    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        if media_id.trim().is_empty() {
            return Err(TagError::InvalidMediaId(
                "Media ID cannot be empty".to_string(),
            ));
        }

        if media_id.len() == URN_CODE40_LENGTH && is_code40_compatible(media_id) {
            return Ok(());
        }
        if media_id.starts_with(HBZU_PREFIX) {
            if media_id.len() != HBZU_PREFIX.len() + HBZU_NUMBER_LENGTH {
                return Err(TagError::InvalidMediaId(format!(
                    "DE290F HBZU media ID requires {HBZU_NUMBER_LENGTH} digits after {HBZU_PREFIX} (got: '{media_id}')"
                )));
            }
            let number =
                parse_numeric_media_id("DE290F", &media_id[HBZU_PREFIX.len()..])?;
            if number > MAX_HBZU_NUMBER {
                return Err(TagError::InvalidMediaId(format!(
                    "DE290F HBZU number too large: {number} exceeds maximum {MAX_HBZU_NUMBER}"
                )));
            }
            return Ok(());
        }
        let numeric = media_id.strip_prefix('@').unwrap_or(media_id);
        let value = parse_numeric_media_id("DE290F", numeric)?;
        if value.to_be_bytes()[0] != 0x00 {
            return Err(TagError::InvalidMediaId(
                "Media ID too large for DE290F format".to_string(),
            ));
        }
        Ok(())
    }
}

fn payload_to_u64(payload: &[u8]) -> u64 {
    let mut padded = [0u8; 8];
    padded[8 - payload.len()..].copy_from_slice(payload);
    u64::from_be_bytes(padded)
}

/// 数字媒体号编码到 7 字节，溢出（最高字节非零）拒绝。
fn encode_numeric_id(numeric: &str, target: &mut [u8; 7]) -> Result<(), TagError> {
    let media_id = numeric.parse::<u64>().map_err(|_| {
        TagError::InvalidMediaId(format!("Invalid numeric media ID: {numeric}"))
    })?;
    let bytes = media_id.to_be_bytes();
    if bytes[0] != 0x00 {
        return Err(TagError::InvalidMediaId(
            "Media ID too large for DE290F format".to_string(),
        ));
    }
    target.copy_from_slice(&bytes[1..]);
    Ok(())
}

fn is_code40_compatible(media_id: &str) -> bool {
    media_id
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> De290FTag {
        De290FTag::from_parts(None, vec![0u8; 16], "a".to_string(), "k".to_string())
    }

    #[test]
    fn numeric_round_trip() {
        for media_id in ["0", "1", "6600", "72057594037927935"] {
            let mut tag = blank();
            tag.set_media_id(media_id).expect("set");
            assert_eq!(tag.data().epc[4], ID_TYPE_NUMERIC);
            assert_eq!(tag.media_id().expect("get"), *media_id);
        }
    }

    #[test]
    fn at_prefix_round_trip() {
        let mut tag = blank();
        tag.set_media_id("@4711").expect("set");
        assert_eq!(tag.data().epc[4], ID_TYPE_AT_PREFIX);
        assert_eq!(tag.media_id().expect("get"), "@4711");
    }

    #[test]
    fn hbzu_round_trip_zero_pads_to_seven_digits() {
        let mut tag = blank();
        tag.set_media_id("49HBZUBD0000042").expect("set");
        assert_eq!(tag.data().epc[4], ID_TYPE_HBZU_PREFIX);
        assert_eq!(tag.media_id().expect("get"), "49HBZUBD0000042");
    }

    #[test]
    fn code40_round_trip_skips_marker_byte() {
        let mut tag = blank();
        tag.set_media_id("C1DE0042").expect("set");
        let epc = tag.data().epc.clone();
        assert_eq!(epc[4], ID_TYPE_URN_CODE40);
        assert_eq!(epc[5], 0x00);
        assert_eq!(tag.media_id().expect("get"), "C1DE0042");
    }

    #[test]
    fn numeric_overflow_is_rejected() {
        let mut tag = blank();
        // 2^56 的最高字节非零，超出 7 字节载荷。
        let err = tag.set_media_id("72057594037927936").expect_err("overflow");
        assert!(matches!(err, TagError::InvalidMediaId(_)));
        assert!(tag.validate_media_id("72057594037927936").is_err());
    }

    #[test]
    fn code40_type_requires_exactly_eight_chars() {
        let mut tag = blank();
        // 9 个 Code40 字符不满足长度 8，回落到数字解析并失败。
        assert!(tag.set_media_id("ABCDEFGHI").is_err());
        tag.set_media_id("AB-C.12:").expect("set");
        assert_eq!(tag.data().epc[4], ID_TYPE_URN_CODE40);
    }

    #[test]
    fn hbzu_requires_exactly_seven_digits() {
        let tag = blank();
        assert!(tag.validate_media_id("49HBZUBD9999999").is_ok());
        assert!(tag.validate_media_id("49HBZUBD10000000").is_err());
        assert!(tag.validate_media_id("49HBZUBD042").is_err());
    }

    #[test]
    fn oversized_hbzu_payload_is_invalid_on_decode() {
        let mut epc = vec![0u8; 16];
        epc[..4].copy_from_slice(&De290FTag::DE290F_HEADER);
        epc[4] = ID_TYPE_HBZU_PREFIX;
        epc[5..12].copy_from_slice(&(MAX_HBZU_NUMBER + 1).to_be_bytes()[1..]);
        let tag = De290FTag::from_parts(None, epc, "a".to_string(), "k".to_string());
        assert!(matches!(tag.media_id(), Err(TagError::InvalidTagData(_))));
    }

    #[test]
    fn unknown_id_type_is_invalid_format() {
        let mut epc = vec![0u8; 16];
        epc[..4].copy_from_slice(&De290FTag::DE290F_HEADER);
        epc[4] = 0x05;
        let tag = De290FTag::from_parts(None, epc, "a".to_string(), "k".to_string());
        assert!(matches!(tag.media_id(), Err(TagError::InvalidTagData(_))));
    }

    #[test]
    fn security_bit_and_passwords_follow_de290() {
        let mut tag = blank();
        tag.set_media_id("6600").expect("set");
        assert!(!tag.is_secured());
        tag.set_secured(true);
        assert!(tag.is_secured());
        assert_eq!(tag.dynamic_blocks(), vec![0x00, 0x01]);
        assert_eq!(tag.access_password().len(), 4);
    }

    #[test]
    fn set_media_id_resets_trailer_bytes() {
        let mut tag = blank();
        tag.set_secured(true);
        tag.set_media_id("123").expect("set");
        // 重建 EPC 后尾部字节全部归零，防盗位随之清除。
        assert!(!tag.is_secured());
        assert_eq!(&tag.data().epc[12..], &[0, 0, 0, 0]);
    }
}
