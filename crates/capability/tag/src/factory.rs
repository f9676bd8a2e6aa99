//! 标签工厂：按 EPC 头部判别格式。
//!
//! 判别顺序固定：DE386 → DE290F → DE6 → DE290/CD290 → BR 结构检查 →
//! Raw。口令取自注册表；DE290F 复用 DE290 的口令键。

use crate::bytes;
use crate::error::TagError;
use crate::formats::{
    BrTag, De6Tag, De290FTag, De290Tag, De290Variant, De386Tag, RawTag, Tag,
};
use crate::passwords::PasswordRegistry;
use std::sync::Arc;

/// 标签工厂。
#[derive(Clone)]
pub struct TagFactory {
    passwords: Arc<PasswordRegistry>,
}

impl TagFactory {
    pub fn new(passwords: Arc<PasswordRegistry>) -> Self {
        Self { passwords }
    }

    /// 由盘点读到的原始 PC/EPC 构造标签。
    pub fn from_bytes(&self, pc: Option<[u8; 2]>, epc: &[u8]) -> Tag {
        if epc.len() < 4 {
            return Tag::Raw(RawTag::from_parts(pc, epc.to_vec()));
        }

        let header = [epc[0], epc[1], epc[2], epc[3]];

        if header == De386Tag::DE386_HEADER {
            return Tag::De386(De386Tag::from_parts(
                pc,
                epc.to_vec(),
                self.passwords.get("DE386Tag", "access"),
                self.passwords.get("DE386Tag", "kill"),
            ));
        }

        if header == De290FTag::DE290F_HEADER {
            // DE290F 复用 DE290 的口令配置。
            return Tag::De290F(De290FTag::from_parts(
                pc,
                epc.to_vec(),
                self.passwords.get("DE290Tag", "access"),
                self.passwords.get("DE290Tag", "kill"),
            ));
        }

        if header == De6Tag::DE6_HEADER {
            return Tag::De6(De6Tag::from_parts(
                pc,
                epc.to_vec(),
                self.passwords.get("DE6Tag", "access"),
                self.passwords.get("DE6Tag", "kill"),
            ));
        }

        if header == De290Tag::DE290_HEADER || header == De290Tag::CD290_HEADER {
            return Tag::De290(De290Tag::from_parts(
                pc,
                epc.to_vec(),
                self.passwords.get("DE290Tag", "access"),
                self.passwords.get("DE290Tag", "kill"),
            ));
        }

        if epc[0] == BrTag::BR_HEADER && BrTag::is_br_tag(epc) {
            return Tag::Br(BrTag::from_parts(
                pc,
                epc.to_vec(),
                self.passwords.get("BRTag", "secret"),
            ));
        }

        Tag::Raw(RawTag::from_parts(pc, epc.to_vec()))
    }

    /// 由 EPC 十六进制字符串构造标签，PC 按长度字段合成。
    pub fn from_hex(&self, epc_hex: &str) -> Result<Tag, TagError> {
        let normalized: String = epc_hex
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if normalized.is_empty() {
            return Err(TagError::InvalidEpcHex(
                "EPC hex string cannot be empty".to_string(),
            ));
        }
        if !normalized.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)) {
            return Err(TagError::InvalidEpcHex(
                "EPC must be valid hexadecimal string".to_string(),
            ));
        }
        if normalized.len() % 2 != 0 {
            return Err(TagError::InvalidEpcHex(
                "EPC hex string must have even length".to_string(),
            ));
        }

        let epc = hex::decode(&normalized)
            .map_err(|_| TagError::InvalidEpcHex("EPC must be valid hexadecimal string".to_string()))?;
        let pc = bytes::pc_for_epc_len(epc.len());
        Ok(self.from_bytes(Some(pc), &epc))
    }

    /// 为初始化构造带媒体号的新标签。
    pub fn for_initialization(
        &self,
        format: &str,
        media_id: &str,
        secured: bool,
    ) -> Result<Tag, TagError> {
        match format.to_uppercase().as_str() {
            "DE290" => Ok(Tag::De290(De290Tag::from_media_id(
                parse_de290_media_id("DE290", media_id)?,
                secured,
                De290Variant::De290,
                self.passwords.get("DE290Tag", "access"),
                self.passwords.get("DE290Tag", "kill"),
            ))),
            "CD290" => Ok(Tag::De290(De290Tag::from_media_id(
                parse_de290_media_id("CD290", media_id)?,
                secured,
                De290Variant::Cd290,
                self.passwords.get("DE290Tag", "access"),
                self.passwords.get("DE290Tag", "kill"),
            ))),
            "DE6" => Ok(Tag::De6(De6Tag::from_media_id(
                media_id,
                secured,
                self.passwords.get("DE6Tag", "access"),
                self.passwords.get("DE6Tag", "kill"),
            )?)),
            "DE290F" => {
                let mut tag = De290FTag::from_parts(
                    None,
                    vec![0u8; 16],
                    self.passwords.get("DE290Tag", "access"),
                    self.passwords.get("DE290Tag", "kill"),
                );
                tag.set_media_id(media_id)?;
                tag.set_secured(secured);
                Ok(Tag::De290F(tag))
            }
            "DE386" => Ok(Tag::De386(De386Tag::from_media_id(
                media_id,
                0x00,
                secured,
                self.passwords.get("DE386Tag", "access"),
                self.passwords.get("DE386Tag", "kill"),
            )?)),
            _ => Err(TagError::UnsupportedFormat(format.to_string())),
        }
    }
}

fn parse_de290_media_id(variant: &str, media_id: &str) -> Result<u64, TagError> {
    media_id.parse::<u64>().map_err(|_| {
        TagError::InvalidMediaId(format!(
            "{variant} format requires numeric media ID (got: '{media_id}')"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn factory() -> TagFactory {
        TagFactory::new(Arc::new(PasswordRegistry::new(HashMap::new())))
    }

    #[test]
    fn headers_discriminate_formats() {
        let cases: [(&[u8; 4], &str); 5] = [
            (&De386Tag::DE386_HEADER, "DE386Tag"),
            (&De290FTag::DE290F_HEADER, "DE290FTag"),
            (&De6Tag::DE6_HEADER, "DE6Tag"),
            (&De290Tag::DE290_HEADER, "DE290Tag"),
            (&De290Tag::CD290_HEADER, "DE290Tag"),
        ];
        for (header, expected) in cases {
            let mut epc = vec![0u8; 16];
            epc[..4].copy_from_slice(header);
            epc[4..].copy_from_slice(&[0x5A; 12]);
            let tag = factory().from_bytes(None, &epc);
            assert_eq!(tag.tag_type(), expected);
        }
    }

    #[test]
    fn perturbed_header_falls_back_to_raw() {
        let mut epc = vec![0u8; 16];
        epc[..4].copy_from_slice(&De290Tag::DE290_HEADER);
        epc[2] ^= 0x01;
        let tag = factory().from_bytes(None, &epc);
        assert_eq!(tag.tag_type(), "RawTag");
    }

    #[test]
    fn br_detection_requires_structural_length() {
        let valid = [0x41u8, 0x03, 0xAA, 0xBB, 0xCC, 0x00];
        assert_eq!(factory().from_bytes(None, &valid).tag_type(), "BRTag");

        // 长度方程不成立时退回 Raw。
        let invalid = [0x41u8, 0x03, 0xAA, 0xBB, 0xCC, 0x00, 0x00, 0x00];
        assert_eq!(factory().from_bytes(None, &invalid).tag_type(), "RawTag");
    }

    #[test]
    fn short_epc_is_raw() {
        assert_eq!(factory().from_bytes(None, &[0x19, 0xE9]).tag_type(), "RawTag");
        assert_eq!(factory().from_bytes(None, &[]).tag_type(), "RawTag");
    }

    #[test]
    fn from_hex_normalizes_and_validates() {
        let tag = factory()
            .from_hex(" 19e9 f871 0000 0000 0000 19c8 0000 0001 ")
            .expect("valid hex");
        assert_eq!(tag.tag_type(), "DE290Tag");
        assert_eq!(tag.media_id().expect("media id"), "6600");
        assert_eq!(tag.pc(), [0x40, 0x00]);

        assert!(matches!(
            factory().from_hex("XYZ1"),
            Err(TagError::InvalidEpcHex(_))
        ));
        assert!(matches!(
            factory().from_hex("ABC"),
            Err(TagError::InvalidEpcHex(_))
        ));
        assert!(matches!(
            factory().from_hex("  "),
            Err(TagError::InvalidEpcHex(_))
        ));
    }

    #[test]
    fn initialization_supports_writable_formats_only() {
        let factory = factory();
        for format in ["DE290", "CD290", "DE6", "DE290F", "DE386"] {
            let media_id = if format == "DE386" { "AB123" } else { "4711" };
            let tag = factory
                .for_initialization(format, media_id, true)
                .unwrap_or_else(|e| panic!("format {format}: {e}"));
            assert!(tag.is_secured(), "format {format}");
            assert_eq!(tag.media_id().expect("media id"), media_id);
        }

        assert!(matches!(
            factory.for_initialization("BR", "BOOK", true),
            Err(TagError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            factory.for_initialization("DE999", "1", true),
            Err(TagError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn lowercase_format_names_are_accepted() {
        let tag = factory()
            .for_initialization("de290", "42", false)
            .expect("lowercase format");
        assert_eq!(tag.tag_type(), "DE290Tag");
        assert!(!tag.is_secured());
    }
}
