//! 标签格式族。
//!
//! 封闭的格式集合，按 EPC 头部字节判别。各格式共享 `TagData`
//! 内部记录（PC 字 + EPC 字节 + 盘点 RSSI 装饰），格式差异只体现在
//! 媒体号编码、防盗位位置与口令派生上。
//!
//! 标签实例在单个请求内可变，不跨线程共享。

mod br;
mod de6;
mod de290;
mod de290f;
mod de386;
mod raw;

pub use br::BrTag;
pub use de6::De6Tag;
pub use de290::{De290Tag, De290Variant};
pub use de290f::De290FTag;
pub use de386::De386Tag;
pub use raw::RawTag;

use crate::bytes;
use crate::error::TagError;
use serde::Serialize;

/// 单天线 RSSI 测量值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AntennaRssi {
    pub antenna_number: u8,
    pub rssi: i32,
}

/// 所有格式共享的内部状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagData {
    pub(crate) pc: [u8; 2],
    pub(crate) epc: Vec<u8>,
    pub(crate) rssi_values: Vec<AntennaRssi>,
}

impl TagData {
    /// PC 缺省时按 EPC 字节长度合成仅含长度字段的 PC。
    pub(crate) fn new(pc: Option<[u8; 2]>, epc: Vec<u8>) -> Self {
        let pc = pc.unwrap_or_else(|| bytes::pc_for_epc_len(epc.len()));
        Self {
            pc,
            epc,
            rssi_values: Vec::new(),
        }
    }

    /// EPC 前 12 字节（不足补零），作为口令派生盐。
    pub(crate) fn epc_prefix_96(&self) -> [u8; 12] {
        let mut prefix = [0u8; 12];
        for (target, byte) in prefix.iter_mut().zip(self.epc.iter()) {
            *target = *byte;
        }
        prefix
    }
}

/// 标签（按格式判别的联合体）。
#[derive(Debug, Clone)]
pub enum Tag {
    De290(De290Tag),
    De290F(De290FTag),
    De386(De386Tag),
    De6(De6Tag),
    Br(BrTag),
    Raw(RawTag),
}

impl Tag {
    fn data(&self) -> &TagData {
        match self {
            Tag::De290(tag) => tag.data(),
            Tag::De290F(tag) => tag.data(),
            Tag::De386(tag) => tag.data(),
            Tag::De6(tag) => tag.data(),
            Tag::Br(tag) => tag.data(),
            Tag::Raw(tag) => tag.data(),
        }
    }

    fn data_mut(&mut self) -> &mut TagData {
        match self {
            Tag::De290(tag) => tag.data_mut(),
            Tag::De290F(tag) => tag.data_mut(),
            Tag::De386(tag) => tag.data_mut(),
            Tag::De6(tag) => tag.data_mut(),
            Tag::Br(tag) => tag.data_mut(),
            Tag::Raw(tag) => tag.data_mut(),
        }
    }

    /// 解码媒体号。
    pub fn media_id(&self) -> Result<String, TagError> {
        match self {
            Tag::De290(tag) => Ok(tag.media_id()),
            Tag::De290F(tag) => tag.media_id(),
            Tag::De386(tag) => Ok(tag.media_id()),
            Tag::De6(tag) => Ok(tag.media_id()),
            Tag::Br(tag) => Ok(tag.media_id()),
            Tag::Raw(tag) => Ok(tag.media_id()),
        }
    }

    /// 改写媒体号，同时保持 PC 长度字段一致。
    pub fn set_media_id(&mut self, media_id: &str) -> Result<(), TagError> {
        match self {
            Tag::De290(tag) => tag.set_media_id(media_id),
            Tag::De290F(tag) => tag.set_media_id(media_id),
            Tag::De386(tag) => tag.set_media_id(media_id),
            Tag::De6(tag) => tag.set_media_id(media_id),
            Tag::Br(tag) => tag.set_media_id(media_id),
            Tag::Raw(tag) => tag.set_media_id(media_id),
        }
    }

    /// 校验媒体号是否符合该格式，任何改写前都先走这里。
    pub fn validate_media_id(&self, media_id: &str) -> Result<(), TagError> {
        match self {
            Tag::De290(tag) => tag.validate_media_id(media_id),
            Tag::De290F(tag) => tag.validate_media_id(media_id),
            Tag::De386(tag) => tag.validate_media_id(media_id),
            Tag::De6(tag) => tag.validate_media_id(media_id),
            Tag::Br(tag) => tag.validate_media_id(media_id),
            Tag::Raw(tag) => tag.validate_media_id(media_id),
        }
    }

    /// 防盗位状态。
    pub fn is_secured(&self) -> bool {
        match self {
            Tag::De290(tag) => tag.is_secured(),
            Tag::De290F(tag) => tag.is_secured(),
            Tag::De386(tag) => tag.is_secured(),
            Tag::De6(tag) => tag.is_secured(),
            Tag::Br(tag) => tag.is_secured(),
            Tag::Raw(_) => false,
        }
    }

    /// 写入防盗位状态。
    pub fn set_secured(&mut self, secured: bool) {
        match self {
            Tag::De290(tag) => tag.set_secured(secured),
            Tag::De290F(tag) => tag.set_secured(secured),
            Tag::De386(tag) => tag.set_secured(secured),
            Tag::De6(tag) => tag.set_secured(secured),
            Tag::Br(tag) => tag.set_secured(secured),
            Tag::Raw(_) => {}
        }
    }

    /// 访问口令（由当前 EPC 派生）。
    pub fn access_password(&self) -> [u8; 4] {
        match self {
            Tag::De290(tag) => tag.access_password(),
            Tag::De290F(tag) => tag.access_password(),
            Tag::De386(tag) => tag.access_password(),
            Tag::De6(tag) => tag.access_password(),
            Tag::Br(tag) => tag.access_password(),
            Tag::Raw(_) => [0; 4],
        }
    }

    /// 销毁口令（由当前 EPC 派生）。
    pub fn kill_password(&self) -> [u8; 4] {
        match self {
            Tag::De290(tag) => tag.kill_password(),
            Tag::De290F(tag) => tag.kill_password(),
            Tag::De386(tag) => tag.kill_password(),
            Tag::De6(tag) => tag.kill_password(),
            Tag::Br(tag) => tag.kill_password(),
            Tag::Raw(_) => [0; 4],
        }
    }

    /// 仅随防盗位变化的最小连续片段。
    pub fn dynamic_blocks(&self) -> Vec<u8> {
        match self {
            Tag::De290(tag) => tag.dynamic_blocks(),
            Tag::De290F(tag) => tag.dynamic_blocks(),
            Tag::De386(tag) => tag.dynamic_blocks(),
            Tag::De6(tag) => tag.dynamic_blocks(),
            Tag::Br(tag) => tag.dynamic_blocks(),
            Tag::Raw(_) => Vec::new(),
        }
    }

    /// 动态片段在 EPC 存储区中的起始字地址。
    pub fn dynamic_blocks_start_word(&self) -> u16 {
        match self {
            Tag::De290(_) | Tag::De290F(_) | Tag::De386(_) | Tag::De6(_) => 9,
            Tag::Br(_) => 1,
            Tag::Raw(_) => 0,
        }
    }

    /// 格式名（与口令键、响应中的 tagType 一致）。
    pub fn tag_type(&self) -> &'static str {
        match self {
            Tag::De290(_) => "DE290Tag",
            Tag::De290F(_) => "DE290FTag",
            Tag::De386(_) => "DE386Tag",
            Tag::De6(_) => "DE6Tag",
            Tag::Br(_) => "BRTag",
            Tag::Raw(_) => "RawTag",
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Tag::Raw(_))
    }

    pub fn pc(&self) -> [u8; 2] {
        self.data().pc
    }

    pub fn epc(&self) -> &[u8] {
        &self.data().epc
    }

    pub fn pc_hex(&self) -> String {
        bytes::to_hex_upper(&self.data().pc)
    }

    pub fn epc_hex(&self) -> String {
        bytes::to_hex_upper(&self.data().epc)
    }

    pub fn rssi_values(&self) -> &[AntennaRssi] {
        &self.data().rssi_values
    }

    pub fn set_rssi_values(&mut self, rssi_values: Vec<AntennaRssi>) {
        self.data_mut().rssi_values = rssi_values;
    }

    /// PC 长度字段指示的 EPC 字节长度。
    pub fn epc_len_from_pc(&self) -> usize {
        bytes::epc_len_from_pc(self.data().pc)
    }

    /// 实际 EPC 长度与 PC 长度字段是否一致。
    pub fn is_epc_length_valid(&self) -> bool {
        self.data().epc.len() == self.epc_len_from_pc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pc_length_coherence_for_constructed_tags() {
        let de290 = Tag::De290(De290Tag::from_media_id(
            22062,
            true,
            De290Variant::De290,
            "a".into(),
            "k".into(),
        ));
        assert!(de290.is_epc_length_valid());
        assert_eq!(de290.epc_len_from_pc(), 16);

        let mut br = Tag::Br(BrTag::from_parts(None, vec![0x41, 0x00], "s".into()));
        br.set_media_id("BR001").expect("set media id");
        assert!(br.is_epc_length_valid());
        assert_eq!(br.epc().len() % 2, 0);
    }

    #[test]
    fn raw_tags_have_no_security_or_passwords() {
        let mut raw = Tag::Raw(RawTag::from_parts(None, vec![0xAA, 0xBB]));
        assert!(!raw.is_secured());
        raw.set_secured(true);
        assert!(!raw.is_secured());
        assert_eq!(raw.access_password(), [0; 4]);
        assert_eq!(raw.dynamic_blocks(), Vec::<u8>::new());
    }
}
