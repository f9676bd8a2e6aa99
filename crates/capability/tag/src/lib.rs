//! # 标签编解码能力模块
//!
//! 图书馆 EPC Gen2 标签的二进制布局族，按 EPC 头部字节区分：
//! - **DE290 / CD290**：8 字节大端媒体号 + 末字节防盗位
//! - **DE290F**：带判别字节的联合编码（数字 / @ 前缀 / HBZU 前缀 / URN Code40）
//! - **DE386**：右对齐 ASCII 媒体号 + 版本字节 + 防盗位
//! - **DE6**：外部机构格式，PC 固定 0x4400
//! - **BR**：变长 EPC，6 位 ASCII 载荷，防盗状态编码在 PC 中
//! - **Raw**：未识别格式，仅透传
//!
//! 访问口令与销毁口令由 EPC 前缀与密钥经散列派生，不落盘。

mod bytes;
pub mod code40;
mod error;
mod factory;
mod formats;
mod passwords;
pub mod sixbit;

pub use bytes::{epc_len_from_pc, pc_for_epc_len, to_hex_upper, update_pc_len};
pub use code40 as urn_code40;
pub use error::TagError;
pub use factory::TagFactory;
pub use formats::{
    AntennaRssi, BrTag, De6Tag, De290FTag, De290Tag, De290Variant, De386Tag, RawTag, Tag,
};
pub use passwords::PasswordRegistry;
pub use sixbit as six_bit_ascii;
