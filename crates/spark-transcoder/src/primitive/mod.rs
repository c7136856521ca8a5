//! 原语编解码器：定宽数值、布尔、定长字节块与字符串。
//!
//! 所有多字节原语都显式接收 [`ByteOrder`]；未指定时整个编解码族统一使用
//! [`ByteOrder::BigEndian`]。

mod fixed;
mod string;

use serde::{Deserialize, Serialize};

pub use fixed::{
    FixedBytesDecoder, FixedBytesEncoder, FixedWidth, FixedWidthDecoder, FixedWidthEncoder,
};
pub use string::{Charset, StringDecoder, StringEncoder};

/// 多字节数值的字节序。
///
/// - `BigEndian`：先到达的字节为最高有效字节（网络序，默认值）；
/// - `LittleEndian`：最后到达的字节为最高有效字节。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}
