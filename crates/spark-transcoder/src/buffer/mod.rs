//! 字节输入输出契约。
//!
//! # 模块定位（Why）
//! - [`ByteSink`] 与 [`ByteSource`] 是编码器、解码器唯一依赖的 I/O 面，
//!   二者均不绑定具体介质（内存、流、文件、网络累积缓冲）。
//! - `ByteSource` 永不阻塞：数据不足时如实报告，由解码器返回 `Incomplete`，
//!   何时补充字节由调用方（通常是事件循环）决定。
//!
//! # 结构（How）
//! - `sink`：写入契约及 `Vec<u8>`、`BytesMut`、流、计数、作用域文件适配器；
//! - `source`：读取契约及切片、`Bytes`、`BytesMut` 实现；
//! - `chunked`：面向分片到达场景的累积缓冲 [`ChunkedSource`]。

mod chunked;
mod sink;
mod source;

pub use chunked::ChunkedSource;
pub use sink::{ByteSink, NullSink, StreamSink, with_file_sink};
pub use source::ByteSource;

use crate::{CodecError, Result};

/// 校验 `start..start + len` 落在长度为 `total` 的缓冲内。
pub(crate) fn check_range(total: usize, start: usize, len: usize) -> Result<()> {
    match start.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(CodecError::range(format!(
            "range start={start} len={len} exceeds buffer length {total}"
        ))),
    }
}
