use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use super::ByteSource;
use crate::{CodecError, Result};

/// 默认单次从 `Read` 拉取的字节上限。
const DEFAULT_FILL_CHUNK: usize = 8 * 1024;

/// 面向“字节分片到达”场景的累积缓冲。
///
/// # 教案式说明
/// - **意图 (Why)**：网络读循环每次只拿到若干字节，需要一个可追加、可被解码器
///   逐步消费的缓冲，并记录累计消费量以便诊断。
/// - **契约 (What)**：
///   - [`feed`](Self::feed) 追加到尾部，不影响已存在的读指针；
///   - [`fill_from`](Self::fill_from) 从 `Read` 读取**一次**，返回读取字节数，`0` 表示 EOF，
///     `Interrupted` 在内部重试；
///   - 作为 [`ByteSource`] 时只暴露已追加的数据，永不阻塞。
/// - **风险提示 (Trade-offs)**：`fill_from` 是否阻塞取决于传入的 `Read`，
///   事件循环应只在可读时调用它。
#[derive(Debug, Default)]
pub struct ChunkedSource {
    buffer: BytesMut,
    consumed: usize,
}

impl ChunkedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            consumed: 0,
        }
    }

    /// 追加一段新到达的字节。
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// 从 `reader` 读取一次并追加，返回本次读取的字节数。
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(start + DEFAULT_FILL_CHUNK, 0);
        let outcome = loop {
            match reader.read(&mut self.buffer[start..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match outcome {
            Ok(read) => {
                self.buffer.truncate(start + read);
                Ok(read)
            }
            Err(err) => {
                self.buffer.truncate(start);
                Err(CodecError::from(err))
            }
        }
    }

    /// 当前缓冲的未读字节数。
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// 自创建以来累计被消费的字节数。
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// 丢弃所有未读数据，例如在解码失败后放弃该流。
    pub fn clear(&mut self) {
        self.consumed += self.buffer.len();
        self.buffer.clear();
    }
}

impl ByteSource for ChunkedSource {
    fn remaining(&self) -> usize {
        self.buffer.len()
    }

    fn chunk(&self) -> &[u8] {
        &self.buffer
    }

    fn advance(&mut self, len: usize) -> Result<()> {
        if len > self.buffer.len() {
            return Err(CodecError::range(format!(
                "cannot advance {len} bytes, only {} buffered",
                self.buffer.len()
            )));
        }
        Buf::advance(&mut self.buffer, len);
        self.consumed += len;
        Ok(())
    }
}
