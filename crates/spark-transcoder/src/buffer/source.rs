use bytes::{Buf, Bytes, BytesMut};

use crate::{CodecError, Result};

/// `ByteSource` 描述解码器读取字节的最小能力。
///
/// # 教案式说明
/// - **意图 (Why)**：解码器需要在字节分片到达时“能读多少读多少”，
///   因此读取面必须可查询剩余量、可窥视、且绝不阻塞等待。
/// - **契约 (What)**：
///   - [`remaining`](Self::remaining)：当前无需等待即可读取的字节数；
///   - [`chunk`](Self::chunk)：从读指针开始的一段连续可读数据，仅在 `remaining() == 0`
///     时为空，可能短于 `remaining()`；
///   - [`advance`](Self::advance)：前移读指针，超过 `remaining()` 返回 `buffer.out_of_range`。
/// - **执行逻辑 (How)**：其余方法均基于上述三个原语提供默认实现，
///   实现者只需覆盖与自身存储布局相关的部分。
/// - **风险提示 (Trade-offs)**：`chunk` 允许分段返回，调用方若要求连续视图应使用 [`peek`](Self::peek)
///   并处理返回 `None` 的情况。
pub trait ByteSource {
    /// 当前可立即读取的字节数。
    fn remaining(&self) -> usize;

    /// 当前连续可读片段。
    fn chunk(&self) -> &[u8];

    /// 前移读指针 `len` 个字节。
    fn advance(&mut self, len: usize) -> Result<()>;

    /// 是否没有可读字节。
    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// 读取一个字节；无可读数据时返回 `None`。
    fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.chunk().first()?;
        self.advance(1).ok()?;
        Some(byte)
    }

    /// 尽可能多地复制到 `dst`，返回实际复制的字节数。
    fn read_available(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let chunk = self.chunk();
            if chunk.is_empty() {
                break;
            }
            let step = chunk.len().min(dst.len() - copied);
            dst[copied..copied + step].copy_from_slice(&chunk[..step]);
            if self.advance(step).is_err() {
                break;
            }
            copied += step;
        }
        copied
    }

    /// 全有或全无地填满 `dst`：字节不足时返回 `false` 且不消费任何数据。
    fn read_exact_into(&mut self, dst: &mut [u8]) -> bool {
        if self.remaining() < dst.len() {
            return false;
        }
        self.read_available(dst) == dst.len()
    }

    /// 以连续视图窥视接下来的 `len` 个字节，不移动读指针。
    ///
    /// 若数据不足或当前片段不连续，返回 `None`。
    fn peek(&self, len: usize) -> Option<&[u8]> {
        self.chunk().get(..len)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn remaining(&self) -> usize {
        (**self).remaining()
    }

    fn chunk(&self) -> &[u8] {
        (**self).chunk()
    }

    fn advance(&mut self, len: usize) -> Result<()> {
        (**self).advance(len)
    }
}

fn exceeds(len: usize, remaining: usize) -> CodecError {
    CodecError::range(format!(
        "cannot advance {len} bytes, only {remaining} remaining"
    ))
}

impl ByteSource for &[u8] {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn chunk(&self) -> &[u8] {
        self
    }

    fn advance(&mut self, len: usize) -> Result<()> {
        if len > self.len() {
            return Err(exceeds(len, self.len()));
        }
        let rest: &[u8] = *self;
        *self = &rest[len..];
        Ok(())
    }
}

impl ByteSource for Bytes {
    fn remaining(&self) -> usize {
        Buf::remaining(self)
    }

    fn chunk(&self) -> &[u8] {
        Buf::chunk(self)
    }

    fn advance(&mut self, len: usize) -> Result<()> {
        let remaining = Buf::remaining(self);
        if len > remaining {
            return Err(exceeds(len, remaining));
        }
        Buf::advance(self, len);
        Ok(())
    }
}

impl ByteSource for BytesMut {
    fn remaining(&self) -> usize {
        Buf::remaining(self)
    }

    fn chunk(&self) -> &[u8] {
        Buf::chunk(self)
    }

    fn advance(&mut self, len: usize) -> Result<()> {
        let remaining = Buf::remaining(self);
        if len > remaining {
            return Err(exceeds(len, remaining));
        }
        Buf::advance(self, len);
        Ok(())
    }
}
