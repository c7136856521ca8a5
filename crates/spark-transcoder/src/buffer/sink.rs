use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use bytes::{BufMut, BytesMut};

use super::check_range;
use crate::Result;

/// `ByteSink` 描述编码器写出字节的最小能力。
///
/// # 教案式说明
/// - **意图 (Why)**：编码器只关心“按顺序追加字节”，不应感知目标是内存、流还是文件。
/// - **契约 (What)**：
///   - [`write_byte`](Self::write_byte) 是唯一必需方法；
///   - [`write_range`](Self::write_range) 默认逐字节委托，批量友好的实现应覆盖它；
///   - `start + len` 超出 `bytes.len()` 时返回 `buffer.out_of_range`，且不写入任何字节。
/// - **执行逻辑 (How)**：越界检查先于写入完成，因此失败调用不会留下半截数据。
/// - **风险提示 (Trade-offs)**：默认实现逐字节调用，流式目标应覆盖批量方法以避免放大系统调用。
pub trait ByteSink {
    /// 写入单个字节。
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// 写入 `bytes[start..start + len]`。
    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        check_range(bytes.len(), start, len)?;
        for &byte in &bytes[start..start + len] {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// 写入整个切片。
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_range(bytes, 0, bytes.len())
    }

    /// 将缓冲数据推送到底层介质；内存目标无需操作。
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        (**self).write_range(bytes, start, len)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl ByteSink for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }

    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        check_range(bytes.len(), start, len)?;
        self.extend_from_slice(&bytes[start..start + len]);
        Ok(())
    }
}

impl ByteSink for BytesMut {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.put_u8(byte);
        Ok(())
    }

    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        check_range(bytes.len(), start, len)?;
        self.put_slice(&bytes[start..start + len]);
        Ok(())
    }
}

/// 包装任意 [`Write`] 的输出流适配器。
///
/// 流的所有权归调用方：`StreamSink` 只负责把写入转交给 `W` 并把 `io::Error`
/// 转换为 `io.*` 错误码，不会在析构时关闭底层流。
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    inner: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.write_all(&[byte])?;
        Ok(())
    }

    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        check_range(bytes.len(), start, len)?;
        self.inner.write_all(&bytes[start..start + len])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// 只计数不落盘的空目标，用于预先计算编码长度。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NullSink {
    written: usize,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 迄今为止“写入”的字节数。
    pub fn written(&self) -> usize {
        self.written
    }
}

impl ByteSink for NullSink {
    fn write_byte(&mut self, _byte: u8) -> Result<()> {
        self.written += 1;
        Ok(())
    }

    fn write_range(&mut self, bytes: &[u8], start: usize, len: usize) -> Result<()> {
        check_range(bytes.len(), start, len)?;
        self.written += len;
        Ok(())
    }
}

/// 在一次调用的生命周期内独占一个文件作为写入目标。
///
/// # 教案式说明
/// - **意图 (Why)**：`encode_to_path` 一类便捷入口需要“打开、写入、关闭”的完整闭环，
///   文件句柄不得泄漏到调用之外。
/// - **契约 (What)**：
///   - 以 `File::create` 语义打开（存在则截断）；
///   - `write` 成功时恰好刷新一次并关闭文件，刷新失败以 `io.failure` 返回；
///   - `write` 失败时直接返回其错误，文件句柄随栈展开释放。
/// - **执行逻辑 (How)**：句柄由 `BufWriter<File>` 持有，释放依赖 RAII，
///   因此 panic 与提前返回同样会关闭文件。
pub fn with_file_sink<R>(
    path: impl AsRef<Path>,
    write: impl FnOnce(&mut dyn ByteSink) -> Result<R>,
) -> Result<R> {
    let file = File::create(path.as_ref())?;
    let mut sink = StreamSink::new(BufWriter::new(file));
    let value = write(&mut sink)?;
    let file = sink.into_inner().into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, codes};

    #[test]
    fn vec_sink_rejects_out_of_range_without_partial_write() {
        let mut sink = Vec::new();
        let err = sink
            .write_range(b"abc", 2, 2)
            .expect_err("越界写入必须失败");
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(sink.is_empty(), "失败调用不得留下半截数据");

        sink.write_range(b"abc", 1, 2).expect("合法区间写入");
        assert_eq!(sink, b"bc");
    }

    #[test]
    fn default_range_write_checks_overflowing_bounds() {
        struct OneByOne(Vec<u8>);
        impl ByteSink for OneByOne {
            fn write_byte(&mut self, byte: u8) -> Result<()> {
                self.0.push(byte);
                Ok(())
            }
        }

        let mut sink = OneByOne(Vec::new());
        let err = sink
            .write_range(b"abc", usize::MAX, 2)
            .expect_err("start + len 溢出同样视为越界");
        assert_eq!(err.code(), codes::BUFFER_OUT_OF_RANGE);

        sink.write_range(b"abcd", 1, 3).expect("逐字节默认实现");
        assert_eq!(sink.0, b"bcd");
    }

    #[test]
    fn null_sink_counts_bytes() {
        let mut sink = NullSink::new();
        sink.write_all(&[1, 2, 3]).expect("计数写入");
        sink.write_byte(4).expect("计数写入");
        assert_eq!(sink.written(), 4);
    }

    #[test]
    fn stream_sink_forwards_to_writer() {
        let mut sink = StreamSink::new(Vec::new());
        sink.write_all(b"spark").expect("写入内存流");
        sink.flush().expect("刷新内存流");
        assert_eq!(sink.into_inner(), b"spark");
    }
}
