use std::{io::Write, path::Path, sync::Arc};

use super::encode_adapters::{
    MapInput, OptionalEncoder, PairEncoder, PrefixedRepeatEncoder, TerminatedRepeatEncoder,
};
use crate::{
    Result,
    buffer::{ByteSink, NullSink, StreamSink, with_file_sink},
};

/// 无状态编码器：`T × ByteSink → ()`。
///
/// # 教案式说明
/// - **意图 (Why)**：编码路径没有跨调用状态，同一编码器可被多个线程共享，
///   只要每次调用使用各自的 Sink。
/// - **契约 (What)**：
///   - 写出的字节必须能被配对的解码器在不借助外部分帧的情况下还原；
///   - 复合类型的编码器按与解码器相同的字段顺序依次调用字段编码器；
///   - 失败时 Sink 中可能残留已写出的前缀，调用方应丢弃该 Sink 的内容。
/// - **执行逻辑 (How)**：一次性编码器可用 [`from_fn`] 从闭包构造。
pub trait Encoder<T: ?Sized>: Send + Sync {
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()>;
}

/// 由闭包实现的编码器，见 [`from_fn`]。
#[derive(Clone, Copy, Debug)]
pub struct EncodeFn<F> {
    f: F,
}

/// 把 `Fn(&T, &mut dyn ByteSink) -> Result<()>` 包装为编码器。
pub fn from_fn<T, F>(f: F) -> EncodeFn<F>
where
    T: ?Sized,
    F: Fn(&T, &mut dyn ByteSink) -> Result<()> + Send + Sync,
{
    EncodeFn { f }
}

impl<T, F> Encoder<T> for EncodeFn<F>
where
    T: ?Sized,
    F: Fn(&T, &mut dyn ByteSink) -> Result<()> + Send + Sync,
{
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        (self.f)(value, sink)
    }
}

impl<T: ?Sized, E: Encoder<T> + ?Sized> Encoder<T> for Box<E> {
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        (**self).encode(value, sink)
    }
}

impl<T: ?Sized, E: Encoder<T> + ?Sized> Encoder<T> for Arc<E> {
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        (**self).encode(value, sink)
    }
}

/// 类型擦除后的编码器。
pub type BoxEncoder<T> = Box<dyn Encoder<T>>;

/// 编码器的派生入口与组合子。
///
/// 便捷入口都只是“围绕新 Sink 调用一次 [`Encoder::encode`]”：
/// 内存缓冲、外部流或作用域文件，后者在每条退出路径上释放。
pub trait EncoderExt<T: ?Sized>: Encoder<T> {
    /// 编码到一块新分配的缓冲。
    fn encode_to_vec(&self, value: &T) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode(value, &mut buffer)?;
        Ok(buffer)
    }

    /// 编码到外部流并刷新；流的所有权仍归调用方。
    fn encode_to_writer<W: Write>(&self, value: &T, writer: &mut W) -> Result<()> {
        let mut sink = StreamSink::new(writer);
        self.encode(value, &mut sink)?;
        sink.flush()
    }

    /// 在单次调用内独占创建 `path` 并写入编码结果。
    fn encode_to_path(&self, value: &T, path: impl AsRef<Path>) -> Result<()> {
        with_file_sink(path, |sink| self.encode(value, sink))
    }

    /// 计算编码后的字节数而不分配缓冲。
    fn encoded_len(&self, value: &T) -> Result<usize> {
        let mut sink = NullSink::new();
        self.encode(value, &mut sink)?;
        Ok(sink.written())
    }

    /// 先把输入映射为 `T` 再编码，得到 `Encoder<U>`。
    fn map_input<U, F>(self, f: F) -> MapInput<Self, F, T>
    where
        Self: Sized,
        T: Sized,
        F: Fn(&U) -> T + Send + Sync,
    {
        MapInput::new(self, f)
    }

    /// 先写存在标记，`Some` 时再写值。
    fn optional<P>(self, presence: P) -> OptionalEncoder<Self, P>
    where
        Self: Sized,
        T: Sized,
        P: Encoder<bool>,
    {
        OptionalEncoder::new(self, presence)
    }

    /// 依次编码二元组的两个分量。
    fn pair<U, B>(self, second: B) -> PairEncoder<Self, B>
    where
        Self: Sized,
        T: Sized,
        B: Encoder<U>,
    {
        PairEncoder::new(self, second)
    }

    /// 先写 32 位元素个数，再逐个编码元素。
    fn repeat_prefixed<L>(self, count: L) -> PrefixedRepeatEncoder<Self, L>
    where
        Self: Sized,
        T: Sized,
        L: Encoder<i32>,
    {
        PrefixedRepeatEncoder::new(self, count)
    }

    /// 逐个编码元素后追加 `end` 作为结束元素。
    fn repeat_until(self, end: T) -> TerminatedRepeatEncoder<Self, T>
    where
        Self: Sized,
        T: Sized + Send + Sync,
    {
        TerminatedRepeatEncoder::new(self, end)
    }
}

impl<T: ?Sized, E: Encoder<T> + ?Sized> EncoderExt<T> for E {}
