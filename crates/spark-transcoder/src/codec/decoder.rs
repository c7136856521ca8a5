use std::{fs::File, io::Read, path::Path};

use tracing::trace;

use super::decode_adapters::{
    AndThen, ExactRepeat, Map, Optional, Pair, PrefixedRepeat, TryMap, UntilRepeat,
};
use crate::{
    CodecError, Result,
    buffer::{ByteSource, ChunkedSource},
    error::codes,
};

/// 解码一次调用的结果。
///
/// # 教案式说明
/// - **意图 (Why)**：挂起点以值而非阻塞或异常表达，调用方（事件循环）拿到
///   `Incomplete` 后自行决定何时带着更多字节再次调用。
/// - **契约 (What)**：
///   - `Done { value, consumed }`：完整的逻辑值已产出，`consumed` 为该值跨所有调用
///     累计消费的字节数；
///   - `Incomplete`：当前可读字节已全部吸收进解码器内部状态，需要同一实例再次调用；
///   - 终止性错误通过外层 `Result::Err` 表达，见 [`DecodeResult`]。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeOutcome<T> {
    Done { value: T, consumed: usize },
    Incomplete,
}

impl<T> DecodeOutcome<T> {
    pub fn done(value: T, consumed: usize) -> Self {
        Self::Done { value, consumed }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }

    /// 转换产出值，保持 `consumed` 不变。
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DecodeOutcome<U> {
        match self {
            Self::Done { value, consumed } => DecodeOutcome::Done {
                value: f(value),
                consumed,
            },
            Self::Incomplete => DecodeOutcome::Incomplete,
        }
    }

    /// 取出产出值，`Incomplete` 返回 `None`。
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Done { value, .. } => Some(value),
            Self::Incomplete => None,
        }
    }
}

/// `Ok(Done | Incomplete)` 或终止本次解码尝试的 `Err`。
pub type DecodeResult<T> = Result<DecodeOutcome<T>>;

/// 可恢复的增量解码状态机。
///
/// # 教案式说明
/// - **意图 (Why)**：字节可能以任意分片到达，解码器必须能“吃掉当前所有可用字节、
///   记住进度、下次接着来”，而不是要求调用方预先凑齐整帧。
/// - **状态 (What)**：`Ready → Processing* → Done | Error`。
///   - 每次 `decode` 只消费当前可读字节，不足时返回 `Incomplete` 并保留累积状态；
///   - 返回 `Done` 或 `Err` 后实例自动回到 `Ready`，可直接解码下一个值；
///   - 从不产出部分值：任何子步骤失败都以 `Err` 结束整次尝试。
/// - **并发 (Trade-offs)**：实例持有可变游标，不可被多个线程同时驱动；
///   并发解码请为每条逻辑流创建独立实例（见 [`DecoderFactory`]）。
///   丢弃实例总是安全的，无需额外清理。
pub trait Decoder: Send {
    type Item;

    /// 推进状态机。
    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item>;

    /// 丢弃累积状态并回到 `Ready`。
    fn reset(&mut self);
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    type Item = D::Item;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        (**self).decode(src)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// 类型擦除后的解码器。
pub type BoxDecoder<T> = Box<dyn Decoder<Item = T>>;

/// 解码器工厂：每次调用产出一个处于 `Ready` 状态的新实例。
///
/// 组合解析器与 [`Transcoder`](crate::Transcoder) 只保存工厂，从不共享解码器实例本身。
pub trait DecoderFactory<T>: Send + Sync {
    fn create(&self) -> BoxDecoder<T>;
}

impl<T, D, F> DecoderFactory<T> for F
where
    F: Fn() -> D + Send + Sync,
    D: Decoder<Item = T> + 'static,
{
    fn create(&self) -> BoxDecoder<T> {
        Box::new(self())
    }
}

fn unexpected_eof(consumed: usize) -> CodecError {
    CodecError::new(
        codes::IO_UNEXPECTED_EOF,
        format!("input ended after {consumed} bytes before the value was complete"),
    )
}

/// 解码器的组合子与一次性便捷入口。
///
/// 所有组合子产出的解码器同样满足 [`Decoder`] 契约：`consumed` 为各子步骤之和，
/// 任一子步骤失败即重置整体状态并向上传播。
pub trait DecoderExt: Decoder {
    /// 转换产出值。
    fn map<R, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> R + Send,
    {
        Map::new(self, f)
    }

    /// 转换产出值，转换失败即为本次解码的错误。
    fn try_map<R, F>(self, f: F) -> TryMap<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Result<R> + Send,
    {
        TryMap::new(self, f)
    }

    /// 以本解码器的产出选择下一个解码器，最终产出后者的值。
    fn and_then<N, F>(self, next: F) -> AndThen<Self, N, F>
    where
        Self: Sized,
        N: Decoder,
        F: FnMut(Self::Item) -> N + Send,
    {
        AndThen::new(self, next)
    }

    /// 先解码存在标记，为 `false` 时直接产出 `None`。
    fn optional<P>(self, presence: P) -> Optional<Self, P>
    where
        Self: Sized,
        Self::Item: Send,
        P: Decoder<Item = bool>,
    {
        Optional::new(self, presence)
    }

    /// 依次解码两个值。
    fn pair<B>(self, second: B) -> Pair<Self, B>
    where
        Self: Sized,
        Self::Item: Send,
        B: Decoder,
    {
        Pair::new(self, second)
    }

    /// 先解码 32 位元素个数，再解码相应数量的元素。
    fn repeat_prefixed<L>(self, count: L) -> PrefixedRepeat<Self, L>
    where
        Self: Sized,
        Self::Item: Send,
        L: Decoder<Item = i32>,
    {
        PrefixedRepeat::new(self, count)
    }

    /// 解码固定个数的元素。
    fn repeat_exact(self, count: usize) -> ExactRepeat<Self>
    where
        Self: Sized,
        Self::Item: Send,
    {
        ExactRepeat::new(self, count)
    }

    /// 重复解码直到 `is_end` 命中结束元素；`keep_last` 决定结束元素是否保留在结果中。
    fn repeat_until<F>(self, keep_last: bool, is_end: F) -> UntilRepeat<Self, F>
    where
        Self: Sized,
        Self::Item: Send,
        F: FnMut(&Self::Item) -> bool + Send,
    {
        UntilRepeat::new(self, keep_last, is_end)
    }

    fn boxed(self) -> BoxDecoder<Self::Item>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// 从完整的内存切片解码一个值，多余字节被忽略。
    ///
    /// 切片不足以构成完整值时返回 `io.unexpected_eof`，解码器随之重置。
    fn decode_slice(&mut self, bytes: &[u8]) -> Result<Self::Item> {
        let mut src = bytes;
        match self.decode(&mut src)? {
            DecodeOutcome::Done { value, .. } => Ok(value),
            DecodeOutcome::Incomplete => {
                self.reset();
                Err(unexpected_eof(bytes.len()))
            }
        }
    }

    /// 从任意 `Read` 逐块拉取字节直到解码出一个值。
    ///
    /// 读取粒度为块，值之后已拉取的字节会被丢弃；需要连续读取多个值时，
    /// 请自行持有 [`ChunkedSource`] 并循环调用 [`Decoder::decode`]。
    fn decode_reader<R: Read>(&mut self, mut reader: R) -> Result<Self::Item> {
        let mut src = ChunkedSource::new();
        loop {
            match self.decode(&mut src)? {
                DecodeOutcome::Done { value, .. } => return Ok(value),
                DecodeOutcome::Incomplete => {
                    let read = src.fill_from(&mut reader)?;
                    trace!(read, consumed = src.consumed(), "decoder refilled from reader");
                    if read == 0 {
                        self.reset();
                        return Err(unexpected_eof(src.consumed()));
                    }
                }
            }
        }
    }

    /// 在单次调用内独占打开 `path` 并解码一个值，返回前关闭文件。
    fn decode_path(&mut self, path: impl AsRef<Path>) -> Result<Self::Item> {
        let file = File::open(path.as_ref())?;
        self.decode_reader(std::io::BufReader::new(file))
    }
}

impl<D: Decoder + ?Sized> DecoderExt for D {}
