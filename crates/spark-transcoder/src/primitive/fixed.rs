use std::marker::PhantomData;

use tracing::trace;

use super::ByteOrder;
use crate::{
    CodecError, Result,
    buffer::{ByteSink, ByteSource},
    codec::{DecodeOutcome, DecodeResult, Decoder, Encoder},
    error::codes,
};

/// 最宽原语（`i64`/`f64`）的字节数，也是内联暂存区的大小。
const MAX_WIDTH: usize = 8;

/// 定宽原语：宽度固定、按字节序解释的数值或布尔值。
///
/// 浮点数经由同宽整数的位模式往返，不存在独立的浮点字节处理。
pub trait FixedWidth: Copy + Send + Sync + 'static {
    const WIDTH: usize;

    /// 从 `bytes` 的前 `WIDTH` 个字节还原值，多余字节被忽略。
    ///
    /// # Panics
    /// `bytes.len() < WIDTH` 时 panic。解码器只在凑满宽度后调用，增量输入请使用
    /// [`FixedWidthDecoder`]。
    fn from_order_bytes(bytes: &[u8], order: ByteOrder) -> Self;

    /// 写入 `out` 的前 `WIDTH` 个字节。
    ///
    /// # Panics
    /// `out.len() < WIDTH` 时 panic。
    fn to_order_bytes(self, order: ByteOrder, out: &mut [u8]);
}

macro_rules! fixed_width_int {
    ($($ty:ty),* $(,)?) => {$(
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn from_order_bytes(bytes: &[u8], order: ByteOrder) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::WIDTH]);
                match order {
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                }
            }

            fn to_order_bytes(self, order: ByteOrder, out: &mut [u8]) {
                let raw = match order {
                    ByteOrder::BigEndian => self.to_be_bytes(),
                    ByteOrder::LittleEndian => self.to_le_bytes(),
                };
                out[..Self::WIDTH].copy_from_slice(&raw);
            }
        }
    )*};
}

fixed_width_int!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FixedWidth for f32 {
    const WIDTH: usize = 4;

    fn from_order_bytes(bytes: &[u8], order: ByteOrder) -> Self {
        f32::from_bits(u32::from_order_bytes(bytes, order))
    }

    fn to_order_bytes(self, order: ByteOrder, out: &mut [u8]) {
        self.to_bits().to_order_bytes(order, out)
    }
}

impl FixedWidth for f64 {
    const WIDTH: usize = 8;

    fn from_order_bytes(bytes: &[u8], order: ByteOrder) -> Self {
        f64::from_bits(u64::from_order_bytes(bytes, order))
    }

    fn to_order_bytes(self, order: ByteOrder, out: &mut [u8]) {
        self.to_bits().to_order_bytes(order, out)
    }
}

/// 单字节布尔：解码时任何非零字节为 `true`，编码只写 `0`/`1`。
impl FixedWidth for bool {
    const WIDTH: usize = 1;

    fn from_order_bytes(bytes: &[u8], _order: ByteOrder) -> Self {
        bytes[0] != 0
    }

    fn to_order_bytes(self, _order: ByteOrder, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

/// 定宽原语解码器。
///
/// # 教案式说明
/// - **意图 (Why)**：网络分片可能把一个 `i64` 切成任意几段，解码器必须把已到达的字节
///   暂存起来，凑满宽度后再一次性解释。
/// - **契约 (What)**：
///   - 每次调用吸收 `min(剩余宽度, 可读字节)` 个字节，不足时返回 `Incomplete`；
///   - 已吸收的字节不会被再次请求；
///   - 凑满后按配置的 [`ByteOrder`] 解释并返回 `Done { consumed: WIDTH }`，随即回到 `Ready`。
/// - **执行逻辑 (How)**：8 字节内联暂存区 + 填充计数，热路径无堆分配。
#[derive(Clone, Debug)]
pub struct FixedWidthDecoder<P> {
    order: ByteOrder,
    scratch: [u8; MAX_WIDTH],
    filled: usize,
    _value: PhantomData<fn() -> P>,
}

impl<P: FixedWidth> FixedWidthDecoder<P> {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            scratch: [0; MAX_WIDTH],
            filled: 0,
            _value: PhantomData,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }
}

impl<P: FixedWidth> Default for FixedWidthDecoder<P> {
    fn default() -> Self {
        Self::new(ByteOrder::default())
    }
}

impl<P: FixedWidth> Decoder for FixedWidthDecoder<P> {
    type Item = P;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<P> {
        self.filled += src.read_available(&mut self.scratch[self.filled..P::WIDTH]);
        if self.filled < P::WIDTH {
            trace!(filled = self.filled, width = P::WIDTH, "fixed-width value incomplete");
            return Ok(DecodeOutcome::Incomplete);
        }
        self.filled = 0;
        let value = P::from_order_bytes(&self.scratch[..P::WIDTH], self.order);
        Ok(DecodeOutcome::done(value, P::WIDTH))
    }

    fn reset(&mut self) {
        self.filled = 0;
    }
}

/// 定宽原语编码器。
#[derive(Clone, Copy, Debug)]
pub struct FixedWidthEncoder<P> {
    order: ByteOrder,
    _value: PhantomData<fn(P)>,
}

impl<P: FixedWidth> FixedWidthEncoder<P> {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            _value: PhantomData,
        }
    }
}

impl<P: FixedWidth> Default for FixedWidthEncoder<P> {
    fn default() -> Self {
        Self::new(ByteOrder::default())
    }
}

impl<P: FixedWidth> Encoder<P> for FixedWidthEncoder<P> {
    fn encode(&self, value: &P, sink: &mut dyn ByteSink) -> Result<()> {
        let mut raw = [0u8; MAX_WIDTH];
        value.to_order_bytes(self.order, &mut raw);
        sink.write_all(&raw[..P::WIDTH])
    }
}

/// 定长原始字节块解码器。
#[derive(Clone, Debug)]
pub struct FixedBytesDecoder {
    buffer: Vec<u8>,
    len: usize,
}

impl FixedBytesDecoder {
    /// 长度为零的声明没有意义，按配置错误拒绝。
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(CodecError::new(
                codes::CONFIG_ZERO_WIDTH,
                "fixed byte block must be at least one byte wide",
            ));
        }
        Ok(Self {
            buffer: Vec::with_capacity(len),
            len,
        })
    }

    pub fn width(&self) -> usize {
        self.len
    }
}

impl Decoder for FixedBytesDecoder {
    type Item = Vec<u8>;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Vec<u8>> {
        let start = self.buffer.len();
        self.buffer.resize(self.len, 0);
        let read = src.read_available(&mut self.buffer[start..]);
        self.buffer.truncate(start + read);
        if self.buffer.len() < self.len {
            return Ok(DecodeOutcome::Incomplete);
        }
        let value = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.len));
        Ok(DecodeOutcome::done(value, self.len))
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// 定长原始字节块编码器；长度不符即为 `format.invalid_length`。
#[derive(Clone, Copy, Debug)]
pub struct FixedBytesEncoder {
    len: usize,
}

impl FixedBytesEncoder {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(CodecError::new(
                codes::CONFIG_ZERO_WIDTH,
                "fixed byte block must be at least one byte wide",
            ));
        }
        Ok(Self { len })
    }
}

impl Encoder<[u8]> for FixedBytesEncoder {
    fn encode(&self, value: &[u8], sink: &mut dyn ByteSink) -> Result<()> {
        if value.len() != self.len {
            return Err(CodecError::new(
                codes::FORMAT_INVALID_LENGTH,
                format!("expected {} bytes, got {}", self.len, value.len()),
            ));
        }
        sink.write_all(value)
    }
}

impl Encoder<Vec<u8>> for FixedBytesEncoder {
    fn encode(&self, value: &Vec<u8>, sink: &mut dyn ByteSink) -> Result<()> {
        Encoder::<[u8]>::encode(self, value, sink)
    }
}
