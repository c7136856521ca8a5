use std::{fmt, io::Read, path::Path, sync::Arc};

use crate::{
    Result,
    buffer::ByteSink,
    codec::{BoxDecoder, DecoderExt, DecoderFactory, Encoder, EncoderExt},
    compose::{ComposedDecoderFactory, ComposedEncoder},
    configuration::{CodecSettings, StringSettings},
    primitive::{
        ByteOrder, FixedWidth, FixedWidthDecoder, FixedWidthEncoder, StringDecoder, StringEncoder,
    },
};

/// 编码器与解码器工厂的组合句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方只依赖一个能力即可完成往返，而不必分别持有并对齐两端。
/// - **契约 (What)**：
///   - 两端必须由同一份设置构造，字段顺序与字节序一致；
///   - 句柄本身无可变状态，可克隆并跨线程共享；每次解码都从工厂取一个新实例。
/// - **执行逻辑 (How)**：纯委托，`encode*` 走编码器，`decode*` 走工厂产出的解码器。
pub struct Transcoder<T> {
    encoder: Arc<dyn Encoder<T>>,
    decoders: Arc<dyn DecoderFactory<T>>,
}

impl<T: 'static> Transcoder<T> {
    pub fn new<E, F>(encoder: E, decoders: F) -> Self
    where
        E: Encoder<T> + 'static,
        F: DecoderFactory<T> + 'static,
    {
        Self {
            encoder: Arc::new(encoder),
            decoders: Arc::new(decoders),
        }
    }

    /// 组合编码器与组合解码器配对。
    pub fn composed(encoder: ComposedEncoder<T>, decoders: ComposedDecoderFactory<T>) -> Self
    where
        T: Send,
    {
        Self::new(encoder, decoders)
    }

    /// 创建一个处于 `Ready` 状态的解码器，用于增量解码。
    pub fn decoder(&self) -> BoxDecoder<T> {
        self.decoders.create()
    }

    pub fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        self.encoder.encode(value, sink)
    }

    pub fn encode_to_vec(&self, value: &T) -> Result<Vec<u8>> {
        self.encoder.encode_to_vec(value)
    }

    pub fn encode_to_path(&self, value: &T, path: impl AsRef<Path>) -> Result<()> {
        self.encoder.encode_to_path(value, path)
    }

    /// 从完整的字节切片解码一个值，尾部多余字节被忽略。
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<T> {
        self.decoder().decode_slice(bytes)
    }

    pub fn decode_reader<R: Read>(&self, reader: R) -> Result<T> {
        self.decoder().decode_reader(reader)
    }

    pub fn decode_path(&self, path: impl AsRef<Path>) -> Result<T> {
        self.decoder().decode_path(path)
    }
}

impl<P: FixedWidth> Transcoder<P> {
    /// 定宽原语的往返句柄。
    pub fn fixed_width(order: ByteOrder) -> Self {
        Self::new(FixedWidthEncoder::<P>::new(order), move || {
            FixedWidthDecoder::<P>::new(order)
        })
    }
}

impl Transcoder<String> {
    /// 按设置中的字节序与字符串分帧构造字符串往返句柄。
    pub fn string(settings: &CodecSettings) -> Result<Self> {
        Self::string_with(settings.byte_order, &settings.string)
    }

    pub fn string_with(order: ByteOrder, settings: &StringSettings) -> Result<Self> {
        let encoder = StringEncoder::new(order, settings)?;
        let prototype = StringDecoder::new(order, settings)?;
        Ok(Self::new(encoder, move || prototype.clone()))
    }
}

impl<T> Clone for Transcoder<T> {
    fn clone(&self) -> Self {
        Self {
            encoder: Arc::clone(&self.encoder),
            decoders: Arc::clone(&self.decoders),
        }
    }
}

impl<T> fmt::Debug for Transcoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("value", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> Encoder<T> for Transcoder<T> {
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        self.encoder.encode(value, sink)
    }
}

impl<T> DecoderFactory<T> for Transcoder<T> {
    fn create(&self) -> BoxDecoder<T> {
        self.decoders.create()
    }
}
