use std::{fmt, sync::Arc};

use crate::{
    CodecError, Result,
    buffer::ByteSink,
    codec::Encoder,
    configuration::CodecSettings,
    error::codes,
    primitive::{ByteOrder, FixedBytesEncoder, FixedWidth, FixedWidthEncoder, StringEncoder},
};

type Body<T> = dyn Fn(&T, &mut EncodingScope<'_, T>) -> Result<()> + Send + Sync;

/// 组合类型的编码器。
///
/// # 教案式说明
/// - **意图 (Why)**：与 [`DecoderComposer`](super::DecoderComposer) 对称，用同一份设置
///   按声明顺序写出字段；自引用字段通过 [`EncodingScope::self_value`] 递归回到同一个函数体。
/// - **契约 (What)**：
///   - 函数体必须按与解码端完全相同的顺序和类型写字段；
///   - 自引用嵌套超过 `max_depth` 以 `format.depth_exceeded` 失败，与解码端的上限一致；
///   - 失败时 Sink 中可能残留部分字节，调用方应丢弃。
pub struct ComposedEncoder<T> {
    order: ByteOrder,
    string: StringEncoder,
    max_depth: usize,
    body: Arc<Body<T>>,
}

impl<T> ComposedEncoder<T> {
    pub fn new<F>(settings: &CodecSettings, body: F) -> Result<Self>
    where
        F: Fn(&T, &mut EncodingScope<'_, T>) -> Result<()> + Send + Sync + 'static,
    {
        settings.validate()?;
        Ok(Self {
            order: settings.byte_order,
            string: StringEncoder::new(settings.byte_order, &settings.string)?,
            max_depth: settings.max_depth,
            body: Arc::new(body),
        })
    }
}

impl<T> Clone for ComposedEncoder<T> {
    fn clone(&self) -> Self {
        Self {
            order: self.order,
            string: self.string.clone(),
            max_depth: self.max_depth,
            body: Arc::clone(&self.body),
        }
    }
}

impl<T> fmt::Debug for ComposedEncoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedEncoder")
            .field("order", &self.order)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl<T> Encoder<T> for ComposedEncoder<T> {
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        let mut scope = EncodingScope {
            sink,
            encoder: self,
            depth: 1,
        };
        (self.body)(value, &mut scope)
    }
}

/// 组合编码函数体内的写入入口。
///
/// 每个方法写出一个字段并返回 `&mut Self`，便于以 `?` 串联。
pub struct EncodingScope<'a, T> {
    sink: &'a mut dyn ByteSink,
    encoder: &'a ComposedEncoder<T>,
    depth: usize,
}

impl<T> EncodingScope<'_, T> {
    fn fixed<P: FixedWidth>(&mut self, value: P) -> Result<&mut Self> {
        FixedWidthEncoder::<P>::new(self.encoder.order).encode(&value, self.sink)?;
        Ok(self)
    }

    pub fn byte(&mut self, value: i8) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn short(&mut self, value: i16) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn int(&mut self, value: i32) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn long(&mut self, value: i64) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn float(&mut self, value: f32) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn double(&mut self, value: f64) -> Result<&mut Self> {
        self.fixed(value)
    }

    pub fn boolean(&mut self, value: bool) -> Result<&mut Self> {
        self.fixed(value)
    }

    /// 按设置中的字符集与分帧方式写出字符串。
    pub fn string(&mut self, value: &str) -> Result<&mut Self> {
        Encoder::<str>::encode(&self.encoder.string, value, self.sink)?;
        Ok(self)
    }

    /// 写出与解码端 `bytes(len)` 对应的定长字节块。
    ///
    /// `value` 的长度与 `len` 不符时以 `format.invalid_length` 失败，且不写出任何字节。
    pub fn bytes(&mut self, len: usize, value: &[u8]) -> Result<&mut Self> {
        Encoder::<[u8]>::encode(&FixedBytesEncoder::new(len)?, value, self.sink)?;
        Ok(self)
    }

    /// 与解码端的 `skip(len)` 对应，写出 `len` 个零字节。
    pub fn skip(&mut self, len: usize) -> Result<&mut Self> {
        for _ in 0..len {
            self.sink.write_byte(0)?;
        }
        Ok(self)
    }

    fn count(&mut self, len: usize) -> Result<&mut Self> {
        let count = i32::try_from(len).map_err(|_| {
            CodecError::new(
                codes::FORMAT_INVALID_LENGTH,
                format!("{len} elements do not fit a 32-bit count prefix"),
            )
        })?;
        self.int(count)
    }

    /// 先写 `Int` 个数，再以 `element` 逐个写出元素。
    ///
    /// 解码端对应 `nested` 一个 `element.repeat_prefixed(Int 解码器)`。
    pub fn list<U, E>(&mut self, element: &E, values: &[U]) -> Result<&mut Self>
    where
        E: Encoder<U> + ?Sized,
    {
        self.count(values.len())?;
        for value in values {
            element.encode(value, self.sink)?;
        }
        Ok(self)
    }

    /// 以任意编码器写出一个嵌套字段。
    pub fn nested<U, E>(&mut self, encoder: &E, value: &U) -> Result<&mut Self>
    where
        U: ?Sized,
        E: Encoder<U> + ?Sized,
    {
        encoder.encode(value, self.sink)?;
        Ok(self)
    }

    /// 写出单字节布尔存在标记，值存在时再交给 `write` 写出。
    pub fn nullable<U, F>(&mut self, value: Option<&U>, write: F) -> Result<&mut Self>
    where
        U: ?Sized,
        F: FnOnce(&mut Self, &U) -> Result<()>,
    {
        let presence = FixedWidthEncoder::<bool>::new(self.encoder.order);
        self.nullable_with(&presence, value, write)
    }

    /// 与解码端的 `nullable_with` 对应：存在标记由 `presence` 写出。
    pub fn nullable_with<U, P, F>(
        &mut self,
        presence: &P,
        value: Option<&U>,
        write: F,
    ) -> Result<&mut Self>
    where
        U: ?Sized,
        P: Encoder<bool> + ?Sized,
        F: FnOnce(&mut Self, &U) -> Result<()>,
    {
        presence.encode(&value.is_some(), self.sink)?;
        if let Some(value) = value {
            write(&mut *self, value)?;
        }
        Ok(self)
    }

    /// 递归写出同类型的值。
    pub fn self_value(&mut self, value: &T) -> Result<&mut Self> {
        if self.depth >= self.encoder.max_depth {
            return Err(CodecError::new(
                codes::FORMAT_DEPTH_EXCEEDED,
                format!(
                    "self reference nests deeper than {} levels",
                    self.encoder.max_depth
                ),
            ));
        }
        let mut child = EncodingScope {
            sink: &mut *self.sink,
            encoder: self.encoder,
            depth: self.depth + 1,
        };
        (self.encoder.body)(value, &mut child)?;
        Ok(self)
    }

    /// 与解码端的 `self_or_null` 对应：存在标记加可选的递归值。
    pub fn self_or_null(&mut self, value: Option<&T>) -> Result<&mut Self> {
        self.nullable(value, |scope, value| scope.self_value(value).map(drop))
    }

    /// 与解码端的 `self_list` 对应：`Int` 个数后逐个递归写出元素。
    pub fn self_list(&mut self, values: &[T]) -> Result<&mut Self> {
        self.count(values.len())?;
        for value in values {
            self.self_value(value)?;
        }
        Ok(self)
    }

    pub fn self_list_or_null(&mut self, values: Option<&[T]>) -> Result<&mut Self> {
        self.nullable(values, |scope, values| scope.self_list(values).map(drop))
    }

    /// 当前嵌套层数，根值为 1。
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 直接访问底层 Sink，用于写出组合 API 未覆盖的格式。
    pub fn sink(&mut self) -> &mut dyn ByteSink {
        &mut *self.sink
    }
}
