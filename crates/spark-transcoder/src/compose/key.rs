use std::{borrow::Cow, fmt, sync::Arc};

use super::erased::{ErasedFactory, erase};
use crate::{
    Result,
    configuration::CodecSettings,
    primitive::{FixedBytesDecoder, FixedWidthDecoder, StringDecoder},
};

/// 组合步骤可直接声明的原语类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// `bool`
    Boolean,
    /// `String`，分帧方式取自设置。
    String,
    /// 定长 `Vec<u8>`；长度为零是配置错误。
    Bytes(usize),
}

impl PrimitiveKind {
    /// 按设置构造该原语的解码器工厂。
    pub(crate) fn factory(self, settings: &CodecSettings) -> Result<Arc<dyn ErasedFactory>> {
        let order = settings.byte_order;
        Ok(match self {
            PrimitiveKind::Byte => erase(move || FixedWidthDecoder::<i8>::new(order)),
            PrimitiveKind::Short => erase(move || FixedWidthDecoder::<i16>::new(order)),
            PrimitiveKind::Int => erase(move || FixedWidthDecoder::<i32>::new(order)),
            PrimitiveKind::Long => erase(move || FixedWidthDecoder::<i64>::new(order)),
            PrimitiveKind::Float => erase(move || FixedWidthDecoder::<f32>::new(order)),
            PrimitiveKind::Double => erase(move || FixedWidthDecoder::<f64>::new(order)),
            PrimitiveKind::Boolean => erase(move || FixedWidthDecoder::<bool>::new(order)),
            PrimitiveKind::String => {
                let prototype = StringDecoder::new(order, &settings.string)?;
                erase(move || prototype.clone())
            }
            PrimitiveKind::Bytes(len) => {
                let prototype = FixedBytesDecoder::new(len)?;
                erase(move || prototype.clone())
            }
        })
    }
}

/// 组合解析缓存的键。
///
/// 键相等的两个步骤解析为同一个图节点；`SelfRef` 永远命中正在构建的根节点占位。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecoderKey {
    Primitive(PrimitiveKind),
    Nullable {
        value: Box<DecoderKey>,
        presence: Box<DecoderKey>,
    },
    SelfRef,
    SelfList,
    Skip(usize),
    Custom(Cow<'static, str>),
}

impl DecoderKey {
    pub fn custom(label: impl Into<Cow<'static, str>>) -> Self {
        DecoderKey::Custom(label.into())
    }

    pub fn nullable(value: DecoderKey, presence: DecoderKey) -> Self {
        DecoderKey::Nullable {
            value: Box::new(value),
            presence: Box::new(presence),
        }
    }
}

impl fmt::Display for DecoderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKey::Primitive(kind) => write!(f, "{kind:?}"),
            DecoderKey::Nullable { value, presence } => write!(f, "{value}?[{presence}]"),
            DecoderKey::SelfRef => f.write_str("self"),
            DecoderKey::SelfList => f.write_str("self[]"),
            DecoderKey::Skip(len) => write!(f, "skip({len})"),
            DecoderKey::Custom(label) => write!(f, "#{label}"),
        }
    }
}
