use std::{borrow::Cow, fmt, sync::Arc};

use super::{
    erased::{ErasedFactory, erase},
    key::{DecoderKey, PrimitiveKind},
};
use crate::codec::DecoderFactory;

/// 组合图中声明的一个步骤，声明顺序即线格式中的字段顺序。
#[derive(Clone)]
pub enum CompositionStep {
    /// 按设置构造的原语。
    Primitive(PrimitiveKind),
    /// 调用方提供的任意解码器工厂；每个嵌套步骤独占一个图节点。
    Nested(NestedStep),
    /// 先解码 `presence`（必须产出 `bool`），为真时再解码 `value`。
    Nullable {
        value: Box<CompositionStep>,
        presence: Box<CompositionStep>,
    },
    /// 正在构建的组合类型自身；只能出现在可空步骤内部，否则永远无法终止。
    SelfReference,
    /// 以 32 位 `Int` 个数为前缀的同类型列表，产出 `Vec<T>`；个数为零时终止递归。
    SelfList,
    /// 跳过固定数量的原始字节，不产出字段。
    Skip(usize),
    /// 通过标签引用 [`DecoderComposer::register`](super::DecoderComposer::register) 登记的共享解码器。
    Shared(Cow<'static, str>),
}

/// 嵌套步骤携带的类型擦除工厂。
#[derive(Clone)]
pub struct NestedStep {
    pub(crate) factory: Arc<dyn ErasedFactory>,
}

impl fmt::Debug for NestedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NestedStep")
            .field(&self.factory.value_type_name())
            .finish()
    }
}

impl fmt::Debug for CompositionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionStep::Primitive(kind) => f.debug_tuple("Primitive").field(kind).finish(),
            CompositionStep::Nested(nested) => nested.fmt(f),
            CompositionStep::Nullable { value, presence } => f
                .debug_struct("Nullable")
                .field("value", value)
                .field("presence", presence)
                .finish(),
            CompositionStep::SelfReference => f.write_str("SelfReference"),
            CompositionStep::SelfList => f.write_str("SelfList"),
            CompositionStep::Skip(len) => f.debug_tuple("Skip").field(len).finish(),
            CompositionStep::Shared(label) => f.debug_tuple("Shared").field(label).finish(),
        }
    }
}

impl CompositionStep {
    pub fn nested<U, F>(factory: F) -> Self
    where
        U: Send + 'static,
        F: DecoderFactory<U> + 'static,
    {
        CompositionStep::Nested(NestedStep {
            factory: erase(factory),
        })
    }

    /// 以单字节布尔作为存在标记的可空步骤。
    pub fn nullable(value: CompositionStep) -> Self {
        Self::nullable_with(value, CompositionStep::Primitive(PrimitiveKind::Boolean))
    }

    pub fn nullable_with(value: CompositionStep, presence: CompositionStep) -> Self {
        CompositionStep::Nullable {
            value: Box::new(value),
            presence: Box::new(presence),
        }
    }

    /// 缓存键；嵌套步骤没有可比较的身份，返回 `None`。
    pub fn key(&self) -> Option<DecoderKey> {
        match self {
            CompositionStep::Primitive(kind) => Some(DecoderKey::Primitive(*kind)),
            CompositionStep::Nested(_) => None,
            CompositionStep::Nullable { value, presence } => {
                Some(DecoderKey::nullable(value.key()?, presence.key()?))
            }
            CompositionStep::SelfReference => Some(DecoderKey::SelfRef),
            CompositionStep::SelfList => Some(DecoderKey::SelfList),
            CompositionStep::Skip(len) => Some(DecoderKey::Skip(*len)),
            CompositionStep::Shared(label) => Some(DecoderKey::Custom(label.clone())),
        }
    }
}
