//! 组合图内部使用的类型擦除层。
//!
//! 图中的叶子产出类型各不相同，统一擦除为 `Box<dyn Any + Send>`；
//! 终结映射函数通过 [`Fields`](super::Fields) 按声明类型取回。

use std::{
    any::{Any, TypeId, type_name},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    buffer::ByteSource,
    codec::{DecodeResult, Decoder, DecoderFactory},
};

pub(crate) type AnyValue = Box<dyn Any + Send>;

pub(crate) trait ErasedDecoder: Send {
    fn decode_any(&mut self, src: &mut dyn ByteSource) -> DecodeResult<AnyValue>;
}

impl<D> ErasedDecoder for D
where
    D: Decoder + ?Sized,
    D::Item: Send + 'static,
{
    fn decode_any(&mut self, src: &mut dyn ByteSource) -> DecodeResult<AnyValue> {
        Ok(self
            .decode(src)?
            .map(|value| Box::new(value) as AnyValue))
    }
}

pub(crate) trait ErasedFactory: Send + Sync {
    fn instantiate(&self) -> Box<dyn ErasedDecoder>;

    /// 产出值的类型，用于构建期校验存在标记必须是 `bool`。
    fn value_type(&self) -> TypeId;

    fn value_type_name(&self) -> &'static str;
}

struct Typed<U, F> {
    factory: F,
    _value: PhantomData<fn() -> U>,
}

impl<U, F> ErasedFactory for Typed<U, F>
where
    U: Send + 'static,
    F: DecoderFactory<U>,
{
    fn instantiate(&self) -> Box<dyn ErasedDecoder> {
        Box::new(self.factory.create())
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<U>()
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<U>()
    }
}

pub(crate) fn erase<U, F>(factory: F) -> Arc<dyn ErasedFactory>
where
    U: Send + 'static,
    F: DecoderFactory<U> + 'static,
{
    Arc::new(Typed {
        factory,
        _value: PhantomData,
    })
}
