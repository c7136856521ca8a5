//! [`EncoderExt`](super::EncoderExt) 组合子的具体类型。

use std::marker::PhantomData;

use super::encoder::Encoder;
use crate::{CodecError, Result, buffer::ByteSink, error::codes};

/// 见 [`EncoderExt::map_input`](super::EncoderExt::map_input)。
#[derive(Debug)]
pub struct MapInput<E, F, T> {
    inner: E,
    f: F,
    _target: PhantomData<fn() -> T>,
}

impl<E, F, T> MapInput<E, F, T> {
    pub(crate) fn new(inner: E, f: F) -> Self {
        Self {
            inner,
            f,
            _target: PhantomData,
        }
    }
}

impl<U, T, E, F> Encoder<U> for MapInput<E, F, T>
where
    U: ?Sized,
    E: Encoder<T>,
    F: Fn(&U) -> T + Send + Sync,
{
    fn encode(&self, value: &U, sink: &mut dyn ByteSink) -> Result<()> {
        self.inner.encode(&(self.f)(value), sink)
    }
}

/// 见 [`EncoderExt::optional`](super::EncoderExt::optional)。
#[derive(Debug)]
pub struct OptionalEncoder<E, P> {
    value: E,
    presence: P,
}

impl<E, P> OptionalEncoder<E, P> {
    pub(crate) fn new(value: E, presence: P) -> Self {
        Self { value, presence }
    }
}

impl<T, E, P> Encoder<Option<T>> for OptionalEncoder<E, P>
where
    E: Encoder<T>,
    P: Encoder<bool>,
{
    fn encode(&self, value: &Option<T>, sink: &mut dyn ByteSink) -> Result<()> {
        self.presence.encode(&value.is_some(), sink)?;
        match value {
            Some(inner) => self.value.encode(inner, sink),
            None => Ok(()),
        }
    }
}

/// 见 [`EncoderExt::pair`](super::EncoderExt::pair)。
#[derive(Debug)]
pub struct PairEncoder<A, B> {
    first: A,
    second: B,
}

impl<A, B> PairEncoder<A, B> {
    pub(crate) fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<T, U, A, B> Encoder<(T, U)> for PairEncoder<A, B>
where
    A: Encoder<T>,
    B: Encoder<U>,
{
    fn encode(&self, value: &(T, U), sink: &mut dyn ByteSink) -> Result<()> {
        self.first.encode(&value.0, sink)?;
        self.second.encode(&value.1, sink)
    }
}

/// 见 [`EncoderExt::repeat_prefixed`](super::EncoderExt::repeat_prefixed)。
#[derive(Debug)]
pub struct PrefixedRepeatEncoder<E, L> {
    element: E,
    count: L,
}

impl<E, L> PrefixedRepeatEncoder<E, L> {
    pub(crate) fn new(element: E, count: L) -> Self {
        Self { element, count }
    }
}

impl<T, E, L> Encoder<[T]> for PrefixedRepeatEncoder<E, L>
where
    E: Encoder<T>,
    L: Encoder<i32>,
{
    fn encode(&self, value: &[T], sink: &mut dyn ByteSink) -> Result<()> {
        let count = i32::try_from(value.len()).map_err(|_| {
            CodecError::new(
                codes::FORMAT_INVALID_LENGTH,
                format!("{} elements do not fit a 32-bit count prefix", value.len()),
            )
        })?;
        self.count.encode(&count, sink)?;
        value
            .iter()
            .try_for_each(|element| self.element.encode(element, sink))
    }
}

impl<T, E, L> Encoder<Vec<T>> for PrefixedRepeatEncoder<E, L>
where
    E: Encoder<T>,
    L: Encoder<i32>,
{
    fn encode(&self, value: &Vec<T>, sink: &mut dyn ByteSink) -> Result<()> {
        Encoder::<[T]>::encode(self, value, sink)
    }
}

/// 见 [`EncoderExt::repeat_until`](super::EncoderExt::repeat_until)。
///
/// 与结束元素相等的普通元素会让解码端提前终止，因此编码时直接拒绝。
#[derive(Debug)]
pub struct TerminatedRepeatEncoder<E, T> {
    element: E,
    end: T,
}

impl<E, T> TerminatedRepeatEncoder<E, T> {
    pub(crate) fn new(element: E, end: T) -> Self {
        Self { element, end }
    }
}

impl<T, E> Encoder<[T]> for TerminatedRepeatEncoder<E, T>
where
    T: PartialEq + Send + Sync,
    E: Encoder<T>,
{
    fn encode(&self, value: &[T], sink: &mut dyn ByteSink) -> Result<()> {
        for (index, element) in value.iter().enumerate() {
            if *element == self.end {
                return Err(CodecError::new(
                    codes::FORMAT_EMBEDDED_TERMINATOR,
                    format!("element {index} equals the end marker"),
                ));
            }
            self.element.encode(element, sink)?;
        }
        self.element.encode(&self.end, sink)
    }
}

impl<T, E> Encoder<Vec<T>> for TerminatedRepeatEncoder<E, T>
where
    T: PartialEq + Send + Sync,
    E: Encoder<T>,
{
    fn encode(&self, value: &Vec<T>, sink: &mut dyn ByteSink) -> Result<()> {
        Encoder::<[T]>::encode(self, value, sink)
    }
}
