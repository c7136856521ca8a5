//! [`DecoderExt`](super::DecoderExt) 组合子的具体类型。
//!
//! 每个适配器只记录“自己这一层”的进度，子解码器的进度由子解码器自身保存；
//! 因此任意嵌套的组合在 `Incomplete` 后都能从原位置恢复。

use tracing::debug;

use super::decoder::{DecodeOutcome, DecodeResult, Decoder};
use crate::{CodecError, Result, buffer::ByteSource, error::codes};

/// 列表预分配的上限，防止恶意长度前缀触发巨量分配。
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

/// 见 [`DecoderExt::map`](super::DecoderExt::map)。
#[derive(Debug)]
pub struct Map<D, F> {
    inner: D,
    f: F,
}

impl<D, F> Map<D, F> {
    pub(crate) fn new(inner: D, f: F) -> Self {
        Self { inner, f }
    }
}

impl<D, F, R> Decoder for Map<D, F>
where
    D: Decoder,
    F: FnMut(D::Item) -> R + Send,
{
    type Item = R;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<R> {
        let f = &mut self.f;
        Ok(self.inner.decode(src)?.map(f))
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// 见 [`DecoderExt::try_map`](super::DecoderExt::try_map)。
#[derive(Debug)]
pub struct TryMap<D, F> {
    inner: D,
    f: F,
}

impl<D, F> TryMap<D, F> {
    pub(crate) fn new(inner: D, f: F) -> Self {
        Self { inner, f }
    }
}

impl<D, F, R> Decoder for TryMap<D, F>
where
    D: Decoder,
    F: FnMut(D::Item) -> Result<R> + Send,
{
    type Item = R;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<R> {
        match self.inner.decode(src)? {
            DecodeOutcome::Done { value, consumed } => {
                let value = (self.f)(value)?;
                Ok(DecodeOutcome::done(value, consumed))
            }
            DecodeOutcome::Incomplete => Ok(DecodeOutcome::Incomplete),
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// 见 [`DecoderExt::and_then`](super::DecoderExt::and_then)。
#[derive(Debug)]
pub struct AndThen<D, N, F> {
    first: D,
    next: Option<N>,
    make_next: F,
    consumed: usize,
}

impl<D, N, F> AndThen<D, N, F> {
    pub(crate) fn new(first: D, make_next: F) -> Self {
        Self {
            first,
            next: None,
            make_next,
            consumed: 0,
        }
    }
}

impl<D, N, F> Decoder for AndThen<D, N, F>
where
    D: Decoder,
    N: Decoder,
    F: FnMut(D::Item) -> N + Send,
{
    type Item = N::Item;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<N::Item> {
        let next = match self.next.as_mut() {
            Some(next) => next,
            None => match self.first.decode(src)? {
                DecodeOutcome::Done { value, consumed } => {
                    self.consumed = consumed;
                    self.next.insert((self.make_next)(value))
                }
                DecodeOutcome::Incomplete => return Ok(DecodeOutcome::Incomplete),
            },
        };
        match next.decode(src) {
            Ok(DecodeOutcome::Done { value, consumed }) => {
                let total = self.consumed + consumed;
                self.reset();
                Ok(DecodeOutcome::done(value, total))
            }
            Ok(DecodeOutcome::Incomplete) => Ok(DecodeOutcome::Incomplete),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.first.reset();
        self.next = None;
        self.consumed = 0;
    }
}

/// 见 [`DecoderExt::optional`](super::DecoderExt::optional)。
#[derive(Debug)]
pub struct Optional<D, P> {
    value: D,
    presence: P,
    /// `Some(n)`：已确认存在，存在标记占用了 `n` 字节。
    present: Option<usize>,
}

impl<D, P> Optional<D, P> {
    pub(crate) fn new(value: D, presence: P) -> Self {
        Self {
            value,
            presence,
            present: None,
        }
    }
}

impl<D, P> Decoder for Optional<D, P>
where
    D: Decoder,
    P: Decoder<Item = bool>,
{
    type Item = Option<D::Item>;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        let head = match self.present {
            Some(head) => head,
            None => match self.presence.decode(src)? {
                DecodeOutcome::Done {
                    value: false,
                    consumed,
                } => return Ok(DecodeOutcome::done(None, consumed)),
                DecodeOutcome::Done {
                    value: true,
                    consumed,
                } => *self.present.insert(consumed),
                DecodeOutcome::Incomplete => return Ok(DecodeOutcome::Incomplete),
            },
        };
        match self.value.decode(src) {
            Ok(DecodeOutcome::Done { value, consumed }) => {
                self.present = None;
                Ok(DecodeOutcome::done(Some(value), head + consumed))
            }
            Ok(DecodeOutcome::Incomplete) => Ok(DecodeOutcome::Incomplete),
            Err(err) => {
                self.present = None;
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.value.reset();
        self.presence.reset();
        self.present = None;
    }
}

/// 见 [`DecoderExt::pair`](super::DecoderExt::pair)。
#[derive(Debug)]
pub struct Pair<A: Decoder, B> {
    first: A,
    second: B,
    held: Option<(A::Item, usize)>,
}

impl<A: Decoder, B> Pair<A, B> {
    pub(crate) fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            held: None,
        }
    }
}

impl<A, B> Decoder for Pair<A, B>
where
    A: Decoder,
    A::Item: Send,
    B: Decoder,
{
    type Item = (A::Item, B::Item);

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        let (first, head) = match self.held.take() {
            Some(held) => held,
            None => match self.first.decode(src)? {
                DecodeOutcome::Done { value, consumed } => (value, consumed),
                DecodeOutcome::Incomplete => return Ok(DecodeOutcome::Incomplete),
            },
        };
        match self.second.decode(src)? {
            DecodeOutcome::Done { value, consumed } => {
                Ok(DecodeOutcome::done((first, value), head + consumed))
            }
            DecodeOutcome::Incomplete => {
                self.held = Some((first, head));
                Ok(DecodeOutcome::Incomplete)
            }
        }
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
        self.held = None;
    }
}

/// 已收集的元素及其累计字节数。
#[derive(Debug)]
struct Collected<T> {
    items: Vec<T>,
    consumed: usize,
}

impl<T> Collected<T> {
    fn with_expected(expected: usize, head: usize) -> Self {
        Self {
            items: Vec::with_capacity(expected.min(MAX_PREALLOCATED_ELEMENTS)),
            consumed: head,
        }
    }

    fn finish(&mut self) -> DecodeOutcome<Vec<T>> {
        let consumed = std::mem::take(&mut self.consumed);
        DecodeOutcome::done(std::mem::take(&mut self.items), consumed)
    }
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            consumed: 0,
        }
    }
}

/// 循环驱动 `element` 直到收集到 `expected` 个元素。
fn collect_exact<D: Decoder>(
    element: &mut D,
    collected: &mut Collected<D::Item>,
    expected: usize,
    src: &mut dyn ByteSource,
) -> Result<bool> {
    while collected.items.len() < expected {
        match element.decode(src)? {
            DecodeOutcome::Done { value, consumed } => {
                collected.items.push(value);
                collected.consumed += consumed;
            }
            DecodeOutcome::Incomplete => return Ok(false),
        }
    }
    Ok(true)
}

/// 见 [`DecoderExt::repeat_prefixed`](super::DecoderExt::repeat_prefixed)。
#[derive(Debug)]
pub struct PrefixedRepeat<D: Decoder, L> {
    element: D,
    count: L,
    expected: Option<usize>,
    collected: Collected<D::Item>,
}

impl<D: Decoder, L> PrefixedRepeat<D, L> {
    pub(crate) fn new(element: D, count: L) -> Self {
        Self {
            element,
            count,
            expected: None,
            collected: Collected::default(),
        }
    }
}

impl<D, L> Decoder for PrefixedRepeat<D, L>
where
    D: Decoder,
    D::Item: Send,
    L: Decoder<Item = i32>,
{
    type Item = Vec<D::Item>;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        let expected = match self.expected {
            Some(expected) => expected,
            None => match self.count.decode(src)? {
                DecodeOutcome::Done { value, consumed } => {
                    let Ok(expected) = usize::try_from(value) else {
                        debug!(count = value, "negative element count rejected");
                        return Err(CodecError::new(
                            codes::FORMAT_INVALID_LENGTH,
                            format!("element count must not be negative, got {value}"),
                        ));
                    };
                    self.collected = Collected::with_expected(expected, consumed);
                    *self.expected.insert(expected)
                }
                DecodeOutcome::Incomplete => return Ok(DecodeOutcome::Incomplete),
            },
        };
        match collect_exact(&mut self.element, &mut self.collected, expected, src) {
            Ok(true) => {
                self.expected = None;
                Ok(self.collected.finish())
            }
            Ok(false) => Ok(DecodeOutcome::Incomplete),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.element.reset();
        self.count.reset();
        self.expected = None;
        self.collected = Collected::default();
    }
}

/// 见 [`DecoderExt::repeat_exact`](super::DecoderExt::repeat_exact)。
#[derive(Debug)]
pub struct ExactRepeat<D: Decoder> {
    element: D,
    count: usize,
    collected: Collected<D::Item>,
}

impl<D: Decoder> ExactRepeat<D> {
    pub(crate) fn new(element: D, count: usize) -> Self {
        Self {
            element,
            count,
            collected: Collected::with_expected(count, 0),
        }
    }
}

impl<D> Decoder for ExactRepeat<D>
where
    D: Decoder,
    D::Item: Send,
{
    type Item = Vec<D::Item>;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        match collect_exact(&mut self.element, &mut self.collected, self.count, src) {
            Ok(true) => {
                let outcome = self.collected.finish();
                self.collected = Collected::with_expected(self.count, 0);
                Ok(outcome)
            }
            Ok(false) => Ok(DecodeOutcome::Incomplete),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.element.reset();
        self.collected = Collected::with_expected(self.count, 0);
    }
}

/// 见 [`DecoderExt::repeat_until`](super::DecoderExt::repeat_until)。
#[derive(Debug)]
pub struct UntilRepeat<D: Decoder, F> {
    element: D,
    keep_last: bool,
    is_end: F,
    collected: Collected<D::Item>,
}

impl<D: Decoder, F> UntilRepeat<D, F> {
    pub(crate) fn new(element: D, keep_last: bool, is_end: F) -> Self {
        Self {
            element,
            keep_last,
            is_end,
            collected: Collected::default(),
        }
    }
}

impl<D, F> Decoder for UntilRepeat<D, F>
where
    D: Decoder,
    D::Item: Send,
    F: FnMut(&D::Item) -> bool + Send,
{
    type Item = Vec<D::Item>;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<Self::Item> {
        loop {
            match self.element.decode(src) {
                Ok(DecodeOutcome::Done { value, consumed }) => {
                    self.collected.consumed += consumed;
                    let end = (self.is_end)(&value);
                    if !end || self.keep_last {
                        self.collected.items.push(value);
                    }
                    if end {
                        return Ok(self.collected.finish());
                    }
                }
                Ok(DecodeOutcome::Incomplete) => return Ok(DecodeOutcome::Incomplete),
                Err(err) => {
                    self.reset();
                    return Err(err);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.element.reset();
        self.collected = Collected::default();
    }
}
